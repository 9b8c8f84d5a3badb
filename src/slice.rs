// Slice and macroblock layer.
//
// A slice covers one or more macroblocks of a single macroblock row.
// Every macroblock is reconstructed straight into the current frame:
// intra blocks are transformed and stored, inter blocks are predicted
// from the reference frames first and the residual is added on top.

use log::trace;

use crate::bits::BitCursor;
use crate::frame::Targets;
use crate::idct::InverseDct;
use crate::motion::{Blend, MotionCompensator, Phase};
use crate::picture::{CodingType, PictureParams};
use crate::vlc::{
    tables, Coefficient, Tables, MB_INTRA, MB_MOTION_BACKWARD, MB_MOTION_FORWARD, MB_PATTERN,
    MB_QUANT,
};

/// Backends borrowed for the duration of one slice.
#[derive(Clone, Copy)]
pub(crate) struct Backends<'a> {
    pub mc: &'a dyn MotionCompensator,
    pub idct: &'a dyn InverseDct,
}

/// Result of decoding one slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SliceOutcome {
    /// The slice ran past the last macroblock of the picture.
    pub picture_complete: bool,
    /// Damaged constructs that were skipped.
    pub corrupt: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MotionType {
    /// No vector coded; predict from the forward reference in place.
    Zero,
    Field,
    Frame,
    DualPrime,
}

impl MotionType {
    fn from_code(code: u32) -> Self {
        match code {
            1 => MotionType::Field,
            2 => MotionType::Frame,
            3 => MotionType::DualPrime,
            _ => MotionType::Zero,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Modes {
    flags: u8,
    motion: MotionType,
    interlaced_dct: bool,
}

impl Modes {
    fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Motion vector predictors of one prediction direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MotionPredictor {
    /// `pmv[vector][component]` in half-pel units (full-pel for MPEG-1
    /// full_pel vectors).
    pub pmv: [[i32; 2]; 2],
    /// Residual bits per component, `f_code - 1`.
    pub r_size: [u32; 2],
    pub full_pel: bool,
}

impl MotionPredictor {
    fn new(f_code: [u8; 2], full_pel: bool) -> Self {
        MotionPredictor {
            pmv: [[0; 2]; 2],
            r_size: [
                u32::from(f_code[0].saturating_sub(1)),
                u32::from(f_code[1].saturating_sub(1)),
            ],
            full_pel,
        }
    }

    fn reset(&mut self) {
        self.pmv = [[0; 2]; 2];
    }

    fn set_both(&mut self, component: usize, value: i32) {
        self.pmv[0][component] = value;
        self.pmv[1][component] = value;
    }
}

/// Wrap a reconstructed vector component into `[-16 << r, 16 << r)`.
fn bound_vector(vector: i32, r_size: u32) -> i32 {
    let limit = 16 << r_size;
    if vector >= limit {
        vector - 2 * limit
    } else if vector < -limit {
        vector + 2 * limit
    } else {
        vector
    }
}

fn dual_prime_vector(vector: i32, m: i32) -> i32 {
    (vector * m + i32::from(vector > 0)) >> 1
}

/// How the coefficients of a block are coded.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BlockCoding {
    pub intra: bool,
    pub mpeg1: bool,
    /// Intra blocks of MPEG-2 pictures with intra_vlc_format set.
    pub table_one: bool,
}

pub(crate) struct Quantizer<'q> {
    pub scale: i32,
    pub matrix: &'q [u8; 64],
    pub scan: &'q [u8; 64],
}

impl Quantizer<'_> {
    fn weight(&self, index: usize) -> i32 {
        self.scale * i32::from(self.matrix[index])
    }
}

// MPEG-1 forces reconstructed levels to be odd, towards zero.
fn oddify(value: i32) -> i32 {
    (value + !(value >> 31)) | 1
}

fn dequantize(coding: BlockCoding, level: i32, weight: i32) -> i32 {
    match (coding.mpeg1, coding.intra) {
        (false, true) => (level * weight) >> 4,
        (false, false) => ((2 * level + 1) * weight) >> 5,
        (true, true) => oddify((level * weight) >> 4),
        (true, false) => oddify(((2 * level + 1) * weight) >> 5),
    }
}

fn dequantize_escape(coding: BlockCoding, level: i32, weight: i32) -> i32 {
    // Non-intra levels are reconstructed as 2 * level + sign(level).
    let non_intra = || (2 * (level + (level >> 31)) + 1) * weight / 32;
    match (coding.mpeg1, coding.intra) {
        (false, true) => level * weight / 16,
        (false, false) => non_intra(),
        (true, true) => oddify(level * weight / 16),
        (true, false) => oddify(non_intra()),
    }
}

fn mpeg1_escape_level(cursor: &mut BitCursor) -> i32 {
    let level = cursor.read_signed(8);
    if level & 0x7f == 0 {
        // 16 bit form: -128 or 0 followed by the low byte.
        cursor.read(8) as i32 + 2 * level
    } else {
        level
    }
}

/// Read the coefficients of one block into `block` in natural order.
/// For intra blocks the DC coefficient must already be in place.
///
/// Returns false when the block was cut short by an invalid code or a
/// run past the last coefficient; whatever was decoded stays in
/// `block`.
pub(crate) fn read_coefficients(
    cursor: &mut BitCursor,
    tables: &Tables,
    coding: BlockCoding,
    quant: &Quantizer,
    block: &mut [i32; 64],
) -> bool {
    let mut i = usize::from(coding.intra);
    let mut mismatch = if coding.intra { !block[0] } else { 1 };
    let mut first = !coding.intra;

    loop {
        // The first coefficient of a non-intra block codes (0, 1) as a
        // single '1', where later ones would read end of block.
        let symbol = if first && cursor.peek(1) == 1 {
            cursor.consume(1);
            Some(Coefficient::RunLevel { run: 0, level: 1 })
        } else {
            tables.coefficient(cursor, coding.table_one)
        };
        first = false;

        let (index, value) = match symbol {
            Some(Coefficient::EndOfBlock) => break,
            Some(Coefficient::RunLevel { run, level }) => {
                i += usize::from(run);
                if i >= 64 {
                    return false;
                }
                let index = usize::from(quant.scan[i]);
                let magnitude = dequantize(coding, i32::from(level), quant.weight(index));
                let value = if cursor.read_bit() { -magnitude } else { magnitude };
                (index, value)
            }
            Some(Coefficient::Escape) => {
                i += cursor.read(6) as usize;
                if i >= 64 {
                    return false;
                }
                let index = usize::from(quant.scan[i]);
                let level = if coding.mpeg1 {
                    mpeg1_escape_level(cursor)
                } else {
                    cursor.read_signed(12)
                };
                (index, dequantize_escape(coding, level, quant.weight(index)))
            }
            None => return false,
        };

        let value = value.clamp(-2048, 2047);
        block[index] = value;
        mismatch ^= value;
        i += 1;
    }

    if !coding.mpeg1 {
        block[63] ^= mismatch & 1;
    }
    true
}

/// State of one slice being decoded into the current frame.
pub(crate) struct SliceDecoder<'a> {
    params: &'a PictureParams,
    backends: Backends<'a>,
    tables: &'static Tables,
    cursor: BitCursor<'a>,
    targets: Targets<'a>,

    forward: MotionPredictor,
    backward: MotionPredictor,
    dc_pred: [i32; 3],
    quantizer_scale: i32,
    block: [i32; 64],

    mba: usize,
    /// First luma sample of the current macroblock row.
    luma_base: usize,
    chroma_base: usize,
    /// Horizontal luma position of the current macroblock.
    offset: usize,
    corrupt: u32,
}

/// Decode the slice in macroblock row `row`. `data` is the slice
/// payload following its start code.
pub(crate) fn decode_slice(
    params: &PictureParams,
    backends: Backends,
    targets: Targets,
    row: usize,
    data: &[u8],
) -> SliceOutcome {
    let mut slice = SliceDecoder::new(params, backends, targets, row, data);
    let picture_complete = slice.run();
    SliceOutcome {
        picture_complete,
        corrupt: slice.corrupt,
    }
}

impl<'a> SliceDecoder<'a> {
    fn new(
        params: &'a PictureParams,
        backends: Backends<'a>,
        targets: Targets<'a>,
        row: usize,
        data: &'a [u8],
    ) -> Self {
        let mut slice = SliceDecoder {
            params,
            backends,
            tables: tables(),
            cursor: BitCursor::new(data),
            targets,
            forward: MotionPredictor::new(params.f_code[0], params.full_pel[0]),
            backward: MotionPredictor::new(params.f_code[1], params.full_pel[1]),
            dc_pred: [params.dc_reset(); 3],
            quantizer_scale: 0,
            block: [0; 64],
            mba: 0,
            luma_base: 0,
            chroma_base: 0,
            offset: 0,
            corrupt: 0,
        };
        slice.seek(row * params.mb_width);
        slice
    }

    /// Returns true if the picture is complete.
    fn run(&mut self) -> bool {
        let params = self.params;
        self.quantizer_scale = params.quantizer_scale(self.cursor.read(5));
        // intra_slice and extra_information_slice
        while self.cursor.read_bit() {
            self.cursor.consume(8);
        }

        let increment = self.tables.macroblock_address_increment(&mut self.cursor) as usize;
        if increment == 0 {
            trace!("empty slice at mba {}", self.mba);
            return false;
        }
        self.seek(self.mba + increment - 1);

        loop {
            if self.mba > params.last_mba {
                self.corrupt += 1;
                break;
            }
            let modes = match self.macroblock() {
                Some(modes) => modes,
                None => {
                    trace!("invalid macroblock type at mba {}, bit {}", self.mba, self.cursor.position());
                    self.corrupt += 1;
                    break;
                }
            };
            self.advance();

            let increment = self.tables.macroblock_address_increment(&mut self.cursor);
            if increment == 0 {
                break;
            }
            if increment > 1 {
                self.dc_pred = [params.dc_reset(); 3];
                if params.coding_type == CodingType::P {
                    self.forward.reset();
                }
                for _ in 1..increment {
                    if self.mba > params.last_mba {
                        self.corrupt += 1;
                        return true;
                    }
                    self.skipped_macroblock(modes);
                    self.advance();
                }
            }
        }

        self.mba > params.last_mba
    }

    fn seek(&mut self, mba: usize) {
        let width = self.params.width;
        let mb_width = self.params.mb_width.max(1);
        let row = mba / mb_width;
        self.mba = mba;
        self.luma_base = row * 16 * width;
        self.chroma_base = row * 4 * width;
        self.offset = (mba % mb_width) * 16;
    }

    fn advance(&mut self) {
        let width = self.params.width;
        self.mba += 1;
        self.offset += 16;
        if self.offset >= width {
            self.luma_base += 16 * width;
            self.chroma_base += 4 * width;
            self.offset = 0;
        }
    }

    fn macroblock(&mut self) -> Option<Modes> {
        let modes = self.macroblock_modes()?;
        if modes.has(MB_QUANT) {
            self.quantizer_scale = self.params.quantizer_scale(self.cursor.read(5));
        }
        if modes.has(MB_INTRA) {
            self.intra_macroblock(modes);
        } else {
            self.inter_macroblock(modes);
        }
        Some(modes)
    }

    fn macroblock_modes(&mut self) -> Option<Modes> {
        let params = self.params;
        let flags = self.tables.macroblock_type(&mut self.cursor, params.coding_type)?;
        let mut modes = Modes {
            flags,
            motion: MotionType::Zero,
            interlaced_dct: false,
        };
        let frame_only = params.frame_pred_frame_dct;

        match params.coding_type {
            CodingType::I => {
                if !frame_only {
                    modes.interlaced_dct = self.cursor.read_bit();
                }
            }
            CodingType::P => {
                if frame_only {
                    if modes.has(MB_MOTION_FORWARD) {
                        modes.motion = MotionType::Frame;
                    }
                } else {
                    if modes.has(MB_MOTION_FORWARD) {
                        modes.motion = MotionType::from_code(self.cursor.read(2));
                    }
                    if modes.has(MB_INTRA | MB_PATTERN) {
                        modes.interlaced_dct = self.cursor.read_bit();
                    }
                }
            }
            CodingType::B => {
                if frame_only {
                    modes.motion = MotionType::Frame;
                } else {
                    if !modes.has(MB_INTRA) {
                        modes.motion = MotionType::from_code(self.cursor.read(2));
                    }
                    if modes.has(MB_INTRA | MB_PATTERN) {
                        modes.interlaced_dct = self.cursor.read_bit();
                    }
                }
            }
            CodingType::D => {}
        }
        Some(modes)
    }

    /// Luma block offset and stride for the DCT type of a macroblock.
    fn dct_layout(&self, modes: Modes) -> (usize, usize) {
        let width = self.params.width;
        if modes.interlaced_dct {
            (width, width * 2)
        } else {
            (width * 8, width)
        }
    }

    fn intra_macroblock(&mut self, modes: Modes) {
        if self.params.concealment_motion_vectors {
            // Parsed to keep the predictors right, never applied.
            self.frame_vector(Direction::Forward);
            self.cursor.consume(1);
        } else {
            self.forward.reset();
            self.backward.reset();
        }

        let (dct_offset, dct_stride) = self.dct_layout(modes);
        let luma = self.luma_base + self.offset;
        for dst in [luma, luma + 8, luma + dct_offset, luma + dct_offset + 8] {
            self.intra_block(0, dst, dct_stride);
        }
        let chroma = self.chroma_base + self.offset / 2;
        let chroma_stride = self.params.width / 2;
        self.intra_block(1, chroma, chroma_stride);
        self.intra_block(2, chroma, chroma_stride);

        if self.params.coding_type == CodingType::D {
            // end_of_macroblock
            self.cursor.consume(1);
        }
    }

    fn intra_block(&mut self, component: usize, dst: usize, stride: usize) {
        let params = self.params;
        let differential = self.tables.dc_differential(&mut self.cursor, component == 0);
        self.dc_pred[component] = self.dc_pred[component].wrapping_add(differential);
        // Damaged streams can walk the predictor out of range; the IDCT
        // input must stay within 12 bits like every other coefficient.
        let dc = self.dc_pred[component].clamp(-2048, 2047) << (3 - u32::from(params.intra_dc_precision));
        self.block[0] = dc.clamp(-2048, 2047);

        if params.coding_type != CodingType::D {
            let coding = BlockCoding {
                intra: true,
                mpeg1: params.mpeg1,
                table_one: !params.mpeg1 && params.intra_vlc_format,
            };
            let quant = Quantizer {
                scale: self.quantizer_scale,
                matrix: &params.intra_quant_matrix,
                scan: params.scan(),
            };
            if !read_coefficients(&mut self.cursor, self.tables, coding, &quant, &mut self.block) {
                self.corrupt += 1;
            }
        }

        let plane = self.targets.current.plane_mut(component);
        self.backends.idct.put_block(&mut self.block, &mut plane.data[dst..], stride);
    }

    fn non_intra_block(&mut self, component: usize, dst: usize, stride: usize) {
        let params = self.params;
        let coding = BlockCoding {
            intra: false,
            mpeg1: params.mpeg1,
            table_one: false,
        };
        let quant = Quantizer {
            scale: self.quantizer_scale,
            matrix: &params.non_intra_quant_matrix,
            scan: params.scan(),
        };
        if !read_coefficients(&mut self.cursor, self.tables, coding, &quant, &mut self.block) {
            self.corrupt += 1;
        }

        let plane = self.targets.current.plane_mut(component);
        self.backends.idct.add_block(&mut self.block, &mut plane.data[dst..], stride);
    }

    fn inter_macroblock(&mut self, modes: Modes) {
        let width = self.params.width;
        match modes.motion {
            MotionType::Frame | MotionType::Field => {
                if modes.has(MB_MOTION_FORWARD) {
                    self.motion(modes.motion, Direction::Forward, Blend::Put);
                }
                if modes.has(MB_MOTION_BACKWARD) {
                    let blend = if modes.has(MB_MOTION_FORWARD) {
                        Blend::Avg
                    } else {
                        Blend::Put
                    };
                    self.motion(modes.motion, Direction::Backward, blend);
                }
            }
            MotionType::DualPrime => self.motion_dual_prime(),
            MotionType::Zero => {
                self.forward.reset();
                self.predict(Direction::Forward, Blend::Put, 0, 0, 0, 0, width, 16);
            }
        }

        if modes.has(MB_PATTERN) {
            match self.tables.coded_block_pattern.decode(&mut self.cursor) {
                Some(pattern) => self.coded_blocks(modes, pattern),
                None => self.corrupt += 1,
            }
        }

        self.dc_pred = [self.params.dc_reset(); 3];
    }

    fn coded_blocks(&mut self, modes: Modes, pattern: u8) {
        let (dct_offset, dct_stride) = self.dct_layout(modes);
        let luma = self.luma_base + self.offset;
        let luma_blocks = [
            (0x20, luma),
            (0x10, luma + 8),
            (0x08, luma + dct_offset),
            (0x04, luma + dct_offset + 8),
        ];
        for (mask, dst) in luma_blocks {
            if pattern & mask != 0 {
                self.non_intra_block(0, dst, dct_stride);
            }
        }

        let chroma = self.chroma_base + self.offset / 2;
        let chroma_stride = self.params.width / 2;
        if pattern & 0x2 != 0 {
            self.non_intra_block(1, chroma, chroma_stride);
        }
        if pattern & 0x1 != 0 {
            self.non_intra_block(2, chroma, chroma_stride);
        }
    }

    fn skipped_macroblock(&mut self, previous: Modes) {
        let width = self.params.width;
        if self.params.coding_type == CodingType::P {
            self.predict(Direction::Forward, Blend::Put, 0, 0, 0, 0, width, 16);
            return;
        }
        // B pictures repeat the vectors of the previous macroblock.
        if previous.has(MB_MOTION_FORWARD) {
            let [x, y] = self.forward.pmv[0];
            self.predict(Direction::Forward, Blend::Put, x, y, 0, 0, width, 16);
        }
        if previous.has(MB_MOTION_BACKWARD) {
            let blend = if previous.has(MB_MOTION_FORWARD) {
                Blend::Avg
            } else {
                Blend::Put
            };
            let [x, y] = self.backward.pmv[0];
            self.predict(Direction::Backward, blend, x, y, 0, 0, width, 16);
        }
    }

    fn predictor(&mut self, direction: Direction) -> &mut MotionPredictor {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Backward => &mut self.backward,
        }
    }

    fn motion_delta(&mut self, r_size: u32) -> i32 {
        let code = match self.tables.motion_code.decode(&mut self.cursor) {
            Some(code) => i32::from(code),
            None => {
                self.corrupt += 1;
                return 0;
            }
        };
        if code == 0 {
            return 0;
        }
        let residual = if r_size > 0 { self.cursor.read(r_size) as i32 } else { 0 };
        let delta = ((code.abs() - 1) << r_size) + residual + 1;
        if code < 0 {
            -delta
        } else {
            delta
        }
    }

    fn dual_prime(&mut self) -> i32 {
        self.tables
            .dual_prime
            .decode(&mut self.cursor)
            .map_or(0, i32::from)
    }

    /// Read one frame vector, updating both predictors of `direction`.
    fn frame_vector(&mut self, direction: Direction) -> (i32, i32) {
        let mut predictor = *self.predictor(direction);
        let [rx, ry] = predictor.r_size;
        let x = bound_vector(predictor.pmv[0][0] + self.motion_delta(rx), rx);
        predictor.set_both(0, x);
        let y = bound_vector(predictor.pmv[0][1] + self.motion_delta(ry), ry);
        predictor.set_both(1, y);
        *self.predictor(direction) = predictor;
        (x, y)
    }

    fn motion(&mut self, motion: MotionType, direction: Direction, blend: Blend) {
        let width = self.params.width;
        if motion == MotionType::Frame {
            let (x, y) = self.frame_vector(direction);
            self.predict(direction, blend, x, y, 0, 0, width, 16);
            return;
        }

        // Two field vectors, each predicting alternate lines. The
        // vertical predictor is kept in frame units.
        let mut predictor = *self.predictor(direction);
        let [rx, ry] = predictor.r_size;
        for field in 0..2 {
            let select = usize::from(self.cursor.read_bit());
            let x = bound_vector(predictor.pmv[field][0] + self.motion_delta(rx), rx);
            predictor.pmv[field][0] = x;
            let y = (predictor.pmv[field][1] >> 1) + self.motion_delta(ry);
            predictor.pmv[field][1] = y << 1;
            self.predict(direction, blend, x, y, field * width, select * width, width * 2, 8);
        }
        *self.predictor(direction) = predictor;
    }

    fn motion_dual_prime(&mut self) {
        let width = self.params.width;
        let mut predictor = self.forward;
        let [rx, ry] = predictor.r_size;

        let x = bound_vector(predictor.pmv[0][0] + self.motion_delta(rx), rx);
        predictor.set_both(0, x);
        let dmv_x = self.dual_prime();
        let y = (predictor.pmv[0][1] >> 1) + self.motion_delta(ry);
        predictor.set_both(1, y << 1);
        let dmv_y = self.dual_prime();
        self.forward = predictor;

        let top_first = self.params.top_field_first;
        let stride = width * 2;

        self.predict(Direction::Forward, Blend::Put, x, y, 0, 0, stride, 8);
        let m = if top_first { 1 } else { 3 };
        let other_x = dual_prime_vector(x, m) + dmv_x;
        let other_y = dual_prime_vector(y, m) + dmv_y - 1;
        self.predict(Direction::Forward, Blend::Avg, other_x, other_y, 0, width, stride, 8);

        self.predict(Direction::Forward, Blend::Put, x, y, width, width, stride, 8);
        let m = if top_first { 3 } else { 1 };
        let other_x = dual_prime_vector(x, m) + dmv_x;
        let other_y = dual_prime_vector(y, m) + dmv_y + 1;
        self.predict(Direction::Forward, Blend::Avg, other_x, other_y, width, 0, stride, 8);
    }

    /// Predict the current macroblock (or one of its fields) from the
    /// reference in `direction`. `dst_shift` and `src_shift` are luma
    /// offsets from the macroblock origin.
    #[allow(clippy::too_many_arguments)]
    fn predict(
        &mut self,
        direction: Direction,
        blend: Blend,
        x: i32,
        y: i32,
        dst_shift: usize,
        src_shift: usize,
        stride: usize,
        height: usize,
    ) {
        let reference = match direction {
            Direction::Forward => self.targets.forward,
            Direction::Backward => self.targets.backward,
        };
        let Some(reference) = reference else {
            trace!("no {:?} reference for mba {}", direction, self.mba);
            self.corrupt += 1;
            return;
        };
        let (x, y) = if self.predictor(direction).full_pel {
            (x << 1, y << 1)
        } else {
            (x, y)
        };

        let mc = self.backends.mc;
        let current = &mut *self.targets.current;
        let luma = self.luma_base + self.offset;
        let mut in_bounds = predict_block(
            mc,
            blend,
            (x, y),
            (16, height, stride),
            &mut current.y.data,
            luma + dst_shift,
            &reference.y.data,
            luma + src_shift,
        );

        let (x, y) = (x / 2, y / 2);
        let chroma = self.chroma_base + self.offset / 2;
        let shape = (8, height / 2, stride / 2);
        for (dst, src) in [
            (&mut current.cb.data, &reference.cb.data),
            (&mut current.cr.data, &reference.cr.data),
        ] {
            in_bounds &= predict_block(
                mc,
                blend,
                (x, y),
                shape,
                dst,
                chroma + dst_shift / 2,
                src,
                chroma + src_shift / 2,
            );
        }

        if !in_bounds {
            trace!("prediction leaves the picture at mba {}", self.mba);
            self.corrupt += 1;
        }
    }
}

/// Predict one block of one plane. `src_origin` is the co-located
/// position in the reference; the vector is applied here. Returns false
/// without touching `dst` if the block would read outside `src`.
#[allow(clippy::too_many_arguments)]
fn predict_block(
    mc: &dyn MotionCompensator,
    blend: Blend,
    (x, y): (i32, i32),
    (width, height, stride): (usize, usize, usize),
    dst: &mut [u8],
    dst_index: usize,
    src: &[u8],
    src_origin: usize,
) -> bool {
    let phase = Phase::of(x, y);
    let src_index = src_origin as isize + (x >> 1) as isize + (y >> 1) as isize * stride as isize;
    if src_index < 0 {
        return false;
    }
    let src_index = src_index as usize;
    if src_index + phase.source_extent(width, height, stride) > src.len()
        || dst_index + (height - 1) * stride + width > dst.len()
    {
        return false;
    }
    mc.predict(blend, phase, width, height, &mut dst[dst_index..], &src[src_index..], stride);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::idct::AccurateIdct;
    use crate::motion::PortableMc;
    use crate::picture::{DEFAULT_INTRA_QUANT_MATRIX, ZIGZAG_SCAN};
    use crate::testutil::StreamWriter;

    const BACKENDS: Backends<'static> = Backends {
        mc: &PortableMc,
        idct: &AccurateIdct,
    };

    fn params(width: u16, height: u16, coding_type: CodingType) -> PictureParams {
        let mut params = PictureParams::default();
        params.set_size(width, height);
        params.coding_type = coding_type;
        params
    }

    fn coefficients(bits: &str, coding: BlockCoding, scale: i32, matrix: &[u8; 64], block: &mut [i32; 64]) -> bool {
        let mut writer = StreamWriter::new();
        writer.code(bits);
        let data = writer.into_bytes();
        let mut cursor = BitCursor::new(&data);
        let quant = Quantizer {
            scale,
            matrix,
            scan: &ZIGZAG_SCAN,
        };
        read_coefficients(&mut cursor, tables(), coding, &quant, block)
    }

    const MPEG2_INTRA: BlockCoding = BlockCoding {
        intra: true,
        mpeg1: false,
        table_one: false,
    };
    const MPEG2_INTER: BlockCoding = BlockCoding {
        intra: false,
        mpeg1: false,
        table_one: false,
    };
    const MPEG1_INTRA: BlockCoding = BlockCoding {
        intra: true,
        mpeg1: true,
        table_one: false,
    };
    const MPEG1_INTER: BlockCoding = BlockCoding {
        intra: false,
        mpeg1: true,
        table_one: false,
    };

    #[test]
    fn escape_level_saturates() {
        let mut block = [0i32; 64];
        block[0] = 8;
        // escape, run 0, level 2047, end of block
        let ok = coefficients("000001 000000 011111111111 10", MPEG2_INTRA, 62, &DEFAULT_INTRA_QUANT_MATRIX, &mut block);
        assert!(ok);
        assert_eq!(block[1], 2047);
        // 8 + 2047 is odd, no mismatch correction
        assert_eq!(block[63], 0);
    }

    #[test]
    fn even_sum_toggles_last_coefficient() {
        let mut block = [0i32; 64];
        // first coefficient (0, 1) as a lone '1', positive, end of block
        let ok = coefficients("1 0 10", MPEG2_INTER, 4, &[16; 64], &mut block);
        assert!(ok);
        assert_eq!(block[0], 6);
        assert_eq!(block[63], 1);
    }

    #[test]
    fn mpeg1_levels_are_odd() {
        let mut block = [0i32; 64];
        let ok = coefficients("1 0 10", MPEG1_INTER, 4, &[16; 64], &mut block);
        assert!(ok);
        assert_eq!(block[0], 5);
        assert_eq!(block[63], 0);

        // 16 bit escape: -128 extended by 0x20 gives -224
        let mut block = [0i32; 64];
        let ok = coefficients(
            "000001 000000 10000000 00100000 10",
            MPEG1_INTRA,
            2,
            &DEFAULT_INTRA_QUANT_MATRIX,
            &mut block,
        );
        assert!(ok);
        assert_eq!(block[1], -447);
    }

    #[test]
    fn run_past_block_end_is_rejected() {
        let mut block = [0i32; 64];
        let ok = coefficients(
            "000001 111111 000000000001 000001 000001",
            MPEG2_INTER,
            2,
            &[16; 64],
            &mut block,
        );
        assert!(!ok);
        assert_ne!(block[63], 0);
    }

    #[test]
    fn vectors_wrap_around_range() {
        assert_eq!(bound_vector(15, 0), 15);
        assert_eq!(bound_vector(16, 0), -16);
        assert_eq!(bound_vector(-17, 0), 15);
        assert_eq!(bound_vector(40, 1), -24);
        assert_eq!(dual_prime_vector(5, 3), 8);
        assert_eq!(dual_prime_vector(-5, 3), -8);
    }

    #[test]
    fn slice_starts_at_its_row() {
        let params = params(32, 96, CodingType::I);
        let mut frame = Frame::new(32, 96);

        let mut writer = StreamWriter::new();
        // quantiser, no extra information, increment 2, intra
        writer.bits(5, 8).flag(false).code("011 1").flat_intra_macroblock();
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 5, &data);
        assert_eq!(
            outcome,
            SliceOutcome {
                picture_complete: true,
                corrupt: 0
            }
        );

        for y in 0..96 {
            for x in 0..32 {
                let expected = if (80..96).contains(&y) && x >= 16 { 128 } else { 0 };
                assert_eq!(frame.y.data[y * 32 + x], expected, "luma ({}, {})", x, y);
            }
        }
        assert_eq!(frame.cb.data[40 * 16 + 8], 128);
        assert_eq!(frame.cr.data[47 * 16 + 15], 128);
        assert_eq!(frame.cr.data[47 * 16 + 7], 0);
        assert_eq!(frame.cb.data[39 * 16 + 8], 0);
    }

    #[test]
    fn dc_prediction_carries_across_macroblocks() {
        let params = params(32, 16, CodingType::I);
        let mut frame = Frame::new(32, 16);

        let mut writer = StreamWriter::new();
        writer.bits(5, 8).flag(false).code("1 1");
        // first luma block: size 1, differential +1
        writer.code("00 1 10");
        for _ in 0..3 {
            writer.code("100 10");
        }
        writer.code("00 10 00 10");
        // next macroblock, all differentials zero
        writer.code("1 1").flat_intra_macroblock();
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert!(outcome.picture_complete);
        assert_eq!(frame.y.data[0], 129);
        assert_eq!(frame.y.data[15 * 32 + 31], 129);
        assert_eq!(frame.cb.data[7 * 16 + 15], 128);
    }

    fn reference(width: usize, height: usize) -> Frame {
        let mut frame = Frame::new(width, height);
        for (y, row) in frame.y.data.chunks_exact_mut(width).enumerate() {
            row.fill((y * 4) as u8);
        }
        frame.cb.data.fill(128);
        frame.cr.data.fill(128);
        frame
    }

    /// Five macroblocks: a coded one with vector (0, +1 line), three
    /// skipped ones, and a coded one with a zero differential.
    fn skip_run(writer: &mut StreamWriter, forward_type: &str) {
        writer.bits(5, 8).flag(false).code("1");
        writer.code(forward_type).code("1 0010");
        writer.code("0011");
        writer.code(forward_type).code("1 1");
    }

    #[test]
    fn p_skips_reset_the_predictor() {
        let params = params(80, 32, CodingType::P);
        let forward = reference(80, 32);
        let mut frame = Frame::new(80, 32);

        let mut writer = StreamWriter::new();
        skip_run(&mut writer, "001");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: Some(&forward),
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(outcome, SliceOutcome::default());

        // one line down
        assert_eq!(frame.y.data[0], 4);
        assert_eq!(frame.y.data[15 * 80 + 15], 64);
        // skipped: in place
        assert_eq!(frame.y.data[16], 0);
        assert_eq!(frame.y.data[5 * 80 + 63], 20);
        // vector predicted from zero
        assert_eq!(frame.y.data[64], 0);
        assert_eq!(frame.y.data[5 * 80 + 79], 20);
        assert_eq!(frame.cb.data[0], 128);
    }

    #[test]
    fn b_skips_reuse_the_vector() {
        let params = params(80, 32, CodingType::B);
        let forward = reference(80, 32);
        let backward = Frame::new(80, 32);
        let mut frame = Frame::new(80, 32);

        let mut writer = StreamWriter::new();
        skip_run(&mut writer, "0010");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: Some(&forward),
            backward: Some(&backward),
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(outcome, SliceOutcome::default());

        for x in [0, 16, 32, 48, 64] {
            assert_eq!(frame.y.data[x], 4, "macroblock at {}", x);
            assert_eq!(frame.y.data[15 * 80 + x + 15], 64, "macroblock at {}", x);
        }
    }

    #[test]
    fn missing_reference_counts_as_corruption() {
        let params = params(16, 16, CodingType::P);
        let mut frame = Frame::new(16, 16);

        let mut writer = StreamWriter::new();
        writer.bits(5, 8).flag(false).code("1 001 1 1");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert!(outcome.picture_complete);
        assert_eq!(outcome.corrupt, 1);
    }

    fn mpeg2_params(width: u16, height: u16, coding_type: CodingType) -> PictureParams {
        let mut params = params(width, height, coding_type);
        params.mpeg1 = false;
        params
    }

    #[test]
    fn runaway_dc_predictor_saturates() {
        let params = params(1024, 16, CodingType::I);
        let mut frame = Frame::new(1024, 16);

        let mut writer = StreamWriter::new();
        writer.bits(5, 8).flag(false);
        for _ in 0..64 {
            writer.code("1 1");
            // size 11, differential +2047, end of block
            for _ in 0..4 {
                writer.code("111111111 11111111111 10");
            }
            writer.code("00 10 00 10");
        }
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(
            outcome,
            SliceOutcome {
                picture_complete: true,
                corrupt: 0
            }
        );
        assert!(frame.y.data.iter().all(|&v| v == 255));
        assert_eq!(frame.cb.data[511], 128);
    }

    #[test]
    fn field_vectors_pick_their_source_field() {
        let mut params = mpeg2_params(16, 32, CodingType::P);
        params.frame_pred_frame_dct = false;
        let forward = reference(16, 32);
        let mut frame = Frame::new(16, 32);

        let mut writer = StreamWriter::new();
        // forward, not coded; field motion
        writer.bits(5, 8).flag(false).code("1 001 01");
        // top field from the bottom field, no displacement
        writer.code("1 1 1");
        // bottom field from the top field, one field line down
        writer.code("0 1 0010");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: Some(&forward),
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(outcome, SliceOutcome::default());

        for k in 0..8 {
            let top = frame.y.data[2 * k * 16 + 5];
            let bottom = frame.y.data[(2 * k + 1) * 16 + 5];
            assert_eq!(top as usize, (2 * k + 1) * 4, "line {}", 2 * k);
            assert_eq!(bottom as usize, (2 * k + 2) * 4, "line {}", 2 * k + 1);
        }
        assert_eq!(frame.y.data[16 * 16], 0);
        assert_eq!(frame.cr.data[7 * 8 + 7], 128);
    }

    fn dual_prime_frame(top_field_first: bool) -> Frame {
        let mut params = mpeg2_params(16, 32, CodingType::P);
        params.frame_pred_frame_dct = false;
        params.top_field_first = top_field_first;
        let forward = reference(16, 32);
        let mut frame = Frame::new(16, 32);

        let mut writer = StreamWriter::new();
        // forward, not coded; dual prime
        writer.bits(5, 8).flag(false).code("1 001 11");
        // x 0, dmv 0, y one field line, dmv 0
        writer.code("1 0 0010 0");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: Some(&forward),
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(outcome, SliceOutcome::default());
        frame
    }

    #[test]
    fn dual_prime_scales_by_field_distance() {
        // Top field first: the opposite parity vector of the top field
        // is scaled by 1/2, the one of the bottom field by 3/2.
        let frame = dual_prime_frame(true);
        for k in 0..8 {
            assert_eq!(frame.y.data[2 * k * 16] as usize, 8 * k + 6, "line {}", 2 * k);
            assert_eq!(frame.y.data[(2 * k + 1) * 16 + 15] as usize, 8 * k + 14, "line {}", 2 * k + 1);
        }

        let frame = dual_prime_frame(false);
        for k in 0..8 {
            assert_eq!(frame.y.data[2 * k * 16] as usize, 8 * k + 10, "line {}", 2 * k);
            assert_eq!(frame.y.data[(2 * k + 1) * 16 + 15] as usize, 8 * k + 10, "line {}", 2 * k + 1);
        }
        assert_eq!(frame.cb.data[0], 128);
    }

    #[test]
    fn concealment_vectors_are_skipped_over() {
        let mut params = mpeg2_params(32, 16, CodingType::I);
        params.concealment_motion_vectors = true;
        let mut frame = Frame::new(32, 16);

        let mut writer = StreamWriter::new();
        writer.bits(5, 8).flag(false);
        // vector (-1, 0) and marker bit, then flat blocks
        writer.code("1 1 011 1 1").flat_intra_macroblock();
        writer.code("1 1 1 1 1").flat_intra_macroblock();
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(
            outcome,
            SliceOutcome {
                picture_complete: true,
                corrupt: 0
            }
        );
        for plane in [&frame.y, &frame.cb, &frame.cr] {
            assert!(plane.data.iter().all(|v| (127..=129).contains(v)));
        }
    }

    #[test]
    fn bidirectional_prediction_averages() {
        let params = params(16, 16, CodingType::B);
        let forward = reference(16, 16);
        let mut backward = Frame::new(16, 16);
        backward.y.data.fill(100);
        backward.cb.data.fill(60);
        backward.cr.data.fill(60);
        let mut frame = Frame::new(16, 16);

        let mut writer = StreamWriter::new();
        // interpolated, not coded, both vectors zero
        writer.bits(5, 8).flag(false).code("1 10 1 1 1 1");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: Some(&forward),
            backward: Some(&backward),
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(
            outcome,
            SliceOutcome {
                picture_complete: true,
                corrupt: 0
            }
        );
        for y in 0..16 {
            assert_eq!(frame.y.data[y * 16 + 3] as usize, (y * 4 + 100 + 1) >> 1, "line {}", y);
        }
        assert_eq!(frame.cb.data[0], 94);
        assert_eq!(frame.cr.data[63], 94);
    }

    #[test]
    fn intra_table_one_with_alternate_scan() {
        let mut params = mpeg2_params(16, 16, CodingType::I);
        params.intra_vlc_format = true;
        params.alternate_scan = true;
        let mut frame = Frame::new(16, 16);

        let mut writer = StreamWriter::new();
        writer.bits(5, 8).flag(false).code("1 1");
        // first AC coefficient, +1, then table one end of block
        writer.code("100 10 0 0110");
        for _ in 0..3 {
            writer.code("100 0110");
        }
        writer.code("00 0110 00 0110");
        let data = writer.into_bytes();

        let targets = Targets {
            current: &mut frame,
            forward: None,
            backward: None,
        };
        let outcome = decode_slice(&params, BACKENDS, targets, 0, &data);
        assert_eq!(
            outcome,
            SliceOutcome {
                picture_complete: true,
                corrupt: 0
            }
        );

        // Alternate scan puts the first AC coefficient in the first
        // column: the block varies vertically only.
        let y = &frame.y.data;
        assert!(y[0].abs_diff(y[7]) <= 1);
        assert!(y[0] >= y[7 * 16] + 4, "{} {}", y[0], y[7 * 16]);
        assert!((127..=129).contains(&y[8]));
        assert!((127..=129).contains(&y[15 * 16 + 15]));
        assert!((127..=129).contains(&frame.cb.data[0]));
    }
}
