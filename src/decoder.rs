// Chunk demultiplexer and picture lifecycle.
//
// Bytes are accumulated until the next start code shows up; the chunk
// collected so far (everything after the previous start code, up to and
// including the 00 00 01 of the new one) is then handled according to
// the previous start code's value.

use log::{debug, info, trace, warn};

use crate::error::{DecodeError, Result};
use crate::frame::{Frame, FramePool, Role};
use crate::header::{parse_extension, parse_picture_header, parse_sequence_header};
use crate::idct::{AccurateIdct, InverseDct};
use crate::motion::{MotionCompensator, PortableMc};
use crate::output::VideoOutput;
use crate::picture::{CodingType, PictureParams};
use crate::slice::{decode_slice, Backends};
use crate::{
    EXTENSION_START_CODE, GROUP_START_CODE, PICTURE_START_CODE, SEQUENCE_END_CODE,
    SEQUENCE_HEADER_CODE, SLICE_START_CODE_MAX, SLICE_START_CODE_MIN, USER_DATA_START_CODE,
};

/// Largest chunk kept, the VBV buffer size of MP@ML streams.
pub const MAX_CHUNK_SIZE: usize = 224 * 1024;

const START_CODE_PREFIX: u32 = 0x0000_0100;
const SHIFT_RESET: u32 = 0xffff_ff00;
/// Start codes from here on belong to the system layer.
const SYSTEM_START_CODE_MIN: u8 = 0xb9;

/// One decoding session over an elementary video stream.
pub struct Decoder {
    params: PictureParams,
    pool: Option<FramePool>,
    mc: Box<dyn MotionCompensator>,
    idct: Box<dyn InverseDct>,

    chunk: Vec<u8>,
    /// Start code of the chunk being collected.
    code: u8,
    shift: u32,
    overflowed: bool,

    sequence_needed: bool,
    drop_b: bool,
    drop_frame: bool,
    terminated: bool,

    picture_corruption: u32,
    corruption: u64,
    pictures: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl Decoder {
    /// Session with the portable motion compensation and the accurate
    /// IDCT.
    pub fn new() -> Self {
        Decoder::with_backends(Box::new(PortableMc), Box::new(AccurateIdct))
    }

    pub fn with_backends(mc: Box<dyn MotionCompensator>, idct: Box<dyn InverseDct>) -> Self {
        Decoder {
            params: PictureParams::default(),
            pool: None,
            mc,
            idct,
            chunk: Vec::with_capacity(MAX_CHUNK_SIZE),
            code: 0xff,
            shift: SHIFT_RESET,
            overflowed: false,
            sequence_needed: true,
            drop_b: false,
            drop_frame: false,
            terminated: false,
            picture_corruption: 0,
            corruption: 0,
            pictures: 0,
        }
    }

    /// Skip the slices of B pictures from the next picture header on.
    pub fn set_drop(&mut self, drop: bool) {
        self.drop_b = drop;
    }

    /// Parameters of the current (or last) picture.
    pub fn params(&self) -> &PictureParams {
        &self.params
    }

    /// Frame currently playing `role`, once a sequence header has been
    /// seen.
    pub fn frame(&self, role: Role) -> Option<&Frame> {
        self.pool.as_ref().map(|pool| pool.frame(role))
    }

    /// Damaged constructs skipped so far: abandoned blocks, predictions
    /// from outside the picture, slices outside the picture and chunk
    /// overflows.
    pub fn corruption_count(&self) -> u64 {
        self.corruption
    }

    pub fn pictures_completed(&self) -> u64 {
        self.pictures
    }

    /// Feed the next piece of the stream. Returns how many pictures were
    /// completed while handling it.
    ///
    /// A chunk is handled once the start code following it has arrived,
    /// so the last chunk of a stream needs a terminating start code
    /// (normally the sequence end code).
    pub fn decode<O: VideoOutput + ?Sized>(&mut self, data: &[u8], output: &mut O) -> Result<usize> {
        if self.terminated {
            return Err(DecodeError::Terminated);
        }

        let mut completed = 0;
        for &byte in data {
            if self.shift == START_CODE_PREFIX {
                completed += self.parse_chunk(output).map_err(|err| {
                    self.terminated = true;
                    err
                })?;
                self.code = byte;
                self.chunk.clear();
                self.overflowed = false;
                self.shift = SHIFT_RESET;
                continue;
            }

            if self.chunk.len() < MAX_CHUNK_SIZE {
                self.chunk.push(byte);
            } else if !self.overflowed {
                warn!("chunk after start code {:#04x} exceeds {} bytes, truncating", self.code, MAX_CHUNK_SIZE);
                self.overflowed = true;
                self.corruption += 1;
            }
            self.shift = (self.shift | u32::from(byte)) << 8;
        }
        Ok(completed)
    }

    /// End the session: hand out the last decoded reference picture.
    /// The decoder is ready for a new stream afterwards, even after a
    /// fatal error.
    pub fn close<O: VideoOutput + ?Sized>(&mut self, output: &mut O) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            if pool.is_decoded(Role::BackwardRef) {
                output.picture_ready(pool.frame(Role::BackwardRef))?;
            }
        }
        info!(
            "{} pictures decoded, {} damaged constructs skipped",
            self.pictures, self.corruption
        );
        self.chunk.clear();
        self.code = 0xff;
        self.shift = SHIFT_RESET;
        self.overflowed = false;
        self.sequence_needed = true;
        self.drop_frame = false;
        self.terminated = false;
        Ok(())
    }

    fn parse_chunk<O: VideoOutput + ?Sized>(&mut self, output: &mut O) -> Result<usize> {
        // Parsing needs `self` mutably; the buffer is put back afterwards
        // to keep its allocation.
        let chunk = std::mem::take(&mut self.chunk);
        let result = self.dispatch(self.code, &chunk, output);
        self.chunk = chunk;
        result
    }

    fn dispatch<O: VideoOutput + ?Sized>(&mut self, code: u8, data: &[u8], output: &mut O) -> Result<usize> {
        if self.sequence_needed && code != SEQUENCE_HEADER_CODE {
            trace!("waiting for a sequence header, dropping chunk {:#04x}", code);
            return Ok(0);
        }

        match code {
            PICTURE_START_CODE => self.picture_header(data)?,
            SEQUENCE_HEADER_CODE => self.sequence_header(data, output)?,
            EXTENSION_START_CODE => parse_extension(&mut self.params, data)?,
            SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX => return self.slice(code, data, output),
            USER_DATA_START_CODE | GROUP_START_CODE | SEQUENCE_END_CODE => {
                trace!("skipping chunk {:#04x}", code);
            }
            SYSTEM_START_CODE_MIN..=0xff => {
                warn!("system start code {:#04x} in video stream, not demultiplexed?", code);
            }
            _ => trace!("ignoring reserved start code {:#04x}", code),
        }
        Ok(0)
    }

    fn sequence_header<O: VideoOutput + ?Sized>(&mut self, data: &[u8], output: &mut O) -> Result<()> {
        parse_sequence_header(&mut self.params, data)?;
        self.sequence_needed = false;

        let (width, height) = (self.params.width, self.params.height);
        if let Some(pool) = &self.pool {
            if pool.width() == width && pool.height() == height {
                return Ok(());
            }
            info!(
                "picture size changed from {}x{} to {}x{}",
                pool.width(),
                pool.height(),
                width,
                height
            );
            if pool.is_decoded(Role::BackwardRef) {
                output.picture_ready(pool.frame(Role::BackwardRef))?;
            }
        }

        let frames = [
            output.allocate_frame(width, height),
            output.allocate_frame(width, height),
            output.allocate_frame(width, height),
        ];
        if frames.iter().any(|f| f.width != width || f.height != height || !planes_fit(f)) {
            return Err(DecodeError::Unsupported(format!(
                "output allocated frames that do not match {}x{}",
                width, height
            )));
        }
        debug!("allocated frames for {}x{}", width, height);
        self.pool = Some(FramePool::new(frames));
        Ok(())
    }

    fn picture_header(&mut self, data: &[u8]) -> Result<()> {
        parse_picture_header(&mut self.params, data)?;
        let coding_type = self.params.coding_type;
        self.drop_frame = self.drop_b && coding_type == CodingType::B;
        self.picture_corruption = 0;
        if let Some(pool) = &mut self.pool {
            pool.rotate(coding_type);
        }
        Ok(())
    }

    fn slice<O: VideoOutput + ?Sized>(&mut self, code: u8, data: &[u8], output: &mut O) -> Result<usize> {
        if self.drop_frame {
            return Ok(0);
        }
        let Some(pool) = self.pool.as_mut() else {
            return Ok(0);
        };

        let row = usize::from(code - 1);
        if row >= self.params.mb_height {
            warn!("slice row {} outside a picture of {} rows", row, self.params.mb_height);
            self.corruption += 1;
            return Ok(0);
        }

        let backends = Backends {
            mc: self.mc.as_ref(),
            idct: self.idct.as_ref(),
        };
        let outcome = decode_slice(&self.params, backends, pool.targets(), row, data);
        self.picture_corruption += outcome.corrupt;
        self.corruption += u64::from(outcome.corrupt);

        let coding_type = self.params.coding_type;
        let display = if coding_type == CodingType::B {
            Role::Throwaway
        } else {
            Role::ForwardRef
        };
        if pool.is_decoded(display) {
            output.slice_ready(pool.frame(display), row);
        }

        if !outcome.picture_complete {
            return Ok(0);
        }

        self.pictures += 1;
        if self.picture_corruption > 0 {
            warn!(
                "{} picture {} completed with {} damaged constructs",
                coding_type, self.params.temporal_reference, self.picture_corruption
            );
        }
        trace!("{} picture {} complete", coding_type, self.params.temporal_reference);
        if pool.is_decoded(display) {
            output.picture_ready(pool.frame(display))?;
        }
        Ok(1)
    }
}

fn planes_fit(frame: &Frame) -> bool {
    let (width, height) = (frame.width, frame.height);
    frame.y.data.len() == width * height
        && frame.cb.data.len() == width * height / 4
        && frame.cr.data.len() == width * height / 4
}
