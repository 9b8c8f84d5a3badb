use std::fmt;

/// Picture coding type from the picture header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodingType {
    I = 1,
    P = 2,
    B = 3,
    /// MPEG-1 DC-only pictures.
    D = 4,
}

impl TryFrom<u8> for CodingType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CodingType::I),
            2 => Ok(CodingType::P),
            3 => Ok(CodingType::B),
            4 => Ok(CodingType::D),
            other => Err(other),
        }
    }
}

impl fmt::Display for CodingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodingType::I => "I",
            CodingType::P => "P",
            CodingType::B => "B",
            CodingType::D => "D",
        };
        f.write_str(name)
    }
}

pub const PICTURE_STRUCTURE_FRAME: u8 = 3;

// Natural order.
pub(crate) const DEFAULT_INTRA_QUANT_MATRIX: [u8; 64] = [
     8, 16, 19, 22, 26, 27, 29, 34,
    16, 16, 22, 24, 27, 29, 34, 37,
    19, 22, 26, 27, 29, 34, 34, 38,
    22, 22, 26, 27, 29, 34, 37, 40,
    22, 26, 27, 29, 32, 35, 40, 48,
    26, 27, 29, 32, 35, 40, 48, 58,
    26, 27, 29, 34, 38, 46, 56, 69,
    27, 29, 35, 38, 46, 56, 69, 83,
];

pub(crate) const DEFAULT_NON_INTRA_QUANT_MATRIX: [u8; 64] = [16; 64];

/// Scan position to natural coefficient index.
pub const ZIGZAG_SCAN: [u8; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

pub const ALTERNATE_SCAN: [u8; 64] = [
     0,  8, 16, 24,  1,  9,  2, 10,
    17, 25, 32, 40, 48, 56, 57, 49,
    41, 33, 26, 18,  3, 11,  4, 12,
    19, 27, 34, 42, 50, 58, 35, 43,
    51, 59, 20, 28,  5, 13,  6, 14,
    21, 29, 36, 44, 52, 60, 37, 45,
    53, 61, 22, 30,  7, 15, 23, 31,
    38, 46, 54, 62, 39, 47, 55, 63,
];

pub(crate) const NON_LINEAR_QUANTIZER_SCALE: [u8; 32] = [
     0,  1,  2,  3,  4,  5,  6,  7,
     8, 10, 12, 14, 16, 18, 20, 22,
    24, 28, 32, 36, 40, 44, 48, 52,
    56, 64, 72, 80, 88, 96, 104, 112,
];

/// Everything the slice decoder needs to know about the picture being
/// decoded. Sequence level fields are filled in by the sequence header
/// and extension, the rest by each picture header and its coding
/// extension.
#[derive(Clone, Debug)]
pub struct PictureParams {
    /// Display size from the sequence header.
    pub horizontal_size: u16,
    pub vertical_size: u16,
    /// Coded size, multiples of 16.
    pub width: usize,
    pub height: usize,
    pub mb_width: usize,
    pub mb_height: usize,
    /// Address of the last macroblock of a picture.
    pub last_mba: usize,

    pub aspect_ratio_code: u8,
    pub frame_rate_code: u8,
    pub bit_rate: u32,

    pub intra_quant_matrix: [u8; 64],
    pub non_intra_quant_matrix: [u8; 64],

    pub mpeg1: bool,
    pub progressive_sequence: bool,
    pub chroma_format: u8,
    /// High bits of the picture size from the sequence extension.
    pub size_extension: u8,

    pub temporal_reference: u16,
    pub coding_type: CodingType,
    /// `f_code[direction][component]`, direction 0 is forward.
    pub f_code: [[u8; 2]; 2],
    /// MPEG-1 only.
    pub full_pel: [bool; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: u8,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub progressive_frame: bool,
}

impl Default for PictureParams {
    fn default() -> Self {
        PictureParams {
            horizontal_size: 0,
            vertical_size: 0,
            width: 0,
            height: 0,
            mb_width: 0,
            mb_height: 0,
            last_mba: 0,
            aspect_ratio_code: 0,
            frame_rate_code: 0,
            bit_rate: 0,
            intra_quant_matrix: DEFAULT_INTRA_QUANT_MATRIX,
            non_intra_quant_matrix: DEFAULT_NON_INTRA_QUANT_MATRIX,
            mpeg1: true,
            progressive_sequence: true,
            chroma_format: 1,
            size_extension: 0,
            temporal_reference: 0,
            coding_type: CodingType::I,
            f_code: [[1; 2]; 2],
            full_pel: [false; 2],
            intra_dc_precision: 0,
            picture_structure: PICTURE_STRUCTURE_FRAME,
            top_field_first: false,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
            repeat_first_field: false,
            progressive_frame: true,
        }
    }
}

impl PictureParams {
    pub(crate) fn set_size(&mut self, horizontal_size: u16, vertical_size: u16) {
        self.horizontal_size = horizontal_size;
        self.vertical_size = vertical_size;
        self.width = (usize::from(horizontal_size) + 15) & !15;
        self.height = (usize::from(vertical_size) + 15) & !15;
        self.mb_width = self.width >> 4;
        self.mb_height = self.height >> 4;
        self.last_mba = self.mb_width * self.mb_height - 1;
    }

    /// Picture coding extension fields take their MPEG-1 meaning until
    /// a sequence extension says otherwise.
    pub(crate) fn reset_mpeg2_fields(&mut self) {
        self.mpeg1 = true;
        self.progressive_sequence = true;
        self.chroma_format = 1;
        self.size_extension = 0;
        self.intra_dc_precision = 0;
        self.picture_structure = PICTURE_STRUCTURE_FRAME;
        self.top_field_first = false;
        self.frame_pred_frame_dct = true;
        self.concealment_motion_vectors = false;
        self.q_scale_type = false;
        self.intra_vlc_format = false;
        self.alternate_scan = false;
        self.repeat_first_field = false;
        self.progressive_frame = true;
    }

    pub fn scan(&self) -> &'static [u8; 64] {
        if self.alternate_scan {
            &ALTERNATE_SCAN
        } else {
            &ZIGZAG_SCAN
        }
    }

    pub fn quantizer_scale(&self, code: u32) -> i32 {
        let code = (code & 31) as usize;
        if self.q_scale_type {
            i32::from(NON_LINEAR_QUANTIZER_SCALE[code])
        } else {
            (code as i32) << 1
        }
    }

    /// Value the DC predictors are reset to.
    pub fn dc_reset(&self) -> i32 {
        1 << (self.intra_dc_precision + 7)
    }
}
