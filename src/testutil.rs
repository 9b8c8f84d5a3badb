// Synthetic elementary stream construction for unit tests.
#![cfg(test)]

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::picture::CodingType;
use crate::{EXTENSION_START_CODE, PICTURE_START_CODE, SEQUENCE_END_CODE, SEQUENCE_HEADER_CODE};

/// Fields of a picture coding extension.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CodingExtension {
    pub f_code: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: u8,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
}

impl Default for CodingExtension {
    fn default() -> Self {
        CodingExtension {
            f_code: [[15; 2]; 2],
            intra_dc_precision: 0,
            picture_structure: 3,
            top_field_first: false,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
        }
    }
}

pub(crate) struct StreamWriter {
    writer: BitWriter<Vec<u8>, BigEndian>,
}

impl StreamWriter {
    pub fn new() -> Self {
        StreamWriter {
            writer: BitWriter::endian(Vec::new(), BigEndian),
        }
    }

    pub fn bits(&mut self, len: u32, value: u32) -> &mut Self {
        self.writer.write(len, value).unwrap();
        self
    }

    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.writer.write_bit(value).unwrap();
        self
    }

    /// Write a code given as a string of '0' and '1'; spaces are ignored.
    pub fn code(&mut self, pattern: &str) -> &mut Self {
        for c in pattern.chars().filter(|c| !c.is_whitespace()) {
            self.writer.write_bit(c == '1').unwrap();
        }
        self
    }

    pub fn start_code(&mut self, code: u8) -> &mut Self {
        self.writer.byte_align().unwrap();
        self.writer.write(24, 1u32).unwrap();
        self.writer.write(8, code).unwrap();
        self
    }

    pub fn sequence_header(&mut self, width: u16, height: u16) -> &mut Self {
        self.start_code(SEQUENCE_HEADER_CODE)
            .bits(12, u32::from(width))
            .bits(12, u32::from(height))
            .bits(4, 1) // square pels
            .bits(4, 3) // 25 Hz
            .bits(18, 0x3ffff)
            .flag(true)
            .bits(10, 112)
            .flag(false)
            .flag(false) // default intra matrix
            .flag(false) // default non-intra matrix
    }

    pub fn sequence_extension(&mut self) -> &mut Self {
        self.start_code(EXTENSION_START_CODE)
            .bits(4, 1)
            .bits(8, 0x48) // main profile, main level
            .flag(true) // progressive_sequence
            .bits(2, 1) // 4:2:0
            .bits(2, 0)
            .bits(2, 0)
            .bits(12, 0)
            .flag(true)
            .bits(8, 0)
            .flag(false)
            .bits(2, 0)
            .bits(5, 0)
    }

    /// Picture header with MPEG-1 style motion vector codes.
    pub fn picture_header(&mut self, coding_type: CodingType, f_code: u8) -> &mut Self {
        self.start_code(PICTURE_START_CODE)
            .bits(10, 0)
            .bits(3, coding_type as u32)
            .bits(16, 0xffff);
        if matches!(coding_type, CodingType::P | CodingType::B) {
            self.flag(false).bits(3, u32::from(f_code));
        }
        if coding_type == CodingType::B {
            self.flag(false).bits(3, u32::from(f_code));
        }
        self.flag(false)
    }

    pub fn coding_extension(&mut self, ext: &CodingExtension) -> &mut Self {
        self.start_code(EXTENSION_START_CODE).bits(4, 8);
        for direction in ext.f_code {
            for code in direction {
                self.bits(4, u32::from(code));
            }
        }
        self.bits(2, u32::from(ext.intra_dc_precision))
            .bits(2, u32::from(ext.picture_structure))
            .flag(ext.top_field_first)
            .flag(ext.frame_pred_frame_dct)
            .flag(ext.concealment_motion_vectors)
            .flag(ext.q_scale_type)
            .flag(ext.intra_vlc_format)
            .flag(ext.alternate_scan)
            .flag(false) // repeat_first_field
            .flag(true) // chroma_420_type
            .flag(true) // progressive_frame
            .flag(false) // composite_display_flag
    }

    /// Slice start code and header with the given quantiser scale code.
    pub fn slice(&mut self, row: usize, quantizer_scale_code: u32) -> &mut Self {
        self.start_code((row + 1) as u8)
            .bits(5, quantizer_scale_code)
            .flag(false)
    }

    /// Intra macroblock body with every DC differential zero and no AC
    /// coefficients, for B-14 style end of block codes.
    pub fn flat_intra_macroblock(&mut self) -> &mut Self {
        for _ in 0..4 {
            self.code("100 10");
        }
        self.code("00 10 00 10")
    }

    /// Terminate with a sequence end code so the last chunk is complete.
    pub fn finish(mut self) -> Vec<u8> {
        self.start_code(SEQUENCE_END_CODE);
        self.writer.into_writer()
    }

    /// Raw bytes without a terminating start code.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.writer.byte_align().unwrap();
        self.writer.into_writer()
    }
}
