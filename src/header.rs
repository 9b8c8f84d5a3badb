// Sequence, picture and extension headers.
//
// Headers are short and parsed once per picture, so they go through
// bitstream-io rather than the slice cursor.

use bitstream_io::{BigEndian, BitRead, BitReader};
use log::{debug, trace};
use std::io;

use crate::error::{DecodeError, Result};
use crate::picture::{
    CodingType, PictureParams, DEFAULT_INTRA_QUANT_MATRIX, DEFAULT_NON_INTRA_QUANT_MATRIX,
    PICTURE_STRUCTURE_FRAME, ZIGZAG_SCAN,
};

type HeaderReader<'a> = BitReader<&'a [u8], BigEndian>;

const SEQUENCE_EXTENSION_ID: u8 = 1;
const QUANT_MATRIX_EXTENSION_ID: u8 = 3;
const PICTURE_CODING_EXTENSION_ID: u8 = 8;

const CHROMA_420: u8 = 1;

fn read_matrix(reader: &mut HeaderReader) -> io::Result<[u8; 64]> {
    let mut matrix = [0u8; 64];
    for &index in ZIGZAG_SCAN.iter() {
        matrix[usize::from(index)] = reader.read::<u8>(8)?;
    }
    Ok(matrix)
}

struct SequenceHeader {
    horizontal_size: u16,
    vertical_size: u16,
    aspect_ratio_code: u8,
    frame_rate_code: u8,
    bit_rate: u32,
    vbv_buffer_size: u16,
    intra_quant_matrix: Option<[u8; 64]>,
    non_intra_quant_matrix: Option<[u8; 64]>,
}

impl SequenceHeader {
    fn read(reader: &mut HeaderReader) -> io::Result<Self> {
        let horizontal_size = reader.read::<u16>(12)?;
        let vertical_size = reader.read::<u16>(12)?;
        let aspect_ratio_code = reader.read::<u8>(4)?;
        let frame_rate_code = reader.read::<u8>(4)?;
        let bit_rate = reader.read::<u32>(18)?;
        // marker bit, not checked
        reader.skip(1)?;
        let vbv_buffer_size = reader.read::<u16>(10)?;
        // constrained_parameters_flag
        reader.skip(1)?;
        let intra_quant_matrix = if reader.read_bit()? {
            Some(read_matrix(reader)?)
        } else {
            None
        };
        let non_intra_quant_matrix = if reader.read_bit()? {
            Some(read_matrix(reader)?)
        } else {
            None
        };
        Ok(SequenceHeader {
            horizontal_size,
            vertical_size,
            aspect_ratio_code,
            frame_rate_code,
            bit_rate,
            vbv_buffer_size,
            intra_quant_matrix,
            non_intra_quant_matrix,
        })
    }

    fn aspect_ratio_str(&self) -> &str {
        const TABLE: [&str; 5] = ["", "1:1", "4:3", "16:9", "2.21:1"];
        TABLE.get(usize::from(self.aspect_ratio_code)).copied().unwrap_or("")
    }
}

/// Nominal frame rate for a `frame_rate_code`, 0.0 if reserved.
pub fn frame_rate(code: u8) -> f32 {
    const TABLE: [f32; 9] = [
        0.0,
        24000. / 1001.,
        24.0,
        25.0,
        30000. / 1001.,
        30.0,
        50.0,
        60000. / 1001.,
        60.0,
    ];
    TABLE.get(usize::from(code)).copied().unwrap_or(0.0)
}

/// Parse a sequence header payload into `params`.
pub(crate) fn parse_sequence_header(params: &mut PictureParams, data: &[u8]) -> Result<()> {
    let mut reader = BitReader::endian(data, BigEndian);
    let header = SequenceHeader::read(&mut reader)
        .map_err(|_| DecodeError::SequenceHeader("truncated"))?;

    if header.horizontal_size == 0 || header.vertical_size == 0 {
        return Err(DecodeError::SequenceHeader("zero picture size"));
    }

    debug!(
        "sequence header: {}x{} aspect={} rate={} bit_rate={} vbv={}",
        header.horizontal_size,
        header.vertical_size,
        header.aspect_ratio_str(),
        frame_rate(header.frame_rate_code),
        header.bit_rate,
        header.vbv_buffer_size
    );

    params.set_size(header.horizontal_size, header.vertical_size);
    params.aspect_ratio_code = header.aspect_ratio_code;
    params.frame_rate_code = header.frame_rate_code;
    params.bit_rate = header.bit_rate;
    params.intra_quant_matrix = header
        .intra_quant_matrix
        .unwrap_or(DEFAULT_INTRA_QUANT_MATRIX);
    params.non_intra_quant_matrix = header
        .non_intra_quant_matrix
        .unwrap_or(DEFAULT_NON_INTRA_QUANT_MATRIX);
    params.reset_mpeg2_fields();
    Ok(())
}

struct PictureHeader {
    temporal_reference: u16,
    coding_type: u8,
    vbv_delay: u16,
    // (full_pel, f_code) for each direction present
    forward: Option<(bool, u8)>,
    backward: Option<(bool, u8)>,
}

impl PictureHeader {
    fn read(reader: &mut HeaderReader) -> io::Result<Self> {
        let temporal_reference = reader.read::<u16>(10)?;
        let coding_type = reader.read::<u8>(3)?;
        let vbv_delay = reader.read::<u16>(16)?;
        let mut forward = None;
        let mut backward = None;
        if coding_type == CodingType::P as u8 || coding_type == CodingType::B as u8 {
            forward = Some((reader.read_bit()?, reader.read::<u8>(3)?));
        }
        if coding_type == CodingType::B as u8 {
            backward = Some((reader.read_bit()?, reader.read::<u8>(3)?));
        }
        Ok(PictureHeader {
            temporal_reference,
            coding_type,
            vbv_delay,
            forward,
            backward,
        })
    }
}

/// Parse a picture header payload into `params`.
pub(crate) fn parse_picture_header(params: &mut PictureParams, data: &[u8]) -> Result<()> {
    let mut reader = BitReader::endian(data, BigEndian);
    let header =
        PictureHeader::read(&mut reader).map_err(|_| DecodeError::PictureHeader("truncated"))?;

    let coding_type = CodingType::try_from(header.coding_type)
        .map_err(|_| DecodeError::PictureHeader("invalid picture coding type"))?;

    trace!(
        "picture header: type={} temporal_reference={} vbv_delay={}",
        coding_type,
        header.temporal_reference,
        header.vbv_delay
    );

    params.coding_type = coding_type;
    params.temporal_reference = header.temporal_reference;

    // MPEG-2 streams carry fixed values here and send the real
    // f_codes in the picture coding extension.
    if params.mpeg1 {
        for (direction, vector) in [header.forward, header.backward].into_iter().enumerate() {
            if let Some((full_pel, f_code)) = vector {
                if f_code == 0 {
                    return Err(DecodeError::PictureHeader("f_code of zero"));
                }
                params.f_code[direction] = [f_code, f_code];
                params.full_pel[direction] = full_pel;
            }
        }
    }
    Ok(())
}

/// Parse an extension payload. Extensions other than the sequence,
/// quant matrix and picture coding extensions are skipped.
pub(crate) fn parse_extension(params: &mut PictureParams, data: &[u8]) -> Result<()> {
    let mut reader = BitReader::endian(data, BigEndian);
    let id = reader
        .read::<u8>(4)
        .map_err(|_| DecodeError::Extension { id: 0, reason: "truncated" })?;
    let truncated = |_| DecodeError::Extension { id, reason: "truncated" };

    match id {
        SEQUENCE_EXTENSION_ID => sequence_extension(params, &mut reader).map_err(truncated)?,
        QUANT_MATRIX_EXTENSION_ID => quant_matrix_extension(params, &mut reader).map_err(truncated)?,
        PICTURE_CODING_EXTENSION_ID => {
            picture_coding_extension(params, &mut reader).map_err(truncated)?
        }
        _ => {
            trace!("skipping extension id {}", id);
            return Ok(());
        }
    }
    validate_extension(params, id)
}

fn sequence_extension(params: &mut PictureParams, reader: &mut HeaderReader) -> io::Result<()> {
    let profile_and_level = reader.read::<u8>(8)?;
    let progressive_sequence = reader.read_bit()?;
    let chroma_format = reader.read::<u8>(2)?;
    let horizontal_size_extension = reader.read::<u8>(2)?;
    let vertical_size_extension = reader.read::<u8>(2)?;
    let bit_rate_extension = reader.read::<u32>(12)?;

    debug!(
        "sequence extension: profile_and_level=0x{:02x} progressive={} chroma_format={}",
        profile_and_level, progressive_sequence, chroma_format
    );

    params.mpeg1 = false;
    params.progressive_sequence = progressive_sequence;
    params.bit_rate |= bit_rate_extension << 18;
    // Checked by validate_extension.
    params.chroma_format = chroma_format;
    params.size_extension = horizontal_size_extension | vertical_size_extension;
    Ok(())
}

fn quant_matrix_extension(params: &mut PictureParams, reader: &mut HeaderReader) -> io::Result<()> {
    if reader.read_bit()? {
        params.intra_quant_matrix = read_matrix(reader)?;
    }
    if reader.read_bit()? {
        params.non_intra_quant_matrix = read_matrix(reader)?;
    }
    // Chroma matrices only apply to 4:2:2 and 4:4:4.
    Ok(())
}

fn picture_coding_extension(params: &mut PictureParams, reader: &mut HeaderReader) -> io::Result<()> {
    for direction in 0..2 {
        for component in 0..2 {
            params.f_code[direction][component] = reader.read::<u8>(4)?;
        }
    }
    params.full_pel = [false; 2];
    params.intra_dc_precision = reader.read::<u8>(2)?;
    params.picture_structure = reader.read::<u8>(2)?;
    params.top_field_first = reader.read_bit()?;
    params.frame_pred_frame_dct = reader.read_bit()?;
    params.concealment_motion_vectors = reader.read_bit()?;
    params.q_scale_type = reader.read_bit()?;
    params.intra_vlc_format = reader.read_bit()?;
    params.alternate_scan = reader.read_bit()?;
    params.repeat_first_field = reader.read_bit()?;
    // chroma_420_type
    reader.skip(1)?;
    params.progressive_frame = reader.read_bit()?;

    trace!(
        "picture coding extension: f_code={:?} dc_precision={} structure={} fpfd={} qst={} ivf={} alt={}",
        params.f_code,
        params.intra_dc_precision,
        params.picture_structure,
        params.frame_pred_frame_dct,
        params.q_scale_type,
        params.intra_vlc_format,
        params.alternate_scan
    );
    Ok(())
}

fn validate_extension(params: &PictureParams, id: u8) -> Result<()> {
    match id {
        SEQUENCE_EXTENSION_ID => {
            if params.chroma_format != CHROMA_420 {
                return Err(DecodeError::Unsupported(format!(
                    "chroma format {}",
                    params.chroma_format
                )));
            }
            if params.size_extension != 0 {
                return Err(DecodeError::Unsupported(
                    "pictures larger than 4095 pixels".to_string(),
                ));
            }
        }
        PICTURE_CODING_EXTENSION_ID => {
            if params.f_code.iter().flatten().any(|&code| code == 0) {
                return Err(DecodeError::Extension { id, reason: "f_code of zero" });
            }
            if params.picture_structure == 0 {
                return Err(DecodeError::Extension { id, reason: "reserved picture structure" });
            }
            if params.picture_structure != PICTURE_STRUCTURE_FRAME {
                return Err(DecodeError::Unsupported("field pictures".to_string()));
            }
        }
        _ => {}
    }
    Ok(())
}
