use std::io::{self, Write};

const FILE_HEADER_SIZE: u32 = 14;
const CORE_HEADER_SIZE: u32 = 12;
const BYTES_PER_PIXEL: usize = 3;

struct BmpFileHeader {
    file_size: u32,
    offset: u32,
}

impl BmpFileHeader {
    fn serialize(&self) -> [u8; 14] {
        let mut ret = [0; 14];
        ret[0] = b'B';
        ret[1] = b'M';
        ret[2..6].copy_from_slice(&self.file_size.to_le_bytes());
        ret[10..14].copy_from_slice(&self.offset.to_le_bytes());
        ret
    }
}

/// OS/2 style BITMAPCOREHEADER, enough for 24 bit images.
#[derive(Debug, Default, Copy, Clone)]
struct BmpCoreHeader {
    size: u32,
    width: u16,
    height: u16,
    nr_planes: u16,
    bits_per_pixel: u16,
}

impl BmpCoreHeader {
    fn serialize(&self) -> [u8; 12] {
        let mut ret = [0; 12];
        ret[0..4].copy_from_slice(&self.size.to_le_bytes());
        ret[4..6].copy_from_slice(&self.width.to_le_bytes());
        ret[6..8].copy_from_slice(&self.height.to_le_bytes());
        ret[8..10].copy_from_slice(&self.nr_planes.to_le_bytes());
        ret[10..12].copy_from_slice(&self.bits_per_pixel.to_le_bytes());
        ret
    }
}

fn invalid(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("bmp: {}", what))
}

/// Write packed RGB `pixels` (top row first) as a 24 bit BMP.
pub fn write_bmp<W: Write>(writer: &mut W, width: usize, height: usize, pixels: &[u8]) -> io::Result<()> {
    let row_bytes = width * BYTES_PER_PIXEL;
    if pixels.len() != row_bytes * height {
        return Err(invalid("pixel buffer does not match the image size"));
    }
    // Rows are padded to a multiple of four bytes.
    let padding_bytes = (4 - row_bytes % 4) % 4;
    let data_size = (row_bytes + padding_bytes) * height;

    let file_header = BmpFileHeader {
        file_size: u32::try_from(data_size)
            .ok()
            .and_then(|size| size.checked_add(FILE_HEADER_SIZE + CORE_HEADER_SIZE))
            .ok_or_else(|| invalid("image too large"))?,
        offset: FILE_HEADER_SIZE + CORE_HEADER_SIZE,
    };
    writer.write_all(&file_header.serialize())?;

    let core_header = BmpCoreHeader {
        size: CORE_HEADER_SIZE,
        width: u16::try_from(width).map_err(|_| invalid("width out of range"))?,
        height: u16::try_from(height).map_err(|_| invalid("height out of range"))?,
        nr_planes: 1,
        bits_per_pixel: (BYTES_PER_PIXEL * 8) as u16,
    };
    writer.write_all(&core_header.serialize())?;

    let padding = [0u8; 3];
    let mut line = vec![0u8; row_bytes];
    // Pixel data stored bottom-to-top, hence .rev()
    for row in pixels.chunks_exact(row_bytes.max(1)).rev() {
        for (dst, rgb) in line.chunks_exact_mut(BYTES_PER_PIXEL).zip(row.chunks_exact(BYTES_PER_PIXEL)) {
            dst.copy_from_slice(&[rgb[2], rgb[1], rgb[0]]);
        }
        writer.write_all(&line)?;
        writer.write_all(&padding[..padding_bytes])?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_bmp() {
        let pixels: Vec<u8> = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut out = Vec::new();
        write_bmp(&mut out, 3, 2, &pixels).unwrap();

        // 9 bytes per row plus 3 padding
        assert_eq!(out.len(), 26 + 2 * 12);
        assert_eq!(&out[0..2], b"BM");
        assert_eq!(u32::from_le_bytes([out[2], out[3], out[4], out[5]]), 50);
        assert_eq!(&out[18..22], &[3, 0, 2, 0]);
        // bottom row first, blue green red
        assert_eq!(&out[26..29], &[3, 2, 1]);
        assert_eq!(&out[38..41], &[0, 0, 255]);
        assert_eq!(&out[44..47], &[255, 0, 0]);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut out = Vec::new();
        assert!(write_bmp(&mut out, 4, 4, &[0; 10]).is_err());
        assert!(out.is_empty());
    }
}
