// Variable length code tables of ISO/IEC 13818-2 Annex B.
//
// Each table is a list of (code, length, value). The lookup groups the
// codes by their number of leading zero bits; inside a group the bits
// following the first one bit index a small direct table. This is the
// same trick as splitting a table at prefix thresholds, but the split
// points fall out of the code lists instead of being written by hand.

use std::sync::OnceLock;

use crate::bits::BitCursor;
use crate::picture::CodingType;

/// (code bits, code length, decoded value)
pub(crate) type Code<T> = (u32, u8, T);

pub(crate) const MBA_STUFFING: u8 = 34;
pub(crate) const MBA_ESCAPE: u8 = 35;

pub(crate) const MB_INTRA: u8 = 0x01;
pub(crate) const MB_PATTERN: u8 = 0x02;
pub(crate) const MB_MOTION_BACKWARD: u8 = 0x04;
pub(crate) const MB_MOTION_FORWARD: u8 = 0x08;
pub(crate) const MB_QUANT: u8 = 0x10;

// Packed run/level values of the DCT coefficient tables.
const DCT_END_OF_BLOCK: u16 = 0x0000;
const DCT_ESCAPE: u16 = 0xffff;

pub(crate) const MACROBLOCK_ADDRESS_INCREMENT: &[Code<u8>] = &[
    (0b1, 1, 1), (0b010, 3, 3), (0b011, 3, 2), (0b0010, 4, 5),
    (0b0011, 4, 4), (0b00010, 5, 7), (0b00011, 5, 6), (0b0000110, 7, 9),
    (0b0000111, 7, 8), (0b00000110, 8, 15), (0b00000111, 8, 14), (0b00001000, 8, 13),
    (0b00001001, 8, 12), (0b00001010, 8, 11), (0b00001011, 8, 10), (0b0000010010, 10, 21),
    (0b0000010011, 10, 20), (0b0000010100, 10, 19), (0b0000010101, 10, 18), (0b0000010110, 10, 17),
    (0b0000010111, 10, 16), (0b00000001000, 11, 35), (0b00000001111, 11, 34), (0b00000011000, 11, 33),
    (0b00000011001, 11, 32), (0b00000011010, 11, 31), (0b00000011011, 11, 30), (0b00000011100, 11, 29),
    (0b00000011101, 11, 28), (0b00000011110, 11, 27), (0b00000011111, 11, 26), (0b00000100000, 11, 25),
    (0b00000100001, 11, 24), (0b00000100010, 11, 23), (0b00000100011, 11, 22),
];

pub(crate) const MACROBLOCK_TYPE_I: &[Code<u8>] = &[
    (0b1, 1, 0x01), (0b01, 2, 0x11),
];

pub(crate) const MACROBLOCK_TYPE_P: &[Code<u8>] = &[
    (0b1, 1, 0x0a), (0b01, 2, 0x02), (0b001, 3, 0x08), (0b00001, 5, 0x12),
    (0b00010, 5, 0x1a), (0b00011, 5, 0x01), (0b000001, 6, 0x11),
];

pub(crate) const MACROBLOCK_TYPE_B: &[Code<u8>] = &[
    (0b10, 2, 0x0c), (0b11, 2, 0x0e), (0b010, 3, 0x04), (0b011, 3, 0x06),
    (0b0010, 4, 0x08), (0b0011, 4, 0x0a), (0b00010, 5, 0x1e), (0b00011, 5, 0x01),
    (0b000001, 6, 0x11), (0b000010, 6, 0x16), (0b000011, 6, 0x1a),
];

pub(crate) const CODED_BLOCK_PATTERN: &[Code<u8>] = &[
    (0b111, 3, 60), (0b1010, 4, 32), (0b1011, 4, 16), (0b1100, 4, 8),
    (0b1101, 4, 4), (0b01000, 5, 62), (0b01001, 5, 2), (0b01010, 5, 61),
    (0b01011, 5, 1), (0b01100, 5, 56), (0b01101, 5, 52), (0b01110, 5, 44),
    (0b01111, 5, 28), (0b10000, 5, 40), (0b10001, 5, 20), (0b10010, 5, 48),
    (0b10011, 5, 12), (0b001100, 6, 63), (0b001101, 6, 3), (0b001110, 6, 36),
    (0b001111, 6, 24), (0b0010000, 7, 34), (0b0010001, 7, 18), (0b0010010, 7, 10),
    (0b0010011, 7, 6), (0b0010100, 7, 33), (0b0010101, 7, 17), (0b0010110, 7, 9),
    (0b0010111, 7, 5), (0b00000100, 8, 58), (0b00000101, 8, 54), (0b00000110, 8, 46),
    (0b00000111, 8, 30), (0b00001000, 8, 57), (0b00001001, 8, 53), (0b00001010, 8, 45),
    (0b00001011, 8, 29), (0b00001100, 8, 38), (0b00001101, 8, 26), (0b00001110, 8, 37),
    (0b00001111, 8, 25), (0b00010000, 8, 43), (0b00010001, 8, 23), (0b00010010, 8, 51),
    (0b00010011, 8, 15), (0b00010100, 8, 42), (0b00010101, 8, 22), (0b00010110, 8, 50),
    (0b00010111, 8, 14), (0b00011000, 8, 41), (0b00011001, 8, 21), (0b00011010, 8, 49),
    (0b00011011, 8, 13), (0b00011100, 8, 35), (0b00011101, 8, 19), (0b00011110, 8, 11),
    (0b00011111, 8, 7), (0b000000001, 9, 0), (0b000000010, 9, 39), (0b000000011, 9, 27),
    (0b000000100, 9, 59), (0b000000101, 9, 55), (0b000000110, 9, 47), (0b000000111, 9, 31),
];

pub(crate) const DC_SIZE_LUMINANCE: &[Code<u8>] = &[
    (0b00, 2, 1), (0b01, 2, 2), (0b100, 3, 0), (0b101, 3, 3),
    (0b110, 3, 4), (0b1110, 4, 5), (0b11110, 5, 6), (0b111110, 6, 7),
    (0b1111110, 7, 8), (0b11111110, 8, 9), (0b111111110, 9, 10), (0b111111111, 9, 11),
];

pub(crate) const DC_SIZE_CHROMINANCE: &[Code<u8>] = &[
    (0b00, 2, 0), (0b01, 2, 1), (0b10, 2, 2), (0b110, 3, 3),
    (0b1110, 4, 4), (0b11110, 5, 5), (0b111110, 6, 6), (0b1111110, 7, 7),
    (0b11111110, 8, 8), (0b111111110, 9, 9), (0b1111111110, 10, 10), (0b1111111111, 10, 11),
];

pub(crate) const MOTION_CODE: &[Code<i8>] = &[
    (0b1, 1, 0), (0b010, 3, 1), (0b011, 3, -1), (0b0010, 4, 2),
    (0b0011, 4, -2), (0b00010, 5, 3), (0b00011, 5, -3), (0b0000110, 7, 4),
    (0b0000111, 7, -4), (0b00000110, 8, 7), (0b00000111, 8, -7), (0b00001000, 8, 6),
    (0b00001001, 8, -6), (0b00001010, 8, 5), (0b00001011, 8, -5), (0b0000010010, 10, 10),
    (0b0000010011, 10, -10), (0b0000010100, 10, 9), (0b0000010101, 10, -9), (0b0000010110, 10, 8),
    (0b0000010111, 10, -8), (0b00000011000, 11, 16), (0b00000011001, 11, -16), (0b00000011010, 11, 15),
    (0b00000011011, 11, -15), (0b00000011100, 11, 14), (0b00000011101, 11, -14), (0b00000011110, 11, 13),
    (0b00000011111, 11, -13), (0b00000100000, 11, 12), (0b00000100001, 11, -12), (0b00000100010, 11, 11),
    (0b00000100011, 11, -11),
];

pub(crate) const DUAL_PRIME: &[Code<i8>] = &[
    (0b0, 1, 0), (0b10, 2, 1), (0b11, 2, -1),
];

pub(crate) const DCT_COEFFICIENTS_ZERO: &[Code<u16>] = &[
    (0b10, 2, 0x0000), (0b11, 2, 0x0001), (0b011, 3, 0x0101),
    (0b0100, 4, 0x0002), (0b0101, 4, 0x0201), (0b00101, 5, 0x0003),
    (0b00110, 5, 0x0401), (0b00111, 5, 0x0301), (0b000001, 6, 0xffff),
    (0b000100, 6, 0x0701), (0b000101, 6, 0x0601), (0b000110, 6, 0x0102),
    (0b000111, 6, 0x0501), (0b0000100, 7, 0x0202), (0b0000101, 7, 0x0901),
    (0b0000110, 7, 0x0004), (0b0000111, 7, 0x0801), (0b00100000, 8, 0x0d01),
    (0b00100001, 8, 0x0006), (0b00100010, 8, 0x0c01), (0b00100011, 8, 0x0b01),
    (0b00100100, 8, 0x0302), (0b00100101, 8, 0x0103), (0b00100110, 8, 0x0005),
    (0b00100111, 8, 0x0a01), (0b0000001000, 10, 0x1001), (0b0000001001, 10, 0x0502),
    (0b0000001010, 10, 0x0007), (0b0000001011, 10, 0x0203), (0b0000001100, 10, 0x0104),
    (0b0000001101, 10, 0x0f01), (0b0000001110, 10, 0x0e01), (0b0000001111, 10, 0x0402),
    (0b000000010000, 12, 0x000b), (0b000000010001, 12, 0x0802), (0b000000010010, 12, 0x0403),
    (0b000000010011, 12, 0x000a), (0b000000010100, 12, 0x0204), (0b000000010101, 12, 0x0702),
    (0b000000010110, 12, 0x1501), (0b000000010111, 12, 0x1401), (0b000000011000, 12, 0x0009),
    (0b000000011001, 12, 0x1301), (0b000000011010, 12, 0x1201), (0b000000011011, 12, 0x0105),
    (0b000000011100, 12, 0x0303), (0b000000011101, 12, 0x0008), (0b000000011110, 12, 0x0602),
    (0b000000011111, 12, 0x1101), (0b0000000010000, 13, 0x0a02), (0b0000000010001, 13, 0x0902),
    (0b0000000010010, 13, 0x0503), (0b0000000010011, 13, 0x0304), (0b0000000010100, 13, 0x0205),
    (0b0000000010101, 13, 0x0107), (0b0000000010110, 13, 0x0106), (0b0000000010111, 13, 0x000f),
    (0b0000000011000, 13, 0x000e), (0b0000000011001, 13, 0x000d), (0b0000000011010, 13, 0x000c),
    (0b0000000011011, 13, 0x1a01), (0b0000000011100, 13, 0x1901), (0b0000000011101, 13, 0x1801),
    (0b0000000011110, 13, 0x1701), (0b0000000011111, 13, 0x1601), (0b00000000010000, 14, 0x001f),
    (0b00000000010001, 14, 0x001e), (0b00000000010010, 14, 0x001d), (0b00000000010011, 14, 0x001c),
    (0b00000000010100, 14, 0x001b), (0b00000000010101, 14, 0x001a), (0b00000000010110, 14, 0x0019),
    (0b00000000010111, 14, 0x0018), (0b00000000011000, 14, 0x0017), (0b00000000011001, 14, 0x0016),
    (0b00000000011010, 14, 0x0015), (0b00000000011011, 14, 0x0014), (0b00000000011100, 14, 0x0013),
    (0b00000000011101, 14, 0x0012), (0b00000000011110, 14, 0x0011), (0b00000000011111, 14, 0x0010),
    (0b000000000010000, 15, 0x0028), (0b000000000010001, 15, 0x0027), (0b000000000010010, 15, 0x0026),
    (0b000000000010011, 15, 0x0025), (0b000000000010100, 15, 0x0024), (0b000000000010101, 15, 0x0023),
    (0b000000000010110, 15, 0x0022), (0b000000000010111, 15, 0x0021), (0b000000000011000, 15, 0x0020),
    (0b000000000011001, 15, 0x010e), (0b000000000011010, 15, 0x010d), (0b000000000011011, 15, 0x010c),
    (0b000000000011100, 15, 0x010b), (0b000000000011101, 15, 0x010a), (0b000000000011110, 15, 0x0109),
    (0b000000000011111, 15, 0x0108), (0b0000000000010000, 16, 0x0112), (0b0000000000010001, 16, 0x0111),
    (0b0000000000010010, 16, 0x0110), (0b0000000000010011, 16, 0x010f), (0b0000000000010100, 16, 0x0603),
    (0b0000000000010101, 16, 0x1002), (0b0000000000010110, 16, 0x0f02), (0b0000000000010111, 16, 0x0e02),
    (0b0000000000011000, 16, 0x0d02), (0b0000000000011001, 16, 0x0c02), (0b0000000000011010, 16, 0x0b02),
    (0b0000000000011011, 16, 0x1f01), (0b0000000000011100, 16, 0x1e01), (0b0000000000011101, 16, 0x1d01),
    (0b0000000000011110, 16, 0x1c01), (0b0000000000011111, 16, 0x1b01),
];

pub(crate) const DCT_COEFFICIENTS_ONE: &[Code<u16>] = &[
    (0b10, 2, 0x0001), (0b010, 3, 0x0101), (0b110, 3, 0x0002),
    (0b0110, 4, 0x0000), (0b0111, 4, 0x0003), (0b00101, 5, 0x0201),
    (0b00110, 5, 0x0102), (0b00111, 5, 0x0301), (0b11100, 5, 0x0004),
    (0b11101, 5, 0x0005), (0b000001, 6, 0xffff), (0b000100, 6, 0x0007),
    (0b000101, 6, 0x0006), (0b000110, 6, 0x0401), (0b000111, 6, 0x0501),
    (0b0000100, 7, 0x0701), (0b0000101, 7, 0x0801), (0b0000110, 7, 0x0601),
    (0b0000111, 7, 0x0202), (0b1111000, 7, 0x0901), (0b1111001, 7, 0x0103),
    (0b1111010, 7, 0x0a01), (0b1111011, 7, 0x0008), (0b1111100, 7, 0x0009),
    (0b00100000, 8, 0x0105), (0b00100001, 8, 0x0b01), (0b00100010, 8, 0x000b),
    (0b00100011, 8, 0x000a), (0b00100100, 8, 0x0d01), (0b00100101, 8, 0x0c01),
    (0b00100110, 8, 0x0302), (0b00100111, 8, 0x0104), (0b11111010, 8, 0x000c),
    (0b11111011, 8, 0x000d), (0b11111100, 8, 0x0203), (0b11111101, 8, 0x0402),
    (0b11111110, 8, 0x000e), (0b11111111, 8, 0x000f), (0b000000100, 9, 0x0502),
    (0b000000101, 9, 0x0e01), (0b000000111, 9, 0x0f01), (0b0000001100, 10, 0x0204),
    (0b0000001101, 10, 0x1001), (0b000000010001, 12, 0x0802), (0b000000010010, 12, 0x0403),
    (0b000000010101, 12, 0x0702), (0b000000010110, 12, 0x1501), (0b000000010111, 12, 0x1401),
    (0b000000011001, 12, 0x1301), (0b000000011010, 12, 0x1201), (0b000000011100, 12, 0x0303),
    (0b000000011110, 12, 0x0602), (0b000000011111, 12, 0x1101), (0b0000000010000, 13, 0x0a02),
    (0b0000000010001, 13, 0x0902), (0b0000000010010, 13, 0x0503), (0b0000000010011, 13, 0x0304),
    (0b0000000010100, 13, 0x0205), (0b0000000010101, 13, 0x0107), (0b0000000010110, 13, 0x0106),
    (0b0000000011011, 13, 0x1a01), (0b0000000011100, 13, 0x1901), (0b0000000011101, 13, 0x1801),
    (0b0000000011110, 13, 0x1701), (0b0000000011111, 13, 0x1601), (0b00000000010000, 14, 0x001f),
    (0b00000000010001, 14, 0x001e), (0b00000000010010, 14, 0x001d), (0b00000000010011, 14, 0x001c),
    (0b00000000010100, 14, 0x001b), (0b00000000010101, 14, 0x001a), (0b00000000010110, 14, 0x0019),
    (0b00000000010111, 14, 0x0018), (0b00000000011000, 14, 0x0017), (0b00000000011001, 14, 0x0016),
    (0b00000000011010, 14, 0x0015), (0b00000000011011, 14, 0x0014), (0b00000000011100, 14, 0x0013),
    (0b00000000011101, 14, 0x0012), (0b00000000011110, 14, 0x0011), (0b00000000011111, 14, 0x0010),
    (0b000000000010000, 15, 0x0028), (0b000000000010001, 15, 0x0027), (0b000000000010010, 15, 0x0026),
    (0b000000000010011, 15, 0x0025), (0b000000000010100, 15, 0x0024), (0b000000000010101, 15, 0x0023),
    (0b000000000010110, 15, 0x0022), (0b000000000010111, 15, 0x0021), (0b000000000011000, 15, 0x0020),
    (0b000000000011001, 15, 0x010e), (0b000000000011010, 15, 0x010d), (0b000000000011011, 15, 0x010c),
    (0b000000000011100, 15, 0x010b), (0b000000000011101, 15, 0x010a), (0b000000000011110, 15, 0x0109),
    (0b000000000011111, 15, 0x0108), (0b0000000000010000, 16, 0x0112), (0b0000000000010001, 16, 0x0111),
    (0b0000000000010010, 16, 0x0110), (0b0000000000010011, 16, 0x010f), (0b0000000000010100, 16, 0x0603),
    (0b0000000000010101, 16, 0x1002), (0b0000000000010110, 16, 0x0f02), (0b0000000000010111, 16, 0x0e02),
    (0b0000000000011000, 16, 0x0d02), (0b0000000000011001, 16, 0x0c02), (0b0000000000011010, 16, 0x0b02),
    (0b0000000000011011, 16, 0x1f01), (0b0000000000011100, 16, 0x1e01), (0b0000000000011101, 16, 0x1d01),
    (0b0000000000011110, 16, 0x1c01), (0b0000000000011111, 16, 0x1b01),
];

struct Group<T> {
    width: u32,
    entries: Vec<Option<(u8, T)>>,
}

/// Lookup structure built from a code list.
pub(crate) struct VlcTable<T> {
    groups: Vec<Group<T>>,
    // The last group holds a code made of zeros only (the chroma DC
    // size code `00`, for instance).
    zero_code: bool,
}

fn leading_zeros(bits: u32, len: u8) -> usize {
    if bits == 0 {
        usize::from(len)
    } else {
        usize::from(len) - (32 - bits.leading_zeros() as usize)
    }
}

impl<T: Copy> VlcTable<T> {
    pub fn new(codes: &[Code<T>]) -> Self {
        let group_count = codes
            .iter()
            .map(|&(bits, len, _)| leading_zeros(bits, len) + 1)
            .max()
            .unwrap_or(0);
        let zero_code = codes.iter().any(|&(bits, _, _)| bits == 0);

        let mut widths = vec![0u32; group_count];
        for &(bits, len, _) in codes {
            let zeros = leading_zeros(bits, len);
            if bits != 0 {
                let suffix = u32::from(len) - zeros as u32 - 1;
                widths[zeros] = widths[zeros].max(suffix);
            }
        }

        let mut groups: Vec<Group<T>> = widths
            .iter()
            .map(|&width| Group {
                width,
                entries: vec![None; 1 << width],
            })
            .collect();

        for &(bits, len, value) in codes {
            let zeros = leading_zeros(bits, len);
            let group = &mut groups[zeros];
            if bits == 0 {
                group.entries[0] = Some((len, value));
                continue;
            }
            let suffix_len = u32::from(len) - zeros as u32 - 1;
            let suffix = bits & ((1 << suffix_len) - 1);
            let spread = group.width - suffix_len;
            for k in 0..(1usize << spread) {
                let index = ((suffix as usize) << spread) | k;
                debug_assert!(group.entries[index].is_none(), "codes are not prefix free");
                group.entries[index] = Some((len, value));
            }
        }

        VlcTable { groups, zero_code }
    }

    /// Decode one symbol. Returns `None` on a bit pattern that is not
    /// a valid code; nothing is consumed in that case.
    pub fn decode(&self, cursor: &mut BitCursor) -> Option<T> {
        let window = cursor.window();
        let zeros = window.leading_zeros() as usize;
        let index = if zeros < self.groups.len() {
            zeros
        } else if self.zero_code {
            self.groups.len() - 1
        } else {
            return None;
        };

        let group = &self.groups[index];
        let entry = if group.width == 0 {
            0
        } else {
            let rest = (u64::from(window) << (index + 1)) as u32;
            (rest >> (32 - group.width)) as usize
        };

        let (len, value) = group.entries[entry]?;
        cursor.consume(u32::from(len));
        Some(value)
    }
}

/// One decoded entry of a DCT coefficient table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Coefficient {
    /// `run` zero coefficients followed by one of magnitude `level`;
    /// the sign bit is still in the stream.
    RunLevel { run: u8, level: u8 },
    EndOfBlock,
    Escape,
}

pub(crate) struct Tables {
    pub address_increment: VlcTable<u8>,
    pub macroblock_type_i: VlcTable<u8>,
    pub macroblock_type_p: VlcTable<u8>,
    pub macroblock_type_b: VlcTable<u8>,
    pub coded_block_pattern: VlcTable<u8>,
    pub dc_size_luminance: VlcTable<u8>,
    pub dc_size_chrominance: VlcTable<u8>,
    pub motion_code: VlcTable<i8>,
    pub dual_prime: VlcTable<i8>,
    pub dct_zero: VlcTable<u16>,
    pub dct_one: VlcTable<u16>,
}

impl Tables {
    fn build() -> Self {
        Tables {
            address_increment: VlcTable::new(MACROBLOCK_ADDRESS_INCREMENT),
            macroblock_type_i: VlcTable::new(MACROBLOCK_TYPE_I),
            macroblock_type_p: VlcTable::new(MACROBLOCK_TYPE_P),
            macroblock_type_b: VlcTable::new(MACROBLOCK_TYPE_B),
            coded_block_pattern: VlcTable::new(CODED_BLOCK_PATTERN),
            dc_size_luminance: VlcTable::new(DC_SIZE_LUMINANCE),
            dc_size_chrominance: VlcTable::new(DC_SIZE_CHROMINANCE),
            motion_code: VlcTable::new(MOTION_CODE),
            dual_prime: VlcTable::new(DUAL_PRIME),
            dct_zero: VlcTable::new(DCT_COEFFICIENTS_ZERO),
            dct_one: VlcTable::new(DCT_COEFFICIENTS_ONE),
        }
    }

    /// Address increment including escapes. 0 means the slice has no
    /// further macroblocks (start code zeros or an invalid code).
    pub fn macroblock_address_increment(&self, cursor: &mut BitCursor) -> u32 {
        let mut increment = 0;
        loop {
            match self.address_increment.decode(cursor) {
                Some(MBA_STUFFING) => continue,
                Some(MBA_ESCAPE) => increment += 33,
                Some(value) => return increment + u32::from(value),
                None => return 0,
            }
        }
    }

    /// Macroblock type flags for the given picture type.
    pub fn macroblock_type(&self, cursor: &mut BitCursor, coding_type: CodingType) -> Option<u8> {
        match coding_type {
            CodingType::I => self.macroblock_type_i.decode(cursor),
            CodingType::P => self.macroblock_type_p.decode(cursor),
            CodingType::B => self.macroblock_type_b.decode(cursor),
            CodingType::D => {
                // Single '1' bit, intra only.
                cursor.consume(1);
                Some(MB_INTRA)
            }
        }
    }

    /// Size and differential of one intra DC coefficient.
    pub fn dc_differential(&self, cursor: &mut BitCursor, luminance: bool) -> i32 {
        let table = if luminance {
            &self.dc_size_luminance
        } else {
            &self.dc_size_chrominance
        };
        let size = match table.decode(cursor) {
            Some(size) => u32::from(size),
            None => return 0,
        };
        if size == 0 {
            return 0;
        }
        let value = cursor.read(size) as i32;
        if value & (1 << (size - 1)) == 0 {
            value - (1 << size) + 1
        } else {
            value
        }
    }

    pub fn coefficient(&self, cursor: &mut BitCursor, table_one: bool) -> Option<Coefficient> {
        let table = if table_one { &self.dct_one } else { &self.dct_zero };
        let packed = table.decode(cursor)?;
        Some(match packed {
            DCT_END_OF_BLOCK => Coefficient::EndOfBlock,
            DCT_ESCAPE => Coefficient::Escape,
            _ => Coefficient::RunLevel {
                run: (packed >> 8) as u8,
                level: (packed & 0xff) as u8,
            },
        })
    }
}

pub(crate) fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}
