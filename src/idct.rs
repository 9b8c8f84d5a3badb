// Inverse DCT.
//
// AccurateIdct is a translation of the ISO/IEC 23002-2 reference [1, 2].
// FastIdct is the AAN style transform used by pl_mpeg; it needs its
// input scaled by a premultiplier matrix.
//
// [1] http://www.reznik.org/software.html
// [2] http://www.reznik.org/papers/SPIE07_MPEG-C_IDCT.pdf

use crate::frame::clamp;

/// Turns a block of dequantised coefficients (natural order) into
/// pixels.
pub trait InverseDct {
    fn transform(&self, block: &mut [i32; 64]);

    /// Transform and store, replacing the 8x8 area at `dst`. The block
    /// is zeroed for reuse.
    fn put_block(&self, block: &mut [i32; 64], dst: &mut [u8], stride: usize) {
        self.transform(block);
        for (row, coeffs) in block.chunks_exact(8).enumerate() {
            let line = &mut dst[row * stride..row * stride + 8];
            for (pixel, &value) in line.iter_mut().zip(coeffs) {
                *pixel = clamp(value);
            }
        }
        block.fill(0);
    }

    /// Transform and add onto the prediction at `dst`.
    fn add_block(&self, block: &mut [i32; 64], dst: &mut [u8], stride: usize) {
        self.transform(block);
        for (row, coeffs) in block.chunks_exact(8).enumerate() {
            let line = &mut dst[row * stride..row * stride + 8];
            for (pixel, &value) in line.iter_mut().zip(coeffs) {
                *pixel = clamp(i32::from(*pixel) + value);
            }
        }
        block.fill(0);
    }
}

// Multiplierless butterflies, each returns (y', z).
fn pmul_1(y: i32) -> (i32, i32) {
    let y2 = (y >> 3) - (y >> 7);
    let y3 = y2 - (y >> 11);
    (y - y2, y2 + (y3 >> 1))
}

fn pmul_2(y: i32) -> (i32, i32) {
    let y2 = (y >> 9) - y;
    ((y2 >> 2) - y2, y >> 1)
}

fn pmul_3(y: i32) -> (i32, i32) {
    let y2 = y + (y >> 5);
    let y3 = y2 >> 2;
    (y3 + (y >> 4), y2 - y3)
}

/// 1-D transform of `input[0..8]`, written transposed to `out` with a
/// stride of 8.
fn scaled_1d_idct(input: &[i32], out: &mut [i32]) {
    // odd part
    let (x1, x3, x5, x7) = (input[1], input[3], input[5], input[7]);
    let xa = x1 + x7;
    let xb = x1 - x7;
    let x1 = xa + x3;
    let x3 = xa - x3;
    let x7 = xb + x5;
    let x5 = xb - x5;

    let (x3, xa) = pmul_1(x3);
    let (x5, xb) = pmul_1(x5);
    let x3 = x3 - xb;
    let x5 = x5 + xa;

    let (x1, xa) = pmul_2(x1);
    let (x7, xb) = pmul_2(x7);
    let x1 = x1 + xb;
    let x7 = x7 - xa;

    // even part
    let (x0, x2, x4, x6) = (input[0], input[2], input[4], input[6]);
    let (x2, xa) = pmul_3(x2);
    let (x6, xb) = pmul_3(x6);
    let x2 = x2 - xb;
    let x6 = x6 + xa;

    let xa = x0 + x4;
    let xb = x0 - x4;
    let x0 = xa + x6;
    let x6 = xa - x6;
    let x4 = xb + x2;
    let x2 = xb - x2;

    out[0] = x0 + x1;
    out[8] = x4 + x5;
    out[16] = x2 + x3;
    out[24] = x6 + x7;
    out[32] = x6 - x7;
    out[40] = x2 - x3;
    out[48] = x4 - x5;
    out[56] = x0 - x1;
}

const A: i32 = 1024;
const B: i32 = 1138;
const C: i32 = 1730;
const D: i32 = 1609;
const E: i32 = 1264;
const F: i32 = 1922;
const G: i32 = 1788;
const H: i32 = 2923;
const I: i32 = 2718;
const J: i32 = 2528;

const SCALE: [i32; 64] = [
    A, B, C, D, A, D, C, B,
    B, E, F, G, B, G, F, E,
    C, F, H, I, C, I, H, F,
    D, G, I, J, D, J, I, G,
    A, B, C, D, A, D, C, B,
    D, G, I, J, D, J, I, G,
    C, F, H, I, C, I, H, F,
    B, E, F, G, B, G, F, E,
];

/// Bit exact ISO/IEC 23002-2 fixed point IDCT.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccurateIdct;

impl InverseDct for AccurateIdct {
    fn transform(&self, block: &mut [i32; 64]) {
        let mut scaled = [0i32; 64];
        let mut transposed = [0i32; 64];

        for i in 0..64 {
            scaled[i] = SCALE[i] * block[i];
        }
        // DC bias for rounding
        scaled[0] += 1 << 12;

        for i in 0..8 {
            scaled_1d_idct(&scaled[i * 8..], &mut transposed[i..]);
        }
        for i in 0..8 {
            scaled_1d_idct(&transposed[i * 8..], &mut scaled[i..]);
        }

        for i in 0..64 {
            block[i] = scaled[i] >> 13;
        }
    }
}

const PREMULTIPLIER: [i32; 64] = [
    32, 44, 42, 38, 32, 25, 17,  9,
    44, 62, 58, 52, 44, 35, 24, 12,
    42, 58, 55, 49, 42, 33, 23, 12,
    38, 52, 49, 44, 38, 30, 20, 10,
    32, 44, 42, 38, 32, 25, 17,  9,
    25, 35, 33, 30, 25, 20, 14,  7,
    17, 24, 23, 20, 17, 14,  9,  5,
     9, 12, 12, 10,  9,  7,  5,  2,
];

/// Faster, slightly less accurate transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastIdct;

impl InverseDct for FastIdct {
    fn transform(&self, block: &mut [i32; 64]) {
        for (coeff, scale) in block.iter_mut().zip(PREMULTIPLIER.iter()) {
            *coeff *= scale;
        }

        // columns
        for i in 0..8 {
            let b1 = block[4 * 8 + i];
            let b3 = block[2 * 8 + i] + block[6 * 8 + i];
            let b4 = block[5 * 8 + i] - block[3 * 8 + i];
            let tmp1 = block[8 + i] + block[7 * 8 + i];
            let tmp2 = block[3 * 8 + i] + block[5 * 8 + i];
            let b6 = block[8 + i] - block[7 * 8 + i];
            let b7 = tmp1 + tmp2;
            let m0 = block[i];
            let x4 = ((b6 * 473 - b4 * 196 + 128) >> 8) - b7;
            let x0 = x4 - (((tmp1 - tmp2) * 362 + 128) >> 8);
            let x1 = m0 - b1;
            let x2 = (((block[2 * 8 + i] - block[6 * 8 + i]) * 362 + 128) >> 8) - b3;
            let x3 = m0 + b1;
            let y3 = x1 + x2;
            let y4 = x3 + b3;
            let y5 = x1 - x2;
            let y6 = x3 - b3;
            let y7 = -x0 - ((b4 * 473 + b6 * 196 + 128) >> 8);
            block[i] = b7 + y4;
            block[8 + i] = x4 + y3;
            block[2 * 8 + i] = y5 - x0;
            block[3 * 8 + i] = y6 - y7;
            block[4 * 8 + i] = y6 + y7;
            block[5 * 8 + i] = x0 + y5;
            block[6 * 8 + i] = y3 - x4;
            block[7 * 8 + i] = y4 - b7;
        }

        // rows
        for row in block.chunks_exact_mut(8) {
            let b1 = row[4];
            let b3 = row[2] + row[6];
            let b4 = row[5] - row[3];
            let tmp1 = row[1] + row[7];
            let tmp2 = row[3] + row[5];
            let b6 = row[1] - row[7];
            let b7 = tmp1 + tmp2;
            let m0 = row[0];
            let x4 = ((b6 * 473 - b4 * 196 + 128) >> 8) - b7;
            let x0 = x4 - (((tmp1 - tmp2) * 362 + 128) >> 8);
            let x1 = m0 - b1;
            let x2 = (((row[2] - row[6]) * 362 + 128) >> 8) - b3;
            let x3 = m0 + b1;
            let y3 = x1 + x2;
            let y4 = x3 + b3;
            let y5 = x1 - x2;
            let y6 = x3 - b3;
            let y7 = -x0 - ((b4 * 473 + b6 * 196 + 128) >> 8);
            row[0] = (b7 + y4 + 128) >> 8;
            row[1] = (x4 + y3 + 128) >> 8;
            row[2] = (y5 - x0 + 128) >> 8;
            row[3] = (y6 - y7 + 128) >> 8;
            row[4] = (y6 + y7 + 128) >> 8;
            row[5] = (x0 + y5 + 128) >> 8;
            row[6] = (y3 - x4 + 128) >> 8;
            row[7] = (y4 - b7 + 128) >> 8;
        }
    }
}
