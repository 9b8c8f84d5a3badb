// Block prediction from reference pictures.

/// Whether a prediction replaces the destination or is averaged into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    Put,
    Avg,
}

/// Half-pel position of a motion vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Whole,
    HalfX,
    HalfY,
    HalfXY,
}

impl Phase {
    /// Phase of a vector given in half-pel units.
    pub fn of(x: i32, y: i32) -> Phase {
        match ((y & 1) << 1) | (x & 1) {
            0 => Phase::Whole,
            1 => Phase::HalfX,
            2 => Phase::HalfY,
            _ => Phase::HalfXY,
        }
    }

    /// Number of source bytes a block touches, counted from its first
    /// pixel.
    pub fn source_extent(self, width: usize, height: usize, stride: usize) -> usize {
        let (extra_x, extra_y) = match self {
            Phase::Whole => (0, 0),
            Phase::HalfX => (1, 0),
            Phase::HalfY => (0, 1),
            Phase::HalfXY => (1, 1),
        };
        (height - 1 + extra_y) * stride + width + extra_x
    }
}

/// Motion compensation backend.
///
/// `dst` and `src` start at the top left pixel of the block and rows
/// are `stride` bytes apart in both. `width` is 16 for luma and 8 for
/// chroma. `src` must cover `phase.source_extent(width, height, stride)`
/// bytes.
pub trait MotionCompensator {
    fn predict(
        &self,
        blend: Blend,
        phase: Phase,
        width: usize,
        height: usize,
        dst: &mut [u8],
        src: &[u8],
        stride: usize,
    );
}

/// Plain integer implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct PortableMc;

#[inline(always)]
fn avg2(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + 1) >> 1) as u8
}

#[inline(always)]
fn avg4(a: u8, b: u8, c: u8, d: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d) + 2) >> 2) as u8
}

#[inline(always)]
fn interpolate<F>(blend: Blend, width: usize, height: usize, dst: &mut [u8], src: &[u8], stride: usize, sample: F)
where
    F: Fn(&[u8], usize) -> u8,
{
    let mut idx = 0;
    for _ in 0..height {
        for x in 0..width {
            let pred = sample(src, idx + x);
            dst[idx + x] = match blend {
                Blend::Put => pred,
                Blend::Avg => avg2(pred, dst[idx + x]),
            };
        }
        idx += stride;
    }
}

impl MotionCompensator for PortableMc {
    fn predict(
        &self,
        blend: Blend,
        phase: Phase,
        width: usize,
        height: usize,
        dst: &mut [u8],
        src: &[u8],
        stride: usize,
    ) {
        match phase {
            Phase::Whole => interpolate(blend, width, height, dst, src, stride, |s, i| s[i]),
            Phase::HalfX => {
                interpolate(blend, width, height, dst, src, stride, |s, i| avg2(s[i], s[i + 1]))
            }
            Phase::HalfY => interpolate(blend, width, height, dst, src, stride, |s, i| {
                avg2(s[i], s[i + stride])
            }),
            Phase::HalfXY => interpolate(blend, width, height, dst, src, stride, |s, i| {
                avg4(s[i], s[i + 1], s[i + stride], s[i + stride + 1])
            }),
        }
    }
}
