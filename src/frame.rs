use crate::picture::CodingType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Plane {
        Plane {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }
}

/// One 4:2:0 picture in planar layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub y: Plane,
    pub cb: Plane,
    pub cr: Plane,
}

#[inline(always)]
pub(crate) fn clamp(n: i32) -> u8 {
    n.clamp(0, 255) as u8
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Frame {
        Frame {
            width,
            height,
            y: Plane::new(width, height),
            // Half as many chrominance pixels in each direction.
            cb: Plane::new(width / 2, height / 2),
            cr: Plane::new(width / 2, height / 2),
        }
    }

    /// Plane by component index: 0 luma, 1 Cb, 2 Cr.
    pub fn plane_mut(&mut self, component: usize) -> &mut Plane {
        match component {
            0 => &mut self.y,
            1 => &mut self.cb,
            _ => &mut self.cr,
        }
    }

    /// Convert to packed 24 bit RGB using BT.601 studio range
    /// coefficients in 16.16 fixed point.
    pub fn to_rgb(&self) -> Vec<u8> {
        const BYTES_PER_PIXEL: usize = 3;
        let stride = self.width * BYTES_PER_PIXEL;
        let mut dest = vec![0; stride * self.height];

        // Each chroma sample covers a 2x2 luma square.
        for row in 0..self.height / 2 {
            for col in 0..self.width / 2 {
                let c_index = row * self.cb.width + col;
                let cr = i32::from(self.cr.data[c_index]) - 128;
                let cb = i32::from(self.cb.data[c_index]) - 128;
                let r = (cr * 104597) >> 16;
                let g = (cb * 25674 + cr * 53278) >> 16;
                let b = (cb * 132201) >> 16;

                for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    let y_index = (row * 2 + dy) * self.y.width + col * 2 + dx;
                    let d_index = (row * 2 + dy) * stride + (col * 2 + dx) * BYTES_PER_PIXEL;
                    let luma = ((i32::from(self.y.data[y_index]) - 16) * 76309) >> 16;
                    dest[d_index] = clamp(luma + r);
                    dest[d_index + 1] = clamp(luma - g);
                    dest[d_index + 2] = clamp(luma + b);
                }
            }
        }
        dest
    }
}

/// What a frame of the pool is currently used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Being decoded into.
    Current,
    ForwardRef,
    BackwardRef,
    /// Target of B pictures, never used as a reference.
    Throwaway,
}

const THROWAWAY: usize = 2;

/// Frames borrowed by one slice: the picture under construction and
/// the references it may predict from. A reference that is the
/// current frame itself is never handed out.
pub(crate) struct Targets<'a> {
    pub current: &'a mut Frame,
    pub forward: Option<&'a Frame>,
    pub backward: Option<&'a Frame>,
}

/// Three frames and the roles they play. Rotation reassigns indices,
/// pixels are never copied.
pub struct FramePool {
    frames: [Frame; 3],
    decoded: [bool; 3],
    current: usize,
    forward: usize,
    backward: usize,
}

impl FramePool {
    pub fn new(frames: [Frame; 3]) -> Self {
        FramePool {
            frames,
            decoded: [false; 3],
            current: THROWAWAY,
            forward: 0,
            backward: 1,
        }
    }

    pub fn index(&self, role: Role) -> usize {
        match role {
            Role::Current => self.current,
            Role::ForwardRef => self.forward,
            Role::BackwardRef => self.backward,
            Role::Throwaway => THROWAWAY,
        }
    }

    pub fn frame(&self, role: Role) -> &Frame {
        &self.frames[self.index(role)]
    }

    /// True once any slice has been decoded into the frame in `role`.
    pub fn is_decoded(&self, role: Role) -> bool {
        self.decoded[self.index(role)]
    }

    pub fn width(&self) -> usize {
        self.frames[0].width
    }

    pub fn height(&self) -> usize {
        self.frames[0].height
    }

    /// Assign roles for a new picture. An I or P picture overwrites the
    /// older reference and becomes the newest one; a B picture goes to
    /// the throwaway frame.
    pub fn rotate(&mut self, coding_type: CodingType) {
        if coding_type == CodingType::B {
            self.current = THROWAWAY;
        } else {
            self.current = self.forward;
            self.forward = self.backward;
            self.backward = self.current;
        }
    }

    pub(crate) fn targets(&mut self) -> Targets<'_> {
        let (current, forward, backward) = (self.current, self.forward, self.backward);
        self.decoded[current] = true;

        let [a, b, c] = &mut self.frames;
        // The current frame and the two others in index order.
        let (frame, low, high, low_index): (&mut Frame, &Frame, &Frame, usize) = match current {
            0 => (a, &*b, &*c, 1),
            1 => (b, &*a, &*c, 0),
            _ => (c, &*a, &*b, 0),
        };
        let other = move |index: usize| {
            if index == current {
                None
            } else if index == low_index {
                Some(low)
            } else {
                Some(high)
            }
        };

        Targets {
            current: frame,
            forward: other(forward),
            backward: other(backward),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> FramePool {
        FramePool::new([Frame::new(16, 16), Frame::new(16, 16), Frame::new(16, 16)])
    }

    #[test]
    fn rotation_i_p_p_b_p() {
        let mut pool = pool();
        let mut completed_anchor = None;

        for coding_type in [CodingType::I, CodingType::P, CodingType::P, CodingType::B, CodingType::P] {
            pool.rotate(coding_type);
            let current = pool.index(Role::Current);

            if coding_type == CodingType::B {
                assert_eq!(current, pool.index(Role::Throwaway));
                assert_ne!(current, pool.index(Role::ForwardRef));
                assert_ne!(current, pool.index(Role::BackwardRef));
            } else {
                // The anchor completed before becomes the forward reference.
                if let Some(previous) = completed_anchor {
                    assert_eq!(pool.index(Role::ForwardRef), previous);
                }
                assert_eq!(current, pool.index(Role::BackwardRef));
                assert_ne!(current, pool.index(Role::Throwaway));
                completed_anchor = Some(current);
            }
            assert_ne!(pool.index(Role::ForwardRef), pool.index(Role::BackwardRef));
        }
    }

    #[test]
    fn b_pictures_leave_references_alone() {
        let mut pool = pool();
        pool.rotate(CodingType::I);
        pool.rotate(CodingType::P);
        let (forward, backward) = (pool.index(Role::ForwardRef), pool.index(Role::BackwardRef));
        pool.rotate(CodingType::B);
        pool.rotate(CodingType::B);
        assert_eq!(pool.index(Role::ForwardRef), forward);
        assert_eq!(pool.index(Role::BackwardRef), backward);
    }

    #[test]
    fn targets_never_alias_current() {
        let mut pool = pool();
        pool.rotate(CodingType::I);
        pool.rotate(CodingType::P);
        let forward = pool.index(Role::ForwardRef);
        pool.frames[forward].y.data[0] = 77;
        {
            let targets = pool.targets();
            // P pictures predict from the forward reference only; the
            // backward role is the current frame.
            assert_eq!(targets.forward.map(|f| f.y.data[0]), Some(77));
            assert!(targets.backward.is_none());
            targets.current.y.data[0] = 5;
        }
        assert!(pool.is_decoded(Role::Current));
        assert!(!pool.is_decoded(Role::ForwardRef));

        pool.rotate(CodingType::B);
        let targets = pool.targets();
        assert!(targets.forward.is_some());
        assert_eq!(targets.backward.map(|f| f.y.data[0]), Some(5));
    }

    #[test]
    fn grey_converts_to_grey() {
        let mut frame = Frame::new(4, 2);
        frame.y.data.fill(126);
        frame.cb.data.fill(128);
        frame.cr.data.fill(128);
        let rgb = frame.to_rgb();
        assert_eq!(rgb.len(), 4 * 2 * 3);
        assert!(rgb.iter().all(|&v| v == 128));
    }
}
