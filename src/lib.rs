// Resources
//
// ISO/IEC 13818-2 (MPEG-2 video), ISO/IEC 11172-2 (MPEG-1 video)
// http://dvdnav.mplayerhq.hu/dvdinfo/mpeghdrs.html
// https://tech.ebu.ch/docs/techreview/trev_266-ely.pdf
// http://www.reznik.org/papers/SPIE07_MPEG-C_IDCT.pdf

//! Decoder for MPEG-1 and MPEG-2 (main profile) video elementary streams.
//!
//! ```no_run
//! use mpeg2_ox::{Decoder, NullOutput};
//!
//! let stream = std::fs::read("movie.m2v")?;
//! let mut decoder = Decoder::new();
//! let mut output = NullOutput::default();
//! decoder.decode(&stream, &mut output)?;
//! decoder.close(&mut output)?;
//! println!("{} pictures", output.pictures);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bits;
mod bmp;
mod decoder;
mod error;
mod frame;
mod header;
mod idct;
mod motion;
mod output;
mod picture;
mod slice;
mod vlc;

#[cfg(test)]
mod testutil;

pub use bmp::write_bmp;
pub use decoder::{Decoder, MAX_CHUNK_SIZE};
pub use error::{DecodeError, Result};
pub use frame::{Frame, FramePool, Plane, Role};
pub use header::frame_rate;
pub use idct::{AccurateIdct, FastIdct, InverseDct};
pub use motion::{Blend, MotionCompensator, Phase, PortableMc};
pub use output::{BmpOutput, Md5Output, NullOutput, PgmOutput, VideoOutput};
pub use picture::{CodingType, PictureParams};

pub const PICTURE_START_CODE: u8 = 0x00;
pub const SLICE_START_CODE_MIN: u8 = 0x01;
pub const SLICE_START_CODE_MAX: u8 = 0xAF;
pub const USER_DATA_START_CODE: u8 = 0xB2;
pub const SEQUENCE_HEADER_CODE: u8 = 0xB3;
pub const EXTENSION_START_CODE: u8 = 0xB5;
pub const SEQUENCE_END_CODE: u8 = 0xB7;
pub const GROUP_START_CODE: u8 = 0xB8;
