// Destinations for decoded pictures.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use log::debug;
use md5::{Digest, Md5};

use crate::bmp::write_bmp;
use crate::frame::Frame;

/// Receives frames from a [`crate::Decoder`].
///
/// Frames handed to `picture_ready` are in display order. They stay
/// owned by the decoder and are overwritten later, so an output that
/// keeps pictures around must copy them.
pub trait VideoOutput {
    /// Called three times when the first sequence header (or one with a
    /// new picture size) arrives. The frame must have the requested
    /// coded size.
    fn allocate_frame(&mut self, width: usize, height: usize) -> Frame {
        Frame::new(width, height)
    }

    fn picture_ready(&mut self, frame: &Frame) -> io::Result<()>;

    /// Macroblock row `row` of the picture being displayed next has been
    /// decoded.
    fn slice_ready(&mut self, _frame: &Frame, _row: usize) {}
}

/// Discards pictures, counting them.
#[derive(Debug, Default)]
pub struct NullOutput {
    pub pictures: usize,
}

impl VideoOutput for NullOutput {
    fn picture_ready(&mut self, _frame: &Frame) -> io::Result<()> {
        self.pictures += 1;
        Ok(())
    }
}

/// Writes one binary PGM per picture: the luma plane followed by the
/// chroma planes with Cb and Cr rows side by side.
pub struct PgmOutput {
    dir: PathBuf,
    pictures: usize,
}

impl PgmOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PgmOutput {
            dir: dir.into(),
            pictures: 0,
        }
    }

    pub fn pictures(&self) -> usize {
        self.pictures
    }
}

pub(crate) fn write_pgm<W: Write>(writer: &mut W, frame: &Frame) -> io::Result<()> {
    write!(writer, "P5\n{} {}\n255\n", frame.width, frame.height * 3 / 2)?;
    writer.write_all(&frame.y.data)?;
    for row in 0..frame.cb.height {
        writer.write_all(frame.cb.row(row))?;
        writer.write_all(frame.cr.row(row))?;
    }
    Ok(())
}

impl VideoOutput for PgmOutput {
    fn picture_ready(&mut self, frame: &Frame) -> io::Result<()> {
        self.pictures += 1;
        let path = self.dir.join(format!("{:05}.pgm", self.pictures));
        debug!("writing {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        write_pgm(&mut writer, frame)?;
        writer.flush()
    }
}

/// Writes one 24 bit BMP per picture.
pub struct BmpOutput {
    dir: PathBuf,
    pictures: usize,
}

impl BmpOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BmpOutput {
            dir: dir.into(),
            pictures: 0,
        }
    }

    pub fn pictures(&self) -> usize {
        self.pictures
    }
}

impl VideoOutput for BmpOutput {
    fn picture_ready(&mut self, frame: &Frame) -> io::Result<()> {
        self.pictures += 1;
        let path = self.dir.join(format!("{:05}.bmp", self.pictures));
        debug!("writing {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        write_bmp(&mut writer, frame.width, frame.height, &frame.to_rgb())?;
        writer.flush()
    }
}

/// Writes the MD5 of every picture, one `md5sum` style line each. The
/// digest covers the picture as [`PgmOutput`] would write it, so a line
/// can be checked against the matching file.
pub struct Md5Output<W: Write> {
    writer: W,
    pictures: usize,
}

impl<W: Write> Md5Output<W> {
    pub fn new(writer: W) -> Self {
        Md5Output { writer, pictures: 0 }
    }

    pub fn pictures(&self) -> usize {
        self.pictures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> VideoOutput for Md5Output<W> {
    fn picture_ready(&mut self, frame: &Frame) -> io::Result<()> {
        self.pictures += 1;
        let mut hasher = Md5::new();
        write_pgm(&mut hasher, frame)?;
        writeln!(self.writer, "{:x}  {:05}.pgm", hasher.finalize(), self.pictures)
    }
}
