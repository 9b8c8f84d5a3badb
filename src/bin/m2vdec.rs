use mpeg2_ox::{
    AccurateIdct, BmpOutput, Decoder, FastIdct, InverseDct, Md5Output, NullOutput, PgmOutput, PortableMc,
    VideoOutput,
};

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

extern crate env_logger;

const BUFFER_SIZE: usize = 256 * 1024;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputKind {
    Null,
    Pgm,
    Bmp,
    /// md5sum lines of the pgm pictures, written to `md5` in the directory
    Md5,
}

#[derive(Parser, Debug)]
#[command(name = "m2vdec", version, about = "Decode an MPEG-1/2 video elementary stream")]
struct Cli {
    /// Elementary stream to decode
    #[arg(short, long)]
    file: PathBuf,

    /// Where decoded pictures go
    #[arg(short, long, value_enum, default_value_t = OutputKind::Null)]
    output: OutputKind,

    /// Directory for pgm, bmp and md5 files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Skip the slices of B pictures
    #[arg(long)]
    drop_b: bool,

    /// Use the fast, less accurate IDCT
    #[arg(long)]
    fast_idct: bool,
}

fn run(cli: &Cli, output: &mut dyn VideoOutput) -> Result<u64, Box<dyn Error>> {
    let idct: Box<dyn InverseDct> = if cli.fast_idct {
        Box::new(FastIdct)
    } else {
        Box::new(AccurateIdct)
    };
    let mut decoder = Decoder::with_backends(Box::new(PortableMc), idct);
    decoder.set_drop(cli.drop_b);

    let mut file = File::open(&cli.file)?;
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let len = file.read(&mut buffer)?;
        if len == 0 {
            break;
        }
        decoder.decode(&buffer[..len], &mut *output)?;
    }
    decoder.close(&mut *output)?;

    if decoder.corruption_count() > 0 {
        eprintln!("{} damaged constructs skipped", decoder.corruption_count());
    }
    Ok(decoder.pictures_completed())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut output: Box<dyn VideoOutput> = match cli.output {
        OutputKind::Null => Box::new(NullOutput::default()),
        OutputKind::Pgm => Box::new(PgmOutput::new(&cli.dir)),
        OutputKind::Bmp => Box::new(BmpOutput::new(&cli.dir)),
        OutputKind::Md5 => Box::new(Md5Output::new(File::create(cli.dir.join("md5"))?)),
    };

    let start = Instant::now();
    let pictures = run(&cli, output.as_mut())?;
    let seconds = start.elapsed().as_secs_f64();

    let fps = if seconds > 0.0 { pictures as f64 / seconds } else { 0.0 };
    println!("{} pictures in {:.2}s, {:.1} fps", pictures, seconds, fps);
    Ok(())
}
