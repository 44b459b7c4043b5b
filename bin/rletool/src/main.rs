use std::{
    fs,
    io::{Read, Write},
    path::PathBuf,
};

use anyhow::{bail, Result};
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use log::info;

use spritecodec::rle;

#[derive(Subcommand, Debug)]
enum Mode {
    /// Input is one color index per byte
    Encode,
    Decode {
        /// Starting offset (inclusive)
        #[arg(short, long = "from")]
        start: Option<usize>,
        /// Ending offset (exclusive)
        #[arg(short, long = "to")]
        end: Option<usize>,
        /// Stop after this many pixels instead of at the end of the input
        #[arg(short = 'n', long)]
        pixels: Option<usize>,
    },
}

/// Encode or decode raw color index streams with the sprite RLE codec.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, disable_help_flag = true)]
#[clap(group(ArgGroup::new("outkd").args(&["to_stdout", "output"])))]
struct Args {
    #[command(subcommand)]
    mode: Mode,
    /// Bits per color index (1 to 4)
    #[arg(short, long, global = true, default_value_t = 4,
          value_parser = clap::value_parser!(u8).range(1..=4))]
    bpp: u8,
    /// Input file (if no input, read from stdin)
    #[arg(global = true)]
    input: Option<PathBuf>,
    /// Output file
    #[arg(short, long, global = true, group = "outkd")]
    output: Option<PathBuf>,
    /// Write to stdout (mutually exclusive with [output])
    #[arg(long, global=true, action=ArgAction::SetTrue, group = "outkd")]
    to_stdout: bool,
    /// Print help information
    #[arg(long, global=true, action=clap::ArgAction::HelpLong)]
    help: Option<bool>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let input = match args.input {
        None => {
            let mut input = Vec::new();
            let stdin = std::io::stdin();
            let mut handle = stdin.lock();
            handle.read_to_end(&mut input)?;
            input
        }
        Some(fname) => fs::read(fname)?,
    };

    let result = match args.mode {
        Mode::Encode => {
            if let Some((pos, &c)) =
                input.iter().enumerate().find(|(_, &c)| c >> args.bpp != 0)
            {
                bail!(
                    "byte {pos} is {c}, which does not fit in {} bits",
                    args.bpp
                );
            }
            rle::encode(&input, args.bpp)
        }
        Mode::Decode { start, end, pixels } => {
            let from = start.unwrap_or(0);
            let to = end.unwrap_or(input.len());
            if from > to || to > input.len() {
                bail!("range {from}..{to} is outside the {} byte input", input.len());
            }
            let input = &input[from..to];
            match pixels {
                Some(count) => {
                    let (pixels, used) =
                        rle::decode_exact(input, args.bpp, count)?;
                    info!("{count} pixels from {used} bytes");
                    pixels
                }
                None => rle::decode(input, args.bpp)?,
            }
        }
    };

    info!("{} bytes in, {} bytes out", input.len(), result.len());

    match (args.output, args.to_stdout) {
        (Some(_), true) => {
            bail!("--output and --to-stdout are mutually exclusive")
        }
        (Some(fname), false) => fs::write(fname, result)?,
        (None, _) => {
            if atty::is(atty::Stream::Stdout) && !args.to_stdout {
                eprintln!("Warning: It looks like you're running rletool in a terminal.");
                eprintln!("Warning: Printing raw binary output to your terminal can cause problems.");
                eprintln!("Warning: If you want to do it anyway, use `--to-stdout`, or consider `--output`.");
                bail!("aborting")
            }
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&result)?;
        }
    };

    Ok(())
}
