use std::{
    fs::{read, write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::init;
use fontcast::{
    BrotliWoff2, ConvertOptions, Converter, FontFormat, Sfnt, Woff2Codec, detect_format,
    filename_suffix, read_as_sfnt, read_otf,
    woff2::{DEFAULT_BROTLI_QUALITY, DEFAULT_BROTLI_WINDOW},
};

#[derive(Parser)]
#[command(name = "fontcast", version)]
#[command(about = "Convert fonts between OpenType/TrueType, WOFF and WOFF2")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a font to another container format
    Convert {
        /// Input font file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Target format: otf, ttf, woff or woff2
        #[arg(long)]
        to: FontFormat,
        /// Output file (default: <input stem>.<suffix of the result>)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
        /// zlib level for WOFF tables (0-9)
        #[arg(long, default_value_t = fontcast::convert::DEFAULT_ZLIB_LEVEL)]
        zlib_level: u32,
        /// brotli quality for WOFF2 (0-11)
        #[arg(long, default_value_t = DEFAULT_BROTLI_QUALITY)]
        brotli_quality: u32,
    },
    /// Print the format and table directory of fonts
    Info {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
    },
}

impl Commands {
    fn run(self) -> Result<()> {
        match self {
            Commands::Convert {
                input,
                to,
                output,
                zlib_level,
                brotli_quality,
            } => {
                let converter = Converter::with_options(
                    BrotliWoff2::new(brotli_quality, DEFAULT_BROTLI_WINDOW),
                    ConvertOptions::new().with_zlib_level(zlib_level),
                );
                convert(&converter, &input, to, output)
            }
            Commands::Info { inputs } => {
                for input in &inputs {
                    info(input)?;
                }
                Ok(())
            }
        }
    }
}

fn read_font(path: &Path) -> Result<Vec<u8>> {
    read(path).with_context(|| format!("Failed to read font: {}", path.display()))
}

/// Where a converted font goes: `output` if given, else the input path with the suffix
/// of the converted data. Never the input itself.
fn output_path(input: &Path, output: Option<PathBuf>, converted: &[u8]) -> Result<PathBuf> {
    let output = match output {
        Some(output) => output,
        None => input.with_extension(filename_suffix(converted).unwrap_or("bin")),
    };
    if output == input {
        bail!("Refusing to overwrite the input file {}", output.display());
    }
    Ok(output)
}

fn convert(
    converter: &Converter<BrotliWoff2>,
    input: &Path,
    to: FontFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let data = read_font(input)?;
    let converted = converter
        .try_convert(&data, to)
        .with_context(|| format!("Failed to convert {} to {to}", input.display()))?;
    let output = output_path(input, output, &converted)?;

    write(&output, &converted)
        .with_context(|| format!("Failed to write font: {}", output.display()))?;
    log::info!(
        "{} ({} bytes) -> {} ({} bytes)",
        input.display(),
        data.len(),
        output.display(),
        converted.len()
    );
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let data = read_font(input)?;
    let format = detect_format(&data);
    println!("{}: {format}", input.display());

    let sfnt: Sfnt = match format {
        FontFormat::Sfnt | FontFormat::Woff => read_as_sfnt(&data)?,
        FontFormat::Woff2 => read_otf(&BrotliWoff2::default().uncompress(&data)?)?,
        FontFormat::Unsupported => return Ok(()),
    };
    println!("  version {:#010x}, {} tables", sfnt.version(), sfnt.num_tables());
    for (tag, table) in sfnt.tables() {
        println!("  {tag}  {:>10} bytes  checksum {:#010x}", table.len(), table.checksum());
    }
    Ok(())
}

fn main() -> Result<()> {
    init();
    Cli::parse().command.run()
}
