//! hdr - Inspect and convert Radiance RGBE images
//!
//! A command-line tool for converting images to/from the `.hdr` format.

mod logger;

use clap::{Parser, Subcommand};
use icy_hdr::{hdr_decode, hdr_encode, rle_allowed, EncodeOptions, HdrImage};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "hdr")]
#[command(author = "Mike Krüger <mkrueger@posteo.de>")]
#[command(version)]
#[command(about = "Inspect and convert Radiance RGBE (.hdr) images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header of an RGBE file
    Info {
        /// Input RGBE file (use - for stdin)
        input: PathBuf,
    },

    /// Convert an RGBE file to an 8-bit PNG
    ToPng {
        /// Input RGBE file (use - for stdin)
        input: PathBuf,

        /// Output PNG file (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exposure adjustment in stops, applied before clamping to [0, 1]
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        exposure: f32,
    },

    /// Convert an image (PNG, JPEG, GIF, WebP) to RGBE
    FromImage {
        /// Input image file
        input: PathBuf,

        /// Output RGBE file (default: input with .hdr extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write flat pixels instead of run-length encoded scanlines
        #[arg(long)]
        flat: bool,
    },

    /// Decode and re-encode an RGBE file, keeping its header fields
    Recompress {
        /// Input RGBE file (use - for stdin)
        input: PathBuf,

        /// Output RGBE file (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Write flat pixels instead of run-length encoded scanlines
        #[arg(long)]
        flat: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let image = read_hdr(&input)?;
            let storage = if rle_allowed(image.width) {
                "run-length encoded scanlines"
            } else {
                "flat pixels"
            };

            println!("program:  {}", image.program_type);
            println!("size:     {}x{}", image.width, image.height);
            println!("storage:  {storage}");
            println!("exposure: {}", image.exposure());
            for line in &image.metadata {
                println!("header:   {line}");
            }
        }

        Commands::ToPng {
            input,
            output,
            exposure,
        } => {
            let image = read_hdr(&input)?;
            let output_path = output.unwrap_or_else(|| input.with_extension("png"));

            let rgb = tone_map(&image.pixels, exposure);
            let png = image::RgbImage::from_raw(image.width as u32, image.height as u32, rgb)
                .ok_or("Failed to create image from decoded data")?;
            png.save(&output_path)?;

            info!(
                "Decoded: {}x{} pixels -> '{}'",
                image.width,
                image.height,
                output_path.display()
            );
        }

        Commands::FromImage {
            input,
            output,
            flat,
        } => {
            let img = image::open(&input)
                .map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
            let rgb = img.to_rgb32f();
            let (width, height) = rgb.dimensions();
            let pixels: Vec<[f32; 3]> = rgb.pixels().map(|p| p.0).collect();

            let output_path = output.unwrap_or_else(|| input.with_extension("hdr"));
            let opts = EncodeOptions {
                use_rle: !flat,
                ..Default::default()
            };

            info!(
                "Encoding '{}' ({}x{}) to '{}'",
                input.display(),
                width,
                height,
                output_path.display()
            );
            let file = File::create(&output_path)?;
            hdr_encode(file, width as usize, height as usize, &pixels, &opts)?;
        }

        Commands::Recompress {
            input,
            output,
            flat,
        } => {
            let image = read_hdr(&input)?;
            let opts = EncodeOptions {
                use_rle: !flat,
                program_type: writable_program_type(&image.program_type),
                metadata: image.metadata.clone(),
            };

            if is_stdio(&output) {
                let stdout = io::stdout().lock();
                hdr_encode(stdout, image.width, image.height, &image.pixels, &opts)?;
            } else {
                let file = File::create(&output)?;
                hdr_encode(file, image.width, image.height, &image.pixels, &opts)?;
                info!(
                    "Recompressed {}x{} pixels -> '{}'",
                    image.width,
                    image.height,
                    output.display()
                );
            }
            io::stdout().flush()?;
        }
    }

    Ok(())
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_hdr(input: &Path) -> Result<HdrImage, Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = if is_stdio(input) {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(input)
            .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
        Box::new(BufReader::new(file))
    };

    let image = hdr_decode(reader)?;
    info!(
        "Read {}x{} RGBE image from '{}'",
        image.width,
        image.height,
        input.display()
    );
    Ok(image)
}

/// Join whitespace separated words with `_`; the header can't carry spaces
/// in the program type.
fn writable_program_type(program_type: &str) -> String {
    program_type.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Scale by `2^stops`, clamp to `[0, 1]` and quantize to 8 bits per channel.
fn tone_map(pixels: &[[f32; 3]], stops: f32) -> Vec<u8> {
    let scale = stops.exp2();
    pixels
        .iter()
        .flatten()
        .map(|&c| ((c * scale).clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
        .collect()
}
