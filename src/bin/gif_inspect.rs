use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use image::{ImageFormat, Rgb, RgbImage};
use prettytable::{format, Cell, Row, Table};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use animgif_processor::image_processing::encode::{decode_sequence, DecodedFrame, DecodedSequence};
use animgif_processor::{LoopCount, Palette};

#[derive(Parser)]
#[command(
    name = "gif-inspect",
    about = "Show the structure of an animated GIF",
    long_about = "Read an animated GIF at the palette-index level and print its logical screen,\nglobal color table, loop setting and per-frame delays.\n\nWith --dump, every frame is expanded through the global palette and written as\nframe_NNN.png into the given directory."
)]
struct Args {
    /// Input .gif file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Write every frame as PNG into this directory
    #[arg(long, value_name = "DIR")]
    dump: Option<PathBuf>,

    /// Also list the global color table
    #[arg(long)]
    palette: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn frame_table(sequence: &DecodedSequence) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(Row::new(vec![
        Cell::new("#"),
        Cell::new("Size"),
        Cell::new("Delay"),
        Cell::new("Colors used"),
    ]));

    for (i, frame) in sequence.frames.iter().enumerate() {
        let used: HashSet<u8> = frame.indices.iter().copied().collect();
        table.add_row(Row::new(vec![
            Cell::new(&i.to_string()),
            Cell::new(&format!("{}x{}", frame.width, frame.height)),
            Cell::new(&format!("{} ({}ms)", frame.delay, frame.delay as u32 * 10)),
            Cell::new(&used.len().to_string()),
        ]));
    }
    table
}

fn palette_table(palette: &Palette) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(Row::new(vec![Cell::new("Index"), Cell::new("Color")]));

    for (i, Rgb([r, g, b])) in palette.colors().iter().enumerate() {
        table.add_row(Row::new(vec![
            Cell::new(&i.to_string()),
            Cell::new(&format!("#{:02x}{:02x}{:02x}", r, g, b)),
        ]));
    }
    table
}

fn expand_frame(frame: &DecodedFrame, palette: &Palette) -> RgbImage {
    let width = frame.width as u32;
    RgbImage::from_fn(width, frame.height as u32, |x, y| {
        let index = frame.indices[(y * width + x) as usize];
        palette.get(index).unwrap_or(Rgb([0, 0, 0]))
    })
}

fn dump_frames(sequence: &DecodedSequence, dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let palette = sequence.full_palette()?;

    for (i, frame) in sequence.frames.iter().enumerate() {
        let path = dir.join(format!("frame_{:03}.png", i));
        expand_frame(frame, &palette)
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        if verbose {
            println!("{} {}", style("[VERBOSE]").dim(), path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let sequence = decode_sequence(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    println!("{}", style(args.input.display()).bold().blue());
    println!("  Logical screen: {}x{}", sequence.width, sequence.height);
    println!("  Global color table: {} entries", sequence.color_table.len() / 3);
    println!(
        "  Loop: {}",
        match sequence.loop_count {
            LoopCount::Forever => "forever".to_string(),
            LoopCount::Finite(n) => format!("{} repetition(s)", n),
        }
    );
    let total_ticks: u32 = sequence.frames.iter().map(|f| f.delay as u32).sum();
    println!(
        "  Frames: {} ({}ms per cycle)",
        sequence.frames.len(),
        total_ticks * 10
    );
    println!();

    frame_table(&sequence).printstd();

    if args.palette {
        println!();
        palette_table(&sequence.full_palette()?).printstd();
    }

    if let Some(dir) = &args.dump {
        dump_frames(&sequence, dir, args.verbose)?;
        println!();
        println!(
            "{} {} frames written to {}",
            style("✓").green().bold(),
            sequence.frames.len(),
            dir.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_frame_uses_palette() {
        let palette = Palette::black_white();
        let frame = DecodedFrame {
            width: 2,
            height: 1,
            delay: 5,
            indices: vec![0, 1],
        };
        let img = expand_frame(&frame, &palette);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_tables_have_header_plus_rows() {
        let sequence = DecodedSequence {
            width: 1,
            height: 1,
            color_table: vec![0, 0, 0, 255, 255, 255],
            loop_count: LoopCount::Forever,
            frames: vec![
                DecodedFrame { width: 1, height: 1, delay: 3, indices: vec![0] },
                DecodedFrame { width: 1, height: 1, delay: 3, indices: vec![1] },
            ],
        };
        assert_eq!(frame_table(&sequence).len(), 3);
        assert_eq!(palette_table(&sequence.full_palette().unwrap()).len(), 3);
    }
}
