//! Per-frame report printed with `--report`
//!
//! One row per output frame in sequence order, followed by a short summary
//! of the animation settings.
use prettytable::{format, Cell, Row, Table};
use std::path::Path;
use std::time::Duration;

use super::FrameReport;

/// Settings shown under the frame table
#[derive(Debug, Clone)]
pub struct AnimationSummary {
    pub output: Option<String>,
    pub palette: String,
    pub palette_size: usize,
    pub loop_label: String,
    pub bytes_written: Option<u64>,
    pub total_time: Duration,
}

#[derive(Debug)]
pub struct AnimationReport<'a> {
    pub frames: &'a [FrameReport],
    pub summary: AnimationSummary,
}

impl<'a> AnimationReport<'a> {
    pub fn new(frames: &'a [FrameReport], summary: AnimationSummary) -> Self {
        Self { frames, summary }
    }

    /// Frame table, header row included
    pub fn frame_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);

        table.add_row(Row::new(vec![
            Cell::new("#"),
            Cell::new("Source"),
            Cell::new("Format"),
            Cell::new("Original"),
            Cell::new("Frame"),
            Cell::new("Delay"),
            Cell::new("Time"),
        ]));

        for frame in self.frames {
            table.add_row(Row::new(vec![
                Cell::new(&frame.index.to_string()),
                Cell::new(&source_name(frame.origin.as_deref())),
                Cell::new(&frame.source_format.to_string()),
                Cell::new(&format!("{}x{}", frame.source_dimensions.0, frame.source_dimensions.1)),
                Cell::new(&format!("{}x{}", frame.output_dimensions.0, frame.output_dimensions.1)),
                Cell::new(&format!("{} ({}ms)", frame.delay, frame.delay as u32 * 10)),
                Cell::new(&format!("{}ms", frame.elapsed.as_millis())),
            ]));
        }

        table
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);

        let s = &self.summary;
        table.add_row(Row::new(vec![
            Cell::new("Output"),
            Cell::new(s.output.as_deref().unwrap_or("(dry run, not written)")),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Palette"),
            Cell::new(&format!("{} ({} colors)", s.palette, s.palette_size)),
        ]));
        table.add_row(Row::new(vec![Cell::new("Loop"), Cell::new(&s.loop_label)]));
        if let Some(bytes) = s.bytes_written {
            table.add_row(Row::new(vec![
                Cell::new("Size"),
                Cell::new(&crate::utils::format_bytes(bytes)),
            ]));
        }
        table.add_row(Row::new(vec![
            Cell::new("Total time"),
            Cell::new(&crate::utils::format_duration(s.total_time)),
        ]));

        table
    }

    /// Print the complete report
    pub fn print(&self) {
        println!();
        println!("FRAMES ({} total)\n", self.frames.len());
        self.frame_table().printstd();
        println!();
        self.summary_table().printstd();
        println!();
    }
}

fn source_name(origin: Option<&Path>) -> String {
    origin
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "-".to_string())
}
