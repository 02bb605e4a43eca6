use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches};
use console::style;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use animgif_processor::cli::Args;
use animgif_processor::image_processing::batch::BatchProcessor;
use animgif_processor::image_processing::encode::{self, CountingWriter, LoopCount};
use animgif_processor::image_processing::report::{AnimationReport, AnimationSummary};
use animgif_processor::image_processing::{ProcessedBatch, ProcessingConfig, ProcessingEngine};
use animgif_processor::utils::{
    create_progress_bar, discover_inputs, error_println, format_bytes, format_duration,
    init_tracing, read_inputs, validate_inputs, verbose_println,
};
use animgif_processor::{JsonMessage, PipelineError};

fn loop_label(loop_count: LoopCount) -> String {
    match loop_count {
        LoopCount::Forever => "forever".to_string(),
        LoopCount::Finite(n) => format!("{} repetition(s)", n),
    }
}

fn print_configuration(args: &Args, config: &ProcessingConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Frame size: {}x{}", config.target_size, config.target_size);
    println!(
        "  Delay: {} ticks ({}ms)",
        config.delay,
        config.delay as u32 * 10
    );
    println!(
        "  Palette: {} ({} colors)",
        args.palette_label(),
        config.palette.len()
    );
    println!("  Crop mode: {:?}", config.crop_mode);
    println!("  Dithering: {:?}", config.dither);
    println!("  Filter: {:?}", config.filter);
    println!("  Loop: {}", loop_label(config.loop_count));
    println!("  Parallel jobs: {}", config.effective_jobs());
    println!("  Extensions: {:?}", args.parse_extensions());
    println!("  Output: {}", args.output.display());
    if args.dry_run {
        println!("  Dry run mode: enabled (the pipeline runs, no file is written)");
    }
    println!();
}

/// Report the failing input of a batch and turn the error into an anyhow one
fn report_batch_failure(err: PipelineError, image_files: &[PathBuf], json: bool) -> anyhow::Error {
    if let PipelineError::Batch { index, source } = &err {
        let path = image_files.get(*index);
        if json {
            JsonMessage::frame_failed(*index, path.map(PathBuf::as_path), source.to_string()).emit();
        } else {
            let name = path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| format!("#{}", index));
            error_println(&format!("{}: {}", name, source));
        }
    }
    anyhow::Error::new(err).context("Failed to build animation frames")
}

fn run(args: &Args, start_time: Instant) -> Result<()> {
    let json = args.json_progress;

    if !json {
        // Print banner
        println!("{}", style("Animated GIF Processor").bold().blue());
        println!("{}", style("Decode, resample, dither, animate").dim());
        println!();
    }

    validate_inputs(args)?;
    let config = args.processing_config().context("Invalid processing options")?;

    if args.verbose && !json {
        print_configuration(args, &config);
    }

    let image_files = discover_inputs(&args.input_paths, &args.parse_extensions(), args.verbose && !json)?;
    if image_files.is_empty() {
        return Err(anyhow::anyhow!("No images found with specified extensions"));
    }

    let inputs = read_inputs(&image_files)?;
    let total = inputs.len();
    let loop_count = config.loop_count;
    let palette_size = config.palette.len();

    let engine = ProcessingEngine::new(config)?;
    verbose_println(
        args.verbose && !json,
        &format!("Processing {} images on {} workers", total, engine.worker_count()),
    );

    let stats = BatchProcessor::new(total);
    let processed: ProcessedBatch = if json {
        engine
            .process_all_with_progress(&inputs, |done, total| {
                stats.increment();
                JsonMessage::progress(
                    done,
                    total,
                    format!("Processing images ({:.1}/s)", stats.items_per_second()),
                );
            })
            .map_err(|e| report_batch_failure(e, &image_files, true))?
    } else {
        let progress = create_progress_bar(total as u64);
        progress.set_message("Processing images");
        let result = engine.process_all_with_progress(&inputs, |_, _| {
            stats.increment();
            progress.inc(1);
            progress.set_message(format!("{:.1} images/s", stats.items_per_second()));
        });
        match result {
            Ok(processed) => {
                progress.finish_with_message("✓ Processing complete!");
                processed
            }
            Err(e) => {
                progress.abandon_with_message("✗ Processing failed");
                return Err(report_batch_failure(e, &image_files, false));
            }
        }
    };

    if json {
        for report in &processed.reports {
            JsonMessage::frame_completed(report).emit();
        }
    }

    // Encode; in dry-run mode the bytes are only counted
    let bytes_written = if args.dry_run {
        let mut counter = CountingWriter::new(io::sink());
        encode::encode(&processed.batch, &mut counter, loop_count)?;
        verbose_println(args.verbose && !json, "Dry run mode: skipping output file");
        counter.bytes_written()
    } else {
        encode::encode_to_path(&processed.batch, &args.output, loop_count)
            .with_context(|| format!("Failed to write animation: {}", args.output.display()))?
    };

    let total_time = start_time.elapsed();
    let output_path = (!args.dry_run).then_some(args.output.as_path());

    if json {
        JsonMessage::summary(
            total,
            processed.batch.len(),
            0,
            total_time.as_secs_f64(),
            output_path,
        );
        return Ok(());
    }

    println!();
    let header = if args.dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);
    println!("  Frames: {}", style(processed.batch.len()).bold().green());
    match output_path {
        Some(path) => println!(
            "  Output: {} ({})",
            style(path.display()).bold(),
            format_bytes(bytes_written)
        ),
        None => println!(
            "  Output: {} (would be {})",
            style("not written").yellow(),
            format_bytes(bytes_written)
        ),
    }
    println!(
        "  Processing time: {}",
        style(format_duration(processed.elapsed)).cyan()
    );
    println!("  Total time: {}", style(format_duration(total_time)).cyan());

    if args.report {
        let summary = AnimationSummary {
            output: output_path.map(|p| p.display().to_string()),
            palette: args.palette_label(),
            palette_size,
            loop_label: loop_label(loop_count),
            bytes_written: Some(bytes_written),
            total_time,
        };
        AnimationReport::new(&processed.reports, summary).print();
    }

    Ok(())
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let matches = Args::command().get_matches();
    let mut args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing(args.verbose, args.json_progress);

    let result = args
        .load_and_merge_config(&matches)
        .and_then(|()| run(&args, start_time));
    if let Err(e) = &result {
        if args.json_progress {
            JsonMessage::error(format!("{:#}", e));
        }
    }
    result
}
