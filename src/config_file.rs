use crate::cli::{Args, CropChoice, DitherChoice, FilterChoice, PaletteChoice};
use anyhow::{bail, Context, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Saved job file: some metadata plus the processing options
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub last_modified: Option<String>,
    pub config: AnimationConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationConfigJson {
    pub input_paths: Option<Vec<String>>,
    pub output_path: Option<String>,
    pub size: Option<u32>,
    pub delay: Option<u16>,
    pub palette: Option<String>,
    pub palette_colors: Option<String>,
    pub crop_mode: Option<String>,
    pub dither_method: Option<String>,
    pub filter: Option<String>,
    pub loop_count: Option<u16>,
    pub jobs: Option<usize>,
    pub extensions: Option<String>,
    pub report: Option<bool>,
    pub dry_run: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Case-insensitive lookup against a clap value enum's names
fn parse_choice<T: ValueEnum>(value: &str, option: &str) -> Result<T> {
    match T::from_str(value, true) {
        Ok(choice) => Ok(choice),
        Err(_) => bail!("Invalid {} '{}' in config file", option, value),
    }
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let config = ConfigFile::load(&config_path)?;
            self.merge_from_config(config.config, matches)?;

            if self.verbose && !self.json_progress {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    /// Apply values from `config` wherever the option was not given on the command line
    pub fn merge_from_config(&mut self, config: AnimationConfigJson, matches: &ArgMatches) -> Result<()> {
        let given = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);

        if !given("input_paths") {
            if let Some(inputs) = config.input_paths {
                self.input_paths = inputs.into_iter().map(PathBuf::from).collect();
            }
        }

        if !given("output") {
            if let Some(output) = config.output_path {
                self.output = PathBuf::from(output);
            }
        }

        if !given("size") {
            if let Some(size) = config.size {
                if size == 0 {
                    bail!("Size in config file must be greater than 0");
                }
                self.size = size;
            }
        }

        if !given("delay") {
            if let Some(delay) = config.delay {
                self.delay = delay;
            }
        }

        if !given("palette") {
            if let Some(palette) = config.palette {
                self.palette = parse_choice::<PaletteChoice>(&palette, "palette")?;
            }
        }

        if !given("palette_colors") {
            if let Some(colors) = config.palette_colors {
                self.palette_colors = Some(colors);
            }
        }

        if !given("crop_mode") {
            if let Some(mode) = config.crop_mode {
                self.crop_mode = parse_choice::<CropChoice>(&mode, "crop mode")?;
            }
        }

        if !given("dithering") {
            if let Some(method) = config.dither_method {
                self.dithering = match method.as_str() {
                    "floydSteinberg" => DitherChoice::FloydSteinberg,
                    other => parse_choice::<DitherChoice>(other, "dithering method")?,
                };
            }
        }

        if !given("filter") {
            if let Some(filter) = config.filter {
                self.filter = match filter.as_str() {
                    "catmullRom" => FilterChoice::CatmullRom,
                    other => parse_choice::<FilterChoice>(other, "filter")?,
                };
            }
        }

        if !given("loop_count") {
            if let Some(count) = config.loop_count {
                self.loop_count = count;
            }
        }

        if !given("jobs") {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        if !given("extensions_str") {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        if !given("report") {
            if let Some(report) = config.report {
                self.report = report;
            }
        }

        if !given("dry_run") {
            if let Some(dry_run) = config.dry_run {
                self.dry_run = dry_run;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DEFAULT_DELAY, DEFAULT_SIZE};
    use clap::{CommandFactory, FromArgMatches};
    use std::io::Write;

    fn parsed(cli: &[&str]) -> (Args, ArgMatches) {
        let matches = Args::command()
            .try_get_matches_from(cli.iter().copied())
            .unwrap();
        let args = Args::from_arg_matches(&matches).unwrap();
        (args, matches)
    }

    #[test]
    fn test_config_fills_defaults() {
        let (mut args, matches) = parsed(&["animgif-processor", "--config", "job.json"]);
        let config = AnimationConfigJson {
            input_paths: Some(vec!["a.png".into(), "b.png".into()]),
            output_path: Some("anim.gif".into()),
            size: Some(96),
            delay: Some(8),
            palette: Some("web216".into()),
            crop_mode: Some("center".into()),
            dither_method: Some("floydSteinberg".into()),
            filter: Some("lanczos3".into()),
            loop_count: Some(4),
            jobs: Some(2),
            report: Some(true),
            ..Default::default()
        };

        args.merge_from_config(config, &matches).unwrap();

        assert_eq!(args.input_paths, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(args.output, PathBuf::from("anim.gif"));
        assert_eq!(args.size, 96);
        assert_eq!(args.delay, 8);
        assert_eq!(args.palette, PaletteChoice::Web216);
        assert_eq!(args.crop_mode, CropChoice::Center);
        assert_eq!(args.dithering, DitherChoice::FloydSteinberg);
        assert_eq!(args.filter, FilterChoice::Lanczos3);
        assert_eq!(args.loop_count, 4);
        assert_eq!(args.jobs, 2);
        assert!(args.report);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_cli_values_take_precedence() {
        let (mut args, matches) =
            parsed(&["animgif-processor", "-i", "cli.png", "--palette=rgb8", "--config", "job.json"]);
        let config = AnimationConfigJson {
            input_paths: Some(vec!["config.png".into()]),
            palette: Some("bw".into()),
            ..Default::default()
        };

        args.merge_from_config(config, &matches).unwrap();

        assert_eq!(args.input_paths, vec![PathBuf::from("cli.png")]);
        assert_eq!(args.palette, PaletteChoice::Rgb8);
    }

    #[test]
    fn test_attached_values_equal_to_defaults_take_precedence() {
        let size = format!("-s{}", DEFAULT_SIZE);
        let delay = format!("-d{}", DEFAULT_DELAY);
        let (mut args, matches) = parsed(&[
            "animgif-processor",
            size.as_str(),
            delay.as_str(),
            "--loop=0",
            "--config",
            "job.json",
        ]);
        let config = AnimationConfigJson {
            size: Some(96),
            delay: Some(8),
            loop_count: Some(3),
            jobs: Some(2),
            ..Default::default()
        };

        args.merge_from_config(config, &matches).unwrap();

        assert_eq!(args.size, DEFAULT_SIZE);
        assert_eq!(args.delay, DEFAULT_DELAY);
        assert_eq!(args.loop_count, 0);
        assert_eq!(args.jobs, 2);
    }

    #[test]
    fn test_invalid_choice_is_reported() {
        let (mut args, matches) = parsed(&["animgif-processor", "--config", "job.json"]);
        let config = AnimationConfigJson {
            crop_mode: Some("diagonal".into()),
            ..Default::default()
        };
        let err = args.merge_from_config(config, &matches).unwrap_err();
        assert!(err.to_string().contains("crop mode"));
    }

    #[test]
    fn test_load_and_merge_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{
                "name": "burst",
                "lastModified": "2024-05-01T10:00:00Z",
                "config": {{ "delay": 20, "paletteColors": "#000000,#ffffff", "dryRun": true }}
            }}"##
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let (mut args, matches) = parsed(&["animgif-processor", "--config", path.as_str()]);
        args.load_and_merge_config(&matches).unwrap();

        assert_eq!(args.delay, 20);
        assert_eq!(args.palette_colors.as_deref(), Some("#000000,#ffffff"));
        assert!(args.dry_run);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let (mut args, matches) =
            parsed(&["animgif-processor", "--config", "/nonexistent/animgif-job.json"]);
        let err = args.load_and_merge_config(&matches).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(ConfigFile::load(file.path()).is_err());
    }
}
