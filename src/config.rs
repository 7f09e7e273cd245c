use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::RunOptions;
use crate::error::{ConvertError, Result};
use crate::types::{CoordMode, ImageSize, DEFAULT_GT_DIRS};

/// Command-line arguments for converting SMD ground truth to CSV and VOC XML.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Root of the unzipped dataset holding the ground-truth folders
    #[arg(short = 'i', long = "input_dir", visible_alias = "inputDir")]
    pub input_dir: Option<PathBuf>,

    /// Directory where the CSV / text files are written
    #[arg(short = 'o', long = "output_dir", visible_alias = "outputDir")]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the `train` and `test` frame folders
    #[arg(short = 'f', long = "frames_dir", visible_alias = "framesDir")]
    pub frames_dir: Option<PathBuf>,

    /// Output mode: 'split' (train/test CSV + VOC XML) or 'legacy' (flat text per subset)
    #[arg(long = "mode", value_enum, default_value = "split")]
    pub mode: Mode,

    /// Truncate bounding box coordinates to integers
    #[arg(long = "integer_bb")]
    pub integer_bb: bool,

    /// Write the class code or the class name in the CSV 'class' column
    #[arg(long = "class_column", value_enum, default_value = "code")]
    pub class_column: ClassColumn,

    /// Ground-truth folders, relative to the input directory
    #[arg(long = "gt_dirs", value_delimiter = ',', default_values_t = default_gt_dirs())]
    pub gt_dirs: Vec<String>,

    /// Image width written into the VOC annotations
    #[arg(long = "image_width", default_value_t = 1920, value_parser = validate_dimension)]
    pub image_width: u32,

    /// Image height written into the VOC annotations
    #[arg(long = "image_height", default_value_t = 1080, value_parser = validate_dimension)]
    pub image_height: u32,

    /// Image depth written into the VOC annotations
    #[arg(long = "image_depth", default_value_t = 3, value_parser = validate_dimension)]
    pub image_depth: u32,
}

// Enumeration for the conversion mode
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum Mode {
    #[default]
    Split,
    Legacy,
}

/// Layout of the flat rows.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum Schema {
    Legacy,
    #[default]
    Detection,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum ClassColumn {
    #[default]
    Code,
    Name,
}

impl Mode {
    pub fn schema(self) -> Schema {
        match self {
            Mode::Split => Schema::Detection,
            Mode::Legacy => Schema::Legacy,
        }
    }
}

/// Input, output and frames directories after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub frames_dir: PathBuf,
}

impl ResolvedPaths {
    pub fn gt_dirs(&self, args: &Args) -> Vec<PathBuf> {
        args.gt_dirs.iter().map(|dir| self.input_dir.join(dir)).collect()
    }
}

impl Args {
    /// Apply the working-directory defaults and check every path exists.
    pub fn resolve_paths(&self) -> Result<ResolvedPaths> {
        let cwd = std::env::current_dir()?;
        let pick = |dir: &Option<PathBuf>| dir.clone().unwrap_or_else(|| cwd.clone());
        let paths = ResolvedPaths {
            input_dir: pick(&self.input_dir),
            output_dir: pick(&self.output_dir),
            frames_dir: pick(&self.frames_dir),
        };
        validate_directories(&[&paths.input_dir, &paths.output_dir, &paths.frames_dir])?;
        Ok(paths)
    }

    pub fn coords(&self) -> CoordMode {
        if self.integer_bb {
            CoordMode::Integer
        } else {
            CoordMode::Real
        }
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize {
            width: self.image_width,
            height: self.image_height,
            depth: self.image_depth,
        }
    }

    /// Pipeline options for this invocation, without document targets.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            schema: self.mode.schema(),
            coords: self.coords(),
            class_column: self.class_column,
            image_size: self.image_size(),
            ..RunOptions::default()
        }
    }
}

/// Fail with `NotFound` on the first path that is not an existing directory.
pub fn validate_directories(dirs: &[&Path]) -> Result<()> {
    match dirs.iter().find(|dir| !dir.is_dir()) {
        Some(missing) => Err(ConvertError::NotFound(missing.to_path_buf())),
        None => Ok(()),
    }
}

fn default_gt_dirs() -> Vec<String> {
    DEFAULT_GT_DIRS.iter().map(|dir| dir.to_string()).collect()
}

// Validate that an image dimension is a positive integer
fn validate_dimension(s: &str) -> std::result::Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("DIMENSION must be a positive integer".to_string()),
    }
}
