use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::conversion::{Row, DETECTION_HEADER};
use crate::error::{ConvertError, Result};
use crate::types::Membership;
use crate::utils::ensure_directory;
use crate::voc::DocumentTarget;

pub const TRAIN_DIR: &str = "train";
pub const TEST_DIR: &str = "test";
pub const TRAIN_ANNOTATIONS_DIR: &str = "train_annotations";
pub const TEST_ANNOTATIONS_DIR: &str = "test_annotations";
pub const TRAIN_LABELS_FILE: &str = "train_labels.csv";
pub const TEST_LABELS_FILE: &str = "test_labels.csv";

/// Names of the regular files directly inside `dir`.
pub fn list_file_names(dir: &Path) -> Result<HashSet<String>> {
    if !dir.is_dir() {
        return Err(ConvertError::NotFound(dir.to_path_buf()));
    }
    let mut names = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Train/test membership from the frames extracted into `<frames_dir>/train`
/// and `<frames_dir>/test`.
pub fn read_membership(frames_dir: &Path) -> Result<Membership> {
    let train = list_file_names(&frames_dir.join(TRAIN_DIR))?;
    let test = list_file_names(&frames_dir.join(TEST_DIR))?;
    log::info!(
        "Found {} train frames and {} test frames.",
        train.len(),
        test.len()
    );
    Ok(Membership { train, test })
}

/// Document targets of the split layout, creating the annotation
/// directories when they are missing.
pub fn setup_annotation_directories(frames_dir: &Path) -> Result<(DocumentTarget, DocumentTarget)> {
    let train = DocumentTarget::new(
        frames_dir.join(TRAIN_DIR),
        ensure_directory(&frames_dir.join(TRAIN_ANNOTATIONS_DIR))?,
    );
    let test = DocumentTarget::new(
        frames_dir.join(TEST_DIR),
        ensure_directory(&frames_dir.join(TEST_ANNOTATIONS_DIR))?,
    );
    Ok((train, test))
}

/// Output file of the flat rows for one ground-truth folder, e.g.
/// `VIS_Onshore/ObjectGT` -> `objects_onshore.txt`.
pub fn legacy_output_name(gt_dir: &str) -> String {
    let subset = Path::new(gt_dir)
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let subset = subset.strip_prefix("vis_").unwrap_or(&subset);
    format!("objects_{}.txt", sanitize_filename::sanitize(subset))
}

/// One comma-joined row per line, no header.
pub fn write_rows_as_lines(path: &Path, rows: &[Row]) -> Result<PathBuf> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        writeln!(writer, "{}", row.to_line())?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

/// Detection rows as CSV with the `filename,width,...,ymax` header.
pub fn write_detection_csv(path: &Path, rows: &[Row]) -> Result<PathBuf> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(DETECTION_HEADER)?;
    for row in rows {
        match row {
            Row::Detection(detection) => writer.serialize(detection)?,
            Row::Legacy(_) => log::warn!(
                "Skipping legacy row of {} in {}",
                row.image_name(),
                path.display()
            ),
        }
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}
