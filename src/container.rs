use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::mat::{read_mat_file, MatArray};
use crate::types::GT_FILE_SUFFIX;

/// The ground-truth container for one video, as loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub video_id: String,
    pub path: PathBuf,
    pub variables: HashMap<String, MatArray>,
}

impl Container {
    pub fn new(
        video_id: impl Into<String>,
        path: impl Into<PathBuf>,
        variables: HashMap<String, MatArray>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            path: path.into(),
            variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&MatArray> {
        self.variables.get(name)
    }

    /// Name used for this container in diagnostics.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }
}

/// Loads a container by path.
pub trait ContainerSource: Send + Sync {
    fn load(&self, video_id: &str, path: &Path) -> Result<Container>;
}

/// Reads `.mat` ground-truth files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatFileSource;

impl ContainerSource for MatFileSource {
    fn load(&self, video_id: &str, path: &Path) -> Result<Container> {
        read_mat_file(path)
            .map(|variables| Container::new(video_id, path, variables))
            .map_err(|e| ConvertError::malformed(path.display().to_string(), e.to_string()))
    }
}

/// Derive the video identifier from a container file name.
///
/// Grammar: `<video_id>_ObjectGT.<ext>`. Everything after the first `.` is
/// dropped, then the `_ObjectGT` suffix if present. Returns `None` when
/// nothing is left (dot-files).
pub fn video_id_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.split('.').next().unwrap_or_default();
    let video_id = stem.strip_suffix(GT_FILE_SUFFIX).unwrap_or(stem);
    if video_id.is_empty() {
        None
    } else {
        Some(video_id.to_string())
    }
}

/// Map every container in `dir` to its video identifier.
///
/// Only regular files are considered; if two files map to the same
/// identifier the one enumerated last wins.
pub fn locate(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvertError::NotFound(dir.to_path_buf()));
    }

    let mut containers = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            debug!("Skipping non-file entry {}", path.display());
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            warn!("Skipping container with a non UTF-8 name: {:?}", path);
            continue;
        };
        match video_id_from_file_name(file_name) {
            Some(video_id) => {
                if let Some(previous) = containers.insert(video_id.clone(), path.clone()) {
                    debug!(
                        "{} replaces {} for video {}",
                        path.display(),
                        previous.display(),
                        video_id
                    );
                }
            }
            None => warn!("Cannot derive a video id from {}", path.display()),
        }
    }
    Ok(containers)
}
