#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use smd2voc::frame::{FIELD_BB, FIELD_DISTANCE, FIELD_MOTION, FIELD_OBJECT, GT_VARIABLE};
use smd2voc::mat::{MatArray, NumericArray, StructArray};
use smd2voc::{Container, ContainerSource, ConvertError};

/// Per-frame ground truth used to build test containers.
#[derive(Debug, Clone, Default)]
pub struct FrameFixture {
    pub boxes: Vec<[f64; 4]>,
    pub objects: Vec<f64>,
    pub motion: Vec<f64>,
    pub distance: Vec<f64>,
}

impl FrameFixture {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Frame whose objects all share motion 1 and distance 100.
    pub fn with_objects(boxes: &[[f64; 4]], objects: &[f64]) -> Self {
        Self {
            boxes: boxes.to_vec(),
            objects: objects.to_vec(),
            motion: vec![1.0; objects.len()],
            distance: vec![100.0; objects.len()],
        }
    }

    fn fields(&self) -> Vec<MatArray> {
        let column = |values: &[f64]| {
            if values.is_empty() {
                MatArray::Numeric(NumericArray::empty())
            } else {
                MatArray::Numeric(NumericArray::column(values))
            }
        };
        let boxes = if self.boxes.is_empty() {
            NumericArray::empty()
        } else {
            NumericArray::from_rows(&self.boxes)
        };
        vec![
            MatArray::Numeric(boxes),
            column(&self.objects),
            column(&self.motion),
            column(&self.distance),
        ]
    }
}

pub fn gt_struct(frames: &[FrameFixture]) -> MatArray {
    MatArray::Struct(StructArray {
        dims: vec![1, frames.len()],
        field_names: [FIELD_BB, FIELD_OBJECT, FIELD_MOTION, FIELD_DISTANCE]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        elements: frames.iter().map(FrameFixture::fields).collect(),
    })
}

pub fn container(video_id: &str, frames: &[FrameFixture]) -> Container {
    let mut variables = HashMap::new();
    variables.insert(GT_VARIABLE.to_string(), gt_struct(frames));
    Container::new(
        video_id,
        format!("{}_ObjectGT.mat", video_id),
        variables,
    )
}

/// Serves containers from memory, keyed by video id. Unknown ids load as
/// malformed containers.
#[derive(Debug, Default)]
pub struct MemorySource {
    containers: HashMap<String, Container>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, container: Container) -> Self {
        self.containers.insert(container.video_id.clone(), container);
        self
    }
}

impl ContainerSource for MemorySource {
    fn load(&self, video_id: &str, path: &Path) -> smd2voc::Result<Container> {
        match self.containers.get(video_id) {
            Some(container) => {
                let mut container = container.clone();
                container.path = path.to_path_buf();
                Ok(container)
            }
            None => Err(ConvertError::MalformedContainer {
                container: path.display().to_string(),
                reason: "not a level 5 MAT-file".to_string(),
            }),
        }
    }
}

/// Create an empty container file for each video id inside `dir`.
pub fn touch_containers(dir: &Path, video_ids: &[&str]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    video_ids
        .iter()
        .map(|video_id| {
            let path = dir.join(format!("{}_ObjectGT.mat", video_id));
            File::create(&path).unwrap();
            path
        })
        .collect()
}

/// Create empty image files named after frames inside `dir`.
pub fn touch_frames(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        File::create(dir.join(name)).unwrap();
    }
}
