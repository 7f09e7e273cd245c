//! Singapore Maritime Dataset ground truth to CSV and Pascal VOC converter
//!
//! This library reads the per-video `*_ObjectGT.mat` containers of the dataset,
//! rebuilds one record per video frame and emits flat rows and per-image VOC
//! XML annotations, optionally split into train and test sets.

pub mod config;
pub mod container;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod io;
pub mod mat;
pub mod types;
pub mod utils;
pub mod voc;

// Re-export commonly used types and functions
pub use config::{Args, ClassColumn, Mode, Schema};
pub use container::{locate, Container, ContainerSource, MatFileSource};
pub use conversion::{emit_row, normalize, Row};
pub use dataset::{convert_legacy, convert_split, run, DocumentTargets, OutputSet, RunOptions};
pub use error::{ConvertError, Result};
pub use frame::reconstruct;
pub use types::{
    Bucket, BoundingBox, CoordMode, FrameRecord, Membership, ObjectClass, ObjectEntry,
    ProcessingStats,
};
pub use voc::{emit_document, save_document, DocumentTarget, VocAnnotation};
