use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

use crate::error::ConvertError;

/// Suffix carried by every ground-truth container file name.
pub const GT_FILE_SUFFIX: &str = "_ObjectGT";

/// Class code marking a placeholder or corrupt object entry.
pub const SENTINEL_CLASS_CODE: i64 = 0;

// Ground-truth subsets shipped with the dataset, relative to its root
pub const DEFAULT_GT_DIRS: &[&str] = &["NIR/ObjectGT", "VIS_Onshore/ObjectGT", "VIS_Onboard/ObjectGT"];

/// The fixed object vocabulary of the Singapore Maritime Dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectClass {
    Ferry = 1,
    Buoy = 2,
    VesselShip = 3,
    SpeedBoat = 4,
    Boat = 5,
    Kayak = 6,
    SailBoat = 7,
    SwimmingPerson = 8,
    FlyingBirdPlane = 9,
    Other = 10,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 10] = [
        ObjectClass::Ferry,
        ObjectClass::Buoy,
        ObjectClass::VesselShip,
        ObjectClass::SpeedBoat,
        ObjectClass::Boat,
        ObjectClass::Kayak,
        ObjectClass::SailBoat,
        ObjectClass::SwimmingPerson,
        ObjectClass::FlyingBirdPlane,
        ObjectClass::Other,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::Ferry => "Ferry",
            ObjectClass::Buoy => "Buoy",
            ObjectClass::VesselShip => "Vessel/ship",
            ObjectClass::SpeedBoat => "Speed boat",
            ObjectClass::Boat => "Boat",
            ObjectClass::Kayak => "Kayak",
            ObjectClass::SailBoat => "Sail boat",
            ObjectClass::SwimmingPerson => "Swimming person",
            ObjectClass::FlyingBirdPlane => "Flying bird/plane",
            ObjectClass::Other => "Other",
        }
    }
}

impl TryFrom<i64> for ObjectClass {
    type Error = ConvertError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        ObjectClass::ALL
            .iter()
            .copied()
            .find(|class| class.code() == code)
            .ok_or(ConvertError::UnknownClassCode(code))
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Box in the dataset's native `[x_min, y_min, width, height]` layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, width: f64, height: f64) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    pub fn x_max(&self) -> f64 {
        self.x_min + self.width
    }

    pub fn y_max(&self) -> f64 {
        self.y_min + self.height
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(raw: [f64; 4]) -> Self {
        Self::new(raw[0], raw[1], raw[2], raw[3])
    }
}

/// How coordinates are rendered on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordMode {
    #[default]
    Real,
    /// Truncate toward zero.
    Integer,
}

impl CoordMode {
    pub fn apply(self, value: f64) -> Coord {
        match self {
            CoordMode::Real => Coord::Real(value),
            CoordMode::Integer => Coord::Int(value.trunc() as i64),
        }
    }
}

/// A single emitted coordinate or measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Real(f64),
    Int(i64),
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Real(value) => f.write_str(&format_real(*value)),
            Coord::Int(value) => write!(f, "{}", value),
        }
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render a real number the way the dataset tooling prints floats: whole
/// values keep a trailing `.0`.
pub fn format_real(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Raw ground truth of one video frame, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub video_id: String,
    pub frame_index: usize,
    pub image_name: String,
    pub bounding_boxes: Vec<[f64; 4]>,
    pub object_classes: Vec<i64>,
    pub motion_flags: Vec<f64>,
    pub distances: Vec<f64>,
}

impl FrameRecord {
    /// Number of objects the frame declares. An object array without
    /// content means no objects, whatever the other arrays hold.
    pub fn object_count(&self) -> usize {
        self.object_classes.len()
    }
}

/// One validated object of one frame, ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub image_name: String,
    pub bbox: BoundingBox,
    pub class_code: i64,
    pub motion: f64,
    pub distance: f64,
    pub coords: CoordMode,
}

impl ObjectEntry {
    pub fn object_class(&self) -> Result<ObjectClass, ConvertError> {
        ObjectClass::try_from(self.class_code)
    }

    pub fn class_name(&self) -> Result<&'static str, ConvertError> {
        self.object_class().map(ObjectClass::name)
    }

    pub fn x_min(&self) -> Coord {
        self.coords.apply(self.bbox.x_min)
    }

    pub fn y_min(&self) -> Coord {
        self.coords.apply(self.bbox.y_min)
    }

    pub fn width(&self) -> Coord {
        self.coords.apply(self.bbox.width)
    }

    pub fn height(&self) -> Coord {
        self.coords.apply(self.bbox.height)
    }

    // Corners are summed in real arithmetic before any truncation
    pub fn x_max(&self) -> Coord {
        self.coords.apply(self.bbox.x_max())
    }

    pub fn y_max(&self) -> Coord {
        self.coords.apply(self.bbox.y_max())
    }
}

/// Image dimensions written into every annotation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            depth: 3,
        }
    }
}

/// Output partition a frame is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Train,
    Test,
    All,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Train => f.write_str("train"),
            Bucket::Test => f.write_str("test"),
            Bucket::All => f.write_str("all"),
        }
    }
}

/// Externally supplied train/test image names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    pub train: HashSet<String>,
    pub test: HashSet<String>,
}

impl Membership {
    pub fn new<T, U>(train: T, test: U) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self {
            train: train.into_iter().map(Into::into).collect(),
            test: test.into_iter().map(Into::into).collect(),
        }
    }

    /// Train wins when a name appears in both sets.
    pub fn bucket_of(&self, image_name: &str) -> Option<Bucket> {
        if self.train.contains(image_name) {
            Some(Bucket::Train)
        } else if self.test.contains(image_name) {
            Some(Bucket::Test)
        } else {
            None
        }
    }
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub containers_loaded: usize,
    pub containers_failed: usize,
    pub frames_processed: usize,
    pub frames_inconsistent: usize,
    pub frames_unassigned: usize,
    pub objects_emitted: usize,
    pub objects_sentinel: usize,
    pub objects_unknown_class: usize,
    pub documents_written: usize,
    pub documents_skipped: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &ProcessingStats) {
        self.containers_loaded += other.containers_loaded;
        self.containers_failed += other.containers_failed;
        self.frames_processed += other.frames_processed;
        self.frames_inconsistent += other.frames_inconsistent;
        self.frames_unassigned += other.frames_unassigned;
        self.objects_emitted += other.objects_emitted;
        self.objects_sentinel += other.objects_sentinel;
        self.objects_unknown_class += other.objects_unknown_class;
        self.documents_written += other.documents_written;
        self.documents_skipped += other.documents_skipped;
    }

    pub fn objects_skipped(&self) -> usize {
        self.objects_sentinel + self.objects_unknown_class
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Containers loaded: {}", self.containers_loaded);
        log::info!("Frames processed: {}", self.frames_processed);
        log::info!("Objects emitted: {}", self.objects_emitted);
        log::info!("Annotation documents written: {}", self.documents_written);

        if self.frames_unassigned > 0 {
            log::info!(
                "Frames outside the train/test lists: {}",
                self.frames_unassigned
            );
        }
        if self.containers_failed > 0 {
            log::warn!("Containers skipped (malformed): {}", self.containers_failed);
        }
        if self.frames_inconsistent > 0 {
            log::warn!(
                "Frames skipped (inconsistent arrays): {}",
                self.frames_inconsistent
            );
        }
        if self.objects_skipped() > 0 {
            log::warn!(
                "Total skipped objects: {} (sentinel class: {}, unknown class: {})",
                self.objects_skipped(),
                self.objects_sentinel,
                self.objects_unknown_class
            );
        }
        if self.documents_skipped > 0 {
            log::warn!(
                "Annotation documents skipped (no valid path): {}",
                self.documents_skipped
            );
        }
    }
}
