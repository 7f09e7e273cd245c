use serde::Serialize;
use std::fmt;

use crate::config::{ClassColumn, Schema};
use crate::error::{ConvertError, Result};
use crate::types::{Coord, CoordMode, FrameRecord, ObjectEntry, SENTINEL_CLASS_CODE};

/// Header of the detection table.
pub const DETECTION_HEADER: [&str; 8] = [
    "filename", "width", "height", "class", "xmin", "ymin", "xmax", "ymax",
];

/// Filter a frame's raw arrays into object entries.
///
/// Entries with the sentinel class code are dropped; the rest keep their
/// input order. Arrays of unequal length are rejected rather than truncated.
pub fn normalize(record: &FrameRecord, coords: CoordMode) -> Result<Vec<ObjectEntry>> {
    let count = record.object_count();
    if count == 0 {
        return Ok(Vec::new());
    }

    let lengths = [
        ("BB", record.bounding_boxes.len()),
        ("Motion", record.motion_flags.len()),
        ("Distance", record.distances.len()),
    ];
    if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != count) {
        return Err(ConvertError::InconsistentRecord {
            image_name: record.image_name.clone(),
            reason: format!("{} objects but {} {} entries", count, len, field),
        });
    }

    Ok((0..count)
        .filter(|&i| record.object_classes[i] != SENTINEL_CLASS_CODE)
        .map(|i| ObjectEntry {
            image_name: record.image_name.clone(),
            bbox: record.bounding_boxes[i].into(),
            class_code: record.object_classes[i],
            motion: record.motion_flags[i],
            distance: record.distances[i],
            coords,
        })
        .collect())
}

/// Class column value of a detection row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Code(i64),
    Name(&'static str),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Code(code) => write!(f, "{}", code),
            ClassLabel::Name(name) => f.write_str(name),
        }
    }
}

/// `image_name, x_min, y_min, width, height, class, distance, motion`
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRow {
    pub image_name: String,
    pub x_min: Coord,
    pub y_min: Coord,
    pub width: Coord,
    pub height: Coord,
    pub class_code: i64,
    pub distance: Coord,
    pub motion: Coord,
}

impl LegacyRow {
    /// Comma-joined line without quoting.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.image_name,
            self.x_min,
            self.y_min,
            self.width,
            self.height,
            self.class_code,
            self.distance,
            self.motion
        )
    }
}

/// One row of the detection table, with corners in absolute pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRow {
    pub filename: String,
    pub width: Coord,
    pub height: Coord,
    pub class: ClassLabel,
    pub xmin: Coord,
    pub ymin: Coord,
    pub xmax: Coord,
    pub ymax: Coord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Legacy(LegacyRow),
    Detection(DetectionRow),
}

impl Row {
    pub fn image_name(&self) -> &str {
        match self {
            Row::Legacy(row) => &row.image_name,
            Row::Detection(row) => &row.filename,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Row::Legacy(row) => row.to_line(),
            Row::Detection(row) => format!(
                "{},{},{},{},{},{},{},{}",
                row.filename, row.width, row.height, row.class, row.xmin, row.ymin, row.xmax, row.ymax
            ),
        }
    }
}

/// Convert an entry to a flat row of the requested schema.
pub fn emit_row(entry: &ObjectEntry, schema: Schema, class_column: ClassColumn) -> Result<Row> {
    match schema {
        Schema::Legacy => Ok(Row::Legacy(LegacyRow {
            image_name: entry.image_name.clone(),
            x_min: entry.x_min(),
            y_min: entry.y_min(),
            width: entry.width(),
            height: entry.height(),
            class_code: entry.class_code,
            distance: Coord::Real(entry.distance),
            motion: Coord::Real(entry.motion),
        })),
        Schema::Detection => {
            let class = match class_column {
                ClassColumn::Code => ClassLabel::Code(entry.class_code),
                ClassColumn::Name => ClassLabel::Name(entry.class_name()?),
            };
            Ok(Row::Detection(DetectionRow {
                filename: entry.image_name.clone(),
                width: entry.width(),
                height: entry.height(),
                class,
                xmin: entry.x_min(),
                ymin: entry.y_min(),
                xmax: entry.x_max(),
                ymax: entry.y_max(),
            }))
        }
    }
}
