use crate::container::Container;
use crate::error::{ConvertError, Result};
use crate::mat::{NumericArray, StructArray};
use crate::types::FrameRecord;

/// Top-level variable holding the per-frame struct array.
pub const GT_VARIABLE: &str = "structXML";

pub const FIELD_BB: &str = "BB";
pub const FIELD_OBJECT: &str = "Object";
pub const FIELD_MOTION: &str = "Motion";
pub const FIELD_DISTANCE: &str = "Distance";

/// Image name of a frame: `<video_id>_frame<frame_index>.jpg`.
pub fn image_name(video_id: &str, frame_index: usize) -> String {
    format!("{}_frame{}.jpg", video_id, frame_index)
}

/// Rebuild one [`FrameRecord`] per frame of the container.
pub fn reconstruct(container: &Container) -> Result<Vec<FrameRecord>> {
    let frames = container
        .variable(GT_VARIABLE)
        .ok_or_else(|| {
            ConvertError::malformed(container.label(), format!("missing variable '{}'", GT_VARIABLE))
        })?
        .as_struct()
        .ok_or_else(|| {
            ConvertError::malformed(container.label(), format!("'{}' is not a struct array", GT_VARIABLE))
        })?;

    (0..frames.len())
        .map(|frame_index| read_frame(container, frames, frame_index))
        .collect()
}

fn read_frame(container: &Container, frames: &StructArray, frame_index: usize) -> Result<FrameRecord> {
    let numeric_field = |name: &str| -> Result<&NumericArray> {
        let value = frames.field(frame_index, name).ok_or_else(|| {
            ConvertError::malformed(
                container.label(),
                format!("frame {} has no '{}' field", frame_index, name),
            )
        })?;
        value.as_numeric().ok_or_else(|| {
            ConvertError::malformed(
                container.label(),
                format!("frame {} field '{}' is a {} array", frame_index, name, value.kind()),
            )
        })
    };

    let bb = numeric_field(FIELD_BB)?;
    let objects = numeric_field(FIELD_OBJECT)?;
    let motion = numeric_field(FIELD_MOTION)?;
    let distance = numeric_field(FIELD_DISTANCE)?;

    let mut record = FrameRecord {
        video_id: container.video_id.clone(),
        frame_index,
        image_name: image_name(&container.video_id, frame_index),
        bounding_boxes: Vec::new(),
        object_classes: Vec::new(),
        motion_flags: Vec::new(),
        distances: Vec::new(),
    };

    // An object array without content is an empty frame, whatever shape it reports
    if objects.is_empty() {
        return Ok(record);
    }

    record.bounding_boxes = box_rows(bb).ok_or_else(|| {
        ConvertError::malformed(
            container.label(),
            format!("frame {} has {:?} bounding boxes, expected Nx4", frame_index, bb.dims),
        )
    })?;
    record.object_classes = objects.data.iter().map(|code| code.trunc() as i64).collect();
    record.motion_flags = motion.data.clone();
    record.distances = distance.data.clone();
    Ok(record)
}

fn box_rows(bb: &NumericArray) -> Option<Vec<[f64; 4]>> {
    if bb.is_empty() {
        return Some(Vec::new());
    }
    if bb.dims.len() != 2 || bb.cols() != 4 {
        return None;
    }
    (0..bb.rows())
        .map(|row| {
            Some([
                bb.get(row, 0)?,
                bb.get(row, 1)?,
                bb.get(row, 2)?,
                bb.get(row, 3)?,
            ])
        })
        .collect()
}
