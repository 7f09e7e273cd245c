use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{Args, ClassColumn, ResolvedPaths, Schema};
use crate::container::{locate, ContainerSource};
use crate::conversion::{emit_row, normalize, Row};
use crate::error::{ConvertError, Result};
use crate::frame::reconstruct;
use crate::io::{
    legacy_output_name, read_membership, setup_annotation_directories, write_detection_csv,
    write_rows_as_lines, TEST_LABELS_FILE, TRAIN_LABELS_FILE,
};
use crate::types::{Bucket, CoordMode, FrameRecord, ImageSize, Membership, ProcessingStats};
use crate::utils::create_progress_bar;
use crate::voc::{emit_document, save_document, DocumentTarget};

/// Where each bucket's annotation documents go; `None` disables them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTargets {
    pub train: Option<DocumentTarget>,
    pub test: Option<DocumentTarget>,
    pub all: Option<DocumentTarget>,
}

impl DocumentTargets {
    pub fn get(&self, bucket: Bucket) -> Option<&DocumentTarget> {
        match bucket {
            Bucket::Train => self.train.as_ref(),
            Bucket::Test => self.test.as_ref(),
            Bucket::All => self.all.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub schema: Schema,
    pub coords: CoordMode,
    pub class_column: ClassColumn,
    pub image_size: ImageSize,
    pub targets: DocumentTargets,
}

/// Rows per bucket plus the counters of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSet {
    pub buckets: BTreeMap<Bucket, Vec<Row>>,
    /// Objects dropped per bucket (sentinel or unknown class).
    pub skipped: BTreeMap<Bucket, usize>,
    pub stats: ProcessingStats,
}

impl OutputSet {
    pub fn rows(&self, bucket: Bucket) -> &[Row] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_objects(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn skipped(&self, bucket: Bucket) -> usize {
        self.skipped.get(&bucket).copied().unwrap_or(0)
    }

    pub fn print_bucket_summary(&self) {
        for (bucket, rows) in &self.buckets {
            log::info!(
                "[{}] objects written: {}, objects skipped: {}",
                bucket,
                rows.len(),
                self.skipped(*bucket)
            );
        }
    }

    fn merge(&mut self, other: OutputSet) {
        for (bucket, rows) in other.buckets {
            self.buckets.entry(bucket).or_default().extend(rows);
        }
        for (bucket, skipped) in other.skipped {
            *self.skipped.entry(bucket).or_default() += skipped;
        }
        self.stats.merge(&other.stats);
    }
}

/// Convert every container found in `container_dirs`.
///
/// With `membership`, frames are routed to the train or test bucket and
/// frames in neither set are dropped; without it everything lands in
/// [`Bucket::All`]. A missing directory aborts the run, while a malformed
/// container, an inconsistent frame or an unknown class only skips the
/// affected part.
pub fn run(
    container_dirs: &[PathBuf],
    membership: Option<&Membership>,
    options: &RunOptions,
    source: &dyn ContainerSource,
) -> Result<OutputSet> {
    let mut containers = Vec::new();
    for dir in container_dirs {
        let located = locate(dir)?;
        info!("Found {} containers in {}.", located.len(), dir.display());
        containers.extend(located);
    }

    let pb = create_progress_bar(containers.len() as u64, "Containers");
    let results: Vec<Result<OutputSet>> = containers
        .par_iter()
        .map(|(video_id, path)| {
            let result = process_container(video_id, path, membership, options, source);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("Container processing complete");

    // Merge in discovery order so repeated runs give identical rows
    let mut output = OutputSet::default();
    for result in results {
        output.merge(result?);
    }
    Ok(output)
}

fn process_container(
    video_id: &str,
    path: &Path,
    membership: Option<&Membership>,
    options: &RunOptions,
    source: &dyn ContainerSource,
) -> Result<OutputSet> {
    let mut output = OutputSet::default();
    let frames = match source.load(video_id, path).and_then(|container| reconstruct(&container)) {
        Ok(frames) => frames,
        Err(e @ ConvertError::MalformedContainer { .. }) => {
            error!("Skipping container: {}", e);
            output.stats.containers_failed += 1;
            return Ok(output);
        }
        Err(e) => return Err(e),
    };
    output.stats.containers_loaded += 1;

    for frame in &frames {
        process_frame(frame, membership, options, &mut output)?;
    }
    Ok(output)
}

fn process_frame(
    frame: &FrameRecord,
    membership: Option<&Membership>,
    options: &RunOptions,
    output: &mut OutputSet,
) -> Result<()> {
    let bucket = match membership {
        Some(membership) => match membership.bucket_of(&frame.image_name) {
            Some(bucket) => bucket,
            None => {
                output.stats.frames_unassigned += 1;
                return Ok(());
            }
        },
        None => Bucket::All,
    };

    let entries = match normalize(frame, options.coords) {
        Ok(entries) => entries,
        Err(e @ ConvertError::InconsistentRecord { .. }) => {
            warn!("Skipping frame: {}", e);
            output.stats.frames_inconsistent += 1;
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let sentinel = frame.object_count() - entries.len();
    output.stats.frames_processed += 1;
    output.stats.objects_sentinel += sentinel;

    let unknown_before = output.stats.objects_unknown_class;
    let stats = &mut output.stats;
    let entries: Vec<_> = entries
        .into_iter()
        .filter(|entry| match entry.object_class() {
            Ok(_) => true,
            Err(e) => {
                warn!("Dropping object of {}: {}", entry.image_name, e);
                stats.objects_unknown_class += 1;
                false
            }
        })
        .collect();

    let unknown = output.stats.objects_unknown_class - unknown_before;
    *output.skipped.entry(bucket).or_default() += sentinel + unknown;

    let rows = output.buckets.entry(bucket).or_default();
    for entry in &entries {
        rows.push(emit_row(entry, options.schema, options.class_column)?);
    }
    output.stats.objects_emitted += entries.len();

    if let Some(target) = options.targets.get(bucket) {
        let document = emit_document(
            &frame.image_name,
            &entries,
            options.image_size,
            &target.image_dir,
        )?;
        match save_document(&document, target)? {
            Some(_) => output.stats.documents_written += 1,
            None => output.stats.documents_skipped += 1,
        }
    }
    Ok(())
}

/// Train/test conversion: CSV tables in the output directory and one VOC
/// document per frame next to the frame folders.
pub fn convert_split(args: &Args, paths: &ResolvedPaths, source: &dyn ContainerSource) -> Result<OutputSet> {
    let membership = read_membership(&paths.frames_dir)?;
    let (train_target, test_target) = setup_annotation_directories(&paths.frames_dir)?;

    let mut options = args.run_options();
    options.targets = DocumentTargets {
        train: Some(train_target),
        test: Some(test_target),
        all: None,
    };

    let output = run(&paths.gt_dirs(args), Some(&membership), &options, source)?;

    let train_rows = output.rows(Bucket::Train);
    let test_rows = output.rows(Bucket::Test);
    info!("Total objects in train dataset: {}", train_rows.len());
    info!("Total objects in test dataset: {}", test_rows.len());

    write_detection_csv(&paths.output_dir.join(TRAIN_LABELS_FILE), train_rows)?;
    write_detection_csv(&paths.output_dir.join(TEST_LABELS_FILE), test_rows)?;
    output.print_bucket_summary();
    output.stats.print_summary();
    info!("Successfully converted mat to csv.");
    Ok(output)
}

/// Legacy conversion: one flat text file of every object per ground-truth
/// folder, no split and no documents.
pub fn convert_legacy(args: &Args, paths: &ResolvedPaths, source: &dyn ContainerSource) -> Result<OutputSet> {
    let options = args.run_options();
    let mut total = OutputSet::default();

    for gt_dir in &args.gt_dirs {
        let output = run(&[paths.input_dir.join(gt_dir)], None, &options, source)?;
        let rows = output.rows(Bucket::All);
        info!("Total objects in {}: {}", gt_dir, rows.len());

        let target = paths.output_dir.join(legacy_output_name(gt_dir));
        write_rows_as_lines(&target, rows)?;
        info!("Wrote {}", target.display());
        total.merge(output);
    }

    total.print_bucket_summary();
    total.stats.print_summary();
    Ok(total)
}
