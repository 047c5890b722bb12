//! VOC to YOLO conversion: coordinate normalization, label writing and the
//! per-directory conversion driver.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classes::ClassRegistry;
use crate::config::SizeSource;
use crate::error::DatasetError;
use crate::types::{
    AnnotationRecord, BoundingBox, ConversionSummary, ItemOutcome, NormalizedBox, SkipReason,
};
use crate::utils::{
    create_io_thread_pool, create_output_directory, create_progress_bar,
    list_files_with_extension,
};
use crate::voc::{image_id_of, read_annotation};

/// Convert a pixel box to YOLO center/size fractions.
///
/// `width` and `height` must be non-zero; records with a zero dimension are
/// skipped before boxes reach this point.
pub fn normalize(bbox: &BoundingBox, class_id: usize, width: u32, height: u32) -> NormalizedBox {
    let (w, h) = (width as f64, height as f64);
    NormalizedBox {
        class_id,
        center_x: (bbox.xmin + bbox.xmax) / 2.0 / w,
        center_y: (bbox.ymin + bbox.ymax) / 2.0 / h,
        width: (bbox.xmax - bbox.xmin) / w,
        height: (bbox.ymax - bbox.ymin) / h,
    }
}

/// Boxes of one record that survived class lookup and validation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub boxes: Vec<NormalizedBox>,
    pub dropped_unknown_class: usize,
    pub dropped_degenerate: usize,
}

/// Normalize every box of `record` against its own dimensions.
///
/// Boxes whose class is not in the registry and boxes that are empty after
/// clamping to the image are dropped and counted.
pub fn normalize_record(
    record: &AnnotationRecord,
    registry: &ClassRegistry,
) -> Result<NormalizedRecord, SkipReason> {
    if record.width == 0 || record.height == 0 {
        return Err(SkipReason::ZeroDimensions);
    }

    let mut result = NormalizedRecord {
        boxes: Vec::with_capacity(record.boxes.len()),
        ..Default::default()
    };
    for bbox in &record.boxes {
        let Some(class_id) = registry.id_of(&bbox.class_name) else {
            debug!(
                "{}: dropping box with unknown class '{}'",
                record.image_id, bbox.class_name
            );
            result.dropped_unknown_class += 1;
            continue;
        };

        let clamped = bbox.clamped(record.width, record.height);
        if clamped.is_degenerate() {
            debug!(
                "{}: dropping degenerate box {:?}",
                record.image_id, bbox
            );
            result.dropped_degenerate += 1;
            continue;
        }

        result
            .boxes
            .push(normalize(&clamped, class_id, record.width, record.height));
    }
    Ok(result)
}

/// Render boxes as YOLO label text, one newline-terminated line per box
pub fn format_labels(boxes: &[NormalizedBox]) -> String {
    let mut yolo_data = String::with_capacity(boxes.len() * 48);
    for nb in boxes {
        yolo_data.push_str(&nb.to_yolo_line());
        yolo_data.push('\n');
    }
    yolo_data
}

/// Write a label file. An empty slice still creates an empty file.
pub fn write_labels(boxes: &[NormalizedBox], destination: &Path) -> std::io::Result<()> {
    let yolo_data = format_labels(boxes);
    write_or_remove(destination, |writer| writer.write_all(yolo_data.as_bytes()))
}

/// Create `destination` and fill it with `fill`. If filling or flushing
/// fails, the partial file is removed before the error is returned.
fn write_or_remove<F>(destination: &Path, fill: F) -> std::io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut writer = BufWriter::new(File::create(destination)?);
    let result = fill(&mut writer).and_then(|()| writer.flush());
    if result.is_err() {
        drop(writer);
        if let Err(e) = fs::remove_file(destination) {
            warn!(
                "Failed to remove partial label file {}: {}",
                destination.display(),
                e
            );
        }
    }
    result
}

/// Fill in `record.width`/`record.height` according to `size_source`
pub fn resolve_dimensions(
    record: &mut AnnotationRecord,
    image_dir: &Path,
    size_source: SizeSource,
) -> Result<(), SkipReason> {
    if size_source == SizeSource::Xml {
        return Ok(());
    }

    if record.filename.is_empty() {
        return Err(SkipReason::ParseError(
            "annotation has no filename element".to_string(),
        ));
    }
    let image_path = image_dir.join(&record.filename);
    if !image_path.is_file() {
        return Err(SkipReason::MissingImage(image_path));
    }
    let (width, height) = image::image_dimensions(&image_path)
        .map_err(|e| SkipReason::UnreadableImage(format!("{}: {}", image_path.display(), e)))?;
    record.width = width;
    record.height = height;
    Ok(())
}

/// Settings shared by every file of one conversion run
#[derive(Debug)]
pub struct ConvertParams<'a> {
    pub image_dir: &'a Path,
    pub labels_dir: &'a Path,
    pub registry: &'a ClassRegistry,
    pub size_source: SizeSource,
}

/// Convert one annotation file into `labels_dir/<stem>.txt`.
///
/// Failures only affect this file and are returned as [`ItemOutcome::Skipped`].
pub fn convert_annotation_file(xml_path: &Path, params: &ConvertParams<'_>) -> ItemOutcome {
    let mut record = match read_annotation(xml_path) {
        Ok(record) => record,
        Err(e) => return ItemOutcome::Skipped(SkipReason::ParseError(e.to_string())),
    };

    if let Err(reason) = resolve_dimensions(&mut record, params.image_dir, params.size_source) {
        return ItemOutcome::Skipped(reason);
    }

    let normalized = match normalize_record(&record, params.registry) {
        Ok(normalized) => normalized,
        Err(reason) => return ItemOutcome::Skipped(reason),
    };

    // Stems may contain dots, so the extension is appended rather than swapped
    let label_path = params
        .labels_dir
        .join(format!("{}.txt", image_id_of(xml_path)));
    if let Err(e) = write_labels(&normalized.boxes, &label_path) {
        return ItemOutcome::Skipped(SkipReason::WriteFailed(format!(
            "{}: {}",
            label_path.display(),
            e
        )));
    }

    ItemOutcome::Converted {
        label_path,
        written: normalized.boxes.len(),
        dropped_unknown_class: normalized.dropped_unknown_class,
        dropped_degenerate: normalized.dropped_degenerate,
    }
}

fn report_skip(xml_path: &Path, reason: &SkipReason) {
    match reason {
        SkipReason::ParseError(msg) => {
            warn!("Skipping {}: parse error: {}", xml_path.display(), msg)
        }
        SkipReason::MissingImage(image) => debug!(
            "Skipping {}: image not found at {}",
            xml_path.display(),
            image.display()
        ),
        SkipReason::UnreadableImage(msg) => {
            warn!("Skipping {}: unreadable image: {}", xml_path.display(), msg)
        }
        SkipReason::ZeroDimensions => warn!(
            "Skipping {}: image width or height is zero",
            xml_path.display()
        ),
        SkipReason::WriteFailed(msg) => {
            warn!("Failed to write label for {}: {}", xml_path.display(), msg)
        }
    }
}

/// Convert every `*.xml` file in `xml_dir`, writing labels to `labels_dir`.
///
/// Files are processed in parallel; each task returns its own outcome and the
/// outcomes are folded into the summary after the pool drains.
pub fn convert_directory(
    xml_dir: &Path,
    params: &ConvertParams<'_>,
    workers: Option<usize>,
) -> Result<ConversionSummary, DatasetError> {
    let xml_files = list_files_with_extension(xml_dir, "xml")?;
    if xml_files.is_empty() {
        return Err(DatasetError::NoAnnotationsFound {
            dir: xml_dir.to_path_buf(),
        });
    }
    if params.size_source == SizeSource::Image {
        DatasetError::require_dir(params.image_dir)?;
    }
    create_output_directory(params.labels_dir)?;

    info!("Found {} XML files. Converting...", xml_files.len());
    let thread_pool = create_io_thread_pool(workers)?;
    let pb = create_progress_bar(xml_files.len() as u64, "Convert");

    let outcomes: Vec<(PathBuf, ItemOutcome)> = thread_pool.install(|| {
        xml_files
            .par_iter()
            .map(|xml_path| {
                let outcome = convert_annotation_file(xml_path, params);
                pb.inc(1);
                (xml_path.clone(), outcome)
            })
            .collect()
    });
    pb.finish_with_message("Conversion complete");

    let mut summary = ConversionSummary::new();
    for (xml_path, outcome) in &outcomes {
        if let ItemOutcome::Skipped(reason) = outcome {
            report_skip(xml_path, reason);
        }
        summary.record(outcome);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(width: u32, height: u32, boxes: Vec<BoundingBox>) -> AnnotationRecord {
        AnnotationRecord {
            image_id: "img".to_string(),
            filename: "img.jpg".to_string(),
            width,
            height,
            boxes,
        }
    }

    #[test]
    fn test_normalize() {
        let bbox = BoundingBox::new("test", 10.0, 10.0, 20.0, 20.0);
        let nb = normalize(&bbox, 0, 100, 100);
        assert!((nb.center_x - 0.15).abs() < 1e-12);
        assert!((nb.center_y - 0.15).abs() < 1e-12);
        assert!((nb.width - 0.1).abs() < 1e-12);
        assert!((nb.height - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_non_square_image() {
        let bbox = BoundingBox::new("ship", 578.0, 549.0, 1107.0, 677.0);
        let nb = normalize(&bbox, 2, 1920, 1080);
        assert_eq!(nb.to_yolo_line(), "2 0.438802 0.567593 0.275521 0.118519");
    }

    #[test]
    fn test_normalize_round_trips_within_a_pixel() {
        let (w, h) = (1920u32, 1080u32);
        let boxes = [
            (0.0, 0.0, 1920.0, 1080.0),
            (1.0, 2.0, 3.0, 4.0),
            (578.0, 549.0, 1107.0, 677.0),
            (1919.0, 1079.0, 1920.0, 1080.0),
            (13.7, 200.2, 14.1, 999.9),
        ];
        for (xmin, ymin, xmax, ymax) in boxes {
            let nb = normalize(&BoundingBox::new("a", xmin, ymin, xmax, ymax), 0, w, h);
            for v in [nb.center_x, nb.center_y, nb.width, nb.height] {
                assert!((0.0..=1.0).contains(&v), "{} out of range", v);
            }

            // Go through the six-decimal text form like a label file does
            let fields: Vec<f64> = nb
                .to_yolo_line()
                .split(' ')
                .skip(1)
                .map(|s| s.parse().unwrap())
                .collect();
            let parsed = NormalizedBox {
                class_id: 0,
                center_x: fields[0],
                center_y: fields[1],
                width: fields[2],
                height: fields[3],
            };
            let (x0, y0, x1, y1) = parsed.to_pixel(w, h);
            assert!((x0 - xmin).abs() <= 1.0);
            assert!((y0 - ymin).abs() <= 1.0);
            assert!((x1 - xmax).abs() <= 1.0);
            assert!((y1 - ymax).abs() <= 1.0);
        }
    }

    #[test]
    fn test_unknown_class_is_dropped_others_kept() {
        let registry = ClassRegistry::from_names(["boat", "ship"]).unwrap();
        let rec = record(
            100,
            100,
            vec![
                BoundingBox::new("boat", 10.0, 10.0, 20.0, 20.0),
                BoundingBox::new("whale", 30.0, 30.0, 40.0, 40.0),
                BoundingBox::new("ship", 50.0, 50.0, 70.0, 60.0),
            ],
        );
        let normalized = normalize_record(&rec, &registry).unwrap();
        assert_eq!(normalized.dropped_unknown_class, 1);
        assert_eq!(
            format_labels(&normalized.boxes),
            "0 0.150000 0.150000 0.100000 0.100000\n1 0.600000 0.550000 0.200000 0.100000\n"
        );
    }

    #[test]
    fn test_zero_dimensions_skip_record() {
        let registry = ClassRegistry::from_names(["boat"]).unwrap();
        let rec = record(0, 100, vec![BoundingBox::new("boat", 1.0, 1.0, 2.0, 2.0)]);
        assert_eq!(
            normalize_record(&rec, &registry),
            Err(SkipReason::ZeroDimensions)
        );
    }

    #[test]
    fn test_degenerate_and_out_of_range_boxes() {
        let registry = ClassRegistry::from_names(["boat"]).unwrap();
        let rec = record(
            100,
            50,
            vec![
                BoundingBox::new("boat", 20.0, 10.0, 20.0, 30.0),
                BoundingBox::new("boat", 150.0, 10.0, 180.0, 30.0),
                BoundingBox::new("boat", 90.0, -10.0, 110.0, 60.0),
            ],
        );
        let normalized = normalize_record(&rec, &registry).unwrap();
        assert_eq!(normalized.dropped_degenerate, 2);
        assert_eq!(normalized.boxes.len(), 1);
        let nb = normalized.boxes[0];
        assert!((nb.center_x - 0.95).abs() < 1e-12);
        assert!((nb.height - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_write_empty_labels_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        write_labels(&[], &path).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.txt");
        let result = write_or_remove(&path, |writer| {
            writer.write_all(b"0 0.500000")?;
            writer.flush()?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_label_name_keeps_dotted_stem() {
        let dir = tempfile::tempdir().unwrap();
        let xml_dir = dir.path().join("xml");
        let labels_dir = dir.path().join("labels");
        std::fs::create_dir_all(&xml_dir).unwrap();
        std::fs::create_dir_all(&labels_dir).unwrap();
        let xml_path = xml_dir.join("2019.01.a.xml");
        std::fs::write(
            &xml_path,
            "<annotation><size><width>10</width><height>10</height></size></annotation>",
        )
        .unwrap();

        let registry = ClassRegistry::from_names(["boat"]).unwrap();
        let params = ConvertParams {
            image_dir: dir.path(),
            labels_dir: &labels_dir,
            registry: &registry,
            size_source: SizeSource::Xml,
        };
        match convert_annotation_file(&xml_path, &params) {
            ItemOutcome::Converted { label_path, .. } => {
                assert_eq!(label_path, labels_dir.join("2019.01.a.txt"));
                assert!(label_path.exists());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_dimensions_from_xml_keeps_record() {
        let mut rec = record(640, 480, vec![]);
        resolve_dimensions(&mut rec, Path::new("/nonexistent"), SizeSource::Xml).unwrap();
        assert_eq!((rec.width, rec.height), (640, 480));
    }

    #[test]
    fn test_resolve_dimensions_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = record(640, 480, vec![]);
        assert_eq!(
            resolve_dimensions(&mut rec, dir.path(), SizeSource::Image),
            Err(SkipReason::MissingImage(dir.path().join("img.jpg")))
        );
    }

    #[test]
    fn test_resolve_dimensions_reads_image_header() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::new(32, 24)
            .save(dir.path().join("img.png"))
            .unwrap();
        let mut rec = record(0, 0, vec![]);
        rec.filename = "img.png".to_string();
        resolve_dimensions(&mut rec, dir.path(), SizeSource::Image).unwrap();
        assert_eq!((rec.width, rec.height), (32, 24));
    }

    #[test]
    fn test_resolve_dimensions_unreadable_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img.jpg"), b"not an image").unwrap();
        let mut rec = record(0, 0, vec![]);
        assert!(matches!(
            resolve_dimensions(&mut rec, dir.path(), SizeSource::Image),
            Err(SkipReason::UnreadableImage(_))
        ));
    }
}
