use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// A labelled rectangle in absolute pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub class_name: String,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(class_name: impl Into<String>, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            class_name: class_name.into(),
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// True unless `xmin < xmax` and `ymin < ymax`. NaN coordinates count as degenerate.
    pub fn is_degenerate(&self) -> bool {
        !(self.xmin < self.xmax && self.ymin < self.ymax)
    }

    /// Copy of this box with every coordinate clamped into `[0, width]x[0, height]`
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            class_name: self.class_name.clone(),
            xmin: self.xmin.clamp(0.0, w),
            ymin: self.ymin.clamp(0.0, h),
            xmax: self.xmax.clamp(0.0, w),
            ymax: self.ymax.clamp(0.0, h),
        }
    }
}

/// The parsed content of one VOC annotation file
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    /// Stem of the annotation file, used to name the label file
    pub image_id: String,
    /// Image file name as written in the annotation's `filename` element
    pub filename: String,
    /// Image width; zero when unknown
    pub width: u32,
    /// Image height; zero when unknown
    pub height: u32,
    pub boxes: Vec<BoundingBox>,
}

/// A box in YOLO representation: class id plus center/size as fractions of the image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    /// Format as a YOLO label line without the trailing newline
    pub fn to_yolo_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.center_x, self.center_y, self.width, self.height
        )
    }

    /// Convert back to pixel `(xmin, ymin, xmax, ymax)` for an image of the given size
    pub fn to_pixel(&self, image_width: u32, image_height: u32) -> (f64, f64, f64, f64) {
        let (w, h) = (image_width as f64, image_height as f64);
        let half_w = self.width * w / 2.0;
        let half_h = self.height * h / 2.0;
        let cx = self.center_x * w;
        let cy = self.center_y * h;
        (cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }
}

/// Why an annotation file produced no label file
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The XML could not be read or did not match the VOC schema
    ParseError(String),
    /// The image named by the annotation does not exist
    MissingImage(PathBuf),
    /// The image exists but its header could not be decoded
    UnreadableImage(String),
    /// The resolved image width or height is zero
    ZeroDimensions,
    /// The label file could not be written
    WriteFailed(String),
}

/// Result of converting a single annotation file
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Converted {
        label_path: PathBuf,
        written: usize,
        dropped_unknown_class: usize,
        dropped_degenerate: usize,
    },
    Skipped(SkipReason),
}

// Struct to hold conversion statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub total_files_processed: usize,
    pub parsed: usize,
    pub skipped_parse_error: usize,
    pub skipped_missing_image: usize,
    pub skipped_unreadable_image: usize,
    pub skipped_zero_dimensions: usize,
    pub failed_writes: usize,
    pub boxes_written: usize,
    pub boxes_dropped_unknown_class: usize,
    pub boxes_dropped_degenerate: usize,
}

impl ConversionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one per-file outcome into the summary
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.total_files_processed += 1;
        match outcome {
            ItemOutcome::Converted {
                written,
                dropped_unknown_class,
                dropped_degenerate,
                ..
            } => {
                self.parsed += 1;
                self.boxes_written += written;
                self.boxes_dropped_unknown_class += dropped_unknown_class;
                self.boxes_dropped_degenerate += dropped_degenerate;
            }
            ItemOutcome::Skipped(SkipReason::ParseError(_)) => self.skipped_parse_error += 1,
            ItemOutcome::Skipped(SkipReason::MissingImage(_)) => self.skipped_missing_image += 1,
            ItemOutcome::Skipped(SkipReason::UnreadableImage(_)) => {
                self.skipped_unreadable_image += 1
            }
            ItemOutcome::Skipped(SkipReason::ZeroDimensions) => self.skipped_zero_dimensions += 1,
            ItemOutcome::Skipped(SkipReason::WriteFailed(_)) => self.failed_writes += 1,
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_parse_error
            + self.skipped_missing_image
            + self.skipped_unreadable_image
            + self.skipped_zero_dimensions
            + self.failed_writes
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Total annotation files processed: {}", self.total_files_processed);
        log::info!("Converted: {}", self.parsed);
        log::info!("Skipped (parse error): {}", self.skipped_parse_error);
        log::info!("Skipped (missing image): {}", self.skipped_missing_image);
        log::info!("Skipped (unreadable image): {}", self.skipped_unreadable_image);
        log::info!("Skipped (zero dimensions): {}", self.skipped_zero_dimensions);
        log::info!("Failed label writes: {}", self.failed_writes);
        log::info!("Boxes written: {}", self.boxes_written);

        if self.boxes_dropped_unknown_class > 0 || self.boxes_dropped_degenerate > 0 {
            log::info!(
                "Boxes dropped: {} (unknown class: {}, degenerate: {})",
                self.boxes_dropped_unknown_class + self.boxes_dropped_degenerate,
                self.boxes_dropped_unknown_class,
                self.boxes_dropped_degenerate
            );
        }

        let total_skipped = self.total_skipped();
        if total_skipped > 0 {
            log::warn!(
                "Total skipped annotation files: {} (parse error: {}, missing image: {}, unreadable image: {}, zero dimensions: {}, write failed: {})",
                total_skipped,
                self.skipped_parse_error,
                self.skipped_missing_image,
                self.skipped_unreadable_image,
                self.skipped_zero_dimensions,
                self.failed_writes
            );
        }
    }
}

/// A partition of identifiers into train/valid/test subsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplit<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subsets paired with their output directory names
    pub fn subsets(&self) -> [(&'static str, &[T]); 3] {
        [
            ("train", &self.train),
            ("valid", &self.valid),
            ("test", &self.test),
        ]
    }
}

/// Files copied (or not) while materializing one subset
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeStats {
    pub images_copied: usize,
    pub labels_copied: usize,
    pub missing_images: usize,
    pub missing_labels: usize,
}

impl MaterializeStats {
    pub fn merge(&mut self, other: MaterializeStats) {
        self.images_copied += other.images_copied;
        self.labels_copied += other.labels_copied;
        self.missing_images += other.missing_images;
        self.missing_labels += other.missing_labels;
    }
}

// Struct to hold split statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub train: usize,
    pub valid: usize,
    pub test: usize,
    pub files: MaterializeStats,
}

impl SplitSummary {
    pub fn print_summary(&self) {
        log::info!("=== Split Summary ===");
        log::info!(
            "Train: {}, Valid: {}, Test: {}",
            self.train,
            self.valid,
            self.test
        );
        log::info!(
            "Copied {} images and {} labels",
            self.files.images_copied,
            self.files.labels_copied
        );
        if self.files.missing_images > 0 || self.files.missing_labels > 0 {
            log::warn!(
                "Missing files skipped: {} images, {} labels",
                self.files.missing_images,
                self.files.missing_labels
            );
        }
    }
}
