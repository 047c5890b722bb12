//! Pascal VOC to YOLO dataset preparation
//!
//! This library converts per-image VOC XML annotations into YOLO label files,
//! enumerates the classes used in a VOC dataset, and splits a converted
//! dataset into train/valid/test directories ready for detector training.

pub mod analyze;
pub mod classes;
pub mod config;
pub mod conversion;
pub mod error;
pub mod io;
pub mod split;
pub mod types;
pub mod utils;
pub mod voc;

// Re-export commonly used types and functions
pub use analyze::{find_all_classes, write_class_list, ClassStats};
pub use classes::ClassRegistry;
pub use config::{Args, Command, SizeSource};
pub use conversion::{convert_directory, normalize, write_labels, ConvertParams};
pub use error::DatasetError;
pub use split::{
    materialize, split_and_copy_dataset, split_ids, split_with_seed, MaterializeParams,
    SplitParams, SplitRatios,
};
pub use types::{
    AnnotationRecord, BoundingBox, ConversionSummary, DatasetSplit, ItemOutcome, NormalizedBox,
    SkipReason, SplitSummary,
};
pub use voc::read_annotation;
