use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// Convert Pascal VOC annotations to YOLO labels and split the dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert a directory of VOC XML files into YOLO label files
    Convert(ConvertArgs),
    /// Split images and labels into train/valid/test directories
    Split(SplitArgs),
    /// List the class names used across a directory of VOC XML files
    Classes(ClassesArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Directory containing VOC XML annotation files
    #[arg(long = "xml_dir")]
    pub xml_dir: PathBuf,

    /// Directory containing the images named by the annotations
    #[arg(long = "image_dir")]
    pub image_dir: PathBuf,

    /// Directory the YOLO label files are written to
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Class list file, one name per line; line order defines class ids
    #[arg(long = "classes", default_value = "classes.txt")]
    pub classes: PathBuf,

    /// Where image width and height come from
    #[arg(long = "size_from", value_enum, default_value = "image")]
    pub size_from: SizeSource,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long = "workers")]
    pub workers: Option<usize>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SplitArgs {
    /// Directory containing the source images
    #[arg(long = "image_dir")]
    pub image_dir: PathBuf,

    /// Directory containing the YOLO label files
    #[arg(long = "label_dir")]
    pub label_dir: PathBuf,

    /// Root directory for train/, valid/ and test/
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Image file extension
    #[arg(long = "image_ext", default_value = ".jpg")]
    pub image_ext: String,

    /// Label file extension
    #[arg(long = "label_ext", default_value = ".txt")]
    pub label_ext: String,

    /// Relative weight of the training subset
    #[arg(long = "train_ratio", default_value_t = 0.7, value_parser = validate_ratio)]
    pub train_ratio: f64,

    /// Relative weight of the validation subset
    #[arg(long = "valid_ratio", default_value_t = 0.15, value_parser = validate_ratio)]
    pub valid_ratio: f64,

    /// Relative weight of the test subset
    #[arg(long = "test_ratio", default_value_t = 0.15, value_parser = validate_ratio)]
    pub test_ratio: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Class list file; when given, data.yaml is written to the output root
    #[arg(long = "classes")]
    pub classes: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ClassesArgs {
    /// Directory containing VOC XML annotation files
    #[arg(long = "xml_dir")]
    pub xml_dir: PathBuf,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Write the sorted class names to this file
    #[arg(long = "output")]
    pub output: Option<PathBuf>,
}

// Source of the image dimensions used for normalization
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum SizeSource {
    /// Read the header of the image file named by the annotation
    Image,
    /// Use the <size> element of the annotation
    Xml,
}

// Validate that a ratio is finite and non-negative
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val >= 0.0 => Ok(val),
        _ => Err("RATIO must be a non-negative number".to_string()),
    }
}
