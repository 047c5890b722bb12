use glob::{glob, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DatasetError;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create an output directory (and its parents) if it does not exist yet.
///
/// Existing content is left in place: output roots are often the dataset
/// root itself.
pub fn create_output_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        debug!("Directory {:?} already exists, reusing it.", path);
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Build a worker pool; `None` or `Some(0)` lets rayon pick the size
pub fn create_io_thread_pool(workers: Option<usize>) -> Result<ThreadPool, DatasetError> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(n) = workers.filter(|&n| n > 0) {
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}

/// List the files directly inside `dir` whose name ends with `.{ext}`, sorted by path.
///
/// `ext` may be given with or without its leading dot.
pub fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, DatasetError> {
    DatasetError::require_dir(dir)?;

    let ext = ext.trim_start_matches('.');
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(ext)
    );
    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Normalize a user-supplied extension to the `.ext` form
pub fn dotted_extension(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_files_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xml", "a.xml", "c.txt", "d.XML.bak"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested.xml")).unwrap();

        let files = list_files_with_extension(dir.path(), ".xml").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml"]);
    }

    #[test]
    fn test_list_files_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_files_with_extension(&dir.path().join("missing"), "xml"),
            Err(DatasetError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_list_files_escapes_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let special = dir.path().join("SeaShips[7000]");
        fs::create_dir(&special).unwrap();
        fs::write(special.join("x.jpg"), "").unwrap();
        assert_eq!(list_files_with_extension(&special, "jpg").unwrap().len(), 1);
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension("jpg"), ".jpg");
        assert_eq!(dotted_extension(".jpg"), ".jpg");
    }

    #[test]
    fn test_create_output_directory_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        create_output_directory(&out).unwrap();
        fs::write(out.join("keep.txt"), "x").unwrap();
        create_output_directory(&out).unwrap();
        assert!(out.join("keep.txt").exists());
    }
}
