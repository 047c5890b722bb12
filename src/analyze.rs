//! Class enumeration across a directory of VOC annotation files.

use log::{info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DatasetError;
use crate::utils::{create_io_thread_pool, create_progress_bar, list_files_with_extension};
use crate::voc::read_class_names;

/// Occurrence counts of every class name found in a scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassStats {
    /// Class name to number of objects carrying it; the keys are the unique names
    pub counts: BTreeMap<String, usize>,
    pub files_scanned: usize,
    pub files_failed: usize,
}

impl ClassStats {
    fn from_names(names: Vec<String>) -> Self {
        let mut stats = Self {
            files_scanned: 1,
            ..Default::default()
        };
        for name in names {
            *stats.counts.entry(name).or_insert(0) += 1;
        }
        stats
    }

    fn failed() -> Self {
        Self {
            files_scanned: 1,
            files_failed: 1,
            ..Default::default()
        }
    }

    /// Fold another partial result into this one
    pub fn merge(mut self, other: ClassStats) -> Self {
        for (name, count) in other.counts {
            *self.counts.entry(name).or_insert(0) += count;
        }
        self.files_scanned += other.files_scanned;
        self.files_failed += other.files_failed;
        self
    }

    /// Unique class names in sorted order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn print_summary(&self) {
        info!("=== Classes ===");
        for (name, count) in &self.counts {
            info!("- {} (occurrences: {})", name, count);
        }
        info!(
            "{} unique classes in {} files",
            self.counts.len(),
            self.files_scanned
        );
        if self.files_failed > 0 {
            warn!("{} files could not be parsed", self.files_failed);
        }
    }
}

/// Class names of every object in one annotation file, in document order.
///
/// Objects without a name, or with a blank one, are ignored. Only the names
/// are read, so bad coordinates or sizes do not hide a file's classes.
pub fn extract_classes(xml_path: &Path) -> Result<Vec<String>, DatasetError> {
    read_class_names(xml_path)
}

/// Scan every `*.xml` file in `xml_dir` with a pool of `workers` threads.
///
/// Each file is parsed by its own task into a local [`ClassStats`]; partial
/// results are merged as tasks complete. A file that fails to parse is
/// reported and counted without stopping the scan.
pub fn find_all_classes(xml_dir: &Path, workers: Option<usize>) -> Result<ClassStats, DatasetError> {
    let xml_files = list_files_with_extension(xml_dir, "xml")?;
    if xml_files.is_empty() {
        return Err(DatasetError::NoAnnotationsFound {
            dir: xml_dir.to_path_buf(),
        });
    }

    info!(
        "Found {} XML files. Starting multi-threaded processing...",
        xml_files.len()
    );
    let thread_pool = create_io_thread_pool(workers)?;
    let pb = create_progress_bar(xml_files.len() as u64, "Classes");

    let stats = thread_pool.install(|| {
        xml_files
            .par_iter()
            .map(|xml_path| {
                let partial = match extract_classes(xml_path) {
                    Ok(names) => ClassStats::from_names(names),
                    Err(e) => {
                        warn!("Error parsing XML file '{}': {}", xml_path.display(), e);
                        ClassStats::failed()
                    }
                };
                pb.inc(1);
                partial
            })
            .reduce(ClassStats::default, ClassStats::merge)
    });
    pb.finish_with_message("Processing complete");

    Ok(stats)
}

/// Write the sorted unique class names, one per line, as a class list file
pub fn write_class_list(stats: &ClassStats, path: &Path) -> std::io::Result<PathBuf> {
    let mut writer = BufWriter::new(File::create(path)?);
    for name in stats.class_names() {
        writeln!(writer, "{}", name)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}
