//! Random train/valid/test split and file materialization.

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::copy;
use std::path::Path;

use crate::classes::ClassRegistry;
use crate::error::DatasetError;
use crate::io::{create_dataset_yaml, setup_split_directories};
use crate::types::{get_image_extensions_set, DatasetSplit, MaterializeStats, SplitSummary};
use crate::utils::{create_progress_bar, dotted_extension, list_files_with_extension};

/// Subset weights normalized to sum to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub valid: f64,
    pub test: f64,
}

impl SplitRatios {
    /// Normalize arbitrary non-negative weights, e.g. `(1, 1, 1)` becomes thirds.
    pub fn new(train: f64, valid: f64, test: f64) -> Result<Self, DatasetError> {
        if [train, valid, test]
            .iter()
            .any(|r| !r.is_finite() || *r < 0.0)
        {
            return Err(DatasetError::invalid_ratios(format!(
                "ratios must be finite and non-negative, got ({}, {}, {})",
                train, valid, test
            )));
        }
        let total = train + valid + test;
        if total <= 0.0 {
            return Err(DatasetError::invalid_ratios("ratios sum to zero"));
        }
        Ok(Self {
            train: train / total,
            valid: valid / total,
            test: test / total,
        })
    }

    /// `(n_train, n_valid, n_test)` for `total` items; test takes the remainder
    pub fn counts(&self, total: usize) -> (usize, usize, usize) {
        let n_train = ((total as f64 * self.train).floor() as usize).min(total);
        let n_valid = ((total as f64 * self.valid).floor() as usize).min(total - n_train);
        (n_train, n_valid, total - n_train - n_valid)
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            valid: 0.15,
            test: 0.15,
        }
    }
}

/// Shuffle `ids` with `rng` and slice them into train/valid/test.
///
/// The subsets are disjoint and together contain every input id.
pub fn split_ids<T, R: Rng + ?Sized>(
    mut ids: Vec<T>,
    ratios: &SplitRatios,
    rng: &mut R,
) -> DatasetSplit<T> {
    ids.shuffle(rng);
    let (n_train, n_valid, _) = ratios.counts(ids.len());

    let test = ids.split_off(n_train + n_valid);
    let valid = ids.split_off(n_train);
    DatasetSplit {
        train: ids,
        valid,
        test,
    }
}

/// [`split_ids`] with a `StdRng` seeded from `seed`
pub fn split_with_seed<T>(ids: Vec<T>, ratios: &SplitRatios, seed: u64) -> DatasetSplit<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    split_ids(ids, ratios, &mut rng)
}

/// Stems of the files in `image_dir` with extension `image_ext`, sorted.
pub fn collect_image_ids(image_dir: &Path, image_ext: &str) -> Result<Vec<String>, DatasetError> {
    let ext = image_ext.trim_start_matches('.');
    if !get_image_extensions_set().contains(&ext.to_lowercase()) {
        warn!("'{}' is not a known image extension", image_ext);
    }

    let ids: Vec<String> = list_files_with_extension(image_dir, ext)?
        .iter()
        .filter_map(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .collect();

    if ids.is_empty() {
        return Err(DatasetError::NoImagesFound {
            dir: image_dir.to_path_buf(),
            ext: dotted_extension(image_ext),
        });
    }
    Ok(ids)
}

/// Source and destination layout for [`materialize`]
#[derive(Debug, Clone, Copy)]
pub struct MaterializeParams<'a> {
    pub src_image_dir: &'a Path,
    pub src_label_dir: &'a Path,
    pub image_ext: &'a str,
    pub label_ext: &'a str,
}

/// Copy each id's image and label into `dst_dir/images/` and `dst_dir/labels/`.
///
/// Image and label are copied independently: a missing (or uncopyable) file
/// is counted and skipped, the rest of the batch continues.
pub fn materialize<S: AsRef<str>>(
    subset_ids: &[S],
    params: &MaterializeParams<'_>,
    dst_dir: &Path,
) -> Result<MaterializeStats, DatasetError> {
    materialize_with_progress(subset_ids, params, dst_dir, &ProgressBar::hidden())
}

fn materialize_with_progress<S: AsRef<str>>(
    subset_ids: &[S],
    params: &MaterializeParams<'_>,
    dst_dir: &Path,
    pb: &ProgressBar,
) -> Result<MaterializeStats, DatasetError> {
    let (dst_image_dir, dst_label_dir) = setup_split_directories(dst_dir)?;
    let image_ext = dotted_extension(params.image_ext);
    let label_ext = dotted_extension(params.label_ext);

    let mut stats = MaterializeStats::default();
    for id in subset_ids {
        let image_name = format!("{}{}", id.as_ref(), image_ext);
        let label_name = format!("{}{}", id.as_ref(), label_ext);

        if copy_if_exists(
            &params.src_image_dir.join(&image_name),
            &dst_image_dir.join(&image_name),
        ) {
            stats.images_copied += 1;
        } else {
            stats.missing_images += 1;
        }

        if copy_if_exists(
            &params.src_label_dir.join(&label_name),
            &dst_label_dir.join(&label_name),
        ) {
            stats.labels_copied += 1;
        } else {
            stats.missing_labels += 1;
        }
        pb.inc(1);
    }
    Ok(stats)
}

fn copy_if_exists(src: &Path, dst: &Path) -> bool {
    if !src.is_file() {
        debug!("Missing source file, skipping: {}", src.display());
        return false;
    }
    match copy(src, dst) {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to copy {} to {}: {}", src.display(), dst.display(), e);
            false
        }
    }
}

/// Settings for a full split run
#[derive(Debug)]
pub struct SplitParams<'a> {
    pub files: MaterializeParams<'a>,
    pub output_root: &'a Path,
    pub ratios: SplitRatios,
    pub seed: u64,
    /// When set, `data.yaml` is written to `output_root`
    pub registry: Option<&'a ClassRegistry>,
}

/// Split the images of `params.files.src_image_dir` and copy them, with their
/// labels, into `output_root/{train,valid,test}/{images,labels}/`.
pub fn split_and_copy_dataset(params: &SplitParams<'_>) -> Result<SplitSummary, DatasetError> {
    DatasetError::require_dir(params.files.src_label_dir)?;
    let ids = collect_image_ids(params.files.src_image_dir, params.files.image_ext)?;
    info!("Found {} images. Splitting with seed {}...", ids.len(), params.seed);

    let split = split_with_seed(ids, &params.ratios, params.seed);
    let mut summary = SplitSummary {
        train: split.train.len(),
        valid: split.valid.len(),
        test: split.test.len(),
        ..Default::default()
    };

    for (name, subset) in split.subsets() {
        let pb = create_progress_bar(subset.len() as u64, name);
        let stats =
            materialize_with_progress(subset, &params.files, &params.output_root.join(name), &pb)?;
        pb.finish_with_message(format!("{} copy complete", name));
        summary.files.merge(stats);
    }

    if let Some(registry) = params.registry {
        info!("Creating data.yaml file...");
        create_dataset_yaml(params.output_root, registry)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ratios_are_normalized() {
        let ratios = SplitRatios::new(1.0, 1.0, 1.0).unwrap();
        assert!((ratios.train - 1.0 / 3.0).abs() < 1e-12);
        assert!((ratios.train + ratios.valid + ratios.test - 1.0).abs() < 1e-12);

        let ratios = SplitRatios::new(7.0, 1.5, 1.5).unwrap();
        assert!((ratios.train - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_ratios() {
        assert!(SplitRatios::new(0.0, 0.0, 0.0).is_err());
        assert!(SplitRatios::new(-1.0, 1.0, 1.0).is_err());
        assert!(SplitRatios::new(f64::NAN, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_counts_floor_floor_remainder() {
        let ratios = SplitRatios::new(1.0, 1.0, 1.0).unwrap();
        assert_eq!(ratios.counts(10), (3, 3, 4));
        assert_eq!(SplitRatios::default().counts(100), (70, 15, 15));
        assert_eq!(SplitRatios::new(1.0, 0.0, 0.0).unwrap().counts(7), (7, 0, 0));
        assert_eq!(SplitRatios::default().counts(0), (0, 0, 0));
    }

    #[test]
    fn test_split_100_is_70_15_15_and_exhaustive() {
        let ids: Vec<u32> = (0..100).collect();
        let split = split_with_seed(ids.clone(), &SplitRatios::default(), 7);

        assert_eq!(split.train.len(), 70);
        assert_eq!(split.valid.len(), 15);
        assert_eq!(split.test.len(), 15);

        let train: HashSet<_> = split.train.iter().collect();
        let valid: HashSet<_> = split.valid.iter().collect();
        let test: HashSet<_> = split.test.iter().collect();
        assert!(train.is_disjoint(&valid));
        assert!(train.is_disjoint(&test));
        assert!(valid.is_disjoint(&test));

        let union: HashSet<_> = train.union(&valid).chain(test.iter()).copied().collect();
        assert_eq!(union, ids.iter().collect::<HashSet<_>>());
    }

    #[test]
    fn test_split_10_equal_weights_puts_remainder_in_test() {
        let ids: Vec<u32> = (0..10).collect();
        let ratios = SplitRatios::new(1.0, 1.0, 1.0).unwrap();
        let split = split_with_seed(ids, &ratios, 1);
        assert_eq!(
            (split.train.len(), split.valid.len(), split.test.len()),
            (3, 3, 4)
        );
        assert_eq!(split.len(), 10);
    }

    #[test]
    fn test_split_is_reproducible_with_seed() {
        let ids: Vec<u32> = (0..50).collect();
        let a = split_with_seed(ids.clone(), &SplitRatios::default(), 42);
        let b = split_with_seed(ids.clone(), &SplitRatios::default(), 42);
        let c = split_with_seed(ids, &SplitRatios::default(), 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_with_injected_rng() {
        let ids: Vec<u32> = (0..20).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let split = split_ids(ids, &SplitRatios::default(), &mut rng);
        assert_eq!(split.len(), 20);
        assert_eq!(split.train.len(), 14);
    }
}
