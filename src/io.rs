use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classes::ClassRegistry;
use crate::utils::create_output_directory;

/// Create `subset_dir/images` and `subset_dir/labels`, returning both paths
pub fn setup_split_directories(subset_dir: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
    let images_dir = create_output_directory(&subset_dir.join("images"))?;
    let labels_dir = create_output_directory(&subset_dir.join("labels"))?;
    Ok((images_dir, labels_dir))
}

/// Render the dataset descriptor consumed by YOLO training and evaluation
pub fn dataset_yaml_content(root: &Path, registry: &ClassRegistry) -> String {
    let mut yaml_content = format!(
        "path: {}\ntrain: train/images\nval: valid/images\ntest: test/images\n",
        root.to_string_lossy()
    );
    yaml_content.push_str(&format!("\nnc: {}\nnames:\n", registry.len()));
    for (id, name) in registry.iter() {
        yaml_content.push_str(&format!("    {}: {}\n", id, yaml_scalar(name)));
    }
    yaml_content
}

/// Create the data.yaml file in `output_root`
pub fn create_dataset_yaml(output_root: &Path, registry: &ClassRegistry) -> std::io::Result<PathBuf> {
    let dataset_yaml_path = output_root.join("data.yaml");
    let absolute_path = fs::canonicalize(output_root)?;
    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    dataset_yaml.write_all(dataset_yaml_content(&absolute_path, registry).as_bytes())?;
    dataset_yaml.flush()?;
    Ok(dataset_yaml_path)
}

// Quote names that YAML would otherwise read as something other than a plain string
fn yaml_scalar(name: &str) -> String {
    let needs_quotes = name.contains(|c: char| ":#'\"{}[],&*!|>%@`".contains(c))
        || name.starts_with(['-', '?', ' '])
        || name.ends_with(' ')
        || matches!(
            name.to_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "null" | "~" | "on" | "off"
        )
        || name.parse::<f64>().is_ok();
    if needs_quotes {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}
