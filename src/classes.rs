use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::DatasetError;

/// Ordered class names; a class id is its position in the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl ClassRegistry {
    /// Load a class list file with one class name per line.
    ///
    /// Lines are trimmed and blank lines are ignored, so a trailing newline
    /// does not create an empty class.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DatasetError::ClassListNotFound {
                path: path.to_path_buf(),
            },
            _ => DatasetError::Io(e),
        })?;

        let registry = Self::parse(&content)?;
        if registry.is_empty() {
            return Err(DatasetError::EmptyClassList {
                path: path.to_path_buf(),
            });
        }
        log::info!(
            "Loaded {} classes from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Build a registry from the text of a class list file
    pub fn parse(content: &str) -> Result<Self, DatasetError> {
        let mut registry = Self::default();
        for (line_idx, line) in content.lines().enumerate() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            if registry.ids.contains_key(name) {
                return Err(DatasetError::DuplicateClass {
                    name: name.to_string(),
                    line: line_idx + 1,
                });
            }
            registry.ids.insert(name.to_string(), registry.names.len());
            registry.names.push(name.to_string());
        }
        Ok(registry)
    }

    /// Build a registry from names in id order
    pub fn from_names<I, S>(names: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let content: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        Self::parse(&content.join("\n"))
    }

    /// Exact-match lookup. `None` means the box should be dropped.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(id, name)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(String::as_str).enumerate()
    }
}
