//! Pascal VOC XML annotation parsing.
//!
//! One XML file describes one image:
//!
//! ```xml
//! <annotation>
//!   <filename>000001.jpg</filename>
//!   <size><width>1920</width><height>1080</height><depth>3</depth></size>
//!   <object>
//!     <name>ore carrier</name>
//!     <bndbox><xmin>578</xmin><ymin>549</ymin><xmax>1107</xmax><ymax>677</ymax></bndbox>
//!   </object>
//! </annotation>
//! ```
//!
//! Elements other than the ones above are ignored. `<size>` is read
//! leniently: exports that write `640.0` or leave it empty still parse, and
//! an unusable value reads as zero.

use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::DatasetError;
use crate::types::{AnnotationRecord, BoundingBox};

#[derive(Debug, Deserialize)]
pub struct VocDocument {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<VocSize>,
    #[serde(rename = "object", default)]
    pub objects: Vec<VocObject>,
}

/// Raw `<size>` text; see [`VocSize::dimensions`]
#[derive(Debug, Deserialize)]
pub struct VocSize {
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VocObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bndbox: Option<VocBndBox>,
}

#[derive(Debug, Deserialize)]
pub struct VocBndBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Only the object names of a document, for scans that need nothing else
#[derive(Debug, Deserialize)]
pub struct VocClassNames {
    #[serde(rename = "object", default)]
    objects: Vec<VocNamedObject>,
}

#[derive(Debug, Deserialize)]
struct VocNamedObject {
    #[serde(default)]
    name: Option<String>,
}

fn non_blank(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|name| !name.is_empty())
}

impl VocObject {
    /// The trimmed class name, or `None` if absent or blank
    pub fn class_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }
}

impl VocSize {
    /// `(width, height)` in pixels. Integral floats such as `640.0` are
    /// accepted; anything else becomes 0.
    pub fn dimensions(&self) -> (u32, u32) {
        (
            parse_dimension(self.width.as_deref()),
            parse_dimension(self.height.as_deref()),
        )
    }
}

fn parse_dimension(text: Option<&str>) -> u32 {
    let text = text.map(str::trim).unwrap_or_default();
    if let Ok(value) = text.parse::<u32>() {
        return value;
    }
    match text.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) => {
            value as u32
        }
        _ => {
            debug!("Ignoring unusable <size> value '{}'", text);
            0
        }
    }
}

impl VocClassNames {
    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path)?;
        Ok(quick_xml::de::from_str(&content)?)
    }

    /// Trimmed non-blank names in document order
    pub fn into_names(self) -> Vec<String> {
        self.objects
            .into_iter()
            .filter_map(|object| non_blank(object.name.as_deref()).map(str::to_string))
            .collect()
    }
}

impl VocDocument {
    pub fn from_xml(xml: &str) -> Result<Self, DatasetError> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    /// Build an [`AnnotationRecord`] for the image identified by `image_id`.
    ///
    /// Every object must carry a name and a `bndbox`; a missing one makes the
    /// whole document unusable.
    pub fn into_record(self, image_id: &str) -> Result<AnnotationRecord, DatasetError> {
        let (width, height) = self
            .size
            .as_ref()
            .map_or((0, 0), VocSize::dimensions);

        let mut boxes = Vec::with_capacity(self.objects.len());
        for (index, object) in self.objects.iter().enumerate() {
            let name = object.class_name().ok_or_else(|| {
                quick_xml::DeError::Custom(format!("object #{} has no name", index))
            })?;
            let bndbox = object.bndbox.as_ref().ok_or_else(|| {
                quick_xml::DeError::Custom(format!("object '{}' has no bndbox", name))
            })?;
            boxes.push(BoundingBox::new(
                name,
                bndbox.xmin,
                bndbox.ymin,
                bndbox.xmax,
                bndbox.ymax,
            ));
        }

        Ok(AnnotationRecord {
            image_id: image_id.to_string(),
            filename: self.filename.map(|f| f.trim().to_string()).unwrap_or_default(),
            width,
            height,
            boxes,
        })
    }
}

/// Stem of an annotation path, used as the image identifier
pub fn image_id_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse an annotation from an XML string
pub fn parse_annotation_str(xml: &str, image_id: &str) -> Result<AnnotationRecord, DatasetError> {
    VocDocument::from_xml(xml)?.into_record(image_id)
}

/// Read and parse a single VOC annotation file
pub fn read_annotation(path: &Path) -> Result<AnnotationRecord, DatasetError> {
    VocDocument::read(path)?.into_record(&image_id_of(path))
}

/// Object names of one annotation file; coordinates and size are not parsed
pub fn read_class_names(path: &Path) -> Result<Vec<String>, DatasetError> {
    Ok(VocClassNames::read(path)?.into_names())
}
