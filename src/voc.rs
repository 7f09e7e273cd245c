//! Pascal VOC annotation documents.
//!
//! A frame's objects are first gathered into a [`VocAnnotation`], turned into
//! a generic [`XmlElement`] tree and only then rendered to text.

use log::warn;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Coord, ImageSize, ObjectEntry};

const UNSPECIFIED: &str = "Unspecified";
const UNKNOWN_DATABASE: &str = "Unknown";

/// Where a document's image lives and where its XML is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub image_dir: PathBuf,
    pub annotation_dir: PathBuf,
}

impl DocumentTarget {
    pub fn new(image_dir: impl Into<PathBuf>, annotation_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            annotation_dir: annotation_dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VocAnnotation {
    pub folder: String,
    pub filename: String,
    pub path: String,
    pub database: String,
    pub size: ImageSize,
    pub segmented: String,
    pub objects: Vec<VocObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub pose: String,
    pub truncated: String,
    pub difficult: String,
    pub occluded: String,
    pub bndbox: BndBox,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BndBox {
    pub xmin: Coord,
    pub ymin: Coord,
    pub xmax: Coord,
    pub ymax: Coord,
}

/// Build the annotation document of one image.
///
/// Fails with `UnknownClassCode` if any entry's class is outside the
/// vocabulary.
pub fn emit_document(
    image_name: &str,
    entries: &[ObjectEntry],
    size: ImageSize,
    image_dir: &Path,
) -> Result<VocAnnotation> {
    let objects = entries
        .iter()
        .map(|entry| {
            Ok(VocObject {
                name: entry.class_name()?.to_string(),
                pose: UNSPECIFIED.to_string(),
                truncated: UNSPECIFIED.to_string(),
                difficult: UNSPECIFIED.to_string(),
                occluded: UNSPECIFIED.to_string(),
                bndbox: BndBox {
                    xmin: entry.x_min(),
                    ymin: entry.y_min(),
                    xmax: entry.x_max(),
                    ymax: entry.y_max(),
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let folder = image_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(VocAnnotation {
        folder,
        filename: image_name.to_string(),
        path: image_dir.join(image_name).to_string_lossy().into_owned(),
        database: UNKNOWN_DATABASE.to_string(),
        size,
        segmented: UNSPECIFIED.to_string(),
        objects,
    })
}

impl VocObject {
    fn to_element(&self) -> XmlElement {
        XmlElement::new("object")
            .child(XmlElement::text("name", &self.name))
            .child(XmlElement::text("pose", &self.pose))
            .child(XmlElement::text("truncated", &self.truncated))
            .child(XmlElement::text("difficult", &self.difficult))
            .child(XmlElement::text("occluded", &self.occluded))
            .child(
                XmlElement::new("bndbox")
                    .child(XmlElement::text("xmin", self.bndbox.xmin))
                    .child(XmlElement::text("ymin", self.bndbox.ymin))
                    .child(XmlElement::text("xmax", self.bndbox.xmax))
                    .child(XmlElement::text("ymax", self.bndbox.ymax)),
            )
    }
}

impl VocAnnotation {
    pub fn to_element(&self) -> XmlElement {
        let mut root = XmlElement::new("annotation")
            .child(XmlElement::text("folder", &self.folder))
            .child(XmlElement::text("filename", &self.filename))
            .child(XmlElement::text("path", &self.path))
            .child(XmlElement::new("source").child(XmlElement::text("database", &self.database)))
            .child(
                XmlElement::new("size")
                    .child(XmlElement::text("width", self.size.width))
                    .child(XmlElement::text("height", self.size.height))
                    .child(XmlElement::text("depth", self.size.depth)),
            )
            .child(XmlElement::text("segmented", &self.segmented));
        for object in &self.objects {
            root.children.push(object.to_element());
        }
        root
    }

    pub fn to_xml(&self) -> io::Result<String> {
        let mut buffer = Vec::new();
        write_xml(&mut buffer, &self.to_element())?;
        String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// A minimal XML element tree: either text content or child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn text(name: &str, text: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            text: Some(text.to_string()),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Serialize `root` with tab indentation.
pub fn write_xml<W: Write>(writer: &mut W, root: &XmlElement) -> io::Result<()> {
    write_element(writer, root, 0)
}

fn write_element<W: Write>(writer: &mut W, element: &XmlElement, depth: usize) -> io::Result<()> {
    let indent = "\t".repeat(depth);
    if element.children.is_empty() {
        let text = element.text.as_deref().unwrap_or_default();
        return writeln!(
            writer,
            "{indent}<{name}>{text}</{name}>",
            name = element.name,
            text = escape_text(text)
        );
    }
    writeln!(writer, "{}<{}>", indent, element.name)?;
    for child in &element.children {
        write_element(writer, child, depth + 1)?;
    }
    writeln!(writer, "{}</{}>", indent, element.name)
}

fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// File name of an image's annotation: the image stem with `.xml`.
pub fn document_file_name(image_name: &str) -> String {
    let stem = Path::new(image_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.xml", sanitize_filename::sanitize(stem))
}

fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}

/// Write the document under the target's annotation directory.
///
/// Returns `Ok(None)` without writing when either target path is empty.
pub fn save_document(document: &VocAnnotation, target: &DocumentTarget) -> Result<Option<PathBuf>> {
    if is_blank(&target.image_dir) {
        warn!(
            "There was no valid path set for the image. Skipping xml generation for {}.",
            document.filename
        );
        return Ok(None);
    }
    if is_blank(&target.annotation_dir) {
        warn!(
            "There was no valid path set for the xml. Skipping xml generation for {}.",
            document.filename
        );
        return Ok(None);
    }

    let output_path = target
        .annotation_dir
        .join(document_file_name(&document.filename));
    let mut writer = BufWriter::new(File::create(&output_path)?);
    write_xml(&mut writer, &document.to_element())?;
    writer.flush()?;
    Ok(Some(output_path))
}
