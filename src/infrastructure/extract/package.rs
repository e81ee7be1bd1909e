//! Minimal read access to the parts of an xlsx package.
//!
//! Only the pieces needed to walk workbook -> worksheet -> drawing -> media
//! are parsed. Part names are zip entry names without a leading slash.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub const MEDIA_PREFIX: &str = "xl/media/";

const REL_TYPE_DRAWING_SUFFIX: &str = "/drawing";
const REL_TYPE_IMAGE_MARKER: &str = "/image";

/// Failure while reading one part of the package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("zip error: {0}")]
    Zip(#[from] ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error in {part}: {message}")]
    Xml { part: String, message: String },
}

impl PackageError {
    fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        Self::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Worksheet -> drawing link.
    pub fn is_drawing(&self) -> bool {
        self.rel_type.ends_with(REL_TYPE_DRAWING_SUFFIX) || self.target.contains("drawings/")
    }

    /// Drawing -> media link.
    pub fn is_image(&self) -> bool {
        self.rel_type.contains(REL_TYPE_IMAGE_MARKER)
    }
}

/// A worksheet declared in `xl/workbook.xml`, in workbook order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub part: String,
}

/// An opened xlsx package.
pub struct XlsxPackage<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> XlsxPackage<'a> {
    /// Opens `bytes` as a zip archive.
    pub fn open(bytes: &'a [u8]) -> Result<Self, PackageError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { archive })
    }

    /// Whether the package contains `part`.
    pub fn has_part(&self, part: &str) -> bool {
        self.archive.index_for_name(part).is_some()
    }

    /// Reads a part, `None` when it is absent.
    pub fn read_part(&mut self, part: &str) -> Result<Option<Vec<u8>>, PackageError> {
        let mut file = match self.archive.by_name(part) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    /// Every media part under `xl/media/`.
    pub fn media_parts(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| name.starts_with(MEDIA_PREFIX) && !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Relationships of `part`; empty when the part has no `.rels` file.
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>, PackageError> {
        let rels_part = rels_part_for(part);
        match self.read_part(&rels_part)? {
            Some(xml) => parse_relationships(&xml, &rels_part),
            None => Ok(Vec::new()),
        }
    }

    /// Worksheets in workbook order with their resolved part names.
    ///
    /// Sheets without a name or whose relationship cannot be found are dropped.
    pub fn sheets(&mut self) -> Result<Vec<SheetEntry>, PackageError> {
        let Some(workbook_xml) = self.read_part(WORKBOOK_PART)? else {
            return Ok(Vec::new());
        };
        let targets: HashMap<String, String> = self
            .relationships(WORKBOOK_PART)?
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();

        let mut reader = Reader::from_reader(workbook_xml.as_slice());
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e) | Event::Start(ref e))
                    if e.local_name().as_ref() == b"sheet" =>
                {
                    let mut name = None;
                    let mut rel_id = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| PackageError::xml(WORKBOOK_PART, err))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| PackageError::xml(WORKBOOK_PART, err))?;
                        match (attr.key.prefix().is_some(), attr.key.local_name().as_ref()) {
                            (false, b"name") => name = Some(value.to_string()),
                            (true, b"id") => rel_id = Some(value.to_string()),
                            _ => {}
                        }
                    }

                    if let (Some(name), Some(rel_id)) = (name, rel_id)
                        && !name.is_empty()
                        && let Some(target) = targets.get(&rel_id)
                    {
                        sheets.push(SheetEntry {
                            name,
                            part: resolve_zip_target(WORKBOOK_PART, target),
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PackageError::xml(WORKBOOK_PART, e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }
}

/// Parses a `.rels` part.
pub fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut rel_type = String::new();
                let mut target = None;
                let mut external = false;

                for attr in e.attributes() {
                    let attr = attr.map_err(|err| PackageError::xml(part, err))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|err| PackageError::xml(part, err))?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value.to_string()),
                        b"Type" => rel_type = value.to_string(),
                        b"Target" => target = Some(value.to_string()),
                        b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }

                if let (Some(id), Some(target)) = (id, target) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        external,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PackageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Resolves a relationship target against the part that declared it.
pub fn resolve_zip_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let base_dir = base_part.rsplit_once('/').map_or("", |(dir, _)| dir);
    if base_dir.is_empty() {
        normalize_path(target)
    } else {
        normalize_path(&format!("{base_dir}/{target}"))
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(segment),
        }
    }
    parts.join("/")
}
