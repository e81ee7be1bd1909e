//! Best-effort structural scan of an xlsx package.
//!
//! Counts what a worksheet's drawings contain so that objects which are not
//! standard embedded pictures (charts, shapes, linked or OLE content) can be
//! reported. The scan never fails; unreadable parts simply contribute nothing.

use std::collections::HashSet;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use super::package::{
    PackageError, SHARED_STRINGS_PART, WORKBOOK_PART, XlsxPackage, resolve_zip_target,
};

const UNKNOWN_ERROR: &str = "#UNKNOWN!";

const NOTE_UNKNOWN_VALUES: &str =
    "Worksheet contains #UNKNOWN! values; unsupported typed objects may not be extractable.";
const NOTE_DRAWING_WITHOUT_IMAGES: &str =
    "Worksheet has drawing content that is not available as standard embedded images.";
const NOTE_NO_IMAGES: &str = "No standard embedded images were found in this worksheet.";
const NOTE_SOME_UNSUPPORTED: &str = "Some worksheet objects are not standard embedded images.";

/// Structural counts for one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetDiagnostics {
    pub name: String,
    pub drawing_relationships: usize,
    /// Pictures, shapes, frames, groups and connectors; anchors when none of those.
    pub drawing_objects: usize,
    pub drawing_pictures: usize,
    pub embedded_image_refs: usize,
    pub unknown_error_cells: usize,
    /// Filled in by the extractor once conversion has run.
    pub extraction_failures: usize,
}

impl SheetDiagnostics {
    /// Empty diagnostics for a sheet the scan did not see.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Objects present in the worksheet that did not become images.
    #[must_use]
    pub fn unsupported_count(&self, extracted: usize) -> usize {
        let missing_pictures = self.drawing_pictures.saturating_sub(extracted);
        let non_picture_objects = self.drawing_objects.saturating_sub(self.drawing_pictures);
        missing_pictures + non_picture_objects + self.unknown_error_cells + self.extraction_failures
    }

    /// Gallery note for the worksheet, if any.
    #[must_use]
    pub fn notes(&self, extracted: usize) -> Option<&'static str> {
        if self.unknown_error_cells > 0 {
            return Some(NOTE_UNKNOWN_VALUES);
        }
        if extracted == 0 {
            if self.drawing_objects > 0 || self.embedded_image_refs > 0 {
                return Some(NOTE_DRAWING_WITHOUT_IMAGES);
            }
            return Some(NOTE_NO_IMAGES);
        }
        (self.unsupported_count(extracted) > 0).then_some(NOTE_SOME_UNSUPPORTED)
    }
}

/// Result of a package scan.
#[derive(Debug, Clone, Default)]
pub struct PackageScan {
    pub sheets: Vec<SheetDiagnostics>,
    /// Parts under `xl/media/` that no drawing references.
    pub unmapped_media: usize,
}

impl PackageScan {
    /// Diagnostics for the sheet titled `name`.
    #[must_use]
    pub fn for_sheet(&self, name: &str) -> Option<&SheetDiagnostics> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

#[derive(Debug, Default)]
struct DrawingCounts {
    pictures: usize,
    shapes: usize,
    frames: usize,
    groups: usize,
    connectors: usize,
    blips: usize,
    anchors: usize,
}

impl DrawingCounts {
    fn objects(&self) -> usize {
        let objects = self.pictures + self.shapes + self.frames + self.groups + self.connectors;
        if objects == 0 { self.anchors } else { objects }
    }
}

/// Scans `workbook` for drawing objects and error cells.
///
/// Never fails: an unreadable package yields an empty scan.
#[must_use]
pub fn scan_package(workbook: &[u8]) -> PackageScan {
    match try_scan(workbook) {
        Ok(scan) => scan,
        Err(e) => {
            debug!(error = %e, "Package scan skipped");
            PackageScan::default()
        }
    }
}

fn try_scan(workbook: &[u8]) -> Result<PackageScan, PackageError> {
    let mut package = XlsxPackage::open(workbook)?;
    if !package.has_part(WORKBOOK_PART) {
        return Ok(PackageScan::default());
    }

    let shared_unknown = unknown_shared_strings(&mut package);
    let mut mapped_media = HashSet::new();
    let mut scan = PackageScan::default();

    for sheet in package.sheets()? {
        let mut diagnostics = SheetDiagnostics::empty(&sheet.name);

        if let Ok(Some(xml)) = package.read_part(&sheet.part) {
            diagnostics.unknown_error_cells = count_unknown_cells(&xml, &shared_unknown);
        }

        let drawings: Vec<String> = package
            .relationships(&sheet.part)
            .unwrap_or_default()
            .iter()
            .filter(|rel| rel.is_drawing())
            .map(|rel| resolve_zip_target(&sheet.part, &rel.target))
            .collect();
        diagnostics.drawing_relationships = drawings.len();

        for drawing_part in drawings {
            let Ok(Some(xml)) = package.read_part(&drawing_part) else {
                continue;
            };
            let Some(counts) = count_drawing(&xml) else {
                debug!(sheet = %sheet.name, drawing = %drawing_part, "Drawing not scannable");
                continue;
            };
            diagnostics.drawing_objects += counts.objects();
            diagnostics.drawing_pictures += counts.pictures;
            diagnostics.embedded_image_refs += counts.blips;

            for rel in package.relationships(&drawing_part).unwrap_or_default() {
                if rel.is_image() && !rel.external {
                    mapped_media.insert(resolve_zip_target(&drawing_part, &rel.target));
                }
            }
        }

        scan.sheets.push(diagnostics);
    }

    scan.unmapped_media = package
        .media_parts()
        .into_iter()
        .filter(|part| !mapped_media.contains(part))
        .count();

    Ok(scan)
}

fn count_drawing(xml: &[u8]) -> Option<DrawingCounts> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut counts = DrawingCounts::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"pic" => counts.pictures += 1,
                b"sp" => counts.shapes += 1,
                b"graphicFrame" => counts.frames += 1,
                b"grpSp" => counts.groups += 1,
                b"cxnSp" => counts.connectors += 1,
                b"blip" => counts.blips += 1,
                b"oneCellAnchor" | b"twoCellAnchor" | b"absoluteAnchor" => counts.anchors += 1,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some(counts)
}

fn is_unknown_error(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(UNKNOWN_ERROR)
}

/// Indices of shared strings whose text is `#UNKNOWN!`.
fn unknown_shared_strings(package: &mut XlsxPackage<'_>) -> HashSet<usize> {
    let Ok(Some(xml)) = package.read_part(SHARED_STRINGS_PART) else {
        return HashSet::new();
    };

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut unknown = HashSet::new();
    let mut index = 0usize;
    let mut current = String::new();
    let mut in_item = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"si" => {
                in_item = true;
                current.clear();
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => index += 1,
            Ok(Event::Text(ref t)) if in_item => current.push_str(&String::from_utf8_lossy(t)),
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"si" => {
                if is_unknown_error(&current) {
                    unknown.insert(index);
                }
                in_item = false;
                index += 1;
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    unknown
}

/// Counts cells holding `#UNKNOWN!` as an error value or as text.
fn count_unknown_cells(xml: &[u8], shared_unknown: &HashSet<usize>) -> usize {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut count = 0usize;
    let mut cell_type: Option<Vec<u8>> = None;
    let mut in_cell = false;
    let mut in_value = false;
    let mut value = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"c" => {
                    in_cell = true;
                    value.clear();
                    cell_type = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.as_ref() == b"t")
                        .map(|attr| attr.value.to_vec());
                }
                b"v" | b"t" if in_cell => in_value = true,
                _ => {}
            },
            Ok(Event::Text(ref t)) if in_value => value.push_str(&String::from_utf8_lossy(t)),
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if cell_is_unknown(cell_type.as_deref(), &value, shared_unknown) {
                        count += 1;
                    }
                    in_cell = false;
                    cell_type = None;
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    count
}

fn cell_is_unknown(cell_type: Option<&[u8]>, value: &str, shared_unknown: &HashSet<usize>) -> bool {
    match cell_type {
        Some(b"s") => value
            .trim()
            .parse::<usize>()
            .is_ok_and(|index| shared_unknown.contains(&index)),
        Some(b"e" | b"str" | b"inlineStr") => is_unknown_error(value),
        _ => false,
    }
}
