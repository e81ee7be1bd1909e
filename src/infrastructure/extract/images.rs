//! Embedded picture extraction.

use std::collections::HashMap;
use std::io::Cursor;

use image::ImageFormat;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use tracing::{debug, warn};

use super::package::{PackageError, Relationship, WORKBOOK_PART, XlsxPackage, resolve_zip_target};
use crate::domain::errors::ExtractError;

/// One picture converted to PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 1-based position among the worksheet's embedded pictures.
    pub index: u32,
    /// PNG-encoded picture bytes.
    pub png: Vec<u8>,
}

/// Pictures of one worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetImages {
    /// Worksheet title as written in the workbook.
    pub name: String,
    /// Converted pictures in drawing order.
    pub images: Vec<ExtractedImage>,
    /// Pictures that were found but could not be converted.
    pub failures: usize,
    /// Set when the worksheet's drawings could not be read at all.
    pub error: Option<String>,
}

impl SheetImages {
    fn failed(name: String, error: &PackageError) -> Self {
        Self {
            name,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Extracts every embedded picture of every worksheet not matched by `skip`.
///
/// Pictures keep their position in the drawing even when an earlier one fails
/// to convert, so indices may have gaps.
///
/// # Errors
/// Returns `ExtractError::InvalidPackage` if `workbook` is not a spreadsheet
/// package or its sheet list cannot be read.
pub fn extract_sheet_images(workbook: &[u8], skip: &Regex) -> Result<Vec<SheetImages>, ExtractError> {
    let mut package =
        XlsxPackage::open(workbook).map_err(|e| ExtractError::invalid_package(e.to_string()))?;
    if !package.has_part(WORKBOOK_PART) {
        return Err(ExtractError::invalid_package(format!("missing {WORKBOOK_PART}")));
    }
    let sheets = package
        .sheets()
        .map_err(|e| ExtractError::invalid_package(e.to_string()))?;

    let mut result = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        if skip.is_match(sheet.name.trim()) {
            debug!(sheet = %sheet.name, "Skipping default worksheet");
            continue;
        }

        match extract_sheet(&mut package, &sheet.name, &sheet.part) {
            Ok(images) => result.push(images),
            Err(e) => {
                warn!(sheet = %sheet.name, error = %e, "Worksheet drawings unreadable");
                result.push(SheetImages::failed(sheet.name, &e));
            }
        }
    }

    Ok(result)
}

fn extract_sheet(
    package: &mut XlsxPackage<'_>,
    name: &str,
    sheet_part: &str,
) -> Result<SheetImages, PackageError> {
    let mut sheet = SheetImages {
        name: name.to_string(),
        ..SheetImages::default()
    };

    let drawings: Vec<String> = package
        .relationships(sheet_part)?
        .iter()
        .filter(|rel| rel.is_drawing() && !rel.external)
        .map(|rel| resolve_zip_target(sheet_part, &rel.target))
        .collect();

    let mut index = 0u32;
    for drawing_part in drawings {
        let Some(xml) = package.read_part(&drawing_part)? else {
            debug!(sheet = name, drawing = %drawing_part, "Drawing part missing");
            continue;
        };
        let embeds = picture_embeds(&xml, &drawing_part)?;
        let media: HashMap<String, Relationship> = package
            .relationships(&drawing_part)?
            .into_iter()
            .filter(Relationship::is_image)
            .map(|rel| (rel.id.clone(), rel))
            .collect();

        for embed in embeds {
            index += 1;
            match load_picture(package, &drawing_part, media.get(&embed)) {
                Ok(png) => sheet.images.push(ExtractedImage { index, png }),
                Err(reason) => {
                    sheet.failures += 1;
                    warn!(sheet = name, image = index, reason = %reason, "Image extraction failed");
                }
            }
        }
    }

    Ok(sheet)
}

fn load_picture(
    package: &mut XlsxPackage<'_>,
    drawing_part: &str,
    rel: Option<&Relationship>,
) -> Result<Vec<u8>, String> {
    let rel = rel.ok_or_else(|| "dangling image relationship".to_string())?;
    if rel.external {
        return Err(format!("linked image {}", rel.target));
    }
    let media_part = resolve_zip_target(drawing_part, &rel.target);
    let raw = package
        .read_part(&media_part)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("missing media part {media_part}"))?;
    to_png(&raw).map_err(|e| format!("{media_part}: {e}"))
}

/// Re-encodes any supported raster format as PNG.
pub fn to_png(raw: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(raw)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// `r:embed` ids of the pictures in a drawing, in document order.
fn picture_embeds(xml: &[u8], part: &str) -> Result<Vec<String>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut embeds = Vec::new();
    let mut pic_depth = 0usize;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"pic" => {
                    pic_depth += 1;
                    current = None;
                }
                b"blip" if pic_depth > 0 && current.is_none() => current = embed_attr(e, part)?,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"blip" && pic_depth > 0 && current.is_none() {
                    current = embed_attr(e, part)?;
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"pic" && pic_depth > 0 {
                    pic_depth -= 1;
                    if let Some(embed) = current.take() {
                        embeds.push(embed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PackageError::Xml {
                    part: part.to_string(),
                    message: e.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(embeds)
}

fn embed_attr(e: &BytesStart<'_>, part: &str) -> Result<Option<String>, PackageError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| PackageError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        })?;
        if attr.key.local_name().as_ref() == b"embed" {
            let value = attr.unescape_value().map_err(|err| PackageError::Xml {
                part: part.to_string(),
                message: err.to_string(),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::extract::fixtures::{SheetFixture, WorkbookFixture, png};

    fn default_skip() -> Regex {
        Regex::new(r"(?i)^Sheet\d*$").unwrap()
    }

    #[test]
    fn test_extracts_images_in_drawing_order() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("Sheet1").image(png(1, 1)))
            .sheet(SheetFixture::new("KIDS").image(png(2, 2)).image(png(3, 3)))
            .build();

        let sheets = extract_sheet_images(&workbook, &default_skip()).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "KIDS");
        let indices: Vec<u32> = sheets[0].images.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![1, 2]);

        let second = image::load_from_memory(&sheets[0].images[1].png).unwrap();
        assert_eq!(second.width(), 3);
    }

    #[test]
    fn test_undecodable_image_keeps_later_positions() {
        let workbook = WorkbookFixture::new()
            .sheet(
                SheetFixture::new("ART")
                    .image(png(1, 1))
                    .image(b"not an image".to_vec())
                    .image(png(2, 2)),
            )
            .build();

        let sheets = extract_sheet_images(&workbook, &default_skip()).unwrap();
        let indices: Vec<u32> = sheets[0].images.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(sheets[0].failures, 1);
        assert!(sheets[0].error.is_none());
    }

    #[test]
    fn test_malformed_drawing_degrades_only_that_sheet() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("BROKEN").image(png(1, 1)).malformed_drawing())
            .sheet(SheetFixture::new("FINE").image(png(1, 1)))
            .build();

        let sheets = extract_sheet_images(&workbook, &default_skip()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets[0].error.is_some());
        assert!(sheets[0].images.is_empty());
        assert_eq!(sheets[1].images.len(), 1);
    }

    #[test]
    fn test_jpeg_is_converted_to_png() {
        let mut jpeg = Cursor::new(Vec::new());
        image::RgbImage::new(4, 4)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("PHOTOS").image(jpeg.into_inner()))
            .build();

        let sheets = extract_sheet_images(&workbook, &default_skip()).unwrap();
        let png = &sheets[0].images[0].png;
        assert_eq!(image::guess_format(png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_not_a_package() {
        let result = extract_sheet_images(b"plain text", &default_skip());
        assert!(matches!(result, Err(ExtractError::InvalidPackage { .. })));
    }

    #[test]
    fn test_zip_without_workbook() {
        let bytes = WorkbookFixture::zip_with(&[("readme.txt", b"hello".as_slice())]);
        let result = extract_sheet_images(&bytes, &default_skip());
        assert!(matches!(result, Err(ExtractError::InvalidPackage { .. })));
    }

    #[test]
    fn test_picture_embeds_skip_linked_pictures() {
        let xml = br#"<xdr:wsDr xmlns:xdr="x" xmlns:a="a" xmlns:r="r">
            <xdr:twoCellAnchor><xdr:pic><xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill></xdr:pic></xdr:twoCellAnchor>
            <xdr:twoCellAnchor><xdr:pic><xdr:blipFill><a:blip r:link="rId2"/></xdr:blipFill></xdr:pic></xdr:twoCellAnchor>
            <xdr:twoCellAnchor><xdr:sp><a:blip r:embed="rId3"/></xdr:sp></xdr:twoCellAnchor>
        </xdr:wsDr>"#;

        assert_eq!(picture_embeds(xml, "d.xml").unwrap(), vec!["rId1".to_string()]);
    }
}
