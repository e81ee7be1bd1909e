//! In-memory xlsx packages for tests.

use std::io::{Cursor, Write};

use image::{ImageFormat, RgbaImage};
use quick_xml::escape::escape;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_XDR: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

/// A solid `width` x `height` PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[derive(Debug, Clone, Default)]
pub struct SheetFixture {
    name: String,
    images: Vec<Vec<u8>>,
    shapes: usize,
    charts: usize,
    unknown_cells: usize,
    unknown_shared: usize,
    malformed_drawing: bool,
}

impl SheetFixture {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn image(mut self, bytes: Vec<u8>) -> Self {
        self.images.push(bytes);
        self
    }

    pub fn shape(mut self) -> Self {
        self.shapes += 1;
        self
    }

    pub fn chart(mut self) -> Self {
        self.charts += 1;
        self
    }

    pub fn unknown_error_cell(mut self) -> Self {
        self.unknown_cells += 1;
        self
    }

    pub fn unknown_shared_string(mut self) -> Self {
        self.unknown_shared += 1;
        self
    }

    pub fn malformed_drawing(mut self) -> Self {
        self.malformed_drawing = true;
        self
    }

    fn has_drawing(&self) -> bool {
        !self.images.is_empty() || self.shapes > 0 || self.charts > 0 || self.malformed_drawing
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookFixture {
    sheets: Vec<SheetFixture>,
    orphans: Vec<(String, Vec<u8>)>,
}

impl WorkbookFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, sheet: SheetFixture) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn orphan_media(mut self, part: &str, bytes: Vec<u8>) -> Self {
        self.orphans.push((part.to_string(), bytes));
        self
    }

    /// A zip holding exactly `entries`.
    pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
        let mut media_counter = 0usize;

        let mut sheet_list = String::new();
        let mut workbook_rels = String::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            sheet_list.push_str(&format!(
                r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
                escape(sheet.name.as_str())
            ));
            workbook_rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL_WORKSHEET}" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }
        let shared_count: usize = self.sheets.iter().map(|s| s.unknown_shared).sum();
        if shared_count > 0 {
            workbook_rels.push_str(&format!(
                r#"<Relationship Id="rIdStrings" Type="{REL_SHARED_STRINGS}" Target="sharedStrings.xml"/>"#
            ));
            parts.push((
                "xl/sharedStrings.xml".to_string(),
                format!(
                    r#"<sst xmlns="{NS_MAIN}" count="2" uniqueCount="2"><si><t>hello</t></si><si><t>#UNKNOWN!</t></si></sst>"#
                )
                .into_bytes(),
            ));
        }

        parts.push((
            "[Content_Types].xml".to_string(),
            br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="png" ContentType="image/png"/><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_vec(),
        ));
        parts.push((
            "xl/workbook.xml".to_string(),
            format!(
                r#"<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets>{sheet_list}</sheets></workbook>"#
            )
            .into_bytes(),
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(r#"<Relationships xmlns="{NS_PKG_REL}">{workbook_rels}</Relationships>"#)
                .into_bytes(),
        ));

        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            let mut cells = String::new();
            let mut row = 0usize;
            for _ in 0..sheet.unknown_cells {
                row += 1;
                cells.push_str(&format!(
                    r#"<row r="{row}"><c r="A{row}" t="e"><v>#UNKNOWN!</v></c></row>"#
                ));
            }
            for _ in 0..sheet.unknown_shared {
                row += 1;
                cells.push_str(&format!(
                    r#"<row r="{row}"><c r="A{row}" t="s"><v>1</v></c><c r="B{row}" t="s"><v>0</v></c></row>"#
                ));
            }
            let drawing_ref = if sheet.has_drawing() {
                r#"<drawing r:id="rId1"/>"#
            } else {
                ""
            };
            parts.push((
                format!("xl/worksheets/sheet{n}.xml"),
                format!(
                    r#"<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheetData>{cells}</sheetData>{drawing_ref}</worksheet>"#
                )
                .into_bytes(),
            ));

            if !sheet.has_drawing() {
                continue;
            }
            parts.push((
                format!("xl/worksheets/_rels/sheet{n}.xml.rels"),
                format!(
                    r#"<Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{REL_DRAWING}" Target="../drawings/drawing{n}.xml"/></Relationships>"#
                )
                .into_bytes(),
            ));

            let mut anchors = String::new();
            let mut drawing_rels = String::new();
            for (j, bytes) in sheet.images.iter().enumerate() {
                let id = j + 1;
                media_counter += 1;
                anchors.push_str(&format!(
                    r#"<xdr:twoCellAnchor><xdr:from><xdr:col>0</xdr:col><xdr:row>{j}</xdr:row></xdr:from><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{id}" name="Picture {id}"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId{id}"/></xdr:blipFill><xdr:spPr/></xdr:pic><xdr:clientData/></xdr:twoCellAnchor>"#
                ));
                drawing_rels.push_str(&format!(
                    r#"<Relationship Id="rId{id}" Type="{REL_IMAGE}" Target="../media/image{media_counter}.png"/>"#
                ));
                parts.push((format!("xl/media/image{media_counter}.png"), bytes.clone()));
            }
            for _ in 0..sheet.shapes {
                anchors.push_str(
                    r#"<xdr:twoCellAnchor><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="90" name="Shape"/><xdr:cNvSpPr/></xdr:nvSpPr><xdr:spPr/></xdr:sp><xdr:clientData/></xdr:twoCellAnchor>"#,
                );
            }
            for _ in 0..sheet.charts {
                anchors.push_str(
                    r#"<xdr:twoCellAnchor><xdr:graphicFrame><xdr:nvGraphicFramePr><xdr:cNvPr id="91" name="Chart"/><xdr:cNvGraphicFramePr/></xdr:nvGraphicFramePr><a:graphic><a:graphicData uri="chart"/></a:graphic></xdr:graphicFrame><xdr:clientData/></xdr:twoCellAnchor>"#,
                );
            }

            let drawing = if sheet.malformed_drawing {
                format!(r#"<xdr:wsDr xmlns:xdr="{NS_XDR}"><xdr:twoCellAnchor><xdr:pic></xdr:wsDr>"#)
            } else {
                format!(
                    r#"<xdr:wsDr xmlns:xdr="{NS_XDR}" xmlns:a="{NS_A}" xmlns:r="{NS_REL}">{anchors}</xdr:wsDr>"#
                )
            };
            parts.push((format!("xl/drawings/drawing{n}.xml"), drawing.into_bytes()));
            parts.push((
                format!("xl/drawings/_rels/drawing{n}.xml.rels"),
                format!(r#"<Relationships xmlns="{NS_PKG_REL}">{drawing_rels}</Relationships>"#)
                    .into_bytes(),
            ));
        }

        parts.extend(self.orphans.iter().cloned());

        let entries: Vec<(&str, &[u8])> = parts
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
            .collect();
        Self::zip_with(&entries)
    }
}
