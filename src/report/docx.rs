use std::io::{Cursor, Write};

use branch_metrics::format::format_field;
use branch_metrics::{BarChart, RankedView, ReportData, ReportView};
use log::{debug, info};
use snafu::ResultExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::report::export::ChartRenderer;
use crate::report::{ReportResult, WritingDocxPartSnafu, WritingDocxSnafu};

/// Display width of the chart images: 5 inches, in English Metric Units.
pub const CHART_DISPLAY_WIDTH_EMU: u64 = 5 * 914_400;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman"/><w:sz w:val="26"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Caption"><w:name w:val="caption"/><w:basedOn w:val="Normal"/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:i/></w:rPr></w:style></w:styles>"#;

const STYLES_REL: &str = r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// The body of `word/document.xml` and the images it refers to.
struct DocxBody<'a> {
    renderer: &'a dyn ChartRenderer,
    xml: String,
    media: Vec<Vec<u8>>,
}

impl<'a> DocxBody<'a> {
    fn new(renderer: &'a dyn ChartRenderer) -> DocxBody<'a> {
        DocxBody {
            renderer,
            xml: String::with_capacity(16 * 1024),
            media: Vec::new(),
        }
    }

    fn styled(&mut self, style: &str, text: &str) {
        self.xml.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            style,
            escape_xml(text)
        ));
    }

    fn paragraph(&mut self, text: &str) {
        self.xml.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape_xml(text)
        ));
    }

    fn cell(&mut self, text: &str, bold: bool) {
        let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
        self.xml.push_str(&format!(
            r#"<w:tc><w:p><w:r>{}<w:t xml:space="preserve">{}</w:t></w:r></w:p></w:tc>"#,
            props,
            escape_xml(text)
        ));
    }

    fn table(&mut self, view: &ReportView) {
        self.xml.push_str(r#"<w:tbl><w:tblPr><w:tblW w:w="5000" w:type="pct"/><w:tblBorders>"#);
        for side in ["top", "left", "bottom", "right", "insideH", "insideV"] {
            self.xml.push_str(&format!(
                r#"<w:{} w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
                side
            ));
        }
        self.xml.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
        for _ in view.headers.iter() {
            self.xml.push_str("<w:gridCol/>");
        }
        self.xml.push_str("</w:tblGrid><w:tr>");
        for header in view.headers.iter() {
            self.cell(header, true);
        }
        self.xml.push_str("</w:tr>");
        for row in view.rows.iter() {
            self.xml.push_str("<w:tr>");
            for value in row.iter() {
                self.cell(&format_field(value), false);
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");
    }

    fn chart(&mut self, chart: &BarChart) -> ReportResult<()> {
        let rendered = self.renderer.render(chart)?;
        match rendered.size {
            Some((width, height)) if rendered.mime == "image/png" && width > 0 => {
                self.media.push(rendered.bytes);
                let index = self.media.len();
                // rId1 is the styles part.
                let r_id = format!("rId{}", index + 1);
                let cx = CHART_DISPLAY_WIDTH_EMU;
                let cy = cx * height as u64 / width as u64;
                let descr = escape_xml(&chart.title);
                self.xml.push_str(&format!(
                    r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="{index}" name="Chart {index}" descr="{descr}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="{index}" name="chart{index}.png" descr="{descr}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{r_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
                ));
            }
            _ => {
                for line in String::from_utf8_lossy(&rendered.bytes).lines() {
                    self.paragraph(line);
                }
            }
        }
        self.styled("Caption", &chart.title);
        Ok(())
    }

    fn ranked(&mut self, section: usize, ranked: &RankedView) -> ReportResult<()> {
        self.styled("Heading1", &format!("{}. {}", section, ranked.view.title));
        self.table(&ranked.view);
        self.paragraph(&ranked.narrative);
        self.chart(&ranked.chart)
    }

    fn document_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1701" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
            self.xml
        )
    }

    fn document_rels(&self) -> String {
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        rels.push_str(STYLES_REL);
        for index in 1..=self.media.len() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/chart{}.png"/>"#,
                index + 1,
                index
            ));
        }
        rels.push_str("</Relationships>");
        rels
    }
}

fn add_part(zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, bytes: &[u8]) -> ReportResult<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)
        .context(WritingDocxSnafu { part: name })?;
    zip.write_all(bytes)
        .context(WritingDocxPartSnafu { part: name })?;
    debug!("add_part: {} ({} bytes)", name, bytes.len());
    Ok(())
}

/// The report as a Word document, with the sections of the Markdown export
/// and one chart image under each ranking.
pub fn export_docx(report: &ReportData, renderer: &dyn ChartRenderer) -> ReportResult<Vec<u8>> {
    let mut body = DocxBody::new(renderer);
    body.styled("Title", &report.title);
    body.styled("Heading1", &format!("1. {}", report.full_table.title));
    body.table(&report.full_table);
    body.styled("Heading1", "2. Tổng quan");
    for line in report.summary.lines.iter() {
        body.paragraph(line);
    }
    body.ranked(3, &report.top)?;
    body.ranked(4, &report.bottom)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    add_part(&mut zip, "[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
    add_part(&mut zip, "_rels/.rels", PACKAGE_RELS.as_bytes())?;
    add_part(&mut zip, "word/document.xml", body.document_xml().as_bytes())?;
    add_part(&mut zip, "word/styles.xml", STYLES.as_bytes())?;
    add_part(
        &mut zip,
        "word/_rels/document.xml.rels",
        body.document_rels().as_bytes(),
    )?;
    for (idx, png) in body.media.iter().enumerate() {
        add_part(&mut zip, &format!("word/media/chart{}.png", idx + 1), png)?;
    }
    let bytes = zip
        .finish()
        .context(WritingDocxSnafu { part: "central directory" })?
        .into_inner();
    info!(
        "export_docx: {} charts, {} bytes",
        body.media.len(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::export::TextChartRenderer;
    use crate::report::raster::{PngChartRenderer, CHART_PIXEL_WIDTH};
    use branch_metrics::assemble::assemble;
    use branch_metrics::builder::Builder;
    use branch_metrics::ranking::{bottom_n, summarize, top_n};
    use branch_metrics::records::{OnTime, OnTimeColumn};
    use branch_metrics::{DatasetSchema, ReportSettings};
    use std::io::Read;

    fn sample_report() -> ReportData {
        let mut builder = Builder::<OnTime>::new();
        builder
            .add_branch("Hải Châu", 200, 5, 2.5)
            .add_branch("Cẩm Lệ", 80, 10, 12.5)
            .add_branch("Hòa Vang", 40, 0, 0.0)
            .add_branch("Sơn Trà & Ngũ Hành Sơn", 100, 4, 4.0);
        let table = builder.build();
        let top = top_n(&table, OnTimeColumn::LateRate, 3);
        let bottom = bottom_n(&table, OnTimeColumn::LateRate, 3);
        let stats = summarize(&table, OnTimeColumn::LateRate).unwrap();
        let settings = ReportSettings {
            schema: DatasetSchema::on_time(),
            rank_size: 3,
            title: None,
        };
        assemble(&settings, &table, None, &top, &bottom, &stats).unwrap()
    }

    fn part(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        bytes
    }

    #[test]
    fn word_document_embeds_png_charts() {
        let bytes = export_docx(&sample_report(), &PngChartRenderer::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/_rels/document.xml.rels",
            "word/media/chart1.png",
            "word/media/chart2.png",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let png = part(&mut archive, "word/media/chart1.png");
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), CHART_PIXEL_WIDTH);

        let xml = String::from_utf8(part(&mut archive, "word/document.xml")).unwrap();
        assert!(xml.contains("BÁO CÁO ĐÁNH GIÁ YÊU CẦU GIẢI QUYẾT ĐÚNG THỜI GIAN CAM KẾT"));
        assert!(xml.contains("Sơn Trà &amp; Ngũ Hành Sơn"));
        assert!(xml.contains("12.50%"));
        assert!(xml.contains(r#"r:embed="rId2""#));
        assert!(xml.contains(r#"r:embed="rId3""#));
        assert!(xml.contains(r#"<wp:extent cx="4572000" cy="2743200"/>"#));

        let rels = String::from_utf8(part(&mut archive, "word/_rels/document.xml.rels")).unwrap();
        assert!(rels.contains(r#"Id="rId3""#));
        assert!(rels.contains(r#"Target="media/chart2.png""#));
    }

    #[test]
    fn text_charts_become_paragraphs() {
        let bytes = export_docx(&sample_report(), &TextChartRenderer::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(!archive.file_names().any(|n| n.starts_with("word/media/")));
        let xml = String::from_utf8(part(&mut archive, "word/document.xml")).unwrap();
        assert!(!xml.contains("<w:drawing>"));
        assert!(xml.contains("█"));
    }
}
