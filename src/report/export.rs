use branch_metrics::format::{format_count, format_field, format_number, format_percent};
use branch_metrics::{BarChart, DatasetKind, FieldValue, RankedView, ReportData, ReportView};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::report::ReportResult;

/// Width of the longest bar, in columns.
pub const CHART_WIDTH: usize = 50;

/// A chart ready to be embedded in a document.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RenderedChart {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// Width and height in pixels, for images.
    pub size: Option<(u32, u32)>,
}

/// Turns a bar chart description into something a document can embed.
pub trait ChartRenderer {
    fn render(&self, chart: &BarChart) -> ReportResult<RenderedChart>;
}

/// Draws charts as text bars.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TextChartRenderer {
    pub width: usize,
}

impl Default for TextChartRenderer {
    fn default() -> Self {
        TextChartRenderer { width: CHART_WIDTH }
    }
}

impl ChartRenderer for TextChartRenderer {
    fn render(&self, chart: &BarChart) -> ReportResult<RenderedChart> {
        Ok(RenderedChart {
            bytes: render_text_chart(chart, self.width).into_bytes(),
            mime: "text/plain".to_string(),
            size: None,
        })
    }
}

/// Bars are scaled against the largest value of the chart.
pub fn render_text_chart(chart: &BarChart, width: usize) -> String {
    let max = chart.bars.iter().map(|b| b.value).fold(0.0, f64::max);
    let label_width = chart
        .bars
        .iter()
        .map(|b| b.label.chars().count())
        .max()
        .unwrap_or(0);
    let mut lines = vec![
        chart.title.clone(),
        format!("{} (max {})", chart.y_label, format_number(max)),
    ];
    for bar in chart.bars.iter() {
        let len = if max > 0.0 {
            ((bar.value / max) * width as f64).round() as usize
        } else {
            0
        };
        let padding = label_width - bar.label.chars().count();
        lines.push(format!(
            "{}{} | {} {}",
            bar.label,
            " ".repeat(padding),
            "█".repeat(len),
            bar.value_label
        ));
    }
    lines.join("\n")
}

fn view_to_markdown(view: &ReportView) -> String {
    let mut lines = vec![
        format!("| {} |", view.headers.join(" | ")),
        format!("|{}", "---|".repeat(view.headers.len())),
    ];
    for row in view.rows.iter() {
        let cells: Vec<String> = row.iter().map(format_field).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

fn chart_to_markdown(chart: &BarChart, renderer: &dyn ChartRenderer) -> ReportResult<String> {
    let rendered = renderer.render(chart)?;
    if rendered.mime.starts_with("text/") {
        Ok(format!("```\n{}\n```", String::from_utf8_lossy(&rendered.bytes)))
    } else {
        // Binary charts cannot be inlined: only the title is kept.
        Ok(format!("*{}* ({}, {} bytes)", chart.title, rendered.mime, rendered.bytes.len()))
    }
}

fn ranked_to_markdown(
    section: usize,
    ranked: &RankedView,
    renderer: &dyn ChartRenderer,
) -> ReportResult<Vec<String>> {
    Ok(vec![
        format!("## {}. {}", section, ranked.view.title),
        view_to_markdown(&ranked.view),
        ranked.narrative.clone(),
        chart_to_markdown(&ranked.chart, renderer)?,
    ])
}

/// The report as a Markdown document, with the layout of the paper reports:
/// data table, overview, top branches, bottom branches.
pub fn export_markdown(
    report: &ReportData,
    renderer: &dyn ChartRenderer,
) -> ReportResult<String> {
    let mut parts: Vec<String> = vec![
        format!("# {}", report.title),
        format!("## 1. {}", report.full_table.title),
        view_to_markdown(&report.full_table),
        "## 2. Tổng quan".to_string(),
    ];
    parts.extend(report.summary.lines.iter().cloned());
    parts.extend(ranked_to_markdown(3, &report.top, renderer)?);
    parts.extend(ranked_to_markdown(4, &report.bottom, renderer)?);
    let mut doc = parts.join("\n\n");
    doc.push('\n');
    Ok(doc)
}

fn field_to_json(value: &FieldValue) -> JSValue {
    match value {
        FieldValue::Blank => JSValue::Null,
        FieldValue::Text(s) => json!(s),
        FieldValue::Int(i) => json!(i),
        FieldValue::Count(c) => json!(c),
        // Rates keep their source scale.
        FieldValue::Rate { value, .. } => json!(value),
    }
}

fn view_to_json(view: &ReportView) -> JSValue {
    let rows: Vec<JSValue> = view
        .rows
        .iter()
        .map(|row| {
            let mut obj: JSMap<String, JSValue> = JSMap::new();
            for (name, value) in view.headers.iter().zip(row.iter()) {
                obj.insert(name.clone(), field_to_json(value));
            }
            JSValue::Object(obj)
        })
        .collect();
    json!({ "title": view.title, "rows": rows })
}

fn ranked_to_json(ranked: &RankedView) -> JSValue {
    let records: Vec<JSValue> = ranked
        .chart
        .bars
        .iter()
        .map(|bar| {
            json!({
                "branch": bar.label,
                "ratePercent": bar.value,
                "rateLabel": bar.value_label,
            })
        })
        .collect();
    json!({
        "table": view_to_json(&ranked.view),
        "records": records,
        "narrative": ranked.narrative,
    })
}

/// A machine-readable summary of the report.
pub fn report_to_json(report: &ReportData) -> JSValue {
    let summary = &report.summary;
    let dataset = match report.kind {
        DatasetKind::AppAdoption => "app",
        DatasetKind::OnTime => "ontime",
    };
    json!({
        "dataset": dataset,
        "title": report.title,
        "table": view_to_json(&report.full_table),
        "summary": {
            "totalBase": summary.total_base,
            "totalBaseLabel": format_count(summary.total_base),
            "totalFlagged": summary.total_flagged,
            "totalFlaggedLabel": format_count(summary.total_flagged),
            "averageRate": summary.average_rate,
            "averageRateLabel": format_percent(summary.average_rate, summary.scale),
            "lines": summary.lines,
        },
        "top": ranked_to_json(&report.top),
        "bottom": ranked_to_json(&report.bottom),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use branch_metrics::assemble::assemble;
    use branch_metrics::builder::Builder;
    use branch_metrics::ranking::{bottom_n, summarize, top_n};
    use branch_metrics::records::{AppAdoption, AppColumn};
    use branch_metrics::{generate_report, Bar, DatasetSchema, LoadedSheet, RawTable, ReportSettings};

    fn chart(values: &[(&str, f64)]) -> BarChart {
        BarChart {
            title: "Top 3".to_string(),
            y_label: "Tỷ lệ (%)".to_string(),
            color: "royalblue".to_string(),
            bars: values
                .iter()
                .map(|(label, value)| Bar {
                    label: label.to_string(),
                    value: *value,
                    value_label: format!("{:.2}%", value),
                })
                .collect(),
        }
    }

    fn sample_report() -> ReportData {
        let mut builder = Builder::<AppAdoption>::new();
        builder
            .add_branch("Hải Châu", 1000, 100, 0.10)
            .add_branch("Thanh Khê", 2000, 1100, 0.55)
            .add_branch("Sơn Trà", 1000, 300, 0.30)
            .add_branch("Ngũ Hành Sơn", 1000, 900, 0.90);
        let table = builder.build();
        let top = top_n(&table, AppColumn::AdoptionRate, 3);
        let bottom = bottom_n(&table, AppColumn::AdoptionRate, 3);
        let stats = summarize(&table, AppColumn::AdoptionRate).unwrap();
        let settings = ReportSettings {
            schema: DatasetSchema::app_adoption(),
            rank_size: 3,
            title: None,
        };
        assemble(&settings, &table, None, &top, &bottom, &stats).unwrap()
    }

    #[test]
    fn text_bars_scale_to_width() {
        let text = render_text_chart(&chart(&[("A", 90.0), ("Bb", 45.0), ("C", 0.0)]), 10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Top 3");
        assert_eq!(lines[1], "Tỷ lệ (%) (max 90)");
        assert_eq!(lines[2], "A  | ██████████ 90.00%");
        assert_eq!(lines[3], "Bb | █████ 45.00%");
        assert_eq!(lines[4], "C  |  0.00%");
    }

    #[test]
    fn renderer_output_is_fenced() {
        let md =
            chart_to_markdown(&chart(&[("A", 12.5)]), &TextChartRenderer::default()).unwrap();
        assert!(md.starts_with("```\nTop 3\n"));
        assert!(md.ends_with("12.50%\n```"));
    }

    struct PngStub;

    impl ChartRenderer for PngStub {
        fn render(&self, _chart: &BarChart) -> ReportResult<RenderedChart> {
            Ok(RenderedChart {
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
                mime: "image/png".to_string(),
                size: Some((1, 1)),
            })
        }
    }

    #[test]
    fn markdown_sections() {
        let md = export_markdown(&sample_report(), &PngStub).unwrap();
        let headings: Vec<&str> = md.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(
            headings,
            vec![
                "# BÁO CÁO ĐÁNH GIÁ KẾT QUẢ THỰC HIỆN QUA APP CSKH",
                "## 1. Bảng dữ liệu tổng hợp",
                "## 2. Tổng quan",
                "## 3. Top 3 điện lực tỷ lệ thực hiện qua App cao nhất",
                "## 4. Top 3 điện lực tỷ lệ thực hiện qua App thấp nhất",
            ]
        );
        assert!(md.contains("| 4 | Ngũ Hành Sơn | 1000 | 900 | 90.00% |"));
        assert!(md.contains("Tổng số khách hàng quản lý: 5,000"));
        assert!(md.contains("(image/png, 4 bytes)"));
    }

    #[test]
    fn json_keeps_source_scale() {
        let js = report_to_json(&sample_report());
        assert_eq!(js["dataset"], "app");
        assert_eq!(js["summary"]["totalBase"], 5000);
        assert_eq!(js["summary"]["totalBaseLabel"], "5,000");
        assert_eq!(js["summary"]["averageRateLabel"], "46.25%");
        assert_eq!(js["top"]["records"][0]["branch"], "Ngũ Hành Sơn");
        assert_eq!(js["top"]["table"]["rows"][0]["Tỷ lệ thực hiện qua App"], 0.9);
        assert_eq!(js["table"]["rows"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn empty_sheet_has_no_report() {
        let sheet = LoadedSheet {
            detail: RawTable {
                header_line: 3,
                columns: DatasetSchema::app_adoption().column_names(),
                rows: vec![],
            },
            aggregate: None,
        };
        let settings = ReportSettings {
            schema: DatasetSchema::app_adoption(),
            rank_size: 3,
            title: None,
        };
        assert!(generate_report(DatasetKind::AppAdoption, settings, sheet).is_err());
    }
}
