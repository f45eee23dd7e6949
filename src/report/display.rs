use branch_metrics::format::format_field;
use branch_metrics::{RankedView, ReportData, ReportView};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::report::export::{render_text_chart, CHART_WIDTH};

/// A view as a markdown-styled table.
pub fn view_to_table(view: &ReportView) -> String {
    let mut builder = Builder::default();
    builder.push_record(view.headers.iter().cloned());
    for row in view.rows.iter() {
        builder.push_record(row.iter().map(format_field));
    }
    builder.build().with(Style::markdown()).to_string()
}

fn ranked_to_console(out: &mut Vec<String>, ranked: &RankedView) {
    out.push(ranked.view.title.clone());
    out.push(view_to_table(&ranked.view));
    out.push(ranked.narrative.clone());
    out.push(render_text_chart(&ranked.chart, CHART_WIDTH));
}

/// The whole report as console text.
pub fn report_to_console(report: &ReportData) -> String {
    let mut out: Vec<String> = vec![
        report.title.clone(),
        report.full_table.title.clone(),
        view_to_table(&report.full_table),
    ];
    out.extend(report.summary.lines.iter().cloned());
    ranked_to_console(&mut out, &report.top);
    ranked_to_console(&mut out, &report.bottom);
    out.join("\n\n")
}
