use log::debug;
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::error::*;
use crate::format::{format_count, format_percent};
use crate::ranking::{RankedSubset, SummaryStats};
use crate::records::{AggregateRecord, BranchRecord, MetricSet, Table};

/// The fields of a table view, by column name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ViewSpec {
    pub title: String,
    pub fields: Vec<String>,
}

impl ViewSpec {
    /// Every column, in the order of the source sheet.
    pub fn full_table(schema: &DatasetSchema, title: &str) -> ViewSpec {
        ViewSpec {
            title: title.to_string(),
            fields: schema.column_names(),
        }
    }

    /// Ranked tables put the rate right after the branch name.
    pub fn ranked(schema: &DatasetSchema, title: &str) -> ViewSpec {
        ViewSpec {
            title: title.to_string(),
            fields: vec![
                schema.sequence.clone(),
                schema.branch.clone(),
                schema.rate.clone(),
                schema.flagged.clone(),
                schema.base.clone(),
            ],
        }
    }
}

/// The fixed texts of a report.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Wording {
    pub title: String,
    pub table_title: String,
    pub total_base_label: String,
    pub total_flagged_label: String,
    pub average_label: String,
    pub top_title: String,
    pub bottom_title: String,
    pub top_chart_title: String,
    pub bottom_chart_title: String,
    pub chart_y_label: String,
    pub top_color: String,
    pub bottom_color: String,
}

impl Wording {
    pub fn for_kind(kind: DatasetKind, rank_size: usize) -> Wording {
        match kind {
            DatasetKind::AppAdoption => Wording {
                title: "BÁO CÁO ĐÁNH GIÁ KẾT QUẢ THỰC HIỆN QUA APP CSKH".to_string(),
                table_title: "Bảng dữ liệu tổng hợp".to_string(),
                total_base_label: "Tổng số khách hàng quản lý".to_string(),
                total_flagged_label: "Tổng số khách hàng đã thực hiện App".to_string(),
                average_label: "Tỷ lệ thực hiện qua App trung bình".to_string(),
                top_title: format!(
                    "Top {} điện lực tỷ lệ thực hiện qua App cao nhất",
                    rank_size
                ),
                bottom_title: format!(
                    "Top {} điện lực tỷ lệ thực hiện qua App thấp nhất",
                    rank_size
                ),
                top_chart_title: format!("Top {} tỷ lệ thực hiện qua App", rank_size),
                bottom_chart_title: format!("Bottom {} tỷ lệ thực hiện qua App", rank_size),
                chart_y_label: "Tỷ lệ thực hiện qua App (%)".to_string(),
                top_color: "royalblue".to_string(),
                bottom_color: "orange".to_string(),
            },
            DatasetKind::OnTime => Wording {
                title: "BÁO CÁO ĐÁNH GIÁ YÊU CẦU GIẢI QUYẾT ĐÚNG THỜI GIAN CAM KẾT".to_string(),
                table_title: "Bảng dữ liệu tổng hợp".to_string(),
                total_base_label: "Tổng số yêu cầu chuyển xử lý".to_string(),
                total_flagged_label: "Tổng số phiếu giải quyết trễ hạn".to_string(),
                average_label: "Tỷ lệ trễ hạn trung bình".to_string(),
                top_title: format!("Top {} điện lực tỷ lệ trễ hạn cao nhất", rank_size),
                bottom_title: format!("Top {} điện lực tỷ lệ trễ hạn thấp nhất", rank_size),
                top_chart_title: format!("Top {} tỷ lệ trễ hạn", rank_size),
                bottom_chart_title: format!("Bottom {} tỷ lệ trễ hạn", rank_size),
                chart_y_label: "Tỷ lệ trễ hạn (%)".to_string(),
                top_color: "crimson".to_string(),
                bottom_color: "goldenrod".to_string(),
            },
        }
    }
}

/// Shapes the pipeline outputs into the bundle read by display and export.
///
/// Only selects fields and converts rates for display: every number comes
/// from `stats` or from the records.
pub fn assemble<M: MetricSet>(
    settings: &ReportSettings,
    detail: &Table<M>,
    aggregate: Option<&AggregateRecord<M>>,
    top: &RankedSubset<M>,
    bottom: &RankedSubset<M>,
    stats: &SummaryStats,
) -> PipelineResult<ReportData> {
    ensure!(!top.is_empty() && !bottom.is_empty(), EmptyDatasetSnafu {});
    let schema = &settings.schema;
    let wording = Wording::for_kind(M::KIND, settings.rank_size);

    let full_spec = ViewSpec::full_table(schema, &wording.table_title);
    let mut full_rows = select_rows(&full_spec, schema, detail.records())?;
    if let Some(total) = aggregate {
        full_rows.push(select_fields(&full_spec, |name| total.field(schema, name))?);
    }
    let full_table = ReportView {
        title: full_spec.title.clone(),
        headers: full_spec.fields.clone(),
        rows: full_rows,
    };

    let summary = summary_view::<M>(&wording, stats);

    let top_view = ranked_view(
        &ViewSpec::ranked(schema, &wording.top_title),
        schema,
        top,
        top_narrative::<M>(top),
        chart(&wording.top_chart_title, &wording, &wording.top_color, top),
    )?;
    let bottom_view = ranked_view(
        &ViewSpec::ranked(schema, &wording.bottom_title),
        schema,
        bottom,
        bottom_narrative::<M>(bottom),
        chart(&wording.bottom_chart_title, &wording, &wording.bottom_color, bottom),
    )?;

    debug!(
        "assemble: {} table rows, {} top, {} bottom",
        full_table.rows.len(),
        top_view.view.rows.len(),
        bottom_view.view.rows.len()
    );
    Ok(ReportData {
        kind: M::KIND,
        title: settings.title.clone().unwrap_or(wording.title),
        full_table,
        summary,
        top: top_view,
        bottom: bottom_view,
    })
}

fn select_fields<F>(spec: &ViewSpec, lookup: F) -> PipelineResult<Vec<FieldValue>>
where
    F: Fn(&str) -> Option<FieldValue>,
{
    spec.fields
        .iter()
        .map(|name| {
            lookup(name).context(AssemblySnafu {
                view: spec.title.clone(),
                field: name.clone(),
            })
        })
        .collect()
}

fn select_rows<M: MetricSet>(
    spec: &ViewSpec,
    schema: &DatasetSchema,
    records: &[BranchRecord<M>],
) -> PipelineResult<Vec<Vec<FieldValue>>> {
    records
        .iter()
        .map(|r| select_fields(spec, |name| r.field(schema, name)))
        .collect()
}

fn ranked_view<M: MetricSet>(
    spec: &ViewSpec,
    schema: &DatasetSchema,
    subset: &RankedSubset<M>,
    narrative: String,
    chart: BarChart,
) -> PipelineResult<RankedView> {
    Ok(RankedView {
        view: ReportView {
            title: spec.title.clone(),
            headers: spec.fields.clone(),
            rows: select_rows(spec, schema, &subset.records)?,
        },
        narrative,
        chart,
    })
}

fn summary_view<M: MetricSet>(wording: &Wording, stats: &SummaryStats) -> SummaryView {
    let scale = stats.scale.unwrap_or(M::SCALE);
    let average = format_percent(stats.average, scale);
    let mut lines = vec![
        format!(
            "{}: {}",
            wording.total_base_label,
            format_count(stats.total_base)
        ),
        format!(
            "{}: {}",
            wording.total_flagged_label,
            format_count(stats.total_flagged)
        ),
        format!("{}: {}", wording.average_label, average),
    ];
    lines.push(match M::KIND {
        DatasetKind::AppAdoption => format!(
            "Tỷ lệ thực hiện qua App trung bình đạt {}. \
             Một số điện lực đạt tỷ lệ cao, cho thấy hiệu quả truyền thông và hỗ trợ khách hàng tốt. \
             Các đơn vị có tỷ lệ thấp cần tăng cường truyền thông, hỗ trợ kỹ thuật và khuyến khích khách hàng sử dụng App.",
            average
        ),
        DatasetKind::OnTime => format!(
            "Tỷ lệ trễ hạn trung bình là {}. \
             Hầu hết các điện lực duy trì tỷ lệ trễ hạn thấp, nhưng vẫn còn một số đơn vị tỷ lệ cao hơn mức trung bình.",
            average
        ),
    });
    SummaryView {
        total_base_label: wording.total_base_label.clone(),
        total_base: stats.total_base,
        total_flagged_label: wording.total_flagged_label.clone(),
        total_flagged: stats.total_flagged,
        average_label: wording.average_label.clone(),
        average_rate: stats.average,
        scale,
        lines,
    }
}

// Callers guarantee that the subsets are not empty.
fn top_narrative<M: MetricSet>(top: &RankedSubset<M>) -> String {
    let leader = &top.records[0];
    let lowest = top
        .records
        .iter()
        .map(|r| r.metrics.rate())
        .fold(f64::INFINITY, f64::min);
    let leader_rate = format_percent(leader.metrics.rate(), M::SCALE);
    let lowest_rate = format_percent(lowest, M::SCALE);
    match M::KIND {
        DatasetKind::AppAdoption => format!(
            "Điện lực {} dẫn đầu với tỷ lệ {}. Các điện lực top {} đều có tỷ lệ trên {}.",
            leader.branch_name,
            leader_rate,
            top.len(),
            lowest_rate
        ),
        DatasetKind::OnTime => format!(
            "Điện lực {} có tỷ lệ trễ hạn cao nhất ({}). Các đơn vị top {} đều có tỷ lệ trên {}.",
            leader.branch_name,
            leader_rate,
            top.len(),
            lowest_rate
        ),
    }
}

fn bottom_narrative<M: MetricSet>(bottom: &RankedSubset<M>) -> String {
    let names: Vec<&str> = bottom
        .records
        .iter()
        .map(|r| r.branch_name.as_str())
        .collect();
    match M::KIND {
        DatasetKind::AppAdoption => format!(
            "Các điện lực nhóm cuối như {} có tỷ lệ thấp hơn đáng kể, cần tập trung cải thiện.",
            names.join(", ")
        ),
        DatasetKind::OnTime => format!(
            "Các đơn vị như {} duy trì tỷ lệ rất thấp, là điểm sáng cần nhân rộng.",
            names.join(", ")
        ),
    }
}

fn chart<M: MetricSet>(
    title: &str,
    wording: &Wording,
    color: &str,
    subset: &RankedSubset<M>,
) -> BarChart {
    BarChart {
        title: title.to_string(),
        y_label: wording.chart_y_label.clone(),
        color: color.to_string(),
        bars: subset
            .records
            .iter()
            .map(|r| Bar {
                label: r.branch_name.clone(),
                value: M::SCALE.to_percent(r.metrics.rate()),
                value_label: format_percent(r.metrics.rate(), M::SCALE),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::ranking::{bottom_n, summarize, top_n};
    use crate::records::{AppAdoption, AppColumn, OnTime, OnTimeColumn};

    fn app_settings() -> ReportSettings {
        ReportSettings {
            schema: DatasetSchema::app_adoption(),
            rank_size: 3,
            title: None,
        }
    }

    fn app_table() -> Table<AppAdoption> {
        let mut builder = Builder::<AppAdoption>::new();
        builder
            .add_branch("Hải Châu", 1000, 100, 0.10)
            .add_branch("Thanh Khê", 2000, 1100, 0.55)
            .add_branch("Sơn Trà", 1000, 300, 0.30)
            .add_branch("Ngũ Hành Sơn", 1000, 900, 0.90)
            .add_branch("Liên Chiểu", 1000, 200, 0.20);
        builder.build()
    }

    fn app_report(aggregate: Option<&AggregateRecord<AppAdoption>>) -> ReportData {
        let table = app_table();
        let top = top_n(&table, AppColumn::AdoptionRate, 3);
        let bottom = bottom_n(&table, AppColumn::AdoptionRate, 3);
        let stats = summarize(&table, AppColumn::AdoptionRate).unwrap();
        assemble(&app_settings(), &table, aggregate, &top, &bottom, &stats).unwrap()
    }

    #[test]
    fn full_table_ends_with_the_total_row() {
        let total = AggregateRecord {
            sequence_number: None,
            branch_name: "Công ty Điện lực Đà Nẵng".to_string(),
            metrics: AppAdoption::from_counts(6000, 2600, 0.4333),
        };
        let report = app_report(Some(&total));
        assert_eq!(report.full_table.rows.len(), 6);
        let last = report.full_table.rows.last().unwrap();
        assert_eq!(last[0], FieldValue::Blank);
        assert_eq!(last[1], FieldValue::Text(total.branch_name.clone()));
        assert_eq!(report.full_table.headers, DatasetSchema::app_adoption().column_names());
    }

    #[test]
    fn ranked_views_and_narratives() {
        let report = app_report(None);
        assert_eq!(
            report.top.view.headers,
            vec![
                "STT",
                "Điện lực",
                "Tỷ lệ thực hiện qua App",
                "Số lượng đã thực hiện App",
                "Số lượng KH quản lý"
            ]
        );
        assert_eq!(report.top.view.rows[0][1], FieldValue::Text("Ngũ Hành Sơn".to_string()));
        assert_eq!(
            report.top.narrative,
            "Điện lực Ngũ Hành Sơn dẫn đầu với tỷ lệ 90.00%. Các điện lực top 3 đều có tỷ lệ trên 30.00%."
        );
        assert_eq!(
            report.bottom.narrative,
            "Các điện lực nhóm cuối như Hải Châu, Liên Chiểu, Sơn Trà có tỷ lệ thấp hơn đáng kể, cần tập trung cải thiện."
        );
        let labels: Vec<&str> = report.top.chart.bars.iter().map(|b| b.value_label.as_str()).collect();
        assert_eq!(labels, vec!["90.00%", "55.00%", "30.00%"]);
        assert_eq!(report.top.chart.color, "royalblue");
    }

    #[test]
    fn summary_lines_use_display_scale() {
        let report = app_report(None);
        assert_eq!(report.summary.total_base, 6000);
        assert_eq!(report.summary.lines[0], "Tổng số khách hàng quản lý: 6,000");
        assert_eq!(report.summary.lines[2], "Tỷ lệ thực hiện qua App trung bình: 41.00%");
        // The stored average stays a fraction.
        assert!((report.summary.average_rate - 0.41).abs() < 1e-12);
    }

    #[test]
    fn late_rate_is_never_rescaled() {
        let mut builder = Builder::<OnTime>::new();
        builder.add_branch("A", 200, 5, 2.5).add_branch("B", 100, 10, 10.0);
        let table = builder.build();
        let top = top_n(&table, OnTimeColumn::LateRate, 3);
        let bottom = bottom_n(&table, OnTimeColumn::LateRate, 3);
        let stats = summarize(&table, OnTimeColumn::LateRate).unwrap();
        let settings = ReportSettings {
            schema: DatasetSchema::on_time(),
            rank_size: 3,
            title: Some("Báo cáo tháng 9".to_string()),
        };
        let report = assemble(&settings, &table, None, &top, &bottom, &stats).unwrap();
        assert_eq!(report.title, "Báo cáo tháng 9");
        assert_eq!(report.summary.lines[2], "Tỷ lệ trễ hạn trung bình: 6.25%");
        assert_eq!(report.top.chart.bars[0].value, 10.0);
        assert_eq!(
            report.top.narrative,
            "Điện lực B có tỷ lệ trễ hạn cao nhất (10.00%). Các đơn vị top 2 đều có tỷ lệ trên 2.50%."
        );
    }

    #[test]
    fn unknown_field_is_an_assembly_error() {
        let table = app_table();
        let spec = ViewSpec {
            title: "Bảng".to_string(),
            fields: vec!["STT".to_string(), "Ghi chú".to_string()],
        };
        let err = select_rows(&spec, &DatasetSchema::app_adoption(), table.records()).unwrap_err();
        assert!(matches!(err, PipelineError::Assembly { ref field, .. } if field == "Ghi chú"));
    }

    #[test]
    fn empty_rankings_are_rejected() {
        let table = Builder::<AppAdoption>::new().build();
        let top = top_n(&table, AppColumn::AdoptionRate, 3);
        let stats = SummaryStats {
            rows: 0,
            total_base: 0,
            total_flagged: 0,
            average: 0.0,
            scale: None,
        };
        let err = assemble(&app_settings(), &table, None, &top, &top, &stats).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset {}));
    }
}
