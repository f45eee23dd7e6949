use std::io::Cursor;

use branch_metrics::BarChart;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};
use log::debug;
use snafu::ResultExt;

use crate::report::export::{ChartRenderer, RenderedChart};
use crate::report::{EncodingChartSnafu, ReportResult};

/// Size of the chart images, in pixels.
pub const CHART_PIXEL_WIDTH: u32 = 600;
pub const CHART_PIXEL_HEIGHT: u32 = 360;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([64, 64, 64, 255]);
const GRID: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Draws charts as PNG images of a fixed size.
///
/// No text is drawn: the labels and values are in the ranked table printed
/// next to the chart.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PngChartRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for PngChartRenderer {
    fn default() -> Self {
        PngChartRenderer {
            width: CHART_PIXEL_WIDTH,
            height: CHART_PIXEL_HEIGHT,
        }
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, chart: &BarChart) -> ReportResult<RenderedChart> {
        let img = draw_bars(chart, self.width, self.height);
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, ImageFormat::Png)
            .context(EncodingChartSnafu {
                title: chart.title.clone(),
            })?;
        let bytes = buffer.into_inner();
        debug!("render: chart {:?}, {} bytes", chart.title, bytes.len());
        Ok(RenderedChart {
            bytes,
            mime: "image/png".to_string(),
            size: Some((self.width, self.height)),
        })
    }
}

/// The colour names used by the report wordings.
pub fn color_of(name: &str) -> Rgba<u8> {
    match name.trim().to_lowercase().as_str() {
        "royalblue" => Rgba([65, 105, 225, 255]),
        "orange" => Rgba([255, 165, 0, 255]),
        "crimson" => Rgba([220, 20, 60, 255]),
        "goldenrod" => Rgba([218, 165, 32, 255]),
        _ => Rgba([128, 128, 128, 255]),
    }
}

fn fill(img: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    for x in x0..x1.min(img.width()) {
        for y in y0..y1.min(img.height()) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Vertical bars scaled against the largest value, in source order.
fn draw_bars(chart: &BarChart, width: u32, height: u32) -> RgbaImage {
    let mut img = ImageBuffer::from_pixel(width, height, BACKGROUND);
    let left = width / 10;
    let right = width - width / 20;
    let top = height / 10;
    let bottom = height - height / 8;
    let plot_height = bottom.saturating_sub(top);

    for step in 1..=4 {
        let y = bottom.saturating_sub(plot_height * step / 4);
        fill(&mut img, left, y, right, y + 1, GRID);
    }

    let max = chart.bars.iter().map(|b| b.value).fold(0.0, f64::max);
    let count = chart.bars.len() as u32;
    if count > 0 && max > 0.0 {
        let slot = right.saturating_sub(left) / count;
        let bar_width = (slot * 3 / 5).max(1);
        let color = color_of(&chart.color);
        for (idx, bar) in chart.bars.iter().enumerate() {
            let bar_height = ((bar.value.max(0.0) / max) * plot_height as f64).round() as u32;
            let x0 = left + slot * idx as u32 + slot.saturating_sub(bar_width) / 2;
            fill(
                &mut img,
                x0,
                bottom - bar_height.min(plot_height),
                x0 + bar_width,
                bottom,
                color,
            );
        }
    }

    fill(&mut img, left, bottom, right, bottom + 2, AXIS);
    fill(&mut img, left, top, left + 2, bottom, AXIS);
    img
}
