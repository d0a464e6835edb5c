use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::drivers::error::ScopeError;
use crate::types::CaptureFrame;

/// Full-scale reading of the 12-bit converter.
const ADC_FULL_SCALE: f32 = 4095.0;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub grid: RGBColor,
    pub marker: RGBColor,
    pub palette: Vec<RGBColor>,
    /// Scale the y axis to the captured range instead of the full ADC span.
    pub autoscale: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            grid: RGBColor(40, 40, 40),
            marker: RGBColor(200, 200, 200),
            palette: vec![YELLOW, CYAN, MAGENTA, GREEN, RED, BLUE, WHITE],
            autoscale: false,
        }
    }
}

/// Draw every channel of a capture, with a vertical marker at the trigger
/// position and a horizontal one at the trigger threshold.
///
/// No text is rendered, so the plot needs no system fonts.
pub fn render_capture_png(frame: &CaptureFrame, style: PlotStyle) -> Result<Vec<u8>, ScopeError> {
    let len = frame.samples.first().map(Vec::len).unwrap_or(0);
    if len < 2 {
        return Err(ScopeError::Plot("capture frame has no samples".into()));
    }
    if style.width == 0 || style.height == 0 || style.palette.is_empty() {
        return Err(ScopeError::Plot("invalid plot style".into()));
    }

    let (y_min, y_max) = if style.autoscale {
        let (lo, hi) = frame
            .samples
            .iter()
            .flat_map(|c| c.iter().copied())
            .chain(std::iter::once(frame.threshold))
            .fold((u16::MAX, 0u16), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let margin = (f32::from(hi - lo) * 0.05).max(10.0);
        (f32::from(lo) - margin, f32::from(hi) + margin)
    } else {
        (0.0, ADC_FULL_SCALE)
    };
    let x_max = (len - 1) as f32;

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(0f32..x_max, y_min..y_max)?;

        // Eight divisions each way, scope style.
        let grid = style.grid;
        chart.draw_series((1..8).map(|i| {
            let x = x_max * i as f32 / 8.0;
            PathElement::new(vec![(x, y_min), (x, y_max)], &grid)
        }))?;
        chart.draw_series((1..8).map(|i| {
            let y = y_min + (y_max - y_min) * i as f32 / 8.0;
            PathElement::new(vec![(0.0, y), (x_max, y)], &grid)
        }))?;

        let marker = style.marker;
        let trigger_x = frame.trigger_position as f32;
        let threshold_y = f32::from(frame.threshold);
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(trigger_x, y_min), (trigger_x, y_max)],
            &marker,
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, threshold_y), (x_max, threshold_y)],
            &marker,
        )))?;

        for (idx, channel) in frame.samples.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            let series = channel
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f32, f32::from(*v)));
            chart.draw_series(LineSeries::new(series, &color))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
