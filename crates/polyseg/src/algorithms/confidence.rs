use image::{GrayImage, Luma};
use imageproc::{
    drawing::{draw_hollow_polygon_mut, draw_line_segment_mut, draw_polygon_mut},
    point::Point,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PolysegError, Result},
    types::{Contour, Mask},
};

/// How a detection's confidence is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    /// Per-instance score reported by the model, passed through unchanged
    Upstream,
    /// Mean mask value over the filled contour region
    MeanProbability,
}

/// Confidence input for a single extraction call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfidenceSource {
    Upstream(f32),
    MeanProbability,
}

impl ConfidenceSource {
    /// Resolve a mode against an optional upstream score.
    ///
    /// Upstream mode without a score falls back to the mask mean.
    pub fn resolve(mode: ConfidenceMode, score: Option<f32>) -> Self {
        match (mode, score) {
            (ConfidenceMode::Upstream, Some(score)) => Self::Upstream(score),
            _ => Self::MeanProbability,
        }
    }

    /// Upstream scores must already be confidences in [0, 1]
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Upstream(score) => check_score(score),
            Self::MeanProbability => Ok(()),
        }
    }

    pub fn score(&self, mask: &Mask, contour: &Contour) -> f64 {
        match *self {
            Self::Upstream(score) => score as f64,
            Self::MeanProbability => mean_probability(mask, contour),
        }
    }
}

/// Reject model scores that are not a finite value in [0, 1]
pub fn check_score(score: f32) -> Result<()> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(PolysegError::InvalidMask(format!(
            "instance score must be within [0, 1], got {}",
            score
        )));
    }
    Ok(())
}

/// Mean mask value over every pixel inside or on the contour.
///
/// The contour is filled once into a scratch image covering its bounding box.
pub fn mean_probability(mask: &Mask, contour: &Contour) -> f64 {
    let Some((min, max)) = contour.bounding_box() else {
        return 0.0;
    };
    if mask.width() == 0 || mask.height() == 0 {
        return 0.0;
    }

    let x_start = min[0].floor().max(0.0) as u32;
    let y_start = min[1].floor().max(0.0) as u32;
    let x_end = (max[0].ceil().max(0.0) as u32).min(mask.width() - 1);
    let y_end = (max[1].ceil().max(0.0) as u32).min(mask.height() - 1);
    if x_start > x_end || y_start > y_end {
        return 0.0;
    }

    let region = rasterize(contour, x_start, y_start, x_end - x_start + 1, y_end - y_start + 1);

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (x, y, pixel) in region.enumerate_pixels() {
        if pixel[0] != 0 {
            sum += mask.get(x + x_start, y + y_start) as f64;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }

    sum / count as f64
}

/// Filled contour, boundary included, on a `width` x `height` canvas at the given offset
fn rasterize(contour: &Contour, x_offset: u32, y_offset: u32, width: u32, height: u32) -> GrayImage {
    let on = Luma([255u8]);
    let mut region = GrayImage::new(width, height);

    let mut points: Vec<Point<i32>> = contour
        .points
        .iter()
        .map(|&[x, y]| Point::new(x.round() as i32 - x_offset as i32, y.round() as i32 - y_offset as i32))
        .collect();
    points.dedup();
    // draw_polygon_mut rejects explicitly closed rings
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    if points.len() >= 3 {
        draw_polygon_mut(&mut region, &points, on);
        let outline: Vec<Point<f32>> = points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect();
        draw_hollow_polygon_mut(&mut region, &outline, on);
    } else {
        if let [a, b] = points[..] {
            draw_line_segment_mut(&mut region, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), on);
        }
        for p in &points {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                region.put_pixel(p.x as u32, p.y as u32, on);
            }
        }
    }

    region
}
