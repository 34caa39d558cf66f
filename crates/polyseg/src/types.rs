use geo_types::{Coord, LineString, Polygon};
use image::{GrayImage, ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{PolysegError, Result};

/// How the values of a [`Mask`] should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    /// Any non-zero value is foreground
    Binary,
    /// Values in [0, 1]; foreground iff value > threshold
    Probability,
}

/// Per-pixel prediction grid produced by an external model
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
    kind: MaskKind,
}

impl Mask {
    /// Create a probability mask from row-major values
    pub fn from_probabilities(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        Self::new(width, height, data, MaskKind::Probability)
    }

    /// Create a binary mask from row-major flags
    pub fn from_binary(width: u32, height: u32, data: Vec<bool>) -> Result<Self> {
        let data = data.into_iter().map(|v| if v { 1.0 } else { 0.0 }).collect();
        Self::new(width, height, data, MaskKind::Binary)
    }

    /// Create a mask from an 8-bit grey image, scaling values to [0, 1]
    pub fn from_gray_image(image: &GrayImage, kind: MaskKind) -> Self {
        let data = image.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
            kind,
        }
    }

    /// Create a mask from a floating point luma image (already in [0, 1])
    pub fn from_luma32f(image: &ImageBuffer<Luma<f32>, Vec<f32>>, kind: MaskKind) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
            kind,
        }
    }

    fn new(width: u32, height: u32, data: Vec<f32>, kind: MaskKind) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PolysegError::InvalidMask(format!(
                "expected {} values for a {}x{} mask, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PolysegError::InvalidMask("mask contains non-finite values".to_string()));
        }
        Ok(Self { width, height, data, kind })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn kind(&self) -> MaskKind {
        self.kind
    }

    /// Value at (x, y); 0.0 outside the grid
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Whether a pixel value counts as foreground for this mask kind
    pub fn is_foreground(&self, value: f32, threshold: f32) -> bool {
        match self.kind {
            MaskKind::Binary => value != 0.0,
            MaskKind::Probability => value > threshold,
        }
    }

    /// Number of foreground pixels at the given threshold
    pub fn foreground_count(&self, threshold: f32) -> usize {
        self.data
            .iter()
            .filter(|&&v| self.is_foreground(v, threshold))
            .count()
    }

    /// Binarize into a 0/255 grey image suitable for contour tracing
    pub fn binarize(&self, threshold: f32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.is_foreground(self.get(x, y), threshold) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

/// Closed boundary of a connected mask region, in pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<[f64; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closed ring as a geo-types LineString (first point repeated at the end)
    pub fn to_closed_linestring(&self) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = self.points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if coords.len() > 1 && first != last {
                coords.push(first);
            }
        }
        LineString::new(coords)
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        Polygon::new(self.to_closed_linestring(), vec![])
    }

    /// Enclosed area (shoelace formula)
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Perimeter of the closed contour
    pub fn arc_length(&self) -> f64 {
        use geo::EuclideanLength;
        self.to_closed_linestring().euclidean_length()
    }

    /// Get the bounding box of the contour
    pub fn bounding_box(&self) -> Option<([f64; 2], [f64; 2])> {
        if self.points.is_empty() {
            return None;
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &[x, y] in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Some(([min_x, min_y], [max_x, max_y]))
    }
}

/// One emitted (class, confidence, polygon) record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct Detection {
    /// Class index reported by the model
    pub class_id: u32,
    /// Optional class name, matched by the host before the index
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Flat normalized coordinates [x0, y0, x1, y1, ...]
    pub points: Vec<f64>,
}

impl Detection {
    pub fn vertex_count(&self) -> usize {
        self.points.len() / 2
    }

    /// Normalized vertices as (x, y) pairs
    pub fn vertices(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.points.chunks_exact(2).map(|p| [p[0], p[1]])
    }

    /// Vertices scaled back to pixel coordinates
    pub fn to_pixel_points(&self, image_width: u32, image_height: u32) -> Vec<[f64; 2]> {
        self.vertices()
            .map(|[x, y]| [x * image_width as f64, y * image_height as f64])
            .collect()
    }
}

/// Detections of a single pass together with the source image size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionSet {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            detections: Vec::new(),
            image_width,
            image_height,
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn into_response(self) -> DetectionResponse {
        DetectionResponse::success(self.detections)
    }
}

/// JSON envelope handed back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct DetectionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResponse {
    pub fn success(detections: Vec<Detection>) -> Self {
        Self {
            success: true,
            detections: Some(detections),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            detections: None,
            error: Some(message.into()),
        }
    }

    /// Detections of a successful response; empty for failures
    pub fn detections(&self) -> &[Detection] {
        self.detections.as_deref().unwrap_or(&[])
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_length_is_checked() {
        let err = Mask::from_probabilities(4, 4, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, PolysegError::InvalidMask(_)));
    }

    #[test]
    fn test_binarize_probability_is_strict() {
        let mask = Mask::from_probabilities(3, 1, vec![0.4, 0.5, 0.6]).unwrap();
        let binary = mask.binarize(0.5);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(1, 0)[0], 0);
        assert_eq!(binary.get_pixel(2, 0)[0], 255);
        assert_eq!(mask.foreground_count(0.5), 1);
    }

    #[test]
    fn test_gray_image_scales_to_unit_range() {
        let image = GrayImage::from_fn(3, 1, |x, _| Luma([[0u8, 51, 255][x as usize]]));
        let mask = Mask::from_gray_image(&image, MaskKind::Probability);
        assert_eq!(mask.get(0, 0), 0.0);
        assert!((mask.get(1, 0) - 0.2).abs() < 1e-6);
        assert_eq!(mask.get(2, 0), 1.0);
        assert_eq!(mask.foreground_count(0.5), 1);
    }

    #[test]
    fn test_binary_mask_ignores_threshold() {
        let mask = Mask::from_binary(2, 1, vec![true, false]).unwrap();
        assert_eq!(mask.foreground_count(0.99), 1);
    }

    #[test]
    fn test_contour_geometry() {
        let contour = Contour::new(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]);
        assert!((contour.area() - 100.0).abs() < 1e-9);
        assert!((contour.arc_length() - 40.0).abs() < 1e-9);
        assert_eq!(contour.bounding_box(), Some(([0.0, 0.0], [10.0, 10.0])));
    }

    #[test]
    fn test_response_shapes() {
        let ok = DetectionResponse::success(vec![]);
        let json: serde_json::Value = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "detections": [] }));

        let failed = DetectionResponse::failure("Could not load image: a.png");
        let json: serde_json::Value = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Could not load image: a.png" })
        );
        assert!(failed.detections().is_empty());
    }

    #[test]
    fn test_detection_class_name_serialized_as_class() {
        let detection = Detection {
            class_id: 2,
            class_name: Some("car".to_string()),
            confidence: 0.9,
            points: vec![0.1, 0.1, 0.2, 0.1, 0.2, 0.2],
        };
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["class"], "car");
        assert_eq!(detection.vertex_count(), 3);
        assert_eq!(detection.to_pixel_points(10, 10)[1], [2.0, 1.0]);
    }
}
