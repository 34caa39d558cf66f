//! YOLO segmentation label files.
//!
//! One line per detection: `class_id x0 y0 x1 y1 ...` with coordinates
//! normalized to the image size.

use std::path::Path;

use crate::{
    error::{PolysegError, Result},
    types::DetectionSet,
};

/// One parsed label line
#[derive(Debug, Clone, PartialEq)]
pub struct YoloPolygon {
    pub class_id: u32,
    /// Normalized (x, y) vertices
    pub points: Vec<[f64; 2]>,
}

impl YoloPolygon {
    /// Vertices scaled to pixel coordinates
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|&[x, y]| [x * image_width as f64, y * image_height as f64])
            .collect()
    }
}

impl DetectionSet {
    /// Render detections as YOLO segmentation label lines
    pub fn to_yolo_labels(&self) -> String {
        let mut out = String::new();
        for detection in &self.detections {
            if detection.vertex_count() < 3 {
                continue;
            }
            out.push_str(&detection.class_id.to_string());
            for value in &detection.points {
                out.push_str(&format!(" {:.6}", value.clamp(0.0, 1.0)));
            }
            out.push('\n');
        }
        out
    }

    pub fn save_yolo_labels<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yolo_labels())?;
        Ok(())
    }
}

/// Parse the contents of a YOLO segmentation label file.
///
/// Blank lines are skipped. `source_name` only appears in error messages.
pub fn parse_yolo_labels(content: &str, source_name: &str) -> Result<Vec<YoloPolygon>> {
    let parse_error = |line: usize, message: String| PolysegError::Parse {
        source_name: source_name.to_string(),
        line,
        message,
    };

    let mut polygons = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let mut fields = raw.split_whitespace();
        let Some(class_field) = fields.next() else {
            continue;
        };

        let class_id: u32 = class_field
            .parse()
            .map_err(|_| parse_error(line_no, format!("invalid class id '{}'", class_field)))?;

        let values = fields
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| parse_error(line_no, format!("invalid coordinate '{}'", v)))
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.len() % 2 != 0 {
            return Err(parse_error(line_no, "odd number of coordinates".to_string()));
        }
        if values.len() < 6 {
            return Err(parse_error(line_no, "a polygon needs at least 3 vertices".to_string()));
        }

        polygons.push(YoloPolygon {
            class_id,
            points: values.chunks_exact(2).map(|p| [p[0], p[1]]).collect(),
        });
    }

    Ok(polygons)
}
