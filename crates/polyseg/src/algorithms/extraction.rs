use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use crate::{error::Result, traits::ContourExtractor, types::Contour};

/// Imageproc-based tracer keeping only outermost boundaries.
///
/// Holes and anything nested inside a hole are dropped. With
/// `compress_chains` set, straight horizontal, vertical and diagonal runs
/// are reduced to their end points.
#[derive(Debug, Clone)]
pub struct ExternalContourExtractor {
    pub compress_chains: bool,
}

impl Default for ExternalContourExtractor {
    fn default() -> Self {
        Self { compress_chains: true }
    }
}

impl ContourExtractor for ExternalContourExtractor {
    fn extract_contours(&self, binary_image: &GrayImage) -> Result<Vec<Contour>> {
        let contours = find_contours::<i32>(binary_image);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .map(|contour| {
                let points: Vec<[i32; 2]> = contour.points.iter().map(|p| [p.x, p.y]).collect();
                let points = if self.compress_chains {
                    compress_chain(&points)
                } else {
                    points
                };
                Contour::new(points.iter().map(|&[x, y]| [x as f64, y as f64]).collect())
            })
            .collect();

        Ok(result)
    }
}

/// Drop every point whose incoming and outgoing steps are identical
fn compress_chain(points: &[[i32; 2]]) -> Vec<[i32; 2]> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    points
        .iter()
        .enumerate()
        .filter(|&(i, p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let step_in = [p[0] - prev[0], p[1] - prev[1]];
            let step_out = [next[0] - p[0], next[1] - p[1]];
            step_in != step_out
        })
        .map(|(_, p)| *p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
        img
    }

    #[test]
    fn test_rectangle_compresses_to_corners() {
        let img = filled_rect(40, 40, 5, 8, 20, 10);
        let contours = ExternalContourExtractor::default().extract_contours(&img).unwrap();
        assert_eq!(contours.len(), 1);

        let mut corners = contours[0].points.clone();
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(
            corners,
            vec![[5.0, 8.0], [5.0, 17.0], [24.0, 8.0], [24.0, 17.0]]
        );
    }

    #[test]
    fn test_uncompressed_contour_keeps_every_boundary_pixel() {
        let img = filled_rect(20, 20, 2, 2, 5, 5);
        let extractor = ExternalContourExtractor { compress_chains: false };
        let contours = extractor.extract_contours(&img).unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 16);
    }

    #[test]
    fn test_holes_and_islands_are_not_external() {
        // Ring with an island inside the hole
        let mut img = filled_rect(60, 60, 5, 5, 50, 50);
        for y in 15..45 {
            for x in 15..45 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
        for y in 25..35 {
            for x in 25..35 {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }

        let contours = ExternalContourExtractor::default().extract_contours(&img).unwrap();
        assert_eq!(contours.len(), 1);
        let (min, max) = contours[0].bounding_box().unwrap();
        assert_eq!(min, [5.0, 5.0]);
        assert_eq!(max, [54.0, 54.0]);
    }

    #[test]
    fn test_separate_components() {
        let mut img = filled_rect(100, 50, 5, 5, 20, 20);
        for y in 10..40 {
            for x in 60..90 {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
        let contours = ExternalContourExtractor::default().extract_contours(&img).unwrap();
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn test_empty_image_has_no_contours() {
        let img = GrayImage::new(30, 30);
        let contours = ExternalContourExtractor::default().extract_contours(&img).unwrap();
        assert!(contours.is_empty());
    }
}
