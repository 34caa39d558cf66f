pub mod builder;

use tracing::debug;
use crate::{
    algorithms::ConfidenceSource,
    config::ExtractorConfig,
    error::{PolysegError, Result},
    traits::{ContourExtractor, ContourSelector, PolygonSimplifier},
    types::{Detection, Mask},
};

/// Mask-to-polygon extractor: binarize, trace, select, simplify, normalize
pub struct PolygonExtractor {
    threshold: f32,
    contour_extractor: Box<dyn ContourExtractor>,
    selector: Box<dyn ContourSelector>,
    simplifier: Box<dyn PolygonSimplifier>,
}

impl PolygonExtractor {
    /// Create a new extractor builder
    pub fn builder() -> builder::ExtractorBuilder {
        builder::ExtractorBuilder::new()
    }

    /// Create a new extractor with the given components
    pub fn new(
        threshold: f32,
        contour_extractor: Box<dyn ContourExtractor>,
        selector: Box<dyn ContourSelector>,
        simplifier: Box<dyn PolygonSimplifier>,
    ) -> Self {
        Self {
            threshold,
            contour_extractor,
            selector,
            simplifier,
        }
    }

    /// Build an extractor from a validated configuration
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(builder::ExtractorBuilder::from_config(config).build())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Convert one mask into zero or more normalized detections.
    ///
    /// Detections come out in contour discovery order. An empty mask yields
    /// an empty vector, not an error.
    pub fn extract(
        &self,
        mask: &Mask,
        image_width: u32,
        image_height: u32,
        class_id: u32,
        confidence: ConfidenceSource,
    ) -> Result<Vec<Detection>> {
        if image_width == 0 || image_height == 0 {
            return Err(PolysegError::InvalidDimensions {
                width: image_width,
                height: image_height,
            });
        }

        confidence.validate()?;

        // Step 1: Binarize
        let binary = mask.binarize(self.threshold);

        // Step 2: Trace external contours
        let contours = self.contour_extractor.extract_contours(&binary)?;
        let traced = contours.len();

        // Step 3: Apply the area / largest-only policy
        let contours = self.selector.select(contours)?;
        debug!(class_id, traced, selected = contours.len(), "contours traced");

        let mut detections = Vec::with_capacity(contours.len());
        for contour in contours {
            // Step 4: Simplify
            let polygon = self.simplifier.simplify(&contour)?;

            // Step 5: Degenerate polygons are skipped
            if polygon.len() < 3 {
                debug!(class_id, vertices = polygon.len(), "skipping degenerate polygon");
                continue;
            }

            // Step 6: Normalize
            let points = polygon.points
                .iter()
                .flat_map(|&[x, y]| {
                    [
                        (x / image_width as f64).clamp(0.0, 1.0),
                        (y / image_height as f64).clamp(0.0, 1.0),
                    ]
                })
                .collect();

            // Step 7: Confidence, measured on the unsimplified contour
            let confidence = confidence.score(mask, &contour);

            detections.push(Detection {
                class_id,
                class_name: None,
                confidence,
                points,
            });
        }

        Ok(detections)
    }

    /// Get information about the extractor configuration
    pub fn info(&self) -> String {
        format!("Extractor: threshold {}, external contours, selection policy, Douglas-Peucker", self.threshold)
    }
}
