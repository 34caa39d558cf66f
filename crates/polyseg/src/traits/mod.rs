use image::{DynamicImage, GrayImage};
use crate::{
    error::Result,
    models::Prediction,
    types::Contour,
};

/// Trait for contour tracing algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the outermost boundaries of a binary (0/255) image
    fn extract_contours(&self, image: &GrayImage) -> Result<Vec<Contour>>;
}

/// Trait for deciding which traced contours become detections
pub trait ContourSelector: Send + Sync {
    fn select(&self, contours: Vec<Contour>) -> Result<Vec<Contour>>;
}

/// Trait for polygon simplification algorithms
pub trait PolygonSimplifier: Send + Sync {
    /// Approximate a closed contour with fewer vertices
    fn simplify(&self, contour: &Contour) -> Result<Contour>;
}

/// Anything able to produce masks for an image.
///
/// One adapter per external framework; the extractor only ever sees the
/// masks they return.
pub trait SegmentationModel: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, image: &DynamicImage) -> Result<Prediction>;
}
