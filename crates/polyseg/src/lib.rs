//! # PolySeg Mask-to-Polygon Extraction
//!
//! Turns the masks produced by external segmentation models into normalized
//! polygon detections for the PolySeg host tool.
//!
//! ## Core Features
//!
//! - **Trait-based Architecture**: contour tracing, contour selection and
//!   simplification are swappable stages
//! - **Plugins**: SMP, Detectron2 and YOLACT profiles with their defaults
//! - **Model Adapters**: probability map files, instance manifests, in-memory predictions
//! - **Output Formats**: JSON response envelope, GeoJSON, YOLO labels, COCO datasets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polyseg::{DenseMaskFiles, Plugin, PluginKind};
//! use std::path::Path;
//!
//! let plugin = Plugin::with_defaults(PluginKind::Smp);
//! let model = DenseMaskFiles::new(["leaf_probability.png"]);
//!
//! let response = plugin.detect(&model, Path::new("leaf.jpg"));
//! println!("{}", response.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Extractor
//!
//! ```rust,no_run
//! use polyseg::{PolygonExtractor, algorithms::*, Mask};
//!
//! let extractor = PolygonExtractor::builder()
//!     .with_threshold(0.3)
//!     .set_selector(LargestContourSelector)
//!     .with_epsilon_ratio(0.01)
//!     .build();
//!
//! let mask = Mask::from_probabilities(4, 4, vec![0.0; 16])?;
//! let detections = extractor.extract(&mask, 4, 4, 0, ConfidenceSource::MeanProbability)?;
//! assert!(detections.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod config;
pub mod extractor;
pub mod models;
pub mod plugin;
pub mod io;
pub mod mcp;
pub mod typed_geojson;

// Re-exports for convenience
pub use error::{PolysegError, Result};
pub use types::{Contour, Detection, DetectionResponse, DetectionSet, Mask, MaskKind};
pub use traits::*;
pub use algorithms::{ConfidenceMode, ConfidenceSource};
pub use config::{ContourPolicy, ExtractorConfig};
pub use extractor::{PolygonExtractor, builder::ExtractorBuilder};
pub use models::{DenseMaskFiles, InstanceEntry, InstanceManifest, InstanceMask, Prediction, PrecomputedModel};
pub use plugin::{ModelSpec, Plugin, PluginKind, PluginProfile, SmpArchitecture};
pub use io::{
    convert_yolo_dataset, parse_yolo_labels, CocoDataset, YoloDataset, YoloPolygon,
};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn write_scene(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let image_path = dir.join("scene.png");
        RgbImage::from_pixel(200, 100, Rgb([30, 30, 30])).save(&image_path).unwrap();

        let mut mask = GrayImage::new(200, 100);
        for y in 20..60 {
            for x in 50..150 {
                mask.put_pixel(x, y, Luma([230u8]));
            }
        }
        let mask_path = dir.join("scene_mask.png");
        mask.save(&mask_path).unwrap();
        (image_path, mask_path)
    }

    #[test]
    fn test_smp_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, mask_path) = write_scene(dir.path());

        let plugin = Plugin::with_defaults(PluginKind::Smp);
        let response = plugin.detect(&DenseMaskFiles::new([mask_path]), &image_path);

        assert!(response.success);
        let detections = response.detections();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 0);
        assert_eq!(detections[0].vertex_count(), 4);
        assert!((detections[0].confidence - 230.0 / 255.0).abs() < 1e-4);
        assert!(detections[0].points.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_detectron2_manifest_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, mask_path) = write_scene(dir.path());
        let manifest = serde_json::json!({
            "instances": [
                { "mask": mask_path.file_name().unwrap().to_str().unwrap(), "class_id": 3, "score": 0.8 }
            ]
        });
        let manifest_path = dir.path().join("instances.json");
        std::fs::write(&manifest_path, manifest.to_string()).unwrap();

        let model = InstanceManifest::from_file(&manifest_path).unwrap();
        let response = Plugin::with_defaults(PluginKind::Detectron2).detect(&model, &image_path);

        assert!(response.success);
        assert_eq!(response.detections().len(), 1);
        assert_eq!(response.detections()[0].class_id, 3);
        assert!((response.detections()[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_mask_is_failure_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let (image_path, _) = write_scene(dir.path());
        let small_mask = dir.path().join("small.png");
        GrayImage::new(20, 10).save(&small_mask).unwrap();

        let response = Plugin::with_defaults(PluginKind::Smp)
            .detect(&DenseMaskFiles::new([small_mask]), &image_path);
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("Mask is 20x10 but image is 200x100")
        );
    }
}
