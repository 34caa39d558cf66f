use std::path::Path;

use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::{debug, info, warn};

use crate::{
    algorithms::{ConfidenceMode, ConfidenceSource},
    config::{ContourPolicy, ExtractorConfig},
    error::{PolysegError, Result},
    extractor::PolygonExtractor,
    models::{InstanceMask, Prediction},
    traits::SegmentationModel,
    types::{Detection, DetectionResponse, DetectionSet},
};

/// The model families PolySeg ships plugins for
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PluginKind {
    /// Segmentation Models PyTorch: dense per-class probability maps
    Smp,
    /// Detectron2 instance segmentation
    Detectron2,
    /// YOLACT real-time instance segmentation
    Yolact,
}

impl PluginKind {
    /// Get a list of all plugin names
    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Smp => "Segmentation Models PyTorch: per-class probability maps, mean-probability confidence, 100 px² area filter",
            Self::Detectron2 => "Detectron2 instance segmentation: largest contour per instance, model score as confidence",
            Self::Yolact => "YOLACT real-time instance segmentation: largest contour per instance, top-k instances by score",
        }
    }

    /// Default settings of the plugin
    pub fn default_profile(&self) -> PluginProfile {
        match self {
            Self::Smp => PluginProfile {
                kind: *self,
                extractor: ExtractorConfig::default(),
                confidence_mode: ConfidenceMode::MeanProbability,
                top_k: None,
                class_names: Vec::new(),
                model: ModelSpec::Smp {
                    architecture: SmpArchitecture::Unet,
                    encoder: "resnet34".to_string(),
                    weights: None,
                    classes: 1,
                },
            },
            Self::Detectron2 => PluginProfile {
                kind: *self,
                extractor: ExtractorConfig {
                    threshold: 0.5,
                    contour_policy: ContourPolicy::LargestOnly,
                    ..ExtractorConfig::default()
                },
                confidence_mode: ConfidenceMode::Upstream,
                top_k: None,
                class_names: Vec::new(),
                model: ModelSpec::Detectron2 {
                    config: "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x.yaml".to_string(),
                    weights: "model_zoo://COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x/137849600/model_final_f10217.pkl".to_string(),
                },
            },
            Self::Yolact => PluginProfile {
                kind: *self,
                extractor: ExtractorConfig {
                    threshold: 0.3,
                    contour_policy: ContourPolicy::LargestOnly,
                    ..ExtractorConfig::default()
                },
                confidence_mode: ConfidenceMode::Upstream,
                top_k: Some(100),
                class_names: Vec::new(),
                model: ModelSpec::Yolact {
                    weights: "weights/yolact_base_54_800000.pth".to_string(),
                },
            },
        }
    }
}

/// SMP decoder architectures selectable by name
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames,
    PartialEq, Eq
)]
pub enum SmpArchitecture {
    Unet,
    UnetPlusPlus,
    MAnet,
    Linknet,
    #[serde(rename = "FPN")]
    #[strum(serialize = "FPN")]
    Fpn,
    #[serde(rename = "PSPNet")]
    #[strum(serialize = "PSPNet")]
    PspNet,
    DeepLabV3,
    DeepLabV3Plus,
    #[serde(rename = "PAN")]
    #[strum(serialize = "PAN")]
    Pan,
}

/// The external model a plugin wraps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "framework", rename_all = "snake_case")]
pub enum ModelSpec {
    Smp {
        architecture: SmpArchitecture,
        encoder: String,
        weights: Option<String>,
        classes: u32,
    },
    Detectron2 {
        config: String,
        weights: String,
    },
    Yolact {
        weights: String,
    },
}

impl ModelSpec {
    pub fn summary(&self) -> String {
        match self {
            Self::Smp { architecture, encoder, weights, classes } => format!(
                "{} / {} ({} classes, weights: {})",
                architecture,
                encoder,
                classes,
                weights.as_deref().unwrap_or("imagenet")
            ),
            Self::Detectron2 { config, weights } => format!("{} ({})", config, weights),
            Self::Yolact { weights } => weights.clone(),
        }
    }
}

/// Everything that parameterizes one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PluginProfile {
    pub kind: PluginKind,
    pub extractor: ExtractorConfig,
    pub confidence_mode: ConfidenceMode,
    /// Keep at most this many instances, highest score first
    pub top_k: Option<usize>,
    /// Class names indexed by class id
    #[serde(default)]
    pub class_names: Vec<String>,
    pub model: ModelSpec,
}

impl PluginProfile {
    /// JSON schema of a plugin profile
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PluginProfile)
    }
}

/// A configured plugin ready to turn model output into detections
pub struct Plugin {
    profile: PluginProfile,
    extractor: PolygonExtractor,
}

impl Plugin {
    pub fn new(profile: PluginProfile) -> Result<Self> {
        let extractor = PolygonExtractor::from_config(&profile.extractor)?;
        Ok(Self { profile, extractor })
    }

    /// Plugin with its default profile
    pub fn with_defaults(kind: PluginKind) -> Self {
        let profile = kind.default_profile();
        let extractor = crate::extractor::builder::ExtractorBuilder::from_config(&profile.extractor).build();
        Self { profile, extractor }
    }

    pub fn profile(&self) -> &PluginProfile {
        &self.profile
    }

    /// Load the image, run the model and extract detections.
    ///
    /// Never fails: problems are reported in the response envelope.
    pub fn detect(&self, model: &dyn SegmentationModel, image_path: &Path) -> DetectionResponse {
        match self.detect_path(model, image_path) {
            Ok(set) => set.into_response(),
            Err(e) => DetectionResponse::failure(e.to_string()),
        }
    }

    /// Like [`Self::detect`] but keeps the image size and the error type
    pub fn detect_path(&self, model: &dyn SegmentationModel, image_path: &Path) -> Result<DetectionSet> {
        let image = image::open(image_path).map_err(|e| {
            warn!(path = %image_path.display(), error = %e, "image load failed");
            PolysegError::ImageLoad(image_path.display().to_string())
        })?;
        self.detect_image(model, &image)
    }

    /// Run the model on an already decoded image
    pub fn detect_image(&self, model: &dyn SegmentationModel, image: &DynamicImage) -> Result<DetectionSet> {
        let (width, height) = (image.width(), image.height());
        info!(
            plugin = %self.profile.kind,
            model = model.name(),
            wrapped = %self.profile.model.summary(),
            width,
            height,
            "running detection"
        );

        debug!("{}", self.extractor.info());

        let prediction = model.predict(image)?;
        let mut set = DetectionSet::new(width, height);

        match prediction {
            Prediction::Dense(masks) => {
                for (class_id, mask) in masks.iter().enumerate() {
                    let source = ConfidenceSource::resolve(self.profile.confidence_mode, None);
                    self.extract_into(&mut set, mask, class_id as u32, source);
                }
            }
            Prediction::Instances(instances) => {
                for instance in self.rank_instances(instances) {
                    let source = ConfidenceSource::resolve(self.profile.confidence_mode, Some(instance.score));
                    self.extract_into(&mut set, &instance.mask, instance.class_id, source);
                }
            }
        }

        info!(detections = set.len(), "detection finished");
        Ok(set)
    }

    /// Keep instances scoring strictly above the threshold, then the top k
    fn rank_instances(&self, instances: Vec<InstanceMask>) -> Vec<InstanceMask> {
        let threshold = self.profile.extractor.threshold;
        let mut kept: Vec<InstanceMask> = instances
            .into_iter()
            .filter(|instance| instance.score > threshold)
            .collect();

        if let Some(top_k) = self.profile.top_k {
            kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            kept.truncate(top_k);
        }
        kept
    }

    fn extract_into(&self, set: &mut DetectionSet, mask: &crate::types::Mask, class_id: u32, source: ConfidenceSource) {
        match self.extractor.extract(mask, set.image_width, set.image_height, class_id, source) {
            Ok(detections) => {
                set.detections.extend(detections.into_iter().map(|d| self.with_class_name(d)));
            }
            Err(e) => warn!(class_id, error = %e, "skipping mask"),
        }
    }

    fn with_class_name(&self, mut detection: Detection) -> Detection {
        detection.class_name = self.profile.class_names.get(detection.class_id as usize).cloned();
        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::PrecomputedModel, types::Mask};
    use std::str::FromStr;

    const WIDTH: u32 = 160;
    const HEIGHT: u32 = 120;

    fn rect(width: u32, height: u32, x0: u32, y0: u32, side: u32, value: f32) -> Vec<f32> {
        let mut data = vec![0.0f32; (width * height) as usize];
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                data[(y * width + x) as usize] = value;
            }
        }
        data
    }

    fn instance(x0: u32, side: u32, class_id: u32, score: f32) -> InstanceMask {
        let flags = rect(WIDTH, HEIGHT, x0, 10, side, 1.0).into_iter().map(|v| v > 0.0).collect();
        InstanceMask {
            mask: Mask::from_binary(WIDTH, HEIGHT, flags).unwrap(),
            class_id,
            score,
        }
    }

    #[test]
    fn test_plugin_names() {
        assert_eq!(PluginKind::names(), &["smp", "detectron2", "yolact"]);
        assert_eq!(PluginKind::from_str("detectron2").unwrap(), PluginKind::Detectron2);
        assert_eq!(SmpArchitecture::from_str("FPN").unwrap(), SmpArchitecture::Fpn);
        assert_eq!(SmpArchitecture::from_str("DeepLabV3Plus").unwrap(), SmpArchitecture::DeepLabV3Plus);
    }

    #[test]
    fn test_default_profiles() {
        let smp = PluginKind::Smp.default_profile();
        assert_eq!(smp.confidence_mode, ConfidenceMode::MeanProbability);
        assert_eq!(smp.extractor.contour_policy, ContourPolicy::MinimumArea { min_area: 100.0 });

        let yolact = PluginKind::Yolact.default_profile();
        assert_eq!(yolact.extractor.threshold, 0.3);
        assert_eq!(yolact.top_k, Some(100));
        assert_eq!(yolact.extractor.contour_policy, ContourPolicy::LargestOnly);
    }

    #[test]
    fn test_dense_prediction_uses_channel_as_class() {
        let background = Mask::from_probabilities(WIDTH, HEIGHT, vec![0.0; (WIDTH * HEIGHT) as usize]).unwrap();
        let foreground = Mask::from_probabilities(WIDTH, HEIGHT, rect(WIDTH, HEIGHT, 20, 20, 40, 0.9)).unwrap();
        let model = PrecomputedModel::new("smp", Prediction::Dense(vec![background, foreground]));

        let mut profile = PluginKind::Smp.default_profile();
        profile.class_names = vec!["background".to_string(), "leaf".to_string()];
        let plugin = Plugin::new(profile).unwrap();

        let set = plugin.detect_image(&model, &DynamicImage::new_rgb8(WIDTH, HEIGHT)).unwrap();
        assert_eq!(set.len(), 1);
        let detection = &set.detections[0];
        assert_eq!(detection.class_id, 1);
        assert_eq!(detection.class_name.as_deref(), Some("leaf"));
        assert!((detection.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_instances_below_threshold_are_dropped() {
        let model = PrecomputedModel::new(
            "detectron2",
            Prediction::Instances(vec![instance(10, 30, 0, 0.95), instance(80, 30, 2, 0.2)]),
        );
        let plugin = Plugin::with_defaults(PluginKind::Detectron2);

        let set = plugin.detect_image(&model, &DynamicImage::new_rgb8(WIDTH, HEIGHT)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.detections[0].class_id, 0);
        assert!((set.detections[0].confidence - 0.95f32 as f64).abs() < 1e-12);
    }

    #[test]
    fn test_instance_scoring_exactly_threshold_is_dropped() {
        let model = PrecomputedModel::new(
            "detectron2",
            Prediction::Instances(vec![instance(10, 30, 0, 0.5), instance(80, 30, 1, 0.51)]),
        );
        let plugin = Plugin::with_defaults(PluginKind::Detectron2);

        let set = plugin.detect_image(&model, &DynamicImage::new_rgb8(WIDTH, HEIGHT)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.detections[0].class_id, 1);
    }

    #[test]
    fn test_top_k_keeps_highest_scores() {
        let model = PrecomputedModel::new(
            "yolact",
            Prediction::Instances(vec![
                instance(5, 20, 0, 0.4),
                instance(40, 20, 1, 0.9),
                instance(80, 20, 2, 0.7),
            ]),
        );
        let mut profile = PluginKind::Yolact.default_profile();
        profile.top_k = Some(2);
        let plugin = Plugin::new(profile).unwrap();

        let set = plugin.detect_image(&model, &DynamicImage::new_rgb8(WIDTH, HEIGHT)).unwrap();
        let mut classes: Vec<u32> = set.detections.iter().map(|d| d.class_id).collect();
        classes.sort();
        assert_eq!(classes, vec![1, 2]);
    }

    #[test]
    fn test_unreadable_image_is_structured_failure() {
        let model = PrecomputedModel::new("none", Prediction::Dense(vec![]));
        let plugin = Plugin::with_defaults(PluginKind::Smp);
        let response = plugin.detect(&model, Path::new("/no/such/image.png"));
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Could not load image: /no/such/image.png"));
    }

    #[test]
    fn test_empty_masks_are_success_without_detections() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("frame.png");
        DynamicImage::new_rgb8(WIDTH, HEIGHT).save(&image_path).unwrap();

        let empty = Mask::from_probabilities(WIDTH, HEIGHT, vec![0.0; (WIDTH * HEIGHT) as usize]).unwrap();
        let model = PrecomputedModel::new("smp", Prediction::Dense(vec![empty]));
        let response = Plugin::with_defaults(PluginKind::Smp).detect(&model, &image_path);
        assert!(response.success);
        assert_eq!(response.detections, Some(vec![]));
    }

    #[test]
    fn test_model_errors_become_failures() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("frame.png");
        DynamicImage::new_rgb8(WIDTH, HEIGHT).save(&image_path).unwrap();

        let wrong_size = Mask::from_probabilities(4, 4, vec![0.0; 16]).unwrap();
        let model = PrecomputedModel::new("smp", Prediction::Dense(vec![wrong_size]));
        let response = Plugin::with_defaults(PluginKind::Smp).detect(&model, &image_path);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("4x4"));
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let mut profile = PluginKind::Smp.default_profile();
        profile.extractor.threshold = -1.0;
        assert!(Plugin::new(profile).is_err());
    }
}
