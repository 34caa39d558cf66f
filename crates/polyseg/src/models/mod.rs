//! Adapters producing masks for the extractor.
//!
//! The networks themselves run elsewhere; these adapters read what they
//! produced (per-class probability maps, or instance masks with scores)
//! and hand it over as a [`Prediction`].

use std::path::{Path, PathBuf};

use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::check_score,
    error::{PolysegError, Result},
    traits::SegmentationModel,
    types::{Mask, MaskKind},
};

/// One predicted object: its mask, class and model score
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMask {
    pub mask: Mask,
    pub class_id: u32,
    pub score: f32,
}

/// Output of a segmentation model for one image
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// One probability map per class; the class id is the index
    Dense(Vec<Mask>),
    /// Independent instances with their own scores
    Instances(Vec<InstanceMask>),
}

impl Prediction {
    pub fn len(&self) -> usize {
        match self {
            Prediction::Dense(masks) => masks.len(),
            Prediction::Instances(instances) => instances.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ensure_dimensions(mask: &Mask, image: &DynamicImage) -> Result<()> {
    if mask.width() != image.width() || mask.height() != image.height() {
        return Err(PolysegError::DimensionMismatch {
            mask_width: mask.width(),
            mask_height: mask.height(),
            image_width: image.width(),
            image_height: image.height(),
        });
    }
    Ok(())
}

fn open_mask(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| PolysegError::ImageLoad(format!("{}: {}", path.display(), e)))
}

/// Non-zero pixels are foreground, at the source bit depth
fn binary_mask(image: &DynamicImage) -> Result<Mask> {
    let luma = image.to_luma16();
    let flags = luma.pixels().map(|p| p[0] != 0).collect();
    Mask::from_binary(luma.width(), luma.height(), flags)
}

/// Per-class probability maps stored as grey images (8 or 16 bit)
#[derive(Debug, Clone)]
pub struct DenseMaskFiles {
    paths: Vec<PathBuf>,
}

impl DenseMaskFiles {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl SegmentationModel for DenseMaskFiles {
    fn name(&self) -> &str {
        "dense-mask-files"
    }

    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let mut masks = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let mask = Mask::from_luma32f(&open_mask(path)?.to_luma32f(), MaskKind::Probability);
            ensure_dimensions(&mask, image)?;
            debug!(path = %path.display(), "loaded probability map");
            masks.push(mask);
        }
        Ok(Prediction::Dense(masks))
    }
}

/// Manifest entry describing one instance mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstanceEntry {
    /// Mask image path, relative to the manifest
    pub mask: PathBuf,
    pub class_id: u32,
    pub score: f32,
}

/// Instance masks listed in a JSON manifest
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstanceManifest {
    pub instances: Vec<InstanceEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl InstanceManifest {
    /// Load a manifest from file; mask paths resolve against its directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&content, base_dir)
    }

    pub fn from_json(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut manifest: InstanceManifest = serde_json::from_str(content)?;
        for entry in &manifest.instances {
            check_score(entry.score)?;
        }
        manifest.base_dir = base_dir.into();
        Ok(manifest)
    }

    pub fn resolve(&self, entry: &InstanceEntry) -> PathBuf {
        if entry.mask.is_absolute() {
            entry.mask.clone()
        } else {
            self.base_dir.join(&entry.mask)
        }
    }
}

impl SegmentationModel for InstanceManifest {
    fn name(&self) -> &str {
        "instance-manifest"
    }

    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let mut instances = Vec::with_capacity(self.instances.len());
        for entry in &self.instances {
            let path = self.resolve(entry);
            let mask = binary_mask(&open_mask(&path)?)?;
            ensure_dimensions(&mask, image)?;
            instances.push(InstanceMask {
                mask,
                class_id: entry.class_id,
                score: entry.score,
            });
        }
        Ok(Prediction::Instances(instances))
    }
}

/// Replays a prediction computed elsewhere
#[derive(Debug, Clone)]
pub struct PrecomputedModel {
    name: String,
    prediction: Prediction,
}

impl PrecomputedModel {
    pub fn new(name: impl Into<String>, prediction: Prediction) -> Self {
        Self {
            name: name.into(),
            prediction,
        }
    }
}

impl SegmentationModel for PrecomputedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        match &self.prediction {
            Prediction::Dense(masks) => masks.iter().try_for_each(|m| ensure_dimensions(m, image))?,
            Prediction::Instances(instances) => instances.iter().try_for_each(|i| {
                check_score(i.score)?;
                ensure_dimensions(&i.mask, image)
            })?,
        }
        Ok(self.prediction.clone())
    }
}
