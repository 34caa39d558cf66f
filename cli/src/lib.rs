use polyseg::{
    ConfidenceMode, ContourPolicy, DenseMaskFiles, DetectionResponse, DetectionSet, InstanceManifest,
    ModelSpec, Plugin, PluginKind, PluginProfile, PolysegError, SegmentationModel,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Polyseg(#[from] PolysegError),
    #[error("{0}")]
    MissingInputs(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Plugin settings read from a configuration file.
///
/// Every field is optional; unset fields keep the plugin default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PolysegConfig {
    pub plugin: Option<PluginKind>,
    pub threshold: Option<f32>,
    pub contour_policy: Option<ContourPolicy>,
    pub epsilon_ratio: Option<f64>,
    pub compress_chains: Option<bool>,
    pub confidence_mode: Option<ConfidenceMode>,
    pub top_k: Option<usize>,
    pub class_names: Option<Vec<String>>,
    pub model: Option<ModelSpec>,
}

impl PolysegConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Apply the file settings over a plugin profile
    pub fn apply(&self, profile: &mut PluginProfile) {
        if let Some(threshold) = self.threshold {
            profile.extractor.threshold = threshold;
        }
        if let Some(policy) = &self.contour_policy {
            profile.extractor.contour_policy = policy.clone();
        }
        if let Some(epsilon_ratio) = self.epsilon_ratio {
            profile.extractor.epsilon_ratio = epsilon_ratio;
        }
        if let Some(compress_chains) = self.compress_chains {
            profile.extractor.compress_chains = compress_chains;
        }
        if let Some(mode) = self.confidence_mode {
            profile.confidence_mode = mode;
        }
        if self.top_k.is_some() {
            profile.top_k = self.top_k;
        }
        if let Some(names) = &self.class_names {
            profile.class_names = names.clone();
        }
        if let Some(model) = &self.model {
            profile.model = model.clone();
        }
    }

    /// Defaults of `kind` (or of the configured plugin) with the file settings applied
    pub fn profile_for(&self, kind: Option<PluginKind>) -> Result<PluginProfile, CliError> {
        let kind = kind
            .or(self.plugin)
            .ok_or_else(|| CliError::MissingInputs("--plugin required for detect".to_string()))?;
        let mut profile = kind.default_profile();
        self.apply(&mut profile);
        Ok(profile)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PolysegConfig)
    }
}

/// Command-line flags that override the configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectOverrides {
    pub conf: Option<f32>,
    pub min_area: Option<f64>,
    pub largest_only: bool,
    pub no_area_filter: bool,
    pub epsilon_ratio: Option<f64>,
    pub top_k: Option<usize>,
}

impl DetectOverrides {
    pub fn apply(&self, profile: &mut PluginProfile) {
        if let Some(conf) = self.conf {
            profile.extractor.threshold = conf;
        }
        if self.largest_only {
            profile.extractor.contour_policy = ContourPolicy::LargestOnly;
        } else if self.no_area_filter {
            profile.extractor.contour_policy = ContourPolicy::All;
        } else if let Some(min_area) = self.min_area {
            profile.extractor.contour_policy = ContourPolicy::MinimumArea { min_area };
        }
        if let Some(epsilon_ratio) = self.epsilon_ratio {
            profile.extractor.epsilon_ratio = epsilon_ratio;
        }
        if self.top_k.is_some() {
            profile.top_k = self.top_k;
        }
    }
}

/// Inputs of one `detect` invocation
#[derive(Debug, Clone, Default)]
pub struct DetectRequest {
    pub plugin: Option<PluginKind>,
    pub image: Option<PathBuf>,
    pub masks: Vec<PathBuf>,
    pub instances: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub overrides: DetectOverrides,
    pub geojson: Option<PathBuf>,
    pub yolo: Option<PathBuf>,
}

/// How a `detect` invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStatus {
    /// The pass ran; the envelope tells whether it succeeded
    Completed,
    /// Missing or invalid inputs; the process exits with status 1
    UsageError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectOutcome {
    pub response: DetectionResponse,
    pub status: DetectStatus,
}

/// Run `detect`. Every outcome, usage errors included, carries an envelope.
pub fn run_detect(request: &DetectRequest) -> DetectOutcome {
    let (plugin, model, image) = match prepare(request) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{}", e);
            return DetectOutcome {
                response: DetectionResponse::failure(e.to_string()),
                status: DetectStatus::UsageError,
            };
        }
    };

    let response = match plugin.detect_path(model.as_ref(), &image) {
        Ok(set) => match write_outputs(request, &set) {
            Ok(()) => set.into_response(),
            Err(e) => {
                error!("{}", e);
                DetectionResponse::failure(e)
            }
        },
        Err(e) => {
            error!("{}", e);
            DetectionResponse::failure(e.to_string())
        }
    };

    DetectOutcome { response, status: DetectStatus::Completed }
}

fn prepare(request: &DetectRequest) -> Result<(Plugin, Box<dyn SegmentationModel>, PathBuf), CliError> {
    let image = request
        .image
        .clone()
        .ok_or_else(|| CliError::MissingInputs("--image required for detect".to_string()))?;

    let config = match &request.config {
        Some(path) => PolysegConfig::from_file(path)?,
        None => PolysegConfig::default(),
    };
    let mut profile = config.profile_for(request.plugin)?;
    request.overrides.apply(&mut profile);
    let plugin = Plugin::new(profile)?;

    let model: Box<dyn SegmentationModel> = match (&request.instances, request.masks.is_empty()) {
        (Some(manifest), _) => Box::new(InstanceManifest::from_file(manifest)?),
        (None, false) => Box::new(DenseMaskFiles::new(request.masks.iter().cloned())),
        (None, true) => {
            return Err(CliError::MissingInputs(
                "--mask or --instances required for detect".to_string(),
            ))
        }
    };

    Ok((plugin, model, image))
}

fn write_outputs(request: &DetectRequest, set: &DetectionSet) -> Result<(), String> {
    if let Some(path) = &request.geojson {
        set.save_geojson(path)
            .map_err(|e| format!("Could not write {}: {}", path.display(), e))?;
        info!("GeoJSON written to {}", path.display());
    }
    if let Some(path) = &request.yolo {
        set.save_yolo_labels(path)
            .map_err(|e| format!("Could not write {}: {}", path.display(), e))?;
        info!("YOLO labels written to {}", path.display());
    }
    Ok(())
}
