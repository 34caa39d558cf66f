use crate::{
    models::{DenseMaskFiles, InstanceManifest},
    plugin::{Plugin, PluginKind, PluginProfile},
    traits::SegmentationModel,
    types::{DetectionResponse, DetectionSet},
};
use rmcp::{
    handler::server::tool::IntoCallToolResult, model::{CallToolResult, Content, ServerCapabilities, ServerInfo}, schemars, tool, Error as McpError, ServerHandler
};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr, sync::{Arc, RwLock}};
use strum::IntoEnumIterator;
use tracing::warn;

/// Request for running a plugin on one image
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DetectRequest {
    #[schemars(description = "Plugin to run: smp, detectron2 or yolact")]
    pub plugin: String,
    #[schemars(description = "Path to the image file")]
    pub image_path: String,
    #[schemars(description = "Per-class probability map images, class id = position")]
    #[serde(default)]
    pub mask_paths: Vec<String>,
    #[schemars(description = "JSON manifest listing instance masks with class ids and scores")]
    pub manifest_path: Option<String>,
    #[schemars(
        description = "Confidence threshold overriding the plugin default",
        range(min = 0.0, max = 1.0)
    )]
    pub confidence: Option<f32>,
}

/// One entry of the plugin listing
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct PluginInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub defaults: PluginProfile,
}

impl IntoCallToolResult for DetectionResponse {
    fn into_call_tool_result(self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&self).unwrap_or_else(|_| format!("{:?}", self)),
        )]))
    }
}

/// MCP Server exposing the PolySeg plugins
#[derive(Clone)]
pub struct PolysegMcpServer {
    last_detections: Arc<RwLock<Option<DetectionSet>>>,
}

impl PolysegMcpServer {
    pub fn new() -> Self {
        Self { last_detections: Arc::new(RwLock::new(None)) }
    }

    fn run_detection(&self, request: DetectRequest) -> Result<DetectionSet, String> {
        let kind = PluginKind::from_str(&request.plugin).map_err(|_| {
            format!(
                "Unknown plugin '{}', expected one of: {}",
                request.plugin,
                PluginKind::names().join(", ")
            )
        })?;

        let mut profile = kind.default_profile();
        if let Some(confidence) = request.confidence {
            profile.extractor.threshold = confidence;
        }
        let plugin = Plugin::new(profile).map_err(|e| e.to_string())?;

        let model: Box<dyn SegmentationModel> = match (&request.manifest_path, request.mask_paths.is_empty()) {
            (Some(manifest), _) => Box::new(InstanceManifest::from_file(manifest).map_err(|e| e.to_string())?),
            (None, false) => Box::new(DenseMaskFiles::new(request.mask_paths.iter())),
            (None, true) => return Err("No masks given: pass mask_paths or manifest_path".to_string()),
        };

        plugin
            .detect_path(model.as_ref(), Path::new(&request.image_path))
            .map_err(|e| e.to_string())
    }
}

impl Default for PolysegMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool(tool_box)]
impl PolysegMcpServer {
    #[tool(description = "Run a segmentation plugin on an image and return normalized polygon detections")]
    fn detect(&self, #[tool(aggr)] request: DetectRequest) -> DetectionResponse {
        match self.run_detection(request) {
            Ok(set) => {
                let response = DetectionResponse::success(set.detections.clone());
                match self.last_detections.write() {
                    Ok(mut last) => *last = Some(set),
                    Err(e) => warn!(error = %e, "could not store detections"),
                }
                response
            }
            Err(e) => DetectionResponse::failure(e),
        }
    }

    #[tool(description = "Export the detections of the last successful detect call as GeoJSON")]
    fn export_geojson(&self) -> String {
        let last = match self.last_detections.read() {
            Ok(last) => last,
            Err(e) => return format!("Failed to read detections: {}", e),
        };
        match last.as_ref() {
            Some(set) => set
                .to_geojson_string()
                .unwrap_or_else(|e| format!("Failed to convert to GeoJSON: {}", e)),
            None => "No detections yet. Please run detect first.".to_string(),
        }
    }

    #[tool(description = "List the available plugins with their default settings")]
    fn list_plugins(&self) -> String {
        let plugins: Vec<PluginInfo> = PluginKind::iter()
            .map(|kind| PluginInfo {
                name: kind.into(),
                description: kind.description(),
                defaults: kind.default_profile(),
            })
            .collect();
        serde_json::to_string_pretty(&plugins)
            .unwrap_or_else(|e| format!("Failed to serialize plugins: {}", e))
    }

    #[tool(description = "Get the JSON schema for plugin profiles")]
    fn get_config_schema(&self) -> String {
        let schema = PluginProfile::schema();
        serde_json::to_string_pretty(&schema)
            .unwrap_or_else(|e| format!("Failed to serialize schema: {}", e))
    }
}

#[tool(tool_box)]
impl ServerHandler for PolysegMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("PolySeg Mask-to-Polygon Server - Run SMP, Detectron2 or YOLACT plugins over precomputed masks and get normalized polygon detections back.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
