use std::marker::PhantomData;
use serde::{Deserialize, Serialize};
use geojson::{Geometry, JsonObject};
use ts_rs::TS;
use schemars::JsonSchema;

/// Properties for detection features
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS, JsonSchema)]
#[ts(export)]
#[schemars(description = "Properties for detection features")]
pub struct DetectionProperties {
    #[schemars(description = "Index of the detection within its pass")]
    pub id: u32,
    #[schemars(description = "Class index reported by the model")]
    pub class_id: u32,
    #[serde(rename = "class", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Class name, when the plugin knows it")]
    pub class_name: Option<String>,
    #[schemars(description = "Detection confidence in [0, 1]")]
    pub confidence: f64,
    #[schemars(description = "Number of polygon vertices")]
    pub vertex_count: usize,
}

/// Type alias for detection GeoJSON
pub type DetectionGeoJson = TypedFeatureCollection<DetectionProperties>;

/// A typed GeoJSON Feature that is generic over its properties.
#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: geojson::Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    /// Creates a new TypedFeature.
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Tries to access the typed properties of the feature.
    pub fn properties(&self) -> Option<P> {
        self.feature.properties.as_ref().and_then(|p| {
            serde_json::from_value(serde_json::Value::Object(p.clone())).ok()
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

impl<P> TypedFeatureCollection<P> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl DetectionGeoJson {
    /// Features of one class
    pub fn features_of_class(&self, class_id: u32) -> Vec<&TypedFeature<DetectionProperties>> {
        self.filter_features(|props| props.class_id == class_id)
    }

    /// Features at or above a confidence
    pub fn features_above_confidence(&self, min_confidence: f64) -> Vec<&TypedFeature<DetectionProperties>> {
        self.filter_features(|props| props.confidence >= min_confidence)
    }

    fn filter_features<F>(&self, predicate: F) -> Vec<&TypedFeature<DetectionProperties>>
    where
        F: Fn(&DetectionProperties) -> bool,
    {
        self.features
            .iter()
            .filter(|feature| feature.properties().map(|p| predicate(&p)).unwrap_or(false))
            .collect()
    }

    /// Get image dimensions from foreign members
    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        let foreign = self.foreign_members.as_ref()?;
        let width = foreign.get("image_width")?.as_u64()? as u32;
        let height = foreign.get("image_height")?.as_u64()? as u32;
        Some((width, height))
    }
}
