use geojson::{FeatureCollection, Feature, Geometry, Value};
use crate::{
    error::Result,
    error::PolysegError,
    types::{Detection, DetectionSet},
    typed_geojson::{TypedFeature, TypedFeatureCollection, DetectionProperties, DetectionGeoJson}
};

/// Closed GeoJSON ring of normalized coordinates
fn detection_ring(detection: &Detection) -> Vec<Vec<Vec<f64>>> {
    let mut ring: Vec<Vec<f64>> = detection.vertices().map(|[x, y]| vec![x, y]).collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    vec![ring]
}

fn detection_properties(id: usize, detection: &Detection) -> DetectionProperties {
    DetectionProperties {
        id: id as u32,
        class_id: detection.class_id,
        class_name: detection.class_name.clone(),
        confidence: detection.confidence,
        vertex_count: detection.vertex_count(),
    }
}

impl DetectionSet {
    fn foreign_members(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut foreign_members = serde_json::Map::new();
        foreign_members.insert("image_width".to_string(), serde_json::Value::from(self.image_width));
        foreign_members.insert("image_height".to_string(), serde_json::Value::from(self.image_height));
        foreign_members.insert("detection_count".to_string(), serde_json::Value::from(self.detections.len()));
        foreign_members
    }

    /// Export to typed GeoJSON format
    pub fn to_typed_geojson(&self) -> Result<DetectionGeoJson> {
        let features = self.detections
            .iter()
            .enumerate()
            .map(|(i, detection)| {
                let geometry = Geometry::new(Value::Polygon(detection_ring(detection)));
                TypedFeature::new(Some(geometry), detection_properties(i, detection))
            })
            .collect();

        Ok(TypedFeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()),
        })
    }

    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut features = Vec::with_capacity(self.detections.len());

        for (i, detection) in self.detections.iter().enumerate() {
            let geometry = Geometry::new(Value::Polygon(detection_ring(detection)));
            let properties = serde_json::to_value(detection_properties(i, detection))?
                .as_object()
                .cloned();

            features.push(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: Some(geojson::feature::Id::Number(serde_json::Number::from(i))),
                properties,
                foreign_members: None,
            });
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.foreign_members()),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        let geojson = self.to_geojson()?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }

    /// Load a DetectionSet from a GeoJSON string written by [`Self::to_geojson_string`]
    pub fn from_geojson_string(geojson_str: &str) -> Result<Self> {
        let geojson: FeatureCollection = geojson_str.parse()?;

        let foreign_members = geojson.foreign_members.as_ref()
            .ok_or_else(|| PolysegError::Geometry("Missing metadata in GeoJSON".to_string()))?;

        let dimension = |key: &str| {
            foreign_members.get(key)
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .ok_or_else(|| PolysegError::Geometry(format!("Missing or invalid {}", key)))
        };
        let image_width = dimension("image_width")?;
        let image_height = dimension("image_height")?;

        let mut detections = Vec::new();
        for feature in geojson.features {
            let properties: DetectionProperties = match feature.properties {
                Some(props) => serde_json::from_value(serde_json::Value::Object(props))?,
                None => continue,
            };

            let Some(Geometry { value: Value::Polygon(rings), .. }) = feature.geometry else {
                continue;
            };
            let Some(exterior) = rings.first() else {
                continue;
            };

            let mut vertices: Vec<&Vec<f64>> = exterior.iter().collect();
            if vertices.len() > 1 && vertices.first() == vertices.last() {
                vertices.pop();
            }

            detections.push(Detection {
                class_id: properties.class_id,
                class_name: properties.class_name,
                confidence: properties.confidence,
                points: vertices.iter().flat_map(|p| p.iter().take(2).copied()).collect(),
            });
        }

        Ok(DetectionSet { detections, image_width, image_height })
    }
}
