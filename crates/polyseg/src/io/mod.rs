//! Export and import of detections and datasets

pub mod geojson;
pub mod yolo;
pub mod coco;

pub use yolo::{parse_yolo_labels, YoloPolygon};
pub use coco::{convert_yolo_dataset, CocoAnnotation, CocoCategory, CocoDataset, CocoImage, YoloDataset};
