use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use geo::{Area, BoundingRect};
use geo_types::{Coord, LineString, Polygon};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{PolysegError, Result},
    io::yolo::{parse_yolo_labels, YoloPolygon},
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    /// One flat polygon `[x0, y0, x1, y1, ...]` in pixels
    pub segmentation: Vec<Vec<f64>>,
    pub area: f64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
    pub iscrowd: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CocoCategory {
    pub id: u32,
    pub name: String,
}

/// COCO instance-segmentation dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CocoDataset {
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
}

impl CocoDataset {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// A YOLO segmentation dataset on disk: `<stem>.txt` labels beside images
#[derive(Debug, Clone)]
pub struct YoloDataset {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    /// Category names indexed by class id
    pub class_names: Vec<String>,
}

impl YoloDataset {
    pub fn new(images_dir: impl Into<PathBuf>, labels_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            labels_dir: labels_dir.into(),
            class_names: Vec::new(),
        }
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    /// Read class names from a text file, one per line
    pub fn with_class_names_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Ok(self.with_class_names(names))
    }

    /// Image files of the dataset, sorted by name
    fn image_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.images_dir.is_dir() {
            return Err(PolysegError::Dataset(format!(
                "images directory {} does not exist",
                self.images_dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.images_dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn category_name(&self, class_id: u32) -> String {
        self.class_names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// COCO category ids start at 1
fn category_id(class_id: u32) -> u32 {
    class_id + 1
}

fn annotation_for(
    polygon: &YoloPolygon,
    id: u64,
    image_id: u64,
    width: u32,
    height: u32,
) -> CocoAnnotation {
    let pixels = polygon.to_pixels(width, height);
    let ring: LineString<f64> = pixels.iter().map(|&[x, y]| Coord { x, y }).collect();
    let shape = Polygon::new(ring, vec![]);

    let bbox = shape
        .bounding_rect()
        .map(|rect| [rect.min().x, rect.min().y, rect.width(), rect.height()])
        .unwrap_or([0.0; 4]);

    CocoAnnotation {
        id,
        image_id,
        category_id: category_id(polygon.class_id),
        segmentation: vec![pixels.iter().flat_map(|p| p.iter().copied()).collect()],
        area: shape.unsigned_area(),
        bbox,
        iscrowd: 0,
    }
}

/// Convert a YOLO segmentation dataset into COCO instance-segmentation JSON.
///
/// Images without a label file are kept with no annotations.
pub fn convert_yolo_dataset(dataset: &YoloDataset) -> Result<CocoDataset> {
    let mut coco = CocoDataset::default();
    let mut seen_classes = BTreeSet::new();

    for (index, image_path) in dataset.image_paths()?.into_iter().enumerate() {
        let image_id = index as u64 + 1;
        let (width, height) = image::image_dimensions(&image_path)?;
        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        coco.images.push(CocoImage { id: image_id, file_name: file_name.clone(), width, height });

        let Some(stem) = image_path.file_stem() else {
            continue;
        };
        let label_path = dataset.labels_dir.join(format!("{}.txt", stem.to_string_lossy()));
        if !label_path.is_file() {
            debug!("No labels for {}", file_name);
            continue;
        }

        let content = std::fs::read_to_string(&label_path)?;
        let polygons = parse_yolo_labels(&content, &label_path.display().to_string())?;
        for polygon in &polygons {
            let id = coco.annotations.len() as u64 + 1;
            seen_classes.insert(polygon.class_id);
            coco.annotations.push(annotation_for(polygon, id, image_id, width, height));
        }
    }

    seen_classes.extend(0..dataset.class_names.len() as u32);
    coco.categories = seen_classes
        .into_iter()
        .map(|class_id| CocoCategory {
            id: category_id(class_id),
            name: dataset.category_name(class_id),
        })
        .collect();

    info!(
        "Converted {} images with {} annotations into {} categories",
        coco.images.len(),
        coco.annotations.len(),
        coco.categories.len()
    );
    Ok(coco)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::tempdir;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) {
        GrayImage::from_pixel(width, height, Luma([0u8]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_convert_dataset() {
        let root = tempdir().unwrap();
        let images = root.path().join("images");
        let labels = root.path().join("labels");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::create_dir_all(&labels).unwrap();

        write_image(&images, "a.png", 100, 50);
        write_image(&images, "b.png", 20, 20);
        std::fs::write(labels.join("a.txt"), "1 0.1 0.2 0.5 0.2 0.5 0.6 0.1 0.6\n").unwrap();
        std::fs::write(images.join("notes.txt"), "not an image").unwrap();

        let dataset = YoloDataset::new(&images, &labels)
            .with_class_names(vec!["cat".to_string(), "dog".to_string()]);
        let coco = convert_yolo_dataset(&dataset).unwrap();

        assert_eq!(coco.images.len(), 2);
        assert_eq!(coco.images[0].file_name, "a.png");
        assert_eq!((coco.images[0].width, coco.images[0].height), (100, 50));

        assert_eq!(coco.annotations.len(), 1);
        let annotation = &coco.annotations[0];
        assert_eq!(annotation.image_id, 1);
        assert_eq!(annotation.category_id, 2);
        assert_eq!(annotation.iscrowd, 0);
        assert_eq!(annotation.segmentation[0].len(), 8);
        // 40 x 20 pixel rectangle starting at (10, 10)
        assert!((annotation.area - 800.0).abs() < 1e-6);
        for (got, want) in annotation.bbox.iter().zip([10.0, 10.0, 40.0, 20.0]) {
            assert!((got - want).abs() < 1e-6);
        }

        let names: Vec<_> = coco.categories.iter().map(|c| (c.id, c.name.as_str())).collect();
        assert_eq!(names, vec![(1, "cat"), (2, "dog")]);
    }

    #[test]
    fn test_unknown_classes_get_generated_names() {
        let root = tempdir().unwrap();
        write_image(root.path(), "img.png", 10, 10);
        std::fs::write(root.path().join("img.txt"), "7 0 0 1 0 1 1\n").unwrap();

        let coco = convert_yolo_dataset(&YoloDataset::new(root.path(), root.path())).unwrap();
        assert_eq!(coco.categories, vec![CocoCategory { id: 8, name: "class_7".to_string() }]);
    }

    #[test]
    fn test_malformed_labels_name_the_file() {
        let root = tempdir().unwrap();
        write_image(root.path(), "img.png", 10, 10);
        std::fs::write(root.path().join("img.txt"), "0 0.5 0.5\n").unwrap();

        let err = convert_yolo_dataset(&YoloDataset::new(root.path(), root.path())).unwrap_err();
        match err {
            PolysegError::Parse { source_name, line, .. } => {
                assert!(source_name.ends_with("img.txt"));
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_images_dir() {
        let root = tempdir().unwrap();
        let dataset = YoloDataset::new(root.path().join("missing"), root.path());
        assert!(matches!(convert_yolo_dataset(&dataset), Err(PolysegError::Dataset(_))));
    }

    #[test]
    fn test_class_names_file() {
        let root = tempdir().unwrap();
        let names = root.path().join("classes.txt");
        std::fs::write(&names, "cat\n\ndog\n").unwrap();
        let dataset = YoloDataset::new(root.path(), root.path())
            .with_class_names_file(&names)
            .unwrap();
        assert_eq!(dataset.class_names, vec!["cat", "dog"]);
    }
}
