use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolysegError {
    #[error("Could not load image: {0}")]
    ImageLoad(String),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    DimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Invalid mask: {0}")]
    InvalidMask(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Geometric computation error: {0}")]
    Geometry(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Parse error in {source_name} line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, PolysegError>;
