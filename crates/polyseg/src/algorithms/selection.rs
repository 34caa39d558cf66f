use crate::{error::Result, traits::ContourSelector, types::Contour};

/// Drops contours whose enclosed area is below `min_area`
#[derive(Debug, Clone)]
pub struct MinimumAreaSelector {
    pub min_area: f64,
}

impl Default for MinimumAreaSelector {
    fn default() -> Self {
        Self { min_area: 100.0 }
    }
}

impl ContourSelector for MinimumAreaSelector {
    fn select(&self, contours: Vec<Contour>) -> Result<Vec<Contour>> {
        Ok(contours
            .into_iter()
            .filter(|contour| contour.area() >= self.min_area)
            .collect())
    }
}

/// Keeps only the largest contour; the first one wins on ties
#[derive(Debug, Clone, Default)]
pub struct LargestContourSelector;

impl ContourSelector for LargestContourSelector {
    fn select(&self, contours: Vec<Contour>) -> Result<Vec<Contour>> {
        let mut largest: Option<(f64, Contour)> = None;

        for contour in contours {
            let area = contour.area();
            match &largest {
                Some((best, _)) if area <= *best => {}
                _ => largest = Some((area, contour)),
            }
        }

        Ok(largest.into_iter().map(|(_, contour)| contour).collect())
    }
}

/// Passes every contour through
#[derive(Debug, Clone, Default)]
pub struct KeepAllSelector;

impl ContourSelector for KeepAllSelector {
    fn select(&self, contours: Vec<Contour>) -> Result<Vec<Contour>> {
        Ok(contours)
    }
}
