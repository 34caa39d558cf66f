use crate::{
    algorithms::{
        DouglasPeuckerSimplifier, ExternalContourExtractor, KeepAllSelector,
        LargestContourSelector, MinimumAreaSelector,
    },
    config::{ContourPolicy, ExtractorConfig, DEFAULT_THRESHOLD},
    extractor::PolygonExtractor,
    traits::{ContourExtractor, ContourSelector, PolygonSimplifier},
};

/// Builder for creating extractors with a fluent API
pub struct ExtractorBuilder {
    threshold: f32,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    selector: Option<Box<dyn ContourSelector>>,
    simplifier: Option<Box<dyn PolygonSimplifier>>,
}

impl ExtractorBuilder {
    /// Create a new extractor builder
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            contour_extractor: None,
            selector: None,
            simplifier: None,
        }
    }

    /// Start from a configuration; individual parts can still be replaced
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new()
            .with_threshold(config.threshold)
            .set_contour_extractor(ExternalContourExtractor {
                compress_chains: config.compress_chains,
            })
            .with_contour_policy(&config.contour_policy)
            .with_epsilon_ratio(config.epsilon_ratio)
    }

    /// Set the probability threshold used for binarization
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the contour selector (replaces any existing one)
    pub fn set_selector<S>(mut self, selector: S) -> Self
    where
        S: ContourSelector + 'static,
    {
        self.selector = Some(Box::new(selector));
        self
    }

    /// Set the simplifier (replaces any existing one)
    pub fn set_simplifier<S>(mut self, simplifier: S) -> Self
    where
        S: PolygonSimplifier + 'static,
    {
        self.simplifier = Some(Box::new(simplifier));
        self
    }

    /// Pick the selector matching a contour policy
    pub fn with_contour_policy(self, policy: &ContourPolicy) -> Self {
        match *policy {
            ContourPolicy::MinimumArea { min_area } => self.set_selector(MinimumAreaSelector { min_area }),
            ContourPolicy::LargestOnly => self.set_selector(LargestContourSelector),
            ContourPolicy::All => self.set_selector(KeepAllSelector),
        }
    }

    /// Douglas-Peucker with a perimeter-relative tolerance
    pub fn with_epsilon_ratio(self, epsilon_ratio: f64) -> Self {
        self.set_simplifier(DouglasPeuckerSimplifier { epsilon_ratio })
    }

    /// Build the extractor with default components if not specified
    pub fn build(self) -> PolygonExtractor {
        let contour_extractor = self.contour_extractor
            .unwrap_or_else(|| Box::new(ExternalContourExtractor::default()));

        let selector = self.selector
            .unwrap_or_else(|| Box::new(MinimumAreaSelector::default()));

        let simplifier = self.simplifier
            .unwrap_or_else(|| Box::new(DouglasPeuckerSimplifier::default()));

        PolygonExtractor::new(self.threshold, contour_extractor, selector, simplifier)
    }
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
