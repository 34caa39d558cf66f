use crate::{error::Result, traits::PolygonSimplifier, types::Contour};

/// Douglas-Peucker simplifier using geo crate's implementation.
///
/// The tolerance scales with the contour: `epsilon = epsilon_ratio * perimeter`.
#[derive(Debug, Clone)]
pub struct DouglasPeuckerSimplifier {
    pub epsilon_ratio: f64,
}

impl Default for DouglasPeuckerSimplifier {
    fn default() -> Self {
        Self { epsilon_ratio: 0.005 }
    }
}

impl DouglasPeuckerSimplifier {
    pub fn tolerance_for(&self, contour: &Contour) -> f64 {
        self.epsilon_ratio * contour.arc_length()
    }
}

impl PolygonSimplifier for DouglasPeuckerSimplifier {
    fn simplify(&self, contour: &Contour) -> Result<Contour> {
        use geo::Simplify;

        if contour.len() < 3 {
            return Ok(contour.clone());
        }

        let epsilon = self.tolerance_for(contour);
        let ring = contour.to_closed_linestring();
        let simplified = ring.simplify(&epsilon);

        let mut points: Vec<[f64; 2]> = simplified.coords()
            .map(|coord| [coord.x, coord.y])
            .collect();

        // Open the ring again
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        Ok(Contour::new(points))
    }
}
