use crate::models::order::Coord;
use crate::routing::matrix::{MatrixError, TimeMatrix};

const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mock travel-time provider: Manhattan distance over degree axes at a
/// fixed speed. City-scale accuracy is all the tests need; it also serves
/// as the fallback when no OSRM endpoint is configured.
#[derive(Debug, Clone)]
pub struct ManhattanMatrix {
    speed_mps: f64,
}

impl ManhattanMatrix {
    pub fn new(speed_mps: f64) -> Self {
        Self { speed_mps }
    }

    fn meters(from: Coord, to: Coord) -> f64 {
        ((from.lat - to.lat).abs() + (from.lon - to.lon).abs()) * METERS_PER_DEGREE
    }
}

impl TimeMatrix for ManhattanMatrix {
    fn time(&self, from: Coord, to: Coord) -> Result<f64, MatrixError> {
        Ok(Self::meters(from, to) / self.speed_mps)
    }

    fn prefetch(&self, _coords: &[Coord]) -> Result<(), MatrixError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_costs_nothing() {
        let matrix = ManhattanMatrix::new(10.0);
        let p = Coord::new(13.405, 52.52);
        assert_eq!(matrix.time(p, p).unwrap(), 0.0);
    }

    #[test]
    fn two_hundred_meters_at_ten_mps_takes_twenty_seconds() {
        let matrix = ManhattanMatrix::new(10.0);
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(200.0 / METERS_PER_DEGREE, 0.0);

        let t = matrix.time(a, b).unwrap();
        assert!((t - 20.0).abs() < 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let matrix = ManhattanMatrix::new(10.0);
        let a = Coord::new(13.39, 52.51);
        let b = Coord::new(13.42, 52.54);

        assert_eq!(matrix.time(a, b).unwrap(), matrix.time(b, a).unwrap());
    }
}
