use thiserror::Error;

use crate::models::order::Coord;

#[derive(Debug, Error)]
pub enum MatrixError {
    /// The backing routing service could not produce a travel time.
    /// Callers skip the affected pairing; the order is retried next cycle.
    #[error("travel time unavailable: {0}")]
    Unavailable(String),
}

/// Pairwise travel-time oracle.
///
/// `time(a, a)` is zero and asymmetry is permitted. `prefetch` must make
/// every pair within `coords` servable from local state; it is idempotent
/// and safe for concurrent use. The batcher is quadratic in coordinates per
/// cluster, so one bulk prefetch replaces N individual round-trips.
pub trait TimeMatrix: Send + Sync {
    fn time(&self, from: Coord, to: Coord) -> Result<f64, MatrixError>;

    fn prefetch(&self, coords: &[Coord]) -> Result<(), MatrixError>;
}
