use crate::models::order::{Order, Stop};
use crate::routing::matrix::TimeMatrix;

/// Outcome of searching for the cheapest legal insertion of an order into
/// an existing stop sequence.
#[derive(Debug, Clone)]
pub struct FeasibilityResult {
    pub is_feasible: bool,
    pub best_stops: Vec<Stop>,
    pub best_time_seconds: f64,
}

impl FeasibilityResult {
    fn infeasible() -> Self {
        Self {
            is_feasible: false,
            best_stops: Vec::new(),
            best_time_seconds: f64::INFINITY,
        }
    }
}

/// Find the cheapest insertion of `order`'s pickup/dropoff pair into
/// `existing`.
///
/// Every `(i, j)` with `0 <= i <= j <= existing.len()` is enumerated: the
/// pickup lands at position `i` and the dropoff at position `j` of the
/// original sequence (adjacent when `i == j`). The relative order of
/// existing stops is untouched, so their pickup-before-dropoff precedence
/// holds by construction. Ties on total time resolve to the smallest
/// `(i, j)`, which keeps the search deterministic.
///
/// A candidate whose leg times the matrix cannot supply is skipped;
/// `is_feasible` is false only when no candidate could be priced.
pub fn evaluate_insertion(
    existing: &[Stop],
    order: &Order,
    matrix: &dyn TimeMatrix,
) -> FeasibilityResult {
    let pickup = Stop::pickup(order);
    let dropoff = Stop::dropoff(order);

    if existing.is_empty() {
        let stops = vec![pickup, dropoff];
        return match route_time(&stops, matrix) {
            Some(total) => FeasibilityResult {
                is_feasible: true,
                best_stops: stops,
                best_time_seconds: total,
            },
            None => FeasibilityResult::infeasible(),
        };
    }

    let n = existing.len();
    let mut best: Option<(Vec<Stop>, f64)> = None;

    for i in 0..=n {
        for j in i..=n {
            let mut stops = Vec::with_capacity(n + 2);
            stops.extend_from_slice(&existing[..i]);
            stops.push(pickup.clone());
            stops.extend_from_slice(&existing[i..j]);
            stops.push(dropoff.clone());
            stops.extend_from_slice(&existing[j..]);

            let Some(total) = route_time(&stops, matrix) else {
                continue;
            };

            let improves = match best.as_ref() {
                Some((_, incumbent)) => total < *incumbent,
                None => true,
            };
            if improves {
                best = Some((stops, total));
            }
        }
    }

    match best {
        Some((stops, total)) => FeasibilityResult {
            is_feasible: true,
            best_stops: stops,
            best_time_seconds: total,
        },
        None => FeasibilityResult::infeasible(),
    }
}

/// Total traversal time of a stop sequence, or None when any leg is
/// unservable.
pub fn route_time(stops: &[Stop], matrix: &dyn TimeMatrix) -> Option<f64> {
    let mut total = 0.0;
    for leg in stops.windows(2) {
        match matrix.time(leg[0].coord, leg[1].coord) {
            Ok(seconds) => total += seconds,
            Err(_) => return None,
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::order::{Coord, OrderStatus, StopKind};
    use crate::routing::manhattan::ManhattanMatrix;
    use crate::routing::matrix::MatrixError;

    const DEG: f64 = 1.0 / 111_320.0; // one meter in degrees

    fn order(id: &str, pickup_m: f64, dropoff_m: f64) -> Order {
        Order {
            id: id.to_string(),
            pickup_id: "m1".to_string(),
            pickup: Coord::new(pickup_m * DEG, 0.0),
            dropoff: Coord::new(dropoff_m * DEG, 0.0),
            created_at: Utc::now(),
            status: OrderStatus::Batching,
        }
    }

    #[test]
    fn empty_sequence_yields_the_trivial_route() {
        let matrix = ManhattanMatrix::new(10.0);
        let o = order("o1", 0.0, 500.0);

        let result = evaluate_insertion(&[], &o, &matrix);

        assert!(result.is_feasible);
        assert_eq!(result.best_stops.len(), 2);
        assert_eq!(result.best_stops[0].kind, StopKind::Pickup);
        assert_eq!(result.best_stops[1].kind, StopKind::Dropoff);
        assert!((result.best_time_seconds - 50.0).abs() < 1e-6);
    }

    #[test]
    fn insertion_picks_the_cheapest_positions() {
        let matrix = ManhattanMatrix::new(10.0);
        let first = order("o1", 0.0, 2000.0);
        let second = order("o2", 1950.0, 4000.0);

        let base = evaluate_insertion(&[], &first, &matrix);
        let result = evaluate_insertion(&base.best_stops, &second, &matrix);

        assert!(result.is_feasible);
        // best chain: P1, P2, D1, D2 = 195 + 5 + 200 seconds
        let kinds: Vec<(StopKind, &str)> = result
            .best_stops
            .iter()
            .map(|s| (s.kind, s.order_id.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (StopKind::Pickup, "o1"),
                (StopKind::Pickup, "o2"),
                (StopKind::Dropoff, "o1"),
                (StopKind::Dropoff, "o2"),
            ]
        );
        assert!((result.best_time_seconds - 400.0).abs() < 1e-6);
    }

    #[test]
    fn existing_precedence_is_preserved() {
        let matrix = ManhattanMatrix::new(10.0);
        let first = order("o1", 0.0, 1000.0);
        let second = order("o2", 100.0, 900.0);

        let base = evaluate_insertion(&[], &first, &matrix);
        let result = evaluate_insertion(&base.best_stops, &second, &matrix);

        let pos = |kind: StopKind, id: &str| {
            result
                .best_stops
                .iter()
                .position(|s| s.kind == kind && s.order_id == id)
                .unwrap()
        };
        assert!(pos(StopKind::Pickup, "o1") < pos(StopKind::Dropoff, "o1"));
        assert!(pos(StopKind::Pickup, "o2") < pos(StopKind::Dropoff, "o2"));
    }

    struct BrokenMatrix;

    impl TimeMatrix for BrokenMatrix {
        fn time(&self, _from: Coord, _to: Coord) -> Result<f64, MatrixError> {
            Err(MatrixError::Unavailable("down".to_string()))
        }

        fn prefetch(&self, _coords: &[Coord]) -> Result<(), MatrixError> {
            Err(MatrixError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn unavailable_matrix_means_infeasible_not_panic() {
        let o = order("o1", 0.0, 500.0);
        let result = evaluate_insertion(&[], &o, &BrokenMatrix);

        assert!(!result.is_feasible);
        assert!(result.best_stops.is_empty());
    }
}
