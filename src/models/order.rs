use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `(lon, lat)` coordinate pair of finite floats.
///
/// Equality and hashing are bitwise over the IEEE representation, so
/// coordinates can key travel-time caches without fuzzy comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    fn bits(&self) -> (u64, u64) {
        (self.lon.to_bits(), self.lat.to_bits())
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Coord {}

impl std::hash::Hash for Coord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Raw,
    Batching,
    Ready,
    Assigned,
    Delivered,
    Cancelled,
}

/// A delivery order as held by the batching core.
///
/// The core only moves an order Raw -> Batching -> Ready; later transitions
/// belong to the dispatcher and the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Identifies the pickup origin (merchant). Two orders share a
    /// `pickup_id` iff their pickup coordinate is identical.
    pub pickup_id: String,
    pub pickup: Coord,
    pub dropoff: Coord,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Pickup,
    Dropoff,
}

/// One stop in a job route. Stops reference orders by id, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub kind: StopKind,
    pub order_id: String,
    pub coord: Coord,
}

impl Stop {
    pub fn pickup(order: &Order) -> Self {
        Self {
            kind: StopKind::Pickup,
            order_id: order.id.clone(),
            coord: order.pickup,
        }
    }

    pub fn dropoff(order: &Order) -> Self {
        Self {
            kind: StopKind::Dropoff,
            order_id: order.id.clone(),
            coord: order.dropoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_equality_is_bitwise() {
        let a = Coord::new(13.405, 52.52);
        let b = Coord::new(13.405, 52.52);
        let c = Coord::new(13.405 + 1e-12, 52.52);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn coord_hashes_like_it_compares() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Coord::new(9.9937, 53.5511));
        set.insert(Coord::new(9.9937, 53.5511));

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn non_finite_coords_are_rejected() {
        assert!(!Coord::new(f64::NAN, 52.52).is_finite());
        assert!(!Coord::new(13.405, f64::INFINITY).is_finite());
        assert!(Coord::new(13.405, 52.52).is_finite());
    }
}
