use std::time::Duration;

use dashmap::DashMap;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::models::order::Coord;
use crate::routing::matrix::{MatrixError, TimeMatrix};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Travel-time provider backed by the OSRM `/table` service.
///
/// `prefetch` pulls one NxN duration table per cluster and fills a local
/// cache keyed by bitwise coordinates; `time` is then served without
/// network I/O. A cache miss falls back to a 2-point table fetch, and any
/// transport or decode failure maps to `MatrixError::Unavailable` so the
/// batcher can skip the pairing instead of failing the cycle.
pub struct OsrmMatrix {
    client: Client,
    base_url: String,
    profile: String,
    cache: DashMap<(Coord, Coord), f64>,
}

#[derive(Deserialize)]
struct TableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmMatrix {
    pub fn new(base_url: &str) -> Result<Self, MatrixError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| MatrixError::Unavailable(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: "driving".to_string(),
            cache: DashMap::new(),
        })
    }

    fn fetch_table(&self, coords: &[Coord]) -> Result<(), MatrixError> {
        if coords.len() < 2 {
            return Ok(());
        }

        let segment = coords
            .iter()
            .map(|c| format!("{},{}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!("{}/table/v1/{}/{}", self.base_url, self.profile, segment);

        let response = self
            .client
            .get(&url)
            .query(&[("annotations", "duration")])
            .send()
            .map_err(|err| MatrixError::Unavailable(format!("osrm request: {err}")))?;

        let body: TableResponse = response
            .json()
            .map_err(|err| MatrixError::Unavailable(format!("osrm response: {err}")))?;

        if body.code != "Ok" {
            return Err(MatrixError::Unavailable(format!(
                "osrm returned code {}",
                body.code
            )));
        }

        let durations = body
            .durations
            .ok_or_else(|| MatrixError::Unavailable("osrm table without durations".to_string()))?;

        for (i, row) in durations.iter().enumerate() {
            let Some(&from) = coords.get(i) else { break };
            for (j, cell) in row.iter().enumerate() {
                let Some(&to) = coords.get(j) else { break };
                // unroutable pairs come back as null; leave them uncached
                if let Some(seconds) = cell {
                    self.cache.insert((from, to), *seconds);
                }
            }
        }

        Ok(())
    }

    fn all_pairs_cached(&self, coords: &[Coord]) -> bool {
        coords.iter().all(|&a| {
            coords
                .iter()
                .all(|&b| a == b || self.cache.contains_key(&(a, b)))
        })
    }
}

impl TimeMatrix for OsrmMatrix {
    fn time(&self, from: Coord, to: Coord) -> Result<f64, MatrixError> {
        if from == to {
            return Ok(0.0);
        }
        if let Some(seconds) = self.cache.get(&(from, to)) {
            return Ok(*seconds);
        }

        self.fetch_table(&[from, to])?;

        self.cache
            .get(&(from, to))
            .map(|entry| *entry)
            .ok_or_else(|| {
                MatrixError::Unavailable(format!(
                    "no route from ({}, {}) to ({}, {})",
                    from.lon, from.lat, to.lon, to.lat
                ))
            })
    }

    fn prefetch(&self, coords: &[Coord]) -> Result<(), MatrixError> {
        let mut unique: Vec<Coord> = Vec::with_capacity(coords.len());
        for &coord in coords {
            if !unique.contains(&coord) {
                unique.push(coord);
            }
        }

        if self.all_pairs_cached(&unique) {
            return Ok(());
        }
        self.fetch_table(&unique)
    }
}
