//! Region table, point classification and coordinate normalization.
//!
//! Portugal is made of three disjoint areas, each with its own bounding box
//! and its own normalized `[0,1]x[0,1]` coordinate space.

use crate::error::{Error, Result};
use crate::models::NormalizedPoint;

/// Bounding box, stored in the `(max_lat, min_lon, min_lat, max_lon)` order
/// used by the region table literals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub max_lat: f64,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(max_lat: f64, min_lon: f64, min_lat: f64, max_lon: f64) -> Self {
        BoundingBox {
            max_lat,
            min_lon,
            min_lat,
            max_lon,
        }
    }

    /// Strict containment: points on an edge are outside.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude < self.max_lat
            && latitude > self.min_lat
            && longitude < self.max_lon
            && longitude > self.min_lon
    }

    fn has_extent(&self) -> bool {
        self.min_lat < self.max_lat && self.min_lon < self.max_lon
    }

    fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min_lat < other.max_lat
            && other.min_lat < self.max_lat
            && self.min_lon < other.max_lon
            && other.min_lon < self.max_lon
    }
}

/// A named area with its own coordinate space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub id: u8,
    pub name: &'static str,
    pub bounds: BoundingBox,
}

impl Region {
    /// Map a coordinate inside this region to its local unit square.
    ///
    /// `x` grows eastward from `min_lon`; `y` grows southward from `max_lat`.
    pub fn normalize(&self, latitude: f64, longitude: f64) -> NormalizedPoint {
        let b = &self.bounds;
        let x = normalize(longitude, b.min_lon, b.max_lon);
        let y = normalize(latitude, b.max_lat, b.min_lat);

        debug_assert!(
            (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y),
            "({latitude}, {longitude}) normalized outside region {} to ({x}, {y})",
            self.id
        );

        NormalizedPoint { x, y }
    }
}

/// Linear remap of `value` so that `start` maps to 0 and `stop` maps to 1.
pub fn normalize(value: f64, start: f64, stop: f64) -> f64 {
    (value - start) / (stop - start)
}

/// Regions of Portugal, in classification priority order
pub const PORTUGAL_REGIONS: [Region; 3] = [
    Region {
        id: 0,
        name: "Mainland",
        bounds: BoundingBox::new(42.1541, -9.5091, 36.9624, -6.1885),
    },
    Region {
        id: 1,
        name: "Azores",
        bounds: BoundingBox::new(39.7312, -31.2920, 36.9272, -25.0084),
    },
    // Inhabited islands only
    Region {
        id: 2,
        name: "Madeira",
        bounds: BoundingBox::new(33.1142, -17.2830, 32.6321, -16.2833),
    },
];

/// Validated, priority-ordered set of regions
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    /// Build a table, sorted by ascending id.
    ///
    /// Fails if a box has no extent on either axis, if two regions share an
    /// id, or if two boxes overlap.
    pub fn new(mut regions: Vec<Region>) -> Result<Self> {
        regions.sort_by_key(|r| r.id);

        for region in &regions {
            if !region.bounds.has_extent() {
                return Err(Error::Config(format!(
                    "region {} ({}) has an empty bounding box",
                    region.id, region.name
                )));
            }
        }

        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                if a.id == b.id {
                    return Err(Error::Config(format!("duplicate region id {}", a.id)));
                }
                if a.bounds.overlaps(&b.bounds) {
                    return Err(Error::Config(format!(
                        "regions {} ({}) and {} ({}) overlap",
                        a.id, a.name, b.id, b.name
                    )));
                }
            }
        }

        Ok(RegionTable { regions })
    }

    pub fn portugal() -> Result<Self> {
        Self::new(PORTUGAL_REGIONS.to_vec())
    }

    /// First region (by ascending id) strictly containing the point.
    pub fn classify(&self, latitude: f64, longitude: f64) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.bounds.contains(latitude, longitude))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
