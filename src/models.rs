use serde::Deserialize;
use std::fmt;

use crate::format::format_g;

/// Row from the errata file: `code|place|lat|lon`
#[derive(Debug, Deserialize)]
pub struct ErrataRow {
    pub code: String,
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Column offsets in the GeoNames tab-delimited dump
pub mod bulk_columns {
    pub const CODE: usize = 1;
    pub const PLACE_NAME: usize = 2;
    pub const LATITUDE: usize = 9;
    pub const LONGITUDE: usize = 10;

    /// Minimum number of columns a row needs to reach every offset above
    pub const MIN_COLUMNS: usize = LONGITUDE + 1;
}

/// Reconciled postal code entry, keyed by `code`
#[derive(Debug, Clone, PartialEq)]
pub struct PostalRecord {
    pub code: String,
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<ErrataRow> for PostalRecord {
    fn from(row: ErrataRow) -> Self {
        PostalRecord {
            code: row.code,
            place_name: row.place_name,
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

/// Coordinates remapped into the `[0,1]` square of the owning region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// One line of the output database
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub code: String,
    pub place_name: String,
    pub region_id: u8,
    pub point: NormalizedPoint,
}

impl OutputRecord {
    /// Copy of this record under a different code (used for generalized codes)
    pub fn with_code(&self, code: String) -> Self {
        OutputRecord {
            code,
            ..self.clone()
        }
    }
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.code,
            self.place_name,
            self.region_id,
            format_g(self.point.x),
            format_g(self.point.y)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_line_format() {
        let record = OutputRecord {
            code: "1000-001".to_string(),
            place_name: "Lisboa".to_string(),
            region_id: 0,
            point: NormalizedPoint { x: 0.5, y: 0.25 },
        };
        assert_eq!(record.to_string(), "1000-001|Lisboa|0|0.5|0.25");
    }

    #[test]
    fn test_with_code_keeps_place_and_point() {
        let record = OutputRecord {
            code: "9000-123".to_string(),
            place_name: "Funchal".to_string(),
            region_id: 2,
            point: NormalizedPoint { x: 0.1, y: 0.9 },
        };
        let general = record.with_code("9000-000".to_string());
        assert_eq!(general.code, "9000-000");
        assert_eq!(general.place_name, "Funchal");
        assert_eq!(general.region_id, 2);
        assert_eq!(general.point, record.point);
    }
}
