//! Merge the GeoNames dump with the errata file.
//!
//! Errata entries always win: they are loaded first and any bulk row for a
//! code that is already known is dropped without complaint.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{bulk_columns, ErrataRow, PostalRecord};

const ERRATA_SOURCE: &str = "errata";
const BULK_SOURCE: &str = "bulk source";
const ERRATA_COLUMNS: usize = 4;

/// Counters collected while merging the two sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileStats {
    pub errata_codes: usize,
    pub bulk_codes: usize,
    pub bulk_missing_coordinates: usize,
    pub bulk_overridden: usize,
    pub bulk_duplicates: usize,
}

/// Canonical `code -> record` mapping, iterated in ascending code order
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub codes: BTreeMap<String, PostalRecord>,
    pub stats: ReconcileStats,
}

/// Parse both sources into one mapping. Any malformed line aborts the merge.
pub fn reconcile<B: Read, E: Read>(bulk: B, errata: E) -> Result<Reconciled> {
    let mut reconciled = Reconciled::default();

    let errata_codes = load_errata(errata, &mut reconciled)?;
    load_bulk(bulk, &errata_codes, &mut reconciled)?;

    info!(
        "Reconciled {} codes ({} from errata, {} from bulk source)",
        reconciled.codes.len(),
        reconciled.stats.errata_codes,
        reconciled.stats.bulk_codes
    );

    Ok(reconciled)
}

fn load_errata<E: Read>(errata: E, out: &mut Reconciled) -> Result<HashSet<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(errata);

    let mut seen = HashSet::new();

    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);

        if record.len() != ERRATA_COLUMNS {
            return Err(Error::parse(
                ERRATA_SOURCE,
                line,
                format!("expected {} fields, found {}", ERRATA_COLUMNS, record.len()),
            ));
        }

        let row: ErrataRow = record
            .deserialize(None)
            .map_err(|e| Error::parse(ERRATA_SOURCE, line, e.to_string()))?;

        if !seen.insert(row.code.clone()) {
            warn!("Errata code {} defined again at line {}, keeping the later entry", row.code, line);
        }
        out.codes.insert(row.code.clone(), row.into());
    }

    out.stats.errata_codes = seen.len();
    Ok(seen)
}

fn load_bulk<B: Read>(bulk: B, errata_codes: &HashSet<String>, out: &mut Reconciled) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(bulk);

    for result in reader.records() {
        let record = result?;
        let line = line_of(&record);

        if record.len() < bulk_columns::MIN_COLUMNS {
            return Err(Error::parse(
                BULK_SOURCE,
                line,
                format!(
                    "expected at least {} columns, found {}",
                    bulk_columns::MIN_COLUMNS,
                    record.len()
                ),
            ));
        }

        let code = record[bulk_columns::CODE].trim();
        let latitude = record[bulk_columns::LATITUDE].trim();
        let longitude = record[bulk_columns::LONGITUDE].trim();

        if latitude.is_empty() || longitude.is_empty() {
            debug!("Skipping {} (no coordinates)", code);
            out.stats.bulk_missing_coordinates += 1;
            continue;
        }

        if out.codes.contains_key(code) {
            if errata_codes.contains(code) {
                out.stats.bulk_overridden += 1;
            } else {
                warn!("Duplicate bulk code {} at line {}, keeping the first", code, line);
                out.stats.bulk_duplicates += 1;
            }
            continue;
        }

        let postal = PostalRecord {
            code: code.to_string(),
            place_name: record[bulk_columns::PLACE_NAME].trim().to_string(),
            latitude: parse_coordinate(latitude, "latitude", line)?,
            longitude: parse_coordinate(longitude, "longitude", line)?,
        };
        out.codes.insert(postal.code.clone(), postal);
        out.stats.bulk_codes += 1;
    }

    Ok(())
}

fn parse_coordinate(value: &str, field: &str, line: u64) -> Result<f64> {
    value.parse::<f64>().map_err(|e| {
        Error::parse(BULK_SOURCE, line, format!("invalid {} {:?}: {}", field, value, e))
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}
