//! Database assembly and output.
//!
//! Walks the reconciled codes in ascending order, drops the ones outside
//! every region, adds generalized codes, and writes the deduplicated,
//! byte-sorted result atomically.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::generalize::Generalizer;
use crate::models::OutputRecord;
use crate::reconcile::{reconcile, Reconciled, ReconcileStats};
use crate::regions::RegionTable;

/// Summary of one build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub sources: ReconcileStats,
    pub out_of_region: usize,
    pub per_region: BTreeMap<u8, usize>,
    pub generalized: usize,
    pub lines: usize,
}

/// Finished database: unique lines in byte order
#[derive(Debug, Clone, Default)]
pub struct Database {
    lines: BTreeMap<String, OutputRecord>,
}

impl Database {
    fn insert(&mut self, record: OutputRecord) {
        self.lines.entry(record.to_string()).or_insert(record);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Records in output order
    pub fn records(&self) -> impl Iterator<Item = &OutputRecord> {
        self.lines.values()
    }

    /// Serialized lines in output order, without terminators
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.keys().map(String::as_str)
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        for line in self.lines() {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write to a temporary file beside `path`, then rename it over `path`.
    ///
    /// On any failure the target is left as it was.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        self.write_to(BufWriter::new(tmp.as_file_mut()))?;
        tmp.as_file().sync_all()?;

        tmp.persist(path).map_err(|e| Error::Persist {
            path: path.display().to_string(),
            source: e.error,
        })?;

        Ok(())
    }
}

/// Turns the two raw sources into a [`Database`]
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    regions: RegionTable,
}

impl DatabaseBuilder {
    pub fn new(regions: RegionTable) -> Self {
        DatabaseBuilder { regions }
    }

    /// Reconcile the sources and assemble the database.
    pub fn build<B: Read, E: Read>(&self, bulk: B, errata: E) -> Result<(Database, BuildReport)> {
        let reconciled = reconcile(bulk, errata)?;
        Ok(self.assemble(&reconciled))
    }

    pub fn build_files(&self, bulk: &Path, errata: &Path) -> Result<(Database, BuildReport)> {
        let bulk = BufReader::new(File::open(bulk)?);
        let errata = BufReader::new(File::open(errata)?);
        self.build(bulk, errata)
    }

    /// Classify, normalize and generalize every reconciled code.
    pub fn assemble(&self, reconciled: &Reconciled) -> (Database, BuildReport) {
        let mut db = Database::default();
        let mut generalizer = Generalizer::new();
        let mut report = BuildReport {
            sources: reconciled.stats.clone(),
            ..Default::default()
        };

        // BTreeMap iteration is ascending by code, which decides which
        // record a generalized code borrows its place and position from.
        for (code, record) in &reconciled.codes {
            let region = match self.regions.classify(record.latitude, record.longitude) {
                Some(region) => region,
                None => {
                    debug!(
                        "Skipping {} at ({}, {}): outside all regions",
                        code, record.latitude, record.longitude
                    );
                    report.out_of_region += 1;
                    continue;
                }
            };

            let output = OutputRecord {
                code: code.clone(),
                place_name: record.place_name.clone(),
                region_id: region.id,
                point: region.normalize(record.latitude, record.longitude),
            };
            *report.per_region.entry(region.id).or_insert(0) += 1;

            if let Some(general) =
                generalizer.synthesize(code, |c| reconciled.codes.contains_key(c))
            {
                db.insert(output.with_code(general));
            }
            db.insert(output);
        }

        report.generalized = generalizer.count();
        report.lines = db.len();

        info!(
            "Assembled {} lines ({} generalized, {} codes outside all regions)",
            report.lines, report.generalized, report.out_of_region
        );
        for region in self.regions.regions() {
            let count = report.per_region.get(&region.id).copied().unwrap_or(0);
            info!("  {} (region {}): {} codes", region.name, region.id, count);
        }

        (db, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new(RegionTable::portugal().unwrap())
    }

    fn bulk_row(code: &str, place: &str, lat: &str, lon: &str) -> String {
        format!("PT\t{}\t{}\t\t\t\t\t\t\t{}\t{}\t\n", code, place, lat, lon)
    }

    fn render(db: &Database) -> String {
        let mut out = Vec::new();
        db.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_lisboa_and_generalized_code() {
        let bulk = bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393");
        let (db, report) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        assert_eq!(
            render(&db),
            "1000-000|Lisboa|0|0.111365|0.661017\n1000-001|Lisboa|0|0.111365|0.661017\n"
        );
        assert_eq!(report.generalized, 1);
        assert_eq!(report.lines, 2);
    }

    #[test]
    fn test_errata_entry_in_madeira() {
        let bulk = bulk_row("9999-123", "Bulk Place", "38.7", "-9.1");
        let errata = "9999-123|Test Place|33.0|-17.0\n";
        let (db, _) = builder().build(bulk.as_bytes(), errata.as_bytes()).unwrap();

        let lines: Vec<&str> = db.lines().collect();
        assert_eq!(
            lines,
            vec![
                "9999-000|Test Place|2|0.283085|0.23688",
                "9999-123|Test Place|2|0.283085|0.23688",
            ]
        );
    }

    #[test]
    fn test_codes_outside_regions_are_dropped() {
        let bulk = [
            bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393"),
            bulk_row("5000-001", "Madrid", "40.4168", "-3.7038"),
        ]
        .concat();
        let (db, report) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        assert!(db.records().all(|r| !r.code.starts_with("5000")));
        assert_eq!(report.out_of_region, 1);
    }

    #[test]
    fn test_codes_without_coordinates_never_appear() {
        let bulk = [
            bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393"),
            bulk_row("1000-002", "Lisboa", "", ""),
        ]
        .concat();
        let (db, _) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        assert!(db.records().all(|r| r.code != "1000-002"));
    }

    #[test]
    fn test_generalized_code_uses_lowest_code_and_is_unique() {
        let bulk = [
            bulk_row("4000-300", "Porto B", "41.15", "-8.61"),
            bulk_row("4000-100", "Porto A", "41.16", "-8.62"),
            bulk_row("4000-200", "Porto C", "41.17", "-8.63"),
        ]
        .concat();
        let (db, report) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        let general: Vec<&OutputRecord> =
            db.records().filter(|r| r.code == "4000-000").collect();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].place_name, "Porto A");
        assert_eq!(report.generalized, 1);
    }

    #[test]
    fn test_real_generalized_code_is_not_synthesized() {
        let bulk = [
            bulk_row("4000-000", "Porto Real", "41.15", "-8.61"),
            bulk_row("4000-100", "Porto A", "41.16", "-8.62"),
        ]
        .concat();
        let (db, report) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        let general: Vec<&OutputRecord> =
            db.records().filter(|r| r.code == "4000-000").collect();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].place_name, "Porto Real");
        assert_eq!(report.generalized, 0);
    }

    #[test]
    fn test_real_code_outside_regions_still_blocks_generalization() {
        let bulk = [
            bulk_row("4000-000", "Nowhere", "0.0", "0.0"),
            bulk_row("4000-100", "Porto A", "41.16", "-8.62"),
        ]
        .concat();
        let (db, _) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        assert!(db.records().all(|r| r.code != "4000-000"));
    }

    #[test]
    fn test_output_is_sorted_and_unique() {
        let bulk = [
            bulk_row("9000-200", "Funchal", "32.66", "-16.92"),
            bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393"),
            bulk_row("9500-100", "Ponta Delgada", "37.74", "-25.67"),
            bulk_row("1000-002", "Lisboa", "38.72", "-9.14"),
        ]
        .concat();
        let (db, _) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        let lines: Vec<&str> = db.lines().collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);

        let codes: std::collections::HashSet<&str> =
            lines.iter().map(|l| l.split('|').next().unwrap()).collect();
        assert_eq!(codes.len(), lines.len());
    }

    #[test]
    fn test_build_is_deterministic() {
        let bulk = [
            bulk_row("9000-200", "Funchal", "32.66", "-16.92"),
            bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393"),
            bulk_row("9500-100", "Ponta Delgada", "37.74", "-25.67"),
        ]
        .concat();
        let errata = "3000-001|Coimbra|40.2|-8.4\n";

        let (first, _) = builder().build(bulk.as_bytes(), errata.as_bytes()).unwrap();
        let (second, _) = builder().build(bulk.as_bytes(), errata.as_bytes()).unwrap();
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("postalcodes.txt");
        std::fs::write(&target, "stale\n").unwrap();

        let bulk = bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393");
        let (db, _) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();
        db.write_atomic(&target).unwrap();

        let written = std::fs::read_to_string(&target).unwrap();
        assert_eq!(written, render(&db));
        // Only the target remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_rename_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("postalcodes.txt");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.txt"), "keep\n").unwrap();

        let bulk = bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393");
        let (db, _) = builder().build(bulk.as_bytes(), "".as_bytes()).unwrap();

        let result = db.write_atomic(&target);
        assert!(matches!(result, Err(Error::Persist { .. })));
        assert!(target.is_dir());
        assert_eq!(std::fs::read_to_string(target.join("keep.txt")).unwrap(), "keep\n");
        // The temporary file is cleaned up
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_build_leaves_target_untouched() {
        let dir = TempDir::new().unwrap();
        let bulk_path = dir.path().join("PT.txt");
        let errata_path = dir.path().join("errata.txt");
        let target = dir.path().join("postalcodes.txt");

        std::fs::write(&bulk_path, bulk_row("1000-001", "Lisboa", "38.7223", "-9.1393")).unwrap();
        std::fs::write(&errata_path, "9000-001|Funchal|not-a-number|-16.9\n").unwrap();
        std::fs::write(&target, "previous\n").unwrap();

        let result = builder().build_files(&bulk_path, &errata_path);
        assert!(matches!(result, Err(Error::Parse { .. })));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "previous\n");
    }

    #[test]
    fn test_missing_errata_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let bulk_path = dir.path().join("PT.txt");
        std::fs::write(&bulk_path, "").unwrap();

        let result = builder().build_files(&bulk_path, &dir.path().join("missing.txt"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
