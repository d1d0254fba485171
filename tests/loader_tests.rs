use real_estate_toolkit::data::{Cleaner, DataLoader, DiagnosticSink, LoaderError};
use real_estate_toolkit::stats::{Columns, Descriptor};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Default)]
struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, path: &Path, error: &LoaderError) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{}: {error}", path.display()));
    }
}

fn write_fixture(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("houses.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn single_house_round_trip() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "id,price,area\n1,250000,80\n");
    let loader = DataLoader::new(&path);

    let records = loader.load_all_records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        Value::Object(records[0].clone()),
        json!({"id": 1, "price": 250000, "area": 80})
    );

    assert!(loader.validate_columns(&["price", "area"]));
    assert!(!loader.validate_columns(&["price", "year"]));
}

#[test]
fn operations_are_independent_reads() {
    let dir = tempdir().unwrap();
    let path = write_fixture(dir.path(), "id,price\n1,10\n");
    let loader = DataLoader::new(&path);

    assert_eq!(loader.load_all_records().len(), 1);

    fs::write(&path, "id,price,area\n1,10,5\n2,20,6\n").unwrap();

    assert_eq!(loader.load_all_records().len(), 2);
    assert!(loader.validate_columns(&["area"]));
}

#[test]
fn failures_are_absorbed_but_distinguishable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.csv");
    let sink = Arc::new(CollectingSink::default());
    let loader = DataLoader::with_sink(&path, sink.clone());

    assert!(loader.load_all_records().is_empty());
    assert!(!loader.validate_columns(&["id"]));

    let lines = sink.lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.contains("missing.csv")));

    assert!(loader.try_load_all_records().is_err());
    assert!(loader.try_validate_columns(&["id"]).is_err());
}

#[test]
fn load_clean_and_describe() {
    let dir = tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "Id,Sale Price,Pool QC\n1,100,NA\n2,300,Gd\n3,200,NA\n",
    );

    let mut cleaner = Cleaner::new(DataLoader::new(&path).load_all_records());
    cleaner.rename_with_best_practices();
    cleaner.na_to_none();
    let records = cleaner.into_records();

    let descriptor = Descriptor::new(&records);
    let ratios = descriptor
        .none_ratio(&Columns::named(["pool_qc"]))
        .unwrap();
    assert!((ratios["pool_qc"] - 2.0 / 3.0).abs() < 1e-12);

    let medians = descriptor.median(&Columns::named(["sale_price"])).unwrap();
    assert_eq!(medians["sale_price"], 200.0);
}
