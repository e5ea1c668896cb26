mod common;

use anyhow::Result;
use common::*;
use glyphsift::store::records_for;
use serde_json::Value;

fn sample_catalog() -> Catalog {
    Catalog::from(vec![
        make_symbol(1, 1, 20, vec![descriptor(0x00, 0)]),
        make_symbol(1, 2, 16, Vec::new()),
        make_symbol(2, 1, 25, vec![descriptor(0xFF, 0), descriptor(0xFF, 1)]),
    ])
}

#[test]
fn test_round_trip_preserves_everything_but_descriptors() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store = CatalogStore::new(dir.path().join("catalog.json"));
    let catalog = sample_catalog();

    let summary = store.merge(&catalog, None)?;
    assert_eq!(summary.previous, 0);
    assert_eq!(summary.appended, 3);

    let loaded = store.load()?;
    assert_eq!(loaded.symbols.len(), catalog.len());
    for (record, symbol) in loaded.symbols.iter().zip(catalog.symbols()) {
        assert_eq!(record.page, symbol.page);
        assert_eq!(record.symbol_id, symbol.symbol_id);
        assert_eq!(record.path, symbol.path);
        assert_eq!(record.position, symbol.position);
        assert_eq!(record.cluster_label, None);
    }
    Ok(())
}

#[test]
fn test_descriptors_never_written() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("catalog.json");
    CatalogStore::new(&path).merge(&sample_catalog(), None)?;

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let symbols = json["symbols"].as_array().expect("symbols array");
    assert_eq!(symbols.len(), 3);
    for symbol in symbols {
        let keys: Vec<&str> = symbol.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(!keys.contains(&"descriptors"));
        assert!(keys.contains(&"cluster_label"));
        assert_eq!(symbol["cluster_label"], Value::Null);
    }
    assert_eq!(symbols[2]["symbol_id"], "p2_s1");
    assert_eq!(symbols[2]["position"]["width"], 25);
    Ok(())
}

#[test]
fn test_labels_from_report_are_persisted() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store = CatalogStore::new(dir.path().join("catalog.json"));
    let catalog = sample_catalog();
    let report = ClusterAnalyzer::new(cluster_config(2, 2, 42))?.analyze(&catalog);

    store.merge(&catalog, Some(&report))?;
    let loaded = store.load()?;

    let labels: Vec<Option<ClusterLabel>> = loaded.symbols.iter().map(|s| s.cluster_label).collect();
    assert_eq!(labels, report.labels);
    assert_eq!(labels[1], None);
    assert_ne!(labels[0], labels[2]);
    Ok(())
}

#[test]
fn test_runs_append_without_dedup() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store = CatalogStore::new(dir.path().join("catalog.json"));
    let catalog = sample_catalog();

    store.merge(&catalog, None)?;
    let second = store.merge(&catalog, None)?;
    assert_eq!(second.previous, 3);
    assert_eq!(second.appended, 3);
    assert_eq!(second.total(), 6);

    let loaded = store.load()?;
    assert_eq!(loaded.symbols.len(), 6);
    // The same ids appear once per run
    assert_eq!(loaded.symbols[0].symbol_id, loaded.symbols[3].symbol_id);
    Ok(())
}

#[test]
fn test_existing_entries_and_unknown_keys_kept() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"{
            "source": "manual",
            "symbols": [
                {"page": 7, "symbol_id": "p7_s3", "path": "old/symbol_p7_s3.png",
                 "position": {"x": 1, "y": 2, "width": 30, "height": 40},
                 "cluster_label": 5, "reviewed": true}
            ]
        }"#,
    )?;

    let store = CatalogStore::new(&path);
    let summary = store.merge(&sample_catalog(), None)?;
    assert_eq!(summary.previous, 1);

    let loaded = store.load()?;
    assert_eq!(loaded.symbols.len(), 4);
    assert_eq!(loaded.extra.get("source"), Some(&Value::from("manual")));

    let old = &loaded.symbols[0];
    assert_eq!(old.symbol_id.as_str(), "p7_s3");
    assert_eq!(old.cluster_label, Some(ClusterLabel(5)));
    assert_eq!(old.extra.get("reviewed"), Some(&Value::from(true)));
    Ok(())
}

#[test]
fn test_corrupt_catalog_is_not_overwritten() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("catalog.json");
    let garbage = "{ this is not json";
    std::fs::write(&path, garbage)?;

    let store = CatalogStore::new(&path);
    let err = store.merge(&sample_catalog(), None).err().expect("merge must fail");
    assert!(matches!(err, Error::StoreRead { .. }));
    assert_eq!(std::fs::read_to_string(&path)?, garbage);
    Ok(())
}

#[test]
fn test_missing_parent_directory_is_created() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("nested").join("deeper").join("catalog.json");

    CatalogStore::new(&path).merge(&sample_catalog(), None)?;
    assert!(path.is_file());
    Ok(())
}

#[test]
fn test_records_follow_catalog_order() {
    let records: Vec<SymbolRecord> = records_for(&sample_catalog(), None);
    let ids: Vec<&str> = records.iter().map(|r| r.symbol_id.as_str()).collect();
    assert_eq!(ids, ["p1_s1", "p1_s2", "p2_s1"]);
}

#[test]
fn test_unwritable_destination_is_store_write_error() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "a file, not a directory")?;

    let err = CatalogStore::new(blocker.join("catalog.json"))
        .merge(&sample_catalog(), None)
        .err()
        .expect("parent is a regular file");
    match err {
        Error::StoreWrite { path, .. } => assert_eq!(path, blocker.join("catalog.json")),
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
