use std::fs::File;
use std::path::Path;

use battery_lifetime::data::format::mat::write_columns;
use battery_lifetime::{
    Lifetime, LoaderError, SkipReason, discover_units, extract_lifetime,
    extract_lifetimes_from_folder, parse_unit,
};

fn write_mat(dir: &Path, name: &str, cycle: &[f64], capacity: &[f64]) {
    let file = File::create(dir.join(name)).unwrap();
    write_columns(file, &[("cycle", cycle), ("capacity", capacity)]).unwrap();
}

/// Three well-formed units in three formats, one corrupt MAT file.
fn mixed_fleet(dir: &Path) {
    write_mat(
        dir,
        "B0005.mat",
        &[1.0, 2.0, 3.0, 4.0, 5.0],
        &[2.0, 1.9, 1.8, 1.4, 1.3],
    );
    std::fs::write(
        dir.join("B0006.csv"),
        "cycle,capacity,impedance\n1,2.0,0.07\n2,1.99,0.071\n3,1.97,0.073\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("B0007.json"),
        r#"[{"cycle": 1, "capacity": 1.8}, {"cycle": 2, "capacity": 1.2}]"#,
    )
    .unwrap();
    std::fs::write(dir.join("B0018.mat"), b"MATLAB 5.0 MAT-file, truncated").unwrap();
    std::fs::write(dir.join("notes.txt"), "not a unit").unwrap();
}

#[test]
fn corrupt_unit_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());

    let ds = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();

    assert_eq!(ds.len(), 3);
    assert_eq!(ds.skipped().len(), 1);
    assert_eq!(ds.skipped()[0].unit_id, "B0018");
    assert!(matches!(ds.skipped()[0].reason, SkipReason::Parse(_)));

    let ids: Vec<&str> = ds.iter().map(|u| u.unit_id.as_str()).collect();
    assert_eq!(ids, vec!["B0005", "B0006", "B0007"]);
}

#[test]
fn lifetimes_follow_first_inclusive_crossing() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());

    let ds = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();

    // 0.7 * 2.0 = 1.4 is reached exactly at the fourth record.
    assert_eq!(ds.units()[0].lifetime, Lifetime::Failed { cycle: 4 });
    assert_eq!(
        ds.units()[1].lifetime,
        Lifetime::Censored {
            last_observed_cycle: 3
        }
    );
    assert_eq!(ds.units()[2].lifetime, Lifetime::Failed { cycle: 2 });

    assert_eq!(ds.observed_lifetimes(), vec![4, 2]);
    assert_eq!(ds.censored_count(), 1);
    assert_eq!(ds.survival_pairs(), vec![(4, false), (3, true), (2, false)]);
    assert_eq!(ds.initial_capacities(), vec![2.0, 2.0, 1.8]);

    let rise = ds.get("B0006").and_then(|u| u.impedance_rise).unwrap();
    assert!((rise - 0.003).abs() < 1e-9);
}

#[test]
fn extraction_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());

    let first = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();
    let second = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();
    assert_eq!(first, second);
}

#[test]
fn out_of_range_threshold_is_rejected_before_any_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());

    let err = extract_lifetimes_from_folder(dir.path(), 1.5).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidConfig(_)));

    let err = extract_lifetimes_from_folder(dir.path().join("missing"), 1.5).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidConfig(_)));
}

#[test]
fn empty_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap_err();
    assert!(matches!(err, LoaderError::NotFound { .. }));
}

#[test]
fn step_by_step_pipeline_matches_folder_extraction() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());

    let files = discover_units(dir.path()).unwrap();
    assert_eq!(files.len(), 4);

    let unit = parse_unit(&files[0]).unwrap();
    assert_eq!(unit.id(), "B0005");
    assert_eq!(unit.cycle_count(), 5);

    let summary = extract_lifetime(&unit, 0.7).unwrap();
    let ds = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();
    assert_eq!(&summary, &ds.units()[0]);

    assert!(matches!(
        parse_unit(&files[3]),
        Err(LoaderError::Parse { ref unit, .. }) if unit == "B0018"
    ));
}

#[test]
fn dataset_cache_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    mixed_fleet(dir.path());
    let ds = extract_lifetimes_from_folder(dir.path(), 0.7).unwrap();

    let cache = tempfile::tempdir().unwrap();
    let path = cache.path().join("dataset.json");
    ds.save_json(&path).unwrap();

    let loaded = battery_lifetime::Dataset::load_json(&path).unwrap();
    assert_eq!(loaded, ds);
    assert_eq!(loaded.threshold_fraction().value(), 0.7);
}
