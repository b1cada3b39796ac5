use super::*;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn import_parses_city_and_flags() {
    let cmd = parse_args(&argv(&[
        "import",
        "toronto",
        "--file",
        "trees.geojson",
        "--refresh",
        "--enrich",
        "--batch-size",
        "500",
        "--storage-dir",
        "/tmp/canopy",
    ]))
    .unwrap();
    assert_eq!(
        cmd,
        Command::Import(ImportArgs {
            city: City::Toronto,
            file: PathBuf::from("trees.geojson"),
            refresh: true,
            enrich: true,
            batch_size: 500,
            storage_dir: PathBuf::from("/tmp/canopy"),
        })
    );
}

#[test]
fn import_defaults_to_incremental() {
    let cmd = parse_args(&argv(&[
        "import",
        "boston",
        "--file",
        "trees.geojson",
        "--storage-dir",
        "/tmp/canopy",
    ]))
    .unwrap();
    let Command::Import(args) = cmd else {
        panic!("expected import");
    };
    assert!(!args.refresh);
    assert!(!args.enrich);
    assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
}

#[test]
fn import_rejects_unknown_city() {
    let err = parse_args(&argv(&["import", "gotham", "--file", "x.geojson"])).unwrap_err();
    assert!(err.contains("unknown city"));
}

#[test]
fn import_requires_file() {
    let err = parse_args(&argv(&["import", "ottawa"])).unwrap_err();
    assert!(err.contains("--file"));
}

#[test]
fn nearest_parses_coordinates_and_bounds() {
    let cmd = parse_args(&argv(&[
        "nearest",
        "--lat",
        "43.6532",
        "--lng",
        "-79.3832",
        "--limit",
        "25",
        "--max-distance-m",
        "250",
        "--storage-dir",
        "/tmp/canopy",
    ]))
    .unwrap();
    assert_eq!(
        cmd,
        Command::Nearest(NearestArgs {
            lat: 43.6532,
            lng: -79.3832,
            limit: Some(25),
            max_distance_m: Some(250.0),
            storage_dir: PathBuf::from("/tmp/canopy"),
        })
    );
}

#[test]
fn nearest_requires_both_coordinates() {
    let err = parse_args(&argv(&["nearest", "--lat", "43.6"])).unwrap_err();
    assert!(err.contains("--lng"));
}

#[test]
fn nearest_rejects_non_numeric_lat() {
    let err = parse_args(&argv(&["nearest", "--lat", "north", "--lng", "-79.3"])).unwrap_err();
    assert!(err.contains("--lat must be a number"));
}

#[test]
fn runs_parses_city_filter() {
    let cmd = parse_args(&argv(&[
        "runs",
        "--city",
        "montreal",
        "--limit",
        "5",
        "--storage-dir",
        "/tmp/canopy",
    ]))
    .unwrap();
    assert_eq!(
        cmd,
        Command::Runs(RunsArgs {
            city: Some(City::Montreal),
            limit: 5,
            storage_dir: PathBuf::from("/tmp/canopy"),
        })
    );
}

#[test]
fn archive_validates_date_override() {
    let err = parse_args(&argv(&[
        "archive",
        "--file",
        "x.geojson",
        "--city",
        "calgary",
        "--date",
        "2024-13-40",
    ]))
    .unwrap_err();
    assert!(err.contains("--date"));

    let cmd = parse_args(&argv(&[
        "archive",
        "--file",
        "x.geojson",
        "--city",
        "calgary",
        "--base-dir",
        "raw",
        "--date",
        "2024-06-15",
    ]))
    .unwrap();
    assert_eq!(
        cmd,
        Command::Archive(ArchiveArgs {
            file: PathBuf::from("x.geojson"),
            city: City::Calgary,
            base_dir: PathBuf::from("raw"),
            date: Some("2024-06-15".to_string()),
        })
    );
}

#[test]
fn unknown_command_is_rejected() {
    let err = parse_args(&argv(&["frobnicate"])).unwrap_err();
    assert!(err.contains("Unknown command"));
}

#[test]
fn nearest_rows_serialize_the_response_shape() {
    use canopy_core::geo::GeoPoint;
    use canopy_core::record::TreeRecord;

    let position = GeoPoint::try_new(43.6532, -79.3832).unwrap();
    let mut record = TreeRecord::new("Toronto Open Data Street Trees".to_string(), 7, position);
    record.common_name = Some("Red Oak".to_string());
    record.dbh_trunk = Some(40);
    let value = nearest_tree_json(&NearestTree {
        record,
        distance_m: 12.5,
    });

    assert_eq!(value["source"], "Toronto Open Data Street Trees");
    assert_eq!(value["objectid"], 7);
    assert_eq!(value["common_name"], "Red Oak");
    assert_eq!(value["dbh"], 40);
    assert_eq!(value["distance"], 12.5);
    assert_eq!(value["latitude"], 43.6532);
    assert_eq!(value["longitude"], -79.3832);
    assert!(value["botanical_name"].is_null());
}
