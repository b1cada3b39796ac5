#![forbid(unsafe_code)]

mod archive;
#[cfg(test)]
mod tests;
mod timefmt;

use canopy_core::city::City;
use canopy_storage::{
    DEFAULT_BATCH_SIZE, ImportRequest, ListRunsRequest, NearestRequest, NearestTree, QueryError,
    TreeStore,
};
use serde_json::json;
use std::path::PathBuf;

const DEFAULT_RUNS_LIMIT: usize = 20;

fn usage() -> &'static str {
    "canopy — municipal street-tree store: import, query, audit, archive\n\n\
USAGE:\n\
  canopy import CITY --file PATH [--refresh] [--enrich]\n\
                [--batch-size N] [--storage-dir DIR]\n\
  canopy nearest --lat F --lng F [--limit N] [--max-distance-m F]\n\
                [--storage-dir DIR]\n\
  canopy runs [--city CITY] [--limit N] [--storage-dir DIR]\n\
  canopy archive --file PATH --city CITY [--base-dir DIR] [--date YYYY-MM-DD]\n\n\
NOTES:\n\
  - CITY is one of: toronto, ottawa, montreal, calgary, waterloo, boston,\n\
    markham, oakville, peterborough.\n\
  - `--refresh` atomically replaces every stored row for the city's source;\n\
    without it rows are upserted incrementally.\n\
  - The storage dir defaults to CANOPY_STORAGE_DIR, then ./canopy_data.\n\
  - `archive` files raw downloads under <base>/<city>/<date>/<name>.\n"
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, PartialEq)]
enum Command {
    Import(ImportArgs),
    Nearest(NearestArgs),
    Runs(RunsArgs),
    Archive(ArchiveArgs),
}

#[derive(Debug, PartialEq)]
struct ImportArgs {
    city: City,
    file: PathBuf,
    refresh: bool,
    enrich: bool,
    batch_size: usize,
    storage_dir: PathBuf,
}

#[derive(Debug, PartialEq)]
struct NearestArgs {
    lat: f64,
    lng: f64,
    limit: Option<usize>,
    max_distance_m: Option<f64>,
    storage_dir: PathBuf,
}

#[derive(Debug, PartialEq)]
struct RunsArgs {
    city: Option<City>,
    limit: usize,
    storage_dir: PathBuf,
}

#[derive(Debug, PartialEq)]
struct ArchiveArgs {
    file: PathBuf,
    city: City,
    base_dir: PathBuf,
    date: Option<String>,
}

fn default_storage_dir() -> PathBuf {
    env_var("CANOPY_STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./canopy_data"))
}

fn parse_city(raw: &str) -> Result<City, String> {
    City::parse(raw).ok_or_else(|| {
        format!(
            "unknown city: {raw} (expected one of: {})",
            City::ALL
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(sub) = args.first() else {
        return Err(usage().to_string());
    };
    let rest = &args[1..];
    match sub.as_str() {
        "import" => parse_import(rest),
        "nearest" => parse_nearest(rest),
        "runs" => parse_runs(rest),
        "archive" => parse_archive(rest),
        other => Err(format!("Unknown command: {other}\n\n{}", usage())),
    }
}

fn parse_import(args: &[String]) -> Result<Command, String> {
    let mut city: Option<City> = None;
    let mut file: Option<PathBuf> = None;
    let mut refresh = false;
    let mut enrich = false;
    let mut batch_size: usize = DEFAULT_BATCH_SIZE;
    let mut storage_dir: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--file" => {
                i += 1;
                let v = args.get(i).ok_or("--file requires PATH")?;
                file = Some(PathBuf::from(v));
            }
            "--refresh" => refresh = true,
            "--enrich" => enrich = true,
            "--batch-size" => {
                i += 1;
                let v = args.get(i).ok_or("--batch-size requires N")?;
                batch_size = v
                    .parse::<usize>()
                    .map_err(|_| "--batch-size must be an integer")?;
            }
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            other if !other.starts_with('-') && city.is_none() => {
                city = Some(parse_city(other)?);
            }
            other => return Err(format!("Unknown arg: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    Ok(Command::Import(ImportArgs {
        city: city.ok_or("import requires CITY")?,
        file: file.ok_or("import requires --file PATH")?,
        refresh,
        enrich,
        batch_size,
        storage_dir: storage_dir.unwrap_or_else(default_storage_dir),
    }))
}

fn parse_nearest(args: &[String]) -> Result<Command, String> {
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;
    let mut limit: Option<usize> = None;
    let mut max_distance_m: Option<f64> = None;
    let mut storage_dir: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--lat" => {
                i += 1;
                let v = args.get(i).ok_or("--lat requires F")?;
                lat = Some(v.parse::<f64>().map_err(|_| "--lat must be a number")?);
            }
            "--lng" => {
                i += 1;
                let v = args.get(i).ok_or("--lng requires F")?;
                lng = Some(v.parse::<f64>().map_err(|_| "--lng must be a number")?);
            }
            "--limit" => {
                i += 1;
                let v = args.get(i).ok_or("--limit requires N")?;
                limit = Some(
                    v.parse::<usize>()
                        .map_err(|_| "--limit must be an integer")?,
                );
            }
            "--max-distance-m" => {
                i += 1;
                let v = args.get(i).ok_or("--max-distance-m requires F")?;
                max_distance_m = Some(
                    v.parse::<f64>()
                        .map_err(|_| "--max-distance-m must be a number")?,
                );
            }
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            other => return Err(format!("Unknown arg: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    Ok(Command::Nearest(NearestArgs {
        lat: lat.ok_or("nearest requires --lat F")?,
        lng: lng.ok_or("nearest requires --lng F")?,
        limit,
        max_distance_m,
        storage_dir: storage_dir.unwrap_or_else(default_storage_dir),
    }))
}

fn parse_runs(args: &[String]) -> Result<Command, String> {
    let mut city: Option<City> = None;
    let mut limit: usize = DEFAULT_RUNS_LIMIT;
    let mut storage_dir: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--city" => {
                i += 1;
                let v = args.get(i).ok_or("--city requires CITY")?;
                city = Some(parse_city(v)?);
            }
            "--limit" => {
                i += 1;
                let v = args.get(i).ok_or("--limit requires N")?;
                limit = v
                    .parse::<usize>()
                    .map_err(|_| "--limit must be an integer")?;
            }
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            other => return Err(format!("Unknown arg: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    Ok(Command::Runs(RunsArgs {
        city,
        limit,
        storage_dir: storage_dir.unwrap_or_else(default_storage_dir),
    }))
}

fn parse_archive(args: &[String]) -> Result<Command, String> {
    let mut file: Option<PathBuf> = None;
    let mut city: Option<City> = None;
    let mut base_dir: Option<PathBuf> = env_var("CANOPY_ARCHIVE_DIR").map(PathBuf::from);
    let mut date: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--file" => {
                i += 1;
                let v = args.get(i).ok_or("--file requires PATH")?;
                file = Some(PathBuf::from(v));
            }
            "--city" => {
                i += 1;
                let v = args.get(i).ok_or("--city requires CITY")?;
                city = Some(parse_city(v)?);
            }
            "--base-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--base-dir requires DIR")?;
                base_dir = Some(PathBuf::from(v));
            }
            "--date" => {
                i += 1;
                let v = args.get(i).ok_or("--date requires YYYY-MM-DD")?;
                if !archive::valid_date(v) {
                    return Err("--date must be YYYY-MM-DD".to_string());
                }
                date = Some(v.to_string());
            }
            other => return Err(format!("Unknown arg: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    Ok(Command::Archive(ArchiveArgs {
        file: file.ok_or("archive requires --file PATH")?,
        city: city.ok_or("archive requires --city CITY")?,
        base_dir: base_dir.unwrap_or_else(|| PathBuf::from(archive::DEFAULT_BASE_DIR)),
        date,
    }))
}

fn nearest_tree_json(tree: &NearestTree) -> serde_json::Value {
    let record = &tree.record;
    json!({
        "source": record.source,
        "objectid": record.objectid,
        "common_name": record.common_name,
        "botanical_name": record.botanical_name,
        "address": record.address,
        "streetname": record.streetname,
        "dbh": record.dbh_trunk,
        "pos": record.tree_position_number,
        "distance": tree.distance_m,
        "longitude": record.position.lng(),
        "latitude": record.position.lat(),
    })
}

fn run_import(args: &ImportArgs) -> Result<(), String> {
    let mut store = TreeStore::open(&args.storage_dir).map_err(|e| e.to_string())?;
    let mut request = ImportRequest::new(args.city, &args.file);
    request.refresh = args.refresh;
    request.enrich = args.enrich;
    request.batch_size = args.batch_size;
    let report = store.import(&request).map_err(|e| e.to_string())?;
    println!(
        "{}",
        json!({
            "city": report.run.city,
            "source_name": report.run.source_name,
            "status": report.run.status,
            "refresh": report.run.refresh_mode,
            "row_count": report.run.row_count,
            "skipped_rows": report.skipped_rows,
            "run_id": report.run.id,
            "finished_at": timefmt::ts_ms_to_rfc3339(report.run.finished_at_ms),
        })
    );
    Ok(())
}

fn run_nearest(args: &NearestArgs) -> Result<(), (i32, String)> {
    let store = TreeStore::open(&args.storage_dir).map_err(|e| (1, e.to_string()))?;
    let mut request = NearestRequest::new(args.lat, args.lng);
    request.limit = args.limit;
    request.max_distance_m = args.max_distance_m;
    let results = store.nearest(&request).map_err(|e| {
        // Validation mirrors a client-class (HTTP 400) failure.
        let code = match e {
            QueryError::Validation(_) => 2,
            _ => 1,
        };
        (code, e.to_string())
    })?;
    let rows: Vec<serde_json::Value> = results.iter().map(nearest_tree_json).collect();
    println!("{}", serde_json::Value::Array(rows));
    Ok(())
}

fn run_runs(args: &RunsArgs) -> Result<(), String> {
    let store = TreeStore::open(&args.storage_dir).map_err(|e| e.to_string())?;
    let request = ListRunsRequest {
        city: args.city,
        limit: args.limit,
    };
    let runs = store.list_runs(&request).map_err(|e| e.to_string())?;
    for run in &runs {
        println!(
            "{}",
            json!({
                "id": run.id,
                "city": run.city,
                "source_name": run.source_name,
                "source_file": run.source_file,
                "refresh": run.refresh_mode,
                "row_count": run.row_count,
                "status": run.status,
                "error_message": run.error_message,
                "started_at": timefmt::ts_ms_to_rfc3339(run.started_at_ms),
                "finished_at": timefmt::ts_ms_to_rfc3339(run.finished_at_ms),
            })
        );
    }
    Ok(())
}

fn run_archive(args: &ArchiveArgs) -> Result<(), String> {
    let dest = archive::archive_file(&args.base_dir, args.city, args.date.as_deref(), &args.file)
        .map_err(|e| format!("archive failed: {e}"))?;
    println!(
        "{}",
        json!({
            "city": args.city.as_str(),
            "archived_to": dest.display().to_string(),
        })
    );
    Ok(())
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", usage());
        return;
    }

    let cmd = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    match cmd {
        Command::Import(args) => {
            if let Err(e) = run_import(&args) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Command::Nearest(args) => {
            if let Err((code, e)) = run_nearest(&args) {
                eprintln!("{e}");
                std::process::exit(code);
            }
        }
        Command::Runs(args) => {
            if let Err(e) = run_runs(&args) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Command::Archive(args) => {
            if let Err(e) = run_archive(&args) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
}
