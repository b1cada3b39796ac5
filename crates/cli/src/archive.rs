#![forbid(unsafe_code)]

//! Raw dataset archiving: every downloaded city file lands under
//! `<base>/<city>/<YYYY-MM-DD>/<file name>` so re-imports stay reproducible.

use crate::timefmt::system_time_to_date;
use canopy_core::city::City;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_BASE_DIR: &str = "data/raw";

/// Dataset date derived from filesystem metadata: creation time where the
/// platform records one, modification time otherwise.
pub(crate) fn dataset_date_for_path(path: &Path) -> io::Result<String> {
    let meta = std::fs::metadata(path)?;
    let ts = meta.created().or_else(|_| meta.modified())?;
    Ok(system_time_to_date(ts))
}

/// Canonical destination for a raw dataset file.
pub(crate) fn archive_destination(base_dir: &Path, city: City, date: &str, path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default();
    base_dir.join(city.as_str()).join(date).join(name)
}

/// Move the file into the archive layout and return the destination.
pub(crate) fn archive_file(
    base_dir: &Path,
    city: City,
    date: Option<&str>,
    path: &Path,
) -> io::Result<PathBuf> {
    let date = match date {
        Some(d) => d.to_string(),
        None => dataset_date_for_path(path)?,
    };
    let dest = archive_destination(base_dir, city, &date, path);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // rename fails across filesystems; fall back to copy-then-remove.
    if std::fs::rename(path, &dest).is_err() {
        std::fs::copy(path, &dest)?;
        std::fs::remove_file(path)?;
    }
    Ok(dest)
}

/// Strict `YYYY-MM-DD` shape check for the `--date` override.
pub(crate) fn valid_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits = [0, 1, 2, 3, 5, 6, 8, 9]
        .iter()
        .all(|&i| bytes[i].is_ascii_digit());
    if !digits {
        return false;
    }
    let month: u32 = raw[5..7].parse().unwrap_or(0);
    let day: u32 = raw[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "canopy_archive_{name}_{}_{}",
            std::process::id(),
            nonce
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn destination_layout_is_base_city_date_name() {
        let dest = archive_destination(
            Path::new("data/raw"),
            City::Toronto,
            "2024-05-01",
            Path::new("/tmp/downloads/street_trees.geojson"),
        );
        assert_eq!(
            dest,
            PathBuf::from("data/raw/toronto/2024-05-01/street_trees.geojson")
        );
    }

    #[test]
    fn archive_moves_the_file() {
        let dir = temp_dir("move");
        let src = dir.join("ottawa.geojson");
        std::fs::write(&src, b"{}").unwrap();
        let base = dir.join("raw");

        let dest = archive_file(&base, City::Ottawa, Some("2024-06-15"), &src).unwrap();
        assert_eq!(dest, base.join("ottawa/2024-06-15/ottawa.geojson"));
        assert!(dest.is_file());
        assert!(!src.exists());
    }

    #[test]
    fn date_falls_back_to_file_metadata() {
        let dir = temp_dir("meta");
        let src = dir.join("boston.geojson");
        std::fs::write(&src, b"{}").unwrap();
        let derived = dataset_date_for_path(&src).unwrap();
        assert!(valid_date(&derived));
    }

    #[test]
    fn date_shape_is_validated() {
        assert!(valid_date("2024-01-31"));
        assert!(!valid_date("2024-13-01"));
        assert!(!valid_date("2024-00-10"));
        assert!(!valid_date("24-01-01"));
        assert!(!valid_date("2024/01/01"));
        assert!(!valid_date("2024-01-1"));
    }
}
