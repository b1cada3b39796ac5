#![forbid(unsafe_code)]

//! The import pipeline: map a raw city file, upsert or replace the source's
//! rows in chunked writes, then append exactly one audit row.

use super::adapters;
use super::error::StoreError;
use super::requests::ImportRequest;
use super::{ImportRunRow, TreeStore, now_ms, source_row_count_tx};
use canopy_core::city::{City, Enrichment};
use canopy_core::record::TreeRecord;
use rusqlite::{Transaction, params};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one pipeline invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    /// The audit row appended for this run.
    pub run: ImportRunRow,
    /// Rows dropped by row-level mapping failures.
    pub skipped_rows: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InsertMode {
    /// Plain insert: refresh mode replaces the whole source, so a duplicate
    /// identity is a constraint failure that rolls the replacement back.
    Insert,
    /// Incremental upsert keyed on `(source, objectid)`, converging every
    /// mutable field to the latest values.
    Upsert,
}

impl TreeStore {
    /// Run one import. Exactly one audit row is appended whether the run
    /// succeeds or fails; a failed run leaves no partial refresh behind.
    ///
    /// Concurrent imports against the same source are not coordinated here;
    /// operators serialize invocations per source.
    pub fn import(&mut self, request: &ImportRequest) -> Result<ImportReport, StoreError> {
        let started_at_ms = now_ms();
        match self.import_rows(request, started_at_ms) {
            Ok(report) => {
                self.refresh_statistics();
                Ok(report)
            }
            Err(err) => {
                // The failed transaction is already rolled back. Audit the
                // failure on a fresh transaction, best-effort, so the
                // invocation stays visible even when the database is sick.
                let _ = self.record_failed_run(request, &err.to_string(), started_at_ms);
                Err(err)
            }
        }
    }

    fn import_rows(
        &mut self,
        request: &ImportRequest,
        started_at_ms: i64,
    ) -> Result<ImportReport, StoreError> {
        let source_name = request.city.source_name();
        let mapped = adapters::map_file(request.city, &request.file_path)?;

        let mut rows = Vec::with_capacity(mapped.len());
        let mut skipped_rows = 0usize;
        for row in mapped {
            match row {
                Ok(record) => rows.push(record),
                Err(_) => skipped_rows += 1,
            }
        }

        let batch_size = request.batch_size.max(1);

        let run = if request.refresh {
            // Atomic replace: delete plus all inserts plus the audit row
            // commit together, so readers never observe a partial source.
            let tx = self.conn_mut().transaction()?;
            tx.execute(
                "DELETE FROM street_trees WHERE source = ?1",
                params![source_name],
            )?;
            for chunk in rows.chunks(batch_size) {
                insert_chunk_tx(&tx, chunk, InsertMode::Insert)?;
            }
            if request.enrich {
                apply_enrichments_tx(&tx, request.city)?;
            }
            let row_count = source_row_count_tx(&tx, source_name)?;
            let run = record_run_tx(&tx, request, Some(row_count), RunStatus::Success, None, started_at_ms)?;
            tx.commit()?;
            run
        } else {
            // Incremental: each chunk commits on its own to bound
            // transaction duration and memory.
            for chunk in rows.chunks(batch_size) {
                let tx = self.conn_mut().transaction()?;
                insert_chunk_tx(&tx, chunk, InsertMode::Upsert)?;
                tx.commit()?;
            }
            let tx = self.conn_mut().transaction()?;
            if request.enrich {
                apply_enrichments_tx(&tx, request.city)?;
            }
            let row_count = source_row_count_tx(&tx, source_name)?;
            let run = record_run_tx(&tx, request, Some(row_count), RunStatus::Success, None, started_at_ms)?;
            tx.commit()?;
            run
        };

        Ok(ImportReport { run, skipped_rows })
    }

    fn record_failed_run(
        &mut self,
        request: &ImportRequest,
        message: &str,
        started_at_ms: i64,
    ) -> Result<ImportRunRow, StoreError> {
        let tx = self.conn_mut().transaction()?;
        let run = record_run_tx(&tx, request, None, RunStatus::Failed, Some(message), started_at_ms)?;
        tx.commit()?;
        Ok(run)
    }

    fn refresh_statistics(&self) {
        // Keeps nearest-neighbor plans honest after bulk writes. The import
        // is already durable, so a statistics failure is not a run failure.
        let _ = self.conn().execute_batch("ANALYZE street_trees;");
    }
}

fn insert_chunk_tx(
    tx: &Transaction<'_>,
    chunk: &[TreeRecord],
    mode: InsertMode,
) -> Result<(), StoreError> {
    let sql = match mode {
        InsertMode::Insert => {
            r#"
            INSERT INTO street_trees (
              source, objectid, city_id, structid, address, streetname,
              crossstreet1, crossstreet2, suffix, unit_number,
              tree_position_number, site, ward, botanical_name, common_name,
              dbh_trunk, latitude, longitude
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
            "#
        }
        InsertMode::Upsert => {
            r#"
            INSERT INTO street_trees (
              source, objectid, city_id, structid, address, streetname,
              crossstreet1, crossstreet2, suffix, unit_number,
              tree_position_number, site, ward, botanical_name, common_name,
              dbh_trunk, latitude, longitude
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
            ON CONFLICT (source, objectid) DO UPDATE SET
              city_id = excluded.city_id,
              structid = excluded.structid,
              address = excluded.address,
              streetname = excluded.streetname,
              crossstreet1 = excluded.crossstreet1,
              crossstreet2 = excluded.crossstreet2,
              suffix = excluded.suffix,
              unit_number = excluded.unit_number,
              tree_position_number = excluded.tree_position_number,
              site = excluded.site,
              ward = excluded.ward,
              botanical_name = excluded.botanical_name,
              common_name = excluded.common_name,
              dbh_trunk = excluded.dbh_trunk,
              latitude = excluded.latitude,
              longitude = excluded.longitude
            "#
        }
    };

    let mut stmt = tx.prepare_cached(sql)?;
    for record in chunk {
        stmt.execute(params![
            record.source,
            record.objectid,
            record.city_id,
            record.structid,
            record.address,
            record.streetname,
            record.crossstreet1,
            record.crossstreet2,
            record.suffix,
            record.unit_number,
            record.tree_position_number,
            record.site,
            record.ward,
            record.botanical_name,
            record.common_name,
            record.dbh_trunk,
            record.position.lat(),
            record.position.lng(),
        ])?;
    }
    Ok(())
}

fn apply_enrichments_tx(tx: &Transaction<'_>, city: City) -> Result<(), StoreError> {
    let source_name = city.source_name();
    for enrichment in city.enrichments() {
        match enrichment {
            Enrichment::WikipediaLinks => {
                tx.execute(
                    r#"
                    UPDATE street_trees
                    SET wikipedia_url = (
                      SELECT wikipedia_url FROM species_links
                      WHERE species_links.common_name = street_trees.common_name
                    )
                    WHERE source = ?1
                      AND common_name IN (SELECT common_name FROM species_links)
                    "#,
                    params![source_name],
                )?;
            }
            Enrichment::HumanReadableNames => {
                tx.execute(
                    r#"
                    UPDATE street_trees
                    SET common_name = (
                      SELECT readable_name FROM species_names
                      WHERE species_names.original_common_name = street_trees.common_name
                    )
                    WHERE source = ?1
                      AND common_name IN (SELECT original_common_name FROM species_names)
                    "#,
                    params![source_name],
                )?;
            }
        }
    }
    Ok(())
}

fn record_run_tx(
    tx: &Transaction<'_>,
    request: &ImportRequest,
    row_count: Option<i64>,
    status: RunStatus,
    error_message: Option<&str>,
    started_at_ms: i64,
) -> Result<ImportRunRow, StoreError> {
    let source_file = std::fs::canonicalize(&request.file_path)
        .unwrap_or_else(|_| request.file_path.clone())
        .display()
        .to_string();
    let finished_at_ms = now_ms();
    tx.execute(
        r#"
        INSERT INTO import_runs (
          city, source_name, source_file, refresh_mode, row_count, status,
          error_message, started_at_ms, finished_at_ms
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
        "#,
        params![
            request.city.as_str(),
            request.city.source_name(),
            source_file,
            request.refresh,
            row_count,
            status.as_str(),
            error_message,
            started_at_ms,
            finished_at_ms
        ],
    )?;
    Ok(ImportRunRow {
        id: tx.last_insert_rowid(),
        city: request.city.as_str().to_string(),
        source_name: request.city.source_name().to_string(),
        source_file,
        refresh_mode: request.refresh,
        row_count,
        status: status.as_str().to_string(),
        error_message: error_message.map(str::to_string),
        started_at_ms,
        finished_at_ms,
    })
}
