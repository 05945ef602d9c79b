use futures_util::future::join_all;
use std::collections::HashSet;

use super::library_service::{duplicate_numbers, set_cached_count};
use super::visibility::require;
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{is_content_file, CurrentUser, MusicDatabase, MusicRecord, Permission};
use crate::storage::registry::decode_array;

#[derive(Clone, Debug, PartialEq)]
pub struct CountMismatch {
    pub library_id: String,
    pub name: String,
    pub cached: usize,
    pub actual: usize,
}

#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub count_mismatches: Vec<CountMismatch>,
    /// Registry entries whose content file does not exist.
    pub missing_content: Vec<String>,
    /// Content files no registry entry points at.
    pub orphan_files: Vec<String>,
    /// `(username, association_id)` pairs naming unknown associations.
    pub dangling_memberships: Vec<(String, String)>,
    /// `(library_id, numbers)` for libraries with repeated `Nr` values.
    pub duplicate_numbers: Vec<(String, Vec<String>)>,
    /// `(library_id, error)` for content files that could not be decoded.
    pub unreadable: Vec<(String, String)>,
}

impl IntegrityReport {
    /// Duplicate numbers are warnings only and do not make a report dirty.
    pub fn is_clean(&self) -> bool {
        self.count_mismatches.is_empty()
            && self.missing_content.is_empty()
            && self.orphan_files.is_empty()
            && self.dangling_memberships.is_empty()
            && self.unreadable.is_empty()
    }
}

enum ContentState {
    Loaded { actual: usize, duplicates: Vec<String> },
    Missing,
    Unreadable(String),
}

async fn inspect(state: &AppState, db: &MusicDatabase) -> ContentState {
    let bytes = match state.store.read(&db.file_name).await {
        Ok(b) => b,
        Err(e) if e.is_not_found() => return ContentState::Missing,
        Err(e) => return ContentState::Unreadable(e.to_string()),
    };
    match decode_array::<MusicRecord>(&db.file_name, &bytes) {
        Ok(records) => ContentState::Loaded {
            actual: records.len(),
            duplicates: duplicate_numbers(&records),
        },
        Err(e) => ContentState::Unreadable(e.to_string()),
    }
}

pub async fn check_integrity(state: &AppState, caller: &CurrentUser) -> Result<IntegrityReport, ServiceError> {
    require(caller, Permission::RunMaintenance)?;
    let dbs = state.databases.load().await?;
    let files: HashSet<String> = state.store.list().await?.into_iter().collect();
    let mut report = IntegrityReport::default();

    let states = join_all(dbs.iter().map(|db| inspect(state, db))).await;
    for (db, content) in dbs.iter().zip(states) {
        match content {
            ContentState::Loaded { actual, duplicates } => {
                if actual != db.record_count {
                    report.count_mismatches.push(CountMismatch {
                        library_id: db.id.clone(),
                        name: db.name.clone(),
                        cached: db.record_count,
                        actual,
                    });
                }
                if !duplicates.is_empty() {
                    report.duplicate_numbers.push((db.id.clone(), duplicates));
                }
            }
            ContentState::Missing => report.missing_content.push(db.id.clone()),
            ContentState::Unreadable(e) => report.unreadable.push((db.id.clone(), e)),
        }
    }

    let referenced: HashSet<&str> = dbs.iter().map(|d| d.file_name.as_str()).collect();
    let mut orphans: Vec<String> = files
        .iter()
        .filter(|f| is_content_file(f) && !referenced.contains(f.as_str()))
        .cloned()
        .collect();
    orphans.sort();
    report.orphan_files = orphans;

    let known: HashSet<String> = state
        .associations
        .load()
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    for u in state.users.load().await? {
        for a in &u.association_ids {
            if !known.contains(a) {
                report.dangling_memberships.push((u.username.clone(), a.clone()));
            }
        }
    }

    tracing::info!(
        clean = report.is_clean(),
        mismatches = report.count_mismatches.len(),
        orphans = report.orphan_files.len(),
        "integrity check finished"
    );
    Ok(report)
}

/// Rewrite every stale `record_count`. Returns the corrections made.
pub async fn repair_counts(state: &AppState, caller: &CurrentUser) -> Result<Vec<CountMismatch>, ServiceError> {
    let report = check_integrity(state, caller).await?;
    for m in &report.count_mismatches {
        set_cached_count(state, &m.library_id, m.actual).await?;
        tracing::info!(library = %m.library_id, from = m.cached, to = m.actual, "record count repaired");
    }
    Ok(report.count_mismatches)
}
