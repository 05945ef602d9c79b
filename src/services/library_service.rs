//! Music databases: the registry in `music_databases.json` plus one content
//! file per library.
//!
//! Every record mutation rewrites the content file first and then the
//! cached `record_count` in the registry entry. If the second write fails
//! the count is stale until `doctor --repair` recomputes it.

use std::collections::HashMap;

use super::visibility::{can_see_association, can_see_library, require, visible_libraries};
use super::{now_iso8601, random_id};
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{CurrentUser, MusicDatabase, MusicRecord, Permission};

/// Result of a record mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordChange {
    pub record_count: usize,
    /// `Nr` values that now occur more than once.
    pub duplicate_numbers: Vec<String>,
}

/// Non-empty `Nr` values occurring more than once, trimmed, in first-seen order.
pub fn duplicate_numbers(records: &[MusicRecord]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for r in records {
        let nr = r.number.trim();
        if nr.is_empty() {
            continue;
        }
        let c = counts.entry(nr).or_insert(0);
        if *c == 0 {
            order.push(nr);
        }
        *c += 1;
    }
    order
        .into_iter()
        .filter(|nr| counts[nr] > 1)
        .map(|s| s.to_string())
        .collect()
}

pub async fn list_libraries(state: &AppState, caller: &CurrentUser) -> Result<Vec<MusicDatabase>, ServiceError> {
    require(caller, Permission::ViewLibraries)?;
    let mut out = visible_libraries(caller, state.databases.load().await?);
    out.sort_by_key(|d| d.name.to_lowercase());
    Ok(out)
}

/// Libraries outside the caller's scope are reported as missing.
pub async fn get_library(state: &AppState, caller: &CurrentUser, id: &str) -> Result<MusicDatabase, ServiceError> {
    require(caller, Permission::ViewLibraries)?;
    state
        .databases
        .load()
        .await?
        .into_iter()
        .find(|d| d.id == id && can_see_library(caller, d))
        .ok_or_else(|| ServiceError::not_found("Music database", id))
}

pub async fn create_library(
    state: &AppState,
    caller: &CurrentUser,
    name: &str,
    association_id: &str,
) -> Result<MusicDatabase, ServiceError> {
    require(caller, Permission::ManageLibraries)?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Invalid("music database name must not be empty".into()));
    }
    if !can_see_association(caller, association_id) {
        return Err(ServiceError::OutOfScope(format!(
            "association '{}' is outside your associations",
            association_id
        )));
    }
    if !state.associations.load().await?.iter().any(|a| a.id == association_id) {
        return Err(ServiceError::not_found("Association", association_id));
    }

    let id = random_id();
    let db = MusicDatabase {
        file_name: MusicDatabase::content_file_for(&id),
        id,
        name,
        association_id: association_id.to_string(),
        record_count: 0,
        created_at: now_iso8601(),
    };

    // Content file first, so a registry entry never points at nothing.
    state.records(&db).save(&[]).await?;

    let entry = db.clone();
    let registered = state
        .databases
        .update(move |rows| {
            rows.push(entry);
            Ok::<_, ServiceError>(())
        })
        .await;
    if let Err(e) = registered {
        if let Err(cleanup) = state.records(&db).remove().await {
            tracing::warn!(file = %db.file_name, %cleanup, "could not remove orphaned content file");
        }
        return Err(e);
    }
    tracing::info!(id = %db.id, name = %db.name, association = %db.association_id, "music database created");
    Ok(db)
}

pub async fn rename_library(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    name: &str,
) -> Result<MusicDatabase, ServiceError> {
    require(caller, Permission::ManageLibraries)?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Invalid("music database name must not be empty".into()));
    }
    let caller = caller.clone();
    let id = id.to_string();
    state
        .databases
        .update(move |rows| {
            let row = rows
                .iter_mut()
                .find(|d| d.id == id && can_see_library(&caller, d))
                .ok_or_else(|| ServiceError::not_found("Music database", id.clone()))?;
            row.name = name;
            Ok(row.clone())
        })
        .await
}

/// Remove the registry entry, then the content file. A content file that is
/// already gone is tolerated.
pub async fn delete_library(state: &AppState, caller: &CurrentUser, id: &str) -> Result<MusicDatabase, ServiceError> {
    require(caller, Permission::ManageLibraries)?;
    let caller_c = caller.clone();
    let key = id.to_string();
    let removed = state
        .databases
        .update(move |rows| {
            let idx = rows
                .iter()
                .position(|d| d.id == key && can_see_library(&caller_c, d))
                .ok_or_else(|| ServiceError::not_found("Music database", key.clone()))?;
            Ok::<_, ServiceError>(rows.remove(idx))
        })
        .await?;

    match state.records(&removed).remove().await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(file = %removed.file_name, "content file was already missing");
        }
        Err(e) => {
            tracing::error!(file = %removed.file_name, %e, "registry entry removed but content file could not be deleted");
            return Err(e.into());
        }
    }
    tracing::info!(id = %removed.id, name = %removed.name, "music database deleted");
    Ok(removed)
}

pub async fn library_records(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
) -> Result<Vec<MusicRecord>, ServiceError> {
    let db = get_library(state, caller, id).await?;
    Ok(state.records(&db).load().await?)
}

/// Rewrite the content file through `f`, then refresh the cached count.
async fn mutate_records<F>(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    f: F,
) -> Result<RecordChange, ServiceError>
where
    F: FnOnce(&mut Vec<MusicRecord>) -> Result<(), ServiceError>,
{
    require(caller, Permission::EditRecords)?;
    let db = get_library(state, caller, id).await?;

    let (record_count, duplicates) = state
        .records(&db)
        .update(move |records| {
            f(records)?;
            Ok::<_, ServiceError>((records.len(), duplicate_numbers(records)))
        })
        .await?;

    set_cached_count(state, &db.id, record_count).await?;

    if !duplicates.is_empty() {
        tracing::warn!(library = %db.id, numbers = ?duplicates, "duplicate record numbers");
    }
    Ok(RecordChange {
        record_count,
        duplicate_numbers: duplicates,
    })
}

pub(crate) async fn set_cached_count(state: &AppState, id: &str, count: usize) -> Result<(), ServiceError> {
    let key = id.to_string();
    state
        .databases
        .update(move |rows| {
            let row = rows
                .iter_mut()
                .find(|d| d.id == key)
                .ok_or_else(|| ServiceError::not_found("Music database", key.clone()))?;
            row.record_count = count;
            Ok::<_, ServiceError>(())
        })
        .await
}

fn check_index(records: &[MusicRecord], index: usize) -> Result<(), ServiceError> {
    if index >= records.len() {
        return Err(ServiceError::Invalid(format!(
            "record index {} out of range (0..{})",
            index,
            records.len()
        )));
    }
    Ok(())
}

pub async fn add_record(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    record: MusicRecord,
) -> Result<RecordChange, ServiceError> {
    mutate_records(state, caller, id, move |records| {
        records.push(record);
        Ok(())
    })
    .await
}

pub async fn update_record(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    index: usize,
    record: MusicRecord,
) -> Result<RecordChange, ServiceError> {
    mutate_records(state, caller, id, move |records| {
        check_index(records, index)?;
        records[index] = record;
        Ok(())
    })
    .await
}

pub async fn delete_record(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    index: usize,
) -> Result<RecordChange, ServiceError> {
    mutate_records(state, caller, id, move |records| {
        check_index(records, index)?;
        records.remove(index);
        Ok(())
    })
    .await
}

/// Replace every record, as a spreadsheet import does.
pub async fn replace_records(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    new_records: Vec<MusicRecord>,
) -> Result<RecordChange, ServiceError> {
    let count = new_records.len();
    let change = mutate_records(state, caller, id, move |records| {
        *records = new_records;
        Ok(())
    })
    .await?;
    tracing::info!(library = %id, records = count, "records imported");
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(nr: &str) -> MusicRecord {
        MusicRecord {
            number: nr.into(),
            ..Default::default()
        }
    }

    #[test]
    fn duplicates_in_first_seen_order() {
        let records = vec![rec("3"), rec("1"), rec(" 3 "), rec("1"), rec("2"), rec("1")];
        assert_eq!(duplicate_numbers(&records), vec!["3", "1"]);
    }

    #[test]
    fn blank_numbers_are_not_duplicates() {
        let records = vec![rec(""), rec("  "), rec("7")];
        assert!(duplicate_numbers(&records).is_empty());
    }
}
