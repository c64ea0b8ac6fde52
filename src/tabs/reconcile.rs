//! Self-healing of tab membership.
//!
//! Section ids change when a course is restored while section numbers do not, so every
//! explicit tab keeps a parallel list of numbers. The repair pass maps dead ids back to live
//! ones through that list; the deletion cascade strips a removed section from every tab.

use crate::error::EngineResult;
use crate::sections::{LiveSections, SectionId, SectionNumber};
use crate::store::OptionStore;

use super::codec::{compact_stored, join_list, parse_stored_list};
use super::{ids_key, numbers_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub section_ids: Vec<SectionId>,
    pub section_numbers: Vec<SectionNumber>,
    pub ids_rewritten: bool,
    pub numbers_rewritten: bool,
}

/// Pure part of the repair pass. Returns the rebuilt lists and whether the id list changed.
pub fn rebuild_membership(
    live: &LiveSections,
    stored_ids: &[Option<SectionId>],
    stored_numbers: &[Option<SectionNumber>],
) -> (Vec<SectionId>, Vec<SectionNumber>, bool) {
    let mut ids = Vec::with_capacity(stored_ids.len());
    let mut numbers = Vec::with_capacity(stored_ids.len());
    let mut ids_changed = false;

    for (k, stored_id) in stored_ids.iter().enumerate() {
        let live_number = stored_id.and_then(|id| live.number_for_id(id));
        match (stored_id, live_number) {
            (Some(id), Some(number)) => {
                ids.push(*id);
                numbers.push(number);
            }
            _ => {
                // Without a live mapping for the backup number the entry is gone for good.
                let backup = stored_numbers.get(k).copied().flatten();
                if let Some((id, number)) =
                    backup.and_then(|n| live.id_for_number(n).map(|id| (id, n)))
                {
                    ids.push(id);
                    numbers.push(number);
                }
                ids_changed = true;
            }
        }
    }
    (ids, numbers, ids_changed)
}

/// Repairs one tab's stored membership against the live sections and persists what drifted:
/// the id list only when an id was replaced or dropped, the number list whenever its encoding
/// differs from what is stored.
pub fn repair_tab_section_ids(
    store: &dyn OptionStore,
    course_id: i64,
    live: &LiveSections,
    stored_ids: &str,
    stored_numbers: &str,
    tab_index: usize,
) -> EngineResult<RepairOutcome> {
    let parsed_ids: Vec<Option<SectionId>> = parse_stored_list(stored_ids);
    let parsed_numbers: Vec<Option<SectionNumber>> = parse_stored_list(stored_numbers);
    let (section_ids, section_numbers, ids_changed) =
        rebuild_membership(live, &parsed_ids, &parsed_numbers);

    if ids_changed {
        let encoded = join_list(&section_ids);
        store.set(course_id, &ids_key(tab_index), &encoded)?;
        tracing::info!(
            course_id,
            tab = tab_index,
            before = stored_ids,
            after = %encoded,
            "repaired stale section ids"
        );
    }

    let encoded_numbers = join_list(&section_numbers);
    let numbers_rewritten = encoded_numbers != compact_stored(stored_numbers);
    if numbers_rewritten {
        store.set(course_id, &numbers_key(tab_index), &encoded_numbers)?;
        tracing::debug!(
            course_id,
            tab = tab_index,
            after = %encoded_numbers,
            "refreshed section number backup"
        );
    }

    Ok(RepairOutcome {
        section_ids,
        section_numbers,
        ids_rewritten: ids_changed,
        numbers_rewritten,
    })
}

/// Removes every token of `raw` equal to `value`. Tokens are compared as integers, never as
/// substrings. Returns the new encoding when something was removed.
pub fn remove_token(raw: &str, value: i64) -> Option<String> {
    let compact = compact_stored(raw);
    if compact.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = compact.split(',').collect();
    let kept: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|tok| tok.parse::<i64>().ok() != Some(value))
        .collect();
    if kept.len() == tokens.len() {
        return None;
    }
    Some(kept.join(","))
}

/// Strips a deleted section from every explicit tab and returns the tabs that were modified.
pub fn remove_section_from_all_tabs(
    store: &dyn OptionStore,
    course_id: i64,
    max_tabs: usize,
    section_number: SectionNumber,
    section_id: SectionId,
) -> EngineResult<Vec<usize>> {
    let mut modified = Vec::new();
    for index in 1..=max_tabs {
        let Some(ids_rec) = store.get(course_id, &ids_key(index))? else {
            continue;
        };
        let Some(new_ids) = remove_token(&ids_rec.value, section_id) else {
            continue;
        };
        store.set(course_id, &ids_key(index), &new_ids)?;

        if let Some(nums_rec) = store.get(course_id, &numbers_key(index))? {
            if let Some(new_numbers) = remove_token(&nums_rec.value, i64::from(section_number)) {
                store.set(course_id, &numbers_key(index), &new_numbers)?;
            }
        }
        modified.push(index);
    }
    if !modified.is_empty() {
        tracing::info!(
            course_id,
            section_id,
            section_number,
            tabs = ?modified,
            "removed section from tabs"
        );
    }
    Ok(modified)
}
