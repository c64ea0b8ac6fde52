use crate::access::Outcome;
use crate::error::{EngineError, EngineResult};
use crate::store::OptionStore;

use super::codec::{join_sequence, parse_sequence_strict};
use super::SEQUENCE_KEY;

/// Display order: the stored sequence restricted to present tabs (first occurrence wins),
/// followed by the remaining present tabs in ascending order.
pub fn resolve_order(present: &[usize], stored: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::with_capacity(present.len());
    for index in stored {
        if present.contains(index) && !order.contains(index) {
            order.push(*index);
        }
    }
    let mut rest: Vec<usize> = present
        .iter()
        .copied()
        .filter(|i| !order.contains(i))
        .collect();
    rest.sort_unstable();
    rest.dedup();
    order.extend(rest);
    order
}

pub fn persist_sequence(
    store: &dyn OptionStore,
    course_id: i64,
    seq: &[usize],
) -> EngineResult<String> {
    let encoded = join_sequence(seq);
    store.set(course_id, SEQUENCE_KEY, &encoded)?;
    tracing::info!(course_id, sequence = %encoded, "tab sequence persisted");
    Ok(encoded)
}

/// Exchanges the display positions of two tabs. Membership and titles are untouched.
pub fn swap(
    store: &dyn OptionStore,
    course_id: i64,
    present: &[usize],
    stored: &[usize],
    moved: usize,
    target: usize,
) -> EngineResult<Outcome<String>> {
    let mut order = resolve_order(present, stored);
    let pos_of = |order: &[usize], index: usize| {
        order
            .iter()
            .position(|i| *i == index)
            .ok_or_else(|| EngineError::malformed(format!("tab {index} does not exist")))
    };
    let a = pos_of(&order, moved)?;
    let b = pos_of(&order, target)?;
    if a == b {
        return Ok(Outcome::Unchanged);
    }
    order.swap(a, b);
    Ok(Outcome::Applied(persist_sequence(store, course_id, &order)?))
}

/// Replaces the whole sequence from a client-supplied list. An empty list is a no-op.
pub fn set_sequence(
    store: &dyn OptionStore,
    course_id: i64,
    raw: &str,
    max_tabs: usize,
) -> EngineResult<Outcome<String>> {
    let seq = parse_sequence_strict(raw, max_tabs)?;
    if seq.is_empty() {
        return Ok(Outcome::Unchanged);
    }
    Ok(Outcome::Applied(persist_sequence(store, course_id, &seq)?))
}
