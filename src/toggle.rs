//! Per-user collapse state of course sections.
//!
//! Two stored encodings exist: a JSON object listing expanded sections as
//! `{"<sectionId>": "1"}` and an older fixed-width string of `0`/`1` characters indexed by
//! section number. Both decode to the set of expanded section ids; only JSON is ever written.
//! Without any record every section is expanded. With a JSON record, a section it does not
//! list is collapsed.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::access::Outcome;
use crate::error::{EngineError, EngineResult};
use crate::sections::{LiveSections, SectionId};
use crate::store::PreferenceStore;

pub fn preference_name(course_id: i64) -> String {
    format!("toggle_seq_{course_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleState {
    expanded: BTreeSet<SectionId>,
}

impl ToggleState {
    pub fn all_expanded(live: &LiveSections) -> Self {
        Self {
            expanded: live.ids().collect(),
        }
    }

    pub fn is_expanded(&self, id: SectionId) -> bool {
        self.expanded.contains(&id)
    }

    /// Live sections that are not expanded, in section-number order.
    pub fn collapsed(&self, live: &LiveSections) -> Vec<SectionId> {
        live.ids().filter(|id| !self.is_expanded(*id)).collect()
    }

    /// Lenient decode of a stored value; anything unreadable counts as "all expanded".
    pub fn decode(raw: &str, live: &LiveSections) -> Self {
        let raw = raw.trim();
        if raw.starts_with('{') {
            let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
                tracing::warn!("unreadable toggle preference, treating all sections as expanded");
                return Self::all_expanded(live);
            };
            let expanded = map
                .into_iter()
                .filter(|(_, value)| {
                    matches!(value, Value::String(s) if s == "1") || value.as_i64() == Some(1)
                })
                .filter_map(|(key, _)| key.parse::<SectionId>().ok())
                .collect();
            return Self { expanded };
        }
        Self::decode_bitstring(raw, live)
    }

    /// Sections past the end of the string were added after it was written; they stay expanded.
    fn decode_bitstring(raw: &str, live: &LiveSections) -> Self {
        let mut state = Self::all_expanded(live);
        for (number, ch) in raw.chars().enumerate() {
            let Some(id) = u32::try_from(number).ok().and_then(|n| live.id_for_number(n)) else {
                continue;
            };
            if ch == '0' {
                state.expanded.remove(&id);
            }
        }
        state
    }

    /// Strict decode of client input: a JSON object of numeric ids to `"0"` or `"1"`.
    pub fn parse_input(raw: &str) -> EngineResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EngineError::malformed(format!("toggle state is not JSON: {e}")))?;
        let Value::Object(map) = value else {
            return Err(EngineError::malformed("toggle state must be a JSON object"));
        };
        let mut expanded = BTreeSet::new();
        for (key, value) in map {
            let id = key
                .parse::<SectionId>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| EngineError::malformed(format!("invalid section id {key:?}")))?;
            match value.as_str() {
                Some("1") => {
                    expanded.insert(id);
                }
                Some("0") => {}
                _ => {
                    return Err(EngineError::malformed(format!(
                        "toggle value for section {id} must be \"0\" or \"1\""
                    )))
                }
            }
        }
        Ok(Self { expanded })
    }

    pub fn encode(&self) -> String {
        let map: Map<String, Value> = self
            .expanded
            .iter()
            .map(|id| (id.to_string(), Value::String("1".to_string())))
            .collect();
        Value::Object(map).to_string()
    }
}

pub fn load_toggles(
    store: &dyn PreferenceStore,
    user_id: i64,
    course_id: i64,
    live: &LiveSections,
) -> EngineResult<ToggleState> {
    let raw = store.get_preference(user_id, &preference_name(course_id))?;
    Ok(match raw {
        Some(r) => ToggleState::decode(&r, live),
        None => ToggleState::all_expanded(live),
    })
}

/// Replaces the user's toggle state and returns the normalized encoding that was stored.
pub fn save_toggles(
    store: &dyn PreferenceStore,
    user_id: i64,
    course_id: i64,
    raw: &str,
) -> EngineResult<Outcome<String>> {
    let state = ToggleState::parse_input(raw)?;
    let encoded = state.encode();
    let name = preference_name(course_id);
    if store.get_preference(user_id, &name)?.as_deref() == Some(encoded.as_str()) {
        return Ok(Outcome::Unchanged);
    }
    store.set_preference(user_id, &name, &encoded)?;
    tracing::info!(user_id, course_id, expanded = state.expanded.len(), "toggle state saved");
    Ok(Outcome::Applied(encoded))
}
