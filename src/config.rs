use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db;

pub const SETTINGS_KEY: &str = "format.tabs";

/// Legacy single-digit tab encoding caps indices at 9.
pub const MAX_TABS_CEILING: usize = 9;

/// Workspace-wide defaults for the tab format. Per-course option records override the
/// course-level ones (`maxtabs`, `limittabname`, `single_section_tabs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    pub default_max_tabs: usize,
    pub tab0_title: String,
    pub tab_title_prefix: String,
    pub section_name_prefix: String,
    pub section0_name: String,
    pub default_limit_tab_name: usize,
    pub single_section_tabs_default: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            default_max_tabs: 5,
            tab0_title: "Module Content".to_string(),
            tab_title_prefix: "Tab".to_string(),
            section_name_prefix: "Topic".to_string(),
            section0_name: "General".to_string(),
            default_limit_tab_name: 0,
            single_section_tabs_default: false,
        }
    }
}

impl FormatConfig {
    pub fn generic_tab_title(&self, index: usize) -> String {
        if index == 0 {
            self.tab0_title.clone()
        } else {
            format!("{} {}", self.tab_title_prefix, index)
        }
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_usize_range(v: &Value, key: &str, min: usize, max: usize) -> Result<usize, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be a non-negative integer", key))? as usize;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_label(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

/// Apply a partial update, validating every field. Unknown fields are rejected.
pub fn merge_patch(current: &mut FormatConfig, patch: &Map<String, Value>) -> Result<(), String> {
    for (k, v) in patch {
        match k.as_str() {
            "defaultMaxTabs" => {
                current.default_max_tabs = parse_usize_range(v, k, 1, MAX_TABS_CEILING)?;
            }
            "tab0Title" => current.tab0_title = parse_label(v, k, 64)?,
            "tabTitlePrefix" => current.tab_title_prefix = parse_label(v, k, 32)?,
            "sectionNamePrefix" => current.section_name_prefix = parse_label(v, k, 32)?,
            "section0Name" => current.section0_name = parse_label(v, k, 64)?,
            "defaultLimitTabName" => {
                current.default_limit_tab_name = parse_usize_range(v, k, 0, 100)?;
            }
            "singleSectionTabsDefault" => {
                current.single_section_tabs_default = parse_bool(v, k)?;
            }
            _ => return Err(format!("unknown format config field: {}", k)),
        }
    }
    Ok(())
}

pub fn load_config(conn: &Connection) -> anyhow::Result<FormatConfig> {
    let mut current = FormatConfig::default();
    if let Some(saved) = db::settings_get_json(conn, SETTINGS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Fields are applied one at a time so a single bad historical value only loses
            // that field.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                if let Err(msg) = merge_patch(&mut current, &single) {
                    tracing::warn!(field = %k, %msg, "ignoring stored format config field");
                }
            }
        }
    }
    Ok(current)
}

pub fn update_config(
    conn: &Connection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<FormatConfig, String>> {
    let mut current = load_config(conn)?;
    if let Err(msg) = merge_patch(&mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, SETTINGS_KEY, &current.to_value())?;
    tracing::info!(fields = patch.len(), "format config updated");
    Ok(Ok(current))
}
