//! Tab layout engine: registry, reconciliation, ordering, assignment and the view projection.

pub mod assign;
pub mod codec;
pub mod ordering;
pub mod reconcile;
pub mod registry;
pub mod title;
pub mod view;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{FormatConfig, MAX_TABS_CEILING};
use crate::sections::{LiveSections, Section, SectionId, SectionNumber};

pub const SEQUENCE_KEY: &str = "tab_seq";
pub const MAX_TABS_KEY: &str = "maxtabs";
pub const LIMIT_TAB_NAME_KEY: &str = "limittabname";
pub const SINGLE_SECTION_TABS_KEY: &str = "single_section_tabs";
pub const SECTION0_ON_TOP_KEY: &str = "section0_ontop";

pub fn title_key(index: usize) -> String {
    format!("tab{index}_title")
}

pub fn ids_key(index: usize) -> String {
    format!("tab{index}")
}

pub fn numbers_key(index: usize) -> String {
    format!("tab{index}_sectionnums")
}

/// Persisted fields of one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabField {
    Title,
    SectionIds,
    SectionNumbers,
}

impl TabField {
    pub fn key(self, index: usize) -> String {
        match self {
            TabField::Title => title_key(index),
            TabField::SectionIds => ids_key(index),
            TabField::SectionNumbers => numbers_key(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub index: usize,
    /// Stored title; empty means "use the generic title".
    pub title: String,
    pub generic_title: String,
    pub section_ids: Vec<SectionId>,
    pub section_numbers: Vec<SectionNumber>,
}

impl Tab {
    pub fn effective_title(&self) -> &str {
        if self.title.is_empty() {
            &self.generic_title
        } else {
            &self.title
        }
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.section_ids.contains(&id)
    }

    /// Drops every occurrence of `id` and of `number`. Returns whether anything changed.
    pub fn detach(&mut self, id: SectionId, number: SectionNumber) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.section_ids.retain(|v| *v != id);
        self.section_numbers.retain(|v| *v != number);
        true
    }

    /// Drops `id` together with the number stored at the same position.
    pub fn remove_id(&mut self, id: SectionId) -> bool {
        let mut removed = false;
        while let Some(pos) = self.section_ids.iter().position(|v| *v == id) {
            self.section_ids.remove(pos);
            if pos < self.section_numbers.len() {
                self.section_numbers.remove(pos);
            }
            removed = true;
        }
        removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSet {
    pub course_id: i64,
    pub max_tabs: usize,
    /// Indexed by tab index; always `max_tabs + 1` entries.
    pub tabs: Vec<Tab>,
    /// Stored display order as read; may be partial or stale.
    pub sequence: Vec<usize>,
}

impl TabSet {
    pub fn get(&self, index: usize) -> Option<&Tab> {
        self.tabs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tab> {
        self.tabs.get_mut(index)
    }

    pub fn indices(&self) -> Vec<usize> {
        self.tabs.iter().map(|t| t.index).collect()
    }

    /// Index of the explicit tab holding `id`, if any.
    pub fn tab_of(&self, id: SectionId) -> Option<usize> {
        self.tabs
            .iter()
            .skip(1)
            .find(|t| t.contains(id))
            .map(|t| t.index)
    }
}

/// Course-level format options, parsed from the raw option map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub max_tabs: usize,
    pub limit_tab_name: usize,
    pub single_section_tabs: bool,
    pub section0_on_top: bool,
    pub sequence: Vec<usize>,
}

fn flag(raw: Option<&String>) -> Option<bool> {
    raw.map(|v| matches!(v.trim(), "1" | "true"))
}

impl FormatOptions {
    pub fn from_map(options: &BTreeMap<String, String>, config: &FormatConfig) -> Self {
        let max_tabs = options
            .get(MAX_TABS_KEY)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(config.default_max_tabs)
            .min(MAX_TABS_CEILING);
        let limit_tab_name = options
            .get(LIMIT_TAB_NAME_KEY)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(config.default_limit_tab_name);
        Self {
            max_tabs,
            limit_tab_name,
            single_section_tabs: flag(options.get(SINGLE_SECTION_TABS_KEY))
                .unwrap_or(config.single_section_tabs_default),
            section0_on_top: flag(options.get(SECTION0_ON_TOP_KEY)).unwrap_or(false),
            sequence: options
                .get(SEQUENCE_KEY)
                .map(|v| codec::parse_sequence_lenient(v))
                .unwrap_or_default(),
        }
    }
}

/// Everything one request needs about a course, computed once and passed along.
#[derive(Debug, Clone)]
pub struct CourseContext {
    pub course_id: i64,
    pub options: FormatOptions,
    pub sections: Vec<Section>,
    pub live: LiveSections,
    pub tabs: TabSet,
}

impl CourseContext {
    pub fn section_by_id(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn section_by_number(&self, number: SectionNumber) -> Option<&Section> {
        self.sections.iter().find(|s| s.number == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn max_tabs_defaults_and_clamps() {
        let cfg = FormatConfig::default();
        assert_eq!(FormatOptions::from_map(&opts(&[]), &cfg).max_tabs, 5);
        assert_eq!(FormatOptions::from_map(&opts(&[("maxtabs", "0")]), &cfg).max_tabs, 5);
        assert_eq!(FormatOptions::from_map(&opts(&[("maxtabs", "7")]), &cfg).max_tabs, 7);
        assert_eq!(FormatOptions::from_map(&opts(&[("maxtabs", "42")]), &cfg).max_tabs, 9);
        assert_eq!(FormatOptions::from_map(&opts(&[("maxtabs", "x")]), &cfg).max_tabs, 5);
    }

    #[test]
    fn flags_and_sequence_are_parsed() {
        let cfg = FormatConfig::default();
        let o = FormatOptions::from_map(
            &opts(&[
                ("single_section_tabs", "1"),
                ("section0_ontop", "0"),
                ("limittabname", "8"),
                ("tab_seq", "tab2,tab0"),
            ]),
            &cfg,
        );
        assert!(o.single_section_tabs);
        assert!(!o.section0_on_top);
        assert_eq!(o.limit_tab_name, 8);
        assert_eq!(o.sequence, vec![2, 0]);
    }

    #[test]
    fn detach_matches_exact_values_only() {
        let mut tab = Tab {
            index: 1,
            title: String::new(),
            generic_title: "Tab 1".into(),
            section_ids: vec![15, 5, 51],
            section_numbers: vec![3, 1, 4],
        };
        assert!(tab.detach(5, 1));
        assert_eq!(tab.section_ids, vec![15, 51]);
        assert_eq!(tab.section_numbers, vec![3, 4]);
        assert!(!tab.detach(5, 1));
        assert_eq!(tab.effective_title(), "Tab 1");
    }
}
