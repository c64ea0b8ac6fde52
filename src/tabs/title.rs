//! Display titles: single-section substitution and length limiting.
//!
//! The projection never writes titles back to the store. The snapshot taken on entering
//! single-section display lives in the sidecar's memory for the lifetime of the process.

use std::collections::HashMap;

use crate::config::FormatConfig;
use crate::sections::Section;

use super::{CourseContext, Tab};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TitleState {
    #[default]
    Normal,
    SingleSectionDisplay { snapshot: String, section_name: String },
}

#[derive(Debug, Default)]
pub struct TitleTracker {
    states: HashMap<(i64, usize), TitleState>,
}

impl TitleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the state of one tab and returns the title to display.
    pub fn project(&mut self, course_id: i64, tab: &Tab, single_name: Option<String>) -> String {
        let key = (course_id, tab.index);
        let current = self.states.remove(&key).unwrap_or_default();
        match (current, single_name) {
            (TitleState::Normal, None) => tab.effective_title().to_string(),
            (TitleState::Normal, Some(name)) => {
                tracing::debug!(course_id, tab = tab.index, "entering single-section title");
                self.states.insert(
                    key,
                    TitleState::SingleSectionDisplay {
                        snapshot: tab.effective_title().to_string(),
                        section_name: name.clone(),
                    },
                );
                name
            }
            (TitleState::SingleSectionDisplay { snapshot, .. }, Some(name)) => {
                self.states.insert(
                    key,
                    TitleState::SingleSectionDisplay {
                        snapshot,
                        section_name: name.clone(),
                    },
                );
                name
            }
            (TitleState::SingleSectionDisplay { snapshot, .. }, None) => {
                // The store wins when the title changed behind the snapshot (purge, restore).
                let stored = tab.effective_title();
                if snapshot != stored {
                    tracing::debug!(
                        course_id,
                        tab = tab.index,
                        %snapshot,
                        stored,
                        "stored title changed during single-section display"
                    );
                }
                stored.to_string()
            }
        }
    }

    /// Keeps a pending snapshot in step with a rename.
    pub fn on_rename(&mut self, course_id: i64, tab_index: usize, new_title: &str) {
        if let Some(TitleState::SingleSectionDisplay { snapshot, .. }) =
            self.states.get_mut(&(course_id, tab_index))
        {
            *snapshot = new_title.to_string();
        }
    }
}

/// The lone non-zero member of `tab`, when single-section titles apply to it.
pub fn single_member<'c>(ctx: &'c CourseContext, tab: &Tab) -> Option<&'c Section> {
    if !ctx.options.single_section_tabs || tab.index == 0 {
        return None;
    }
    let mut members = tab
        .section_ids
        .iter()
        .filter_map(|id| ctx.section_by_id(*id))
        .filter(|s| s.number != 0);
    let first = members.next()?;
    if members.next().is_some() {
        return None;
    }
    Some(first)
}

pub fn single_section_name(
    ctx: &CourseContext,
    tab: &Tab,
    config: &FormatConfig,
) -> Option<String> {
    single_member(ctx, tab).map(|s| s.display_name(config))
}

/// First `limit` characters plus an ellipsis when `title` is longer; `limit == 0` disables.
pub fn truncate(title: &str, limit: usize) -> String {
    if limit == 0 || title.chars().count() <= limit {
        return title.to_string();
    }
    let mut short: String = title.chars().take(limit).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::LiveSections;
    use crate::tabs::{FormatOptions, TabSet};

    fn tab(index: usize, title: &str, ids: &[i64]) -> Tab {
        Tab {
            index,
            title: title.to_string(),
            generic_title: format!("Tab {index}"),
            section_ids: ids.to_vec(),
            section_numbers: Vec::new(),
        }
    }

    fn state_of(tracker: &TitleTracker, index: usize) -> TitleState {
        tracker.states.get(&(1, index)).cloned().unwrap_or_default()
    }

    fn context(single: bool, tabs: Vec<Tab>) -> CourseContext {
        let sections: Vec<Section> = (0..=8)
            .map(|n| Section {
                id: 100 + i64::from(n),
                number: n,
                visible: true,
                name: (n == 7).then(|| "Genetics".to_string()),
            })
            .collect();
        let live = LiveSections::from_sections(&sections);
        CourseContext {
            course_id: 1,
            options: FormatOptions {
                max_tabs: 5,
                limit_tab_name: 0,
                single_section_tabs: single,
                section0_on_top: false,
                sequence: Vec::new(),
            },
            sections,
            live,
            tabs: TabSet {
                course_id: 1,
                max_tabs: 5,
                tabs,
                sequence: Vec::new(),
            },
        }
    }

    #[test]
    fn single_member_tab_shows_section_name_until_it_grows() {
        let cfg = FormatConfig::default();
        let mut tracker = TitleTracker::new();

        let lone = tab(3, "Lab Work", &[107]);
        let ctx = context(true, vec![lone.clone()]);
        let name = single_section_name(&ctx, &lone, &cfg);
        assert_eq!(tracker.project(1, &lone, name), "Genetics");
        assert!(matches!(
            state_of(&tracker, 3),
            TitleState::SingleSectionDisplay { ref snapshot, .. } if snapshot == "Lab Work"
        ));

        let grown = tab(3, "Lab Work", &[107, 108]);
        let ctx = context(true, vec![grown.clone()]);
        let name = single_section_name(&ctx, &grown, &cfg);
        assert_eq!(name, None);
        assert_eq!(tracker.project(1, &grown, name), "Lab Work");
        assert_eq!(state_of(&tracker, 3), TitleState::Normal);
    }

    #[test]
    fn rename_while_substituted_is_restored_on_exit() {
        let mut tracker = TitleTracker::new();
        let lone = tab(2, "Old", &[103]);
        tracker.project(1, &lone, Some("Topic 3".into()));
        tracker.on_rename(1, 2, "Renamed");
        let grown = tab(2, "Renamed", &[103, 104]);
        assert_eq!(tracker.project(1, &grown, None), "Renamed");
    }

    #[test]
    fn exit_shows_the_stored_title_after_it_was_reset() {
        let mut tracker = TitleTracker::new();
        let lone = tab(3, "Lab Work", &[107]);
        assert_eq!(tracker.project(1, &lone, Some("Topic 7".into())), "Topic 7");

        // Tab 3 was purged and re-created with its default title in the meantime.
        let recreated = tab(3, "Tab 3", &[]);
        assert_eq!(tracker.project(1, &recreated, None), "Tab 3");
        assert_eq!(state_of(&tracker, 3), TitleState::Normal);
    }

    #[test]
    fn section_zero_and_disabled_option_do_not_count() {
        let cfg = FormatConfig::default();
        let with_zero = tab(1, "", &[100, 105]);
        let ctx = context(true, vec![with_zero.clone()]);
        assert_eq!(single_section_name(&ctx, &with_zero, &cfg).as_deref(), Some("Topic 5"));

        let ctx = context(false, vec![with_zero.clone()]);
        assert_eq!(single_section_name(&ctx, &with_zero, &cfg), None);

        let tab0 = tab(0, "", &[105]);
        let ctx = context(true, vec![tab0.clone()]);
        assert_eq!(single_section_name(&ctx, &tab0, &cfg), None);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate("Photosynthesis", 5), "Photo…");
        assert_eq!(truncate("Cells", 5), "Cells");
        assert_eq!(truncate("Évolution", 2), "Év…");
        assert_eq!(truncate("Anything", 0), "Anything");
    }
}
