use std::collections::BTreeMap;

use crate::config::FormatConfig;
use crate::error::EngineResult;
use crate::sections::{LiveSections, Section};
use crate::store::OptionStore;

use super::codec::join_list;
use super::reconcile::repair_tab_section_ids;
use super::{
    ids_key, numbers_key, title_key, CourseContext, FormatOptions, Tab, TabField, TabSet,
    SEQUENCE_KEY,
};

/// Materializes a course's tabs from option records and writes single fields back.
pub struct TabRegistry<'a> {
    store: &'a dyn OptionStore,
    config: &'a FormatConfig,
}

impl<'a> TabRegistry<'a> {
    pub fn new(store: &'a dyn OptionStore, config: &'a FormatConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &'a dyn OptionStore {
        self.store
    }

    pub fn load_format_options(&self, course_id: i64) -> EngineResult<BTreeMap<String, String>> {
        self.store.load_all(course_id)
    }

    /// Creates any missing tab record for indices `0..=max_tabs` with its default, and adds
    /// it to `options`. Returns how many records were created.
    pub fn ensure_tabs_initialized(
        &self,
        course_id: i64,
        max_tabs: usize,
        options: &mut BTreeMap<String, String>,
    ) -> EngineResult<usize> {
        let mut wanted: Vec<(String, String)> = vec![(SEQUENCE_KEY.to_string(), String::new())];
        for i in 0..=max_tabs {
            wanted.push((title_key(i), self.config.generic_tab_title(i)));
            if i > 0 {
                wanted.push((ids_key(i), String::new()));
                wanted.push((numbers_key(i), String::new()));
            }
        }

        let mut created = 0;
        for (name, default) in wanted {
            if options.contains_key(&name) {
                continue;
            }
            self.store.set(course_id, &name, &default)?;
            options.insert(name, default);
            created += 1;
        }
        if created > 0 {
            tracing::info!(course_id, max_tabs, created, "initialized tab records");
        }
        Ok(created)
    }

    /// Deletes records of tabs above `max_tabs` left over from a larger tab count. Stops at
    /// the first index without a title record.
    pub fn purge_abandoned_tabs(
        &self,
        course_id: i64,
        max_tabs: usize,
        options: &mut BTreeMap<String, String>,
    ) -> EngineResult<Vec<usize>> {
        let mut purged = Vec::new();
        let mut i = max_tabs + 1;
        while options.contains_key(&title_key(i)) {
            for name in [title_key(i), ids_key(i), numbers_key(i)] {
                self.store.delete(course_id, &name)?;
                options.remove(&name);
            }
            purged.push(i);
            i += 1;
        }
        if !purged.is_empty() {
            tracing::info!(course_id, tabs = ?purged, "purged abandoned tab records");
        }
        Ok(purged)
    }

    /// Builds every tab `0..=max_tabs`, repairing explicit membership against `live`.
    pub fn prepare_tabs(
        &self,
        course_id: i64,
        options: &BTreeMap<String, String>,
        format: &FormatOptions,
        live: &LiveSections,
    ) -> EngineResult<TabSet> {
        let get = |name: &str| options.get(name).map(String::as_str).unwrap_or("");
        let mut tabs = Vec::with_capacity(format.max_tabs + 1);
        for i in 0..=format.max_tabs {
            let (section_ids, section_numbers) = if i > 0 {
                let repaired = repair_tab_section_ids(
                    self.store,
                    course_id,
                    live,
                    get(&ids_key(i)),
                    get(&numbers_key(i)),
                    i,
                )?;
                (repaired.section_ids, repaired.section_numbers)
            } else {
                (Vec::new(), Vec::new())
            };
            tabs.push(Tab {
                index: i,
                title: get(&title_key(i)).to_string(),
                generic_title: self.config.generic_tab_title(i),
                section_ids,
                section_numbers,
            });
        }
        Ok(TabSet {
            course_id,
            max_tabs: format.max_tabs,
            tabs,
            sequence: format.sequence.clone(),
        })
    }

    pub fn persist_tab(
        &self,
        course_id: i64,
        index: usize,
        field: TabField,
        value: &str,
    ) -> EngineResult<i64> {
        let id = self.store.set(course_id, &field.key(index), value)?;
        tracing::debug!(course_id, tab = index, ?field, "tab field persisted");
        Ok(id)
    }

    pub fn persist_membership(&self, course_id: i64, tab: &Tab) -> EngineResult<()> {
        self.persist_tab(course_id, tab.index, TabField::SectionIds, &join_list(&tab.section_ids))?;
        self.persist_tab(
            course_id,
            tab.index,
            TabField::SectionNumbers,
            &join_list(&tab.section_numbers),
        )?;
        Ok(())
    }

    /// Per-request pipeline: load, initialize, purge, repair.
    pub fn load_context(
        &self,
        course_id: i64,
        sections: Vec<Section>,
    ) -> EngineResult<CourseContext> {
        let mut options = self.load_format_options(course_id)?;
        let format = FormatOptions::from_map(&options, self.config);
        self.ensure_tabs_initialized(course_id, format.max_tabs, &mut options)?;
        self.purge_abandoned_tabs(course_id, format.max_tabs, &mut options)?;
        let live = LiveSections::from_sections(&sections);
        let tabs = self.prepare_tabs(course_id, &options, &format, &live)?;
        Ok(CourseContext {
            course_id,
            options: format,
            sections,
            live,
            tabs,
        })
    }
}
