use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::access::Outcome;
use crate::error::{EngineError, EngineResult};
use crate::sections::{LiveSections, Section, SectionId, SectionNumber};

use super::codec::parse_strict_list;
use super::registry::TabRegistry;
use super::{title_key, CourseContext, TabField, TabSet, SECTION0_ON_TOP_KEY};

pub const MAX_TITLE_CHARS: usize = 255;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!][^>]*>").expect("invalid tag regex"));

fn explicit_index(tabs: &TabSet, tab_index: usize) -> EngineResult<()> {
    if tab_index > tabs.max_tabs {
        return Err(EngineError::malformed(format!(
            "tab index {tab_index} exceeds maximum {}",
            tabs.max_tabs
        )));
    }
    Ok(())
}

/// Places `section` in `tab_index`, taking it out of every other tab first. Index 0 only
/// removes, since tab 0 collects whatever is unassigned.
pub fn move_section_to_tab(
    registry: &TabRegistry<'_>,
    tabs: &mut TabSet,
    tab_index: usize,
    section: &Section,
) -> EngineResult<Outcome<Vec<usize>>> {
    explicit_index(tabs, tab_index)?;
    let current = tabs.tab_of(section.id);
    if tab_index > 0 && current == Some(tab_index) {
        let elsewhere = tabs
            .tabs
            .iter()
            .skip(1)
            .any(|t| t.index != tab_index && t.contains(section.id));
        if !elsewhere {
            return Ok(Outcome::Unchanged);
        }
    }
    if tab_index == 0 && current.is_none() {
        return Ok(Outcome::Unchanged);
    }

    let course_id = tabs.course_id;
    let mut modified = remove_section_from_tabs(registry, tabs, section)?;
    if let Some(target) = tabs.get_mut(tab_index).filter(|t| t.index > 0) {
        target.section_ids.push(section.id);
        target.section_numbers.push(section.number);
        registry.persist_membership(course_id, target)?;
        if !modified.contains(&tab_index) {
            modified.push(tab_index);
        }
    }
    tracing::info!(
        course_id,
        section_id = section.id,
        tab = tab_index,
        "section moved"
    );
    Ok(Outcome::Applied(modified))
}

/// Removes `section` from every explicit tab and returns the tabs that changed.
pub fn remove_section_from_tabs(
    registry: &TabRegistry<'_>,
    tabs: &mut TabSet,
    section: &Section,
) -> EngineResult<Vec<usize>> {
    let mut modified = Vec::new();
    let course_id = tabs.course_id;
    for tab in tabs.tabs.iter_mut().skip(1) {
        if tab.detach(section.id, section.number) {
            registry.persist_membership(course_id, tab)?;
            modified.push(tab.index);
        }
    }
    Ok(modified)
}

/// Replaces the membership of one explicit tab with client-supplied lists. Every pair must
/// name a live section of the course at its current number.
pub fn assign_tab_sections(
    registry: &TabRegistry<'_>,
    tabs: &mut TabSet,
    live: &LiveSections,
    tab_index: usize,
    ids_csv: &str,
    numbers_csv: &str,
) -> EngineResult<Outcome<&'static str>> {
    if tab_index == 0 || tab_index > tabs.max_tabs {
        return Err(EngineError::malformed(format!(
            "tab index must be in 1..={}, got {tab_index}",
            tabs.max_tabs
        )));
    }
    let ids: Vec<SectionId> = parse_strict_list(ids_csv, "sections")?;
    let numbers: Vec<SectionNumber> = parse_strict_list(numbers_csv, "sectionnums")?;
    if ids.len() != numbers.len() {
        return Err(EngineError::malformed(format!(
            "sections has {} entries but sectionnums has {}",
            ids.len(),
            numbers.len()
        )));
    }
    if let Some(bad) = ids.iter().find(|id| **id <= 0) {
        return Err(EngineError::malformed(format!("section id {bad} is not positive")));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(EngineError::malformed(format!("section id {dup} listed twice")));
    }
    for (id, number) in ids.iter().zip(&numbers) {
        match live.number_for_id(*id) {
            Some(live_number) if live_number == *number => {}
            Some(live_number) => {
                return Err(EngineError::malformed(format!(
                    "section {id} is number {live_number}, not {number}"
                )))
            }
            None => {
                return Err(EngineError::malformed(format!(
                    "section {id} does not belong to course {}",
                    tabs.course_id
                )))
            }
        }
    }

    let course_id = tabs.course_id;
    for tab in tabs.tabs.iter_mut().skip(1).filter(|t| t.index != tab_index) {
        let mut changed = false;
        for id in &ids {
            changed |= tab.remove_id(*id);
        }
        if changed {
            registry.persist_membership(course_id, tab)?;
        }
    }
    if let Some(target) = tabs.get_mut(tab_index) {
        target.section_ids = ids;
        target.section_numbers = numbers;
        registry.persist_membership(course_id, target)?;
    }
    tracing::info!(course_id, tab = tab_index, "tab membership assigned");
    Ok(Outcome::Applied("ok"))
}

pub fn set_section0_on_top(
    registry: &TabRegistry<'_>,
    ctx: &mut CourseContext,
    on_top: bool,
) -> EngineResult<Outcome<bool>> {
    if ctx.options.section0_on_top == on_top {
        return Ok(Outcome::Unchanged);
    }
    registry
        .store()
        .set(ctx.course_id, SECTION0_ON_TOP_KEY, if on_top { "1" } else { "0" })?;
    ctx.options.section0_on_top = on_top;
    tracing::info!(course_id = ctx.course_id, on_top, "section 0 placement changed");
    Ok(Outcome::Applied(on_top))
}

/// Markup is stripped and surrounding whitespace trimmed before the length check.
pub fn clean_title(raw: &str) -> EngineResult<String> {
    let cleaned = TAG_RE.replace_all(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > MAX_TITLE_CHARS {
        return Err(EngineError::malformed(format!(
            "tab title longer than {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(cleaned.to_string())
}

/// Writes a tab title. Applied carries the record id; an identical title is `Unchanged`.
pub fn rename_tab(
    registry: &TabRegistry<'_>,
    tabs: &mut TabSet,
    tab_index: usize,
    raw_title: &str,
) -> EngineResult<Outcome<i64>> {
    explicit_index(tabs, tab_index)?;
    let title = clean_title(raw_title)?;
    let existing = registry.store().get(tabs.course_id, &title_key(tab_index))?;
    if existing.as_ref().is_some_and(|rec| rec.value == title) {
        return Ok(Outcome::Unchanged);
    }
    let id = registry.persist_tab(tabs.course_id, tab_index, TabField::Title, &title)?;
    if let Some(tab) = tabs.get_mut(tab_index) {
        tab.title = title;
    }
    tracing::info!(course_id = tabs.course_id, tab = tab_index, record_id = id, "tab renamed");
    Ok(Outcome::Applied(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;
    use crate::store::testing::RecordingStore;
    use crate::store::OptionStore;

    fn sections(n: u32) -> Vec<Section> {
        (0..=n)
            .map(|number| Section {
                id: 200 + i64::from(number),
                number,
                visible: true,
                name: None,
            })
            .collect()
    }

    fn assert_exclusive(tabs: &TabSet) {
        let mut seen = HashSet::new();
        for tab in tabs.tabs.iter().skip(1) {
            for id in &tab.section_ids {
                assert!(seen.insert(*id), "section {id} in more than one tab");
            }
        }
    }

    #[test]
    fn moving_into_an_empty_tab_writes_a_single_token() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        store.seed(1, "tab1", "201,202");
        store.seed(1, "tab1_sectionnums", "1,2");
        let all = sections(3);
        let mut ctx = registry.load_context(1, all.clone()).expect("context");

        let out = move_section_to_tab(&registry, &mut ctx.tabs, 3, &all[2]).expect("move");
        assert_eq!(out, Outcome::Applied(vec![1, 3]));
        assert_eq!(store.value(1, "tab3").as_deref(), Some("202"));
        assert_eq!(store.value(1, "tab3_sectionnums").as_deref(), Some("2"));
        assert_eq!(store.value(1, "tab1").as_deref(), Some("201"));
        assert_eq!(store.value(1, "tab1_sectionnums").as_deref(), Some("1"));
        assert_exclusive(&ctx.tabs);
    }

    #[test]
    fn moving_to_tab_zero_only_removes() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        store.seed(1, "tab2", "203");
        store.seed(1, "tab2_sectionnums", "3");
        let all = sections(3);
        let mut ctx = registry.load_context(1, all.clone()).expect("context");

        move_section_to_tab(&registry, &mut ctx.tabs, 0, &all[3]).expect("move");
        assert_eq!(store.value(1, "tab2").as_deref(), Some(""));
        assert_eq!(ctx.tabs.tab_of(203), None);
        assert_eq!(
            move_section_to_tab(&registry, &mut ctx.tabs, 0, &all[3]).expect("again"),
            Outcome::Unchanged
        );
        assert!(move_section_to_tab(&registry, &mut ctx.tabs, 6, &all[3]).is_err());
    }

    #[test]
    fn repeated_moves_keep_sections_exclusive() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        let all = sections(6);
        let mut ctx = registry.load_context(5, all.clone()).expect("context");
        let plan = [(1, 1), (2, 1), (1, 4), (3, 2), (5, 4), (2, 4), (6, 1), (1, 5)];
        for (number, tab) in plan {
            move_section_to_tab(&registry, &mut ctx.tabs, tab, &all[number]).expect("move");
            assert_exclusive(&ctx.tabs);
        }
        let reloaded = registry.load_context(5, all).expect("reload");
        assert_eq!(reloaded.tabs.tab_of(201), Some(5));
        assert_eq!(reloaded.tabs.get(4).map(|t| t.section_ids.clone()), Some(vec![205, 202]));
        assert_exclusive(&reloaded.tabs);
    }

    #[test]
    fn assign_validates_before_writing() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        let mut ctx = registry.load_context(1, sections(4)).expect("context");
        store.clear_writes();

        for (index, ids, nums) in [
            (2, "201,x", "1,2"),
            (2, "201,202", "1"),
            (2, "0", "0"),
            (2, "201,201", "1,1"),
            (0, "201", "1"),
            (6, "201", "1"),
            (2, "201,,202", "1,,2"),
            (2, "99999", "1"),
            (2, "201,202", "1,3"),
        ] {
            assert!(
                assign_tab_sections(&registry, &mut ctx.tabs, &ctx.live, index, ids, nums).is_err(),
                "accepted {index} {ids:?} {nums:?}"
            );
        }
        assert!(store.writes().is_empty());
    }

    #[test]
    fn assign_takes_listed_sections_from_other_tabs() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        store.seed(1, "tab1", "201,202,203");
        store.seed(1, "tab1_sectionnums", "1,2,3");
        let mut ctx = registry.load_context(1, sections(4)).expect("context");

        let out = assign_tab_sections(&registry, &mut ctx.tabs, &ctx.live, 2, "202, 204", "2,4")
            .expect("assign");
        assert_eq!(out.legacy_value(), "ok");
        assert_eq!(store.value(1, "tab1").as_deref(), Some("201,203"));
        assert_eq!(store.value(1, "tab1_sectionnums").as_deref(), Some("1,3"));
        assert_eq!(store.value(1, "tab2").as_deref(), Some("202,204"));
        assert_eq!(store.value(1, "tab2_sectionnums").as_deref(), Some("2,4"));
        assert_exclusive(&ctx.tabs);
    }

    #[test]
    fn foreign_ids_cannot_alias_a_section_held_elsewhere() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        store.seed(1, "tab1", "201");
        store.seed(1, "tab1_sectionnums", "1");
        let all = sections(3);
        let mut ctx = registry.load_context(1, all.clone()).expect("context");

        let out = assign_tab_sections(&registry, &mut ctx.tabs, &ctx.live, 2, "99999", "1");
        assert_eq!(out.map_err(|e| e.code()), Err("bad_params"));

        let reloaded = registry.load_context(1, all).expect("reload");
        assert_eq!(reloaded.tabs.get(1).map(|t| t.section_ids.clone()), Some(vec![201]));
        assert_eq!(reloaded.tabs.get(2).map(|t| t.section_ids.clone()), Some(vec![]));
        assert_exclusive(&reloaded.tabs);
    }

    #[test]
    fn rename_reports_record_id_only_on_change() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        let mut ctx = registry.load_context(1, sections(2)).expect("context");
        let record = store.get(1, "tab2_title").expect("get").expect("record");

        let out = rename_tab(&registry, &mut ctx.tabs, 2, "  <b>Week</b> Two ").expect("rename");
        assert_eq!(out, Outcome::Applied(record.id));
        assert_eq!(store.value(1, "tab2_title").as_deref(), Some("Week Two"));
        assert_eq!(
            rename_tab(&registry, &mut ctx.tabs, 2, "Week Two").expect("same"),
            Outcome::Unchanged
        );
        assert!(rename_tab(&registry, &mut ctx.tabs, 2, &"x".repeat(300)).is_err());
        assert!(rename_tab(&registry, &mut ctx.tabs, 9, "Nope").is_err());
    }

    #[test]
    fn section0_flag_is_persisted_once() {
        let store = RecordingStore::new();
        let cfg = FormatConfig::default();
        let registry = TabRegistry::new(&store, &cfg);
        let mut ctx = registry.load_context(1, sections(1)).expect("context");
        let first = set_section0_on_top(&registry, &mut ctx, true).expect("set");
        assert_eq!(first, Outcome::Applied(true));
        let second = set_section0_on_top(&registry, &mut ctx, true).expect("set");
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(store.value(1, "section0_ontop").as_deref(), Some("1"));
    }
}
