//! Serializable layout of one course as a renderer consumes it.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::FormatConfig;
use crate::sections::{Section, SectionId, SectionNumber};

use super::ordering::resolve_order;
use super::title::{single_section_name, truncate, TitleTracker};
use super::{CourseContext, Tab};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: SectionId,
    pub number: SectionNumber,
    pub name: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabView {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub generic_title: String,
    pub display_title: String,
    pub short_title: String,
    pub single_section: bool,
    /// No members to show; the tab is rendered but not displayed.
    pub hidden: bool,
    /// Every member is hidden from students.
    pub all_sections_hidden: bool,
    pub section_ids: Vec<SectionId>,
    pub section_numbers: Vec<SectionNumber>,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course_id: i64,
    pub max_tabs: usize,
    pub limit_tab_name: usize,
    pub single_section_tabs: bool,
    pub section0_on_top: bool,
    pub section0: Option<SectionView>,
    /// Left to right.
    pub order: Vec<usize>,
    pub tabs: Vec<TabView>,
    /// False when only one tab would be shown, in which case the tab bar is suppressed.
    pub tabs_visible: bool,
}

fn section_view(section: &Section, config: &FormatConfig) -> SectionView {
    SectionView {
        id: section.id,
        number: section.number,
        name: section.display_name(config),
        visible: section.visible,
    }
}

/// Tab 0 holds every live section no explicit tab claims; section 0 moves out when it is
/// shown above the tabs.
fn implicit_members<'c>(ctx: &'c CourseContext) -> Vec<&'c Section> {
    let claimed: HashSet<SectionId> = ctx
        .tabs
        .tabs
        .iter()
        .skip(1)
        .flat_map(|t| t.section_ids.iter().copied())
        .collect();
    ctx.sections
        .iter()
        .filter(|s| !claimed.contains(&s.id))
        .filter(|s| !(ctx.options.section0_on_top && s.number == 0))
        .collect()
}

fn explicit_members<'c>(ctx: &'c CourseContext, tab: &Tab) -> Vec<&'c Section> {
    tab.section_ids
        .iter()
        .filter_map(|id| ctx.section_by_id(*id))
        .filter(|s| !(ctx.options.section0_on_top && s.number == 0))
        .collect()
}

pub fn build_view(
    ctx: &CourseContext,
    config: &FormatConfig,
    titles: &mut TitleTracker,
) -> CourseView {
    let order = resolve_order(&ctx.tabs.indices(), &ctx.tabs.sequence);
    let mut tabs = Vec::with_capacity(order.len());
    for index in &order {
        let Some(tab) = ctx.tabs.get(*index) else {
            continue;
        };
        let members = if tab.index == 0 {
            implicit_members(ctx)
        } else {
            explicit_members(ctx, tab)
        };
        let single_name = single_section_name(ctx, tab, config);
        let single_section = single_name.is_some();
        let display_title = titles.project(ctx.course_id, tab, single_name);
        let short_title = truncate(&display_title, ctx.options.limit_tab_name);
        tabs.push(TabView {
            index: tab.index,
            id: format!("tab{}", tab.index),
            title: tab.effective_title().to_string(),
            generic_title: tab.generic_title.clone(),
            display_title,
            short_title,
            single_section,
            hidden: members.is_empty(),
            all_sections_hidden: !members.is_empty() && members.iter().all(|s| !s.visible),
            section_ids: members.iter().map(|s| s.id).collect(),
            section_numbers: members.iter().map(|s| s.number).collect(),
            sections: members.iter().map(|s| section_view(s, config)).collect(),
        });
    }

    let shown = tabs.iter().filter(|t| !t.hidden).count();
    let section0 = if ctx.options.section0_on_top {
        ctx.section_by_number(0).map(|s| section_view(s, config))
    } else {
        None
    };
    tracing::debug!(course_id = ctx.course_id, tabs = tabs.len(), shown, "course view built");
    CourseView {
        course_id: ctx.course_id,
        max_tabs: ctx.options.max_tabs,
        limit_tab_name: ctx.options.limit_tab_name,
        single_section_tabs: ctx.options.single_section_tabs,
        section0_on_top: ctx.options.section0_on_top,
        section0,
        order,
        tabs,
        tabs_visible: shown > 1,
    }
}
