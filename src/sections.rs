use std::collections::{BTreeMap, HashMap};

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::config::FormatConfig;
use crate::error::{EngineError, EngineResult};

pub type SectionId = i64;
pub type SectionNumber = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub number: SectionNumber,
    pub visible: bool,
    pub name: Option<String>,
}

impl Section {
    pub fn display_name(&self, config: &FormatConfig) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ if self.number == 0 => config.section0_name.clone(),
            _ => format!("{} {}", config.section_name_prefix, self.number),
        }
    }
}

/// Current section identities of one course, indexed both ways.
#[derive(Debug, Clone, Default)]
pub struct LiveSections {
    by_number: BTreeMap<SectionNumber, SectionId>,
    by_id: HashMap<SectionId, SectionNumber>,
}

impl LiveSections {
    pub fn from_sections(sections: &[Section]) -> Self {
        let mut live = Self::default();
        for s in sections {
            live.by_number.insert(s.number, s.id);
            live.by_id.insert(s.id, s.number);
        }
        live
    }

    /// Ids in section-number order.
    pub fn ids(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.by_number.values().copied()
    }

    pub fn id_for_number(&self, number: SectionNumber) -> Option<SectionId> {
        self.by_number.get(&number).copied()
    }

    pub fn number_for_id(&self, id: SectionId) -> Option<SectionNumber> {
        self.by_id.get(&id).copied()
    }
}

pub fn course_exists(conn: &Connection, course_id: i64) -> EngineResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn require_course(conn: &Connection, course_id: i64) -> EngineResult<()> {
    if course_exists(conn, course_id)? {
        Ok(())
    } else {
        Err(EngineError::CourseNotFound(course_id))
    }
}

/// Creates a course with sections `0..=num_sections`.
pub fn create_course(conn: &Connection, name: &str, num_sections: u32) -> EngineResult<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("INSERT INTO courses(name) VALUES(?)", [name])?;
    let course_id = tx.last_insert_rowid();
    for number in 0..=num_sections {
        tx.execute(
            "INSERT INTO course_sections(course_id, section, name, visible) VALUES(?, ?, NULL, 1)",
            (course_id, number),
        )?;
    }
    tx.commit()?;
    tracing::info!(course_id, num_sections, "course created");
    Ok(course_id)
}

pub fn list_sections(conn: &Connection, course_id: i64) -> EngineResult<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT id, section, visible, name FROM course_sections
         WHERE course_id = ?
         ORDER BY section",
    )?;
    let rows = stmt
        .query_map([course_id], |row| {
            Ok(Section {
                id: row.get(0)?,
                number: row.get(1)?,
                visible: row.get::<_, i64>(2)? != 0,
                name: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_section(
    conn: &Connection,
    course_id: i64,
    number: SectionNumber,
) -> EngineResult<Section> {
    conn.query_row(
        "SELECT id, section, visible, name FROM course_sections WHERE course_id = ? AND section = ?",
        (course_id, number),
        |row| {
            Ok(Section {
                id: row.get(0)?,
                number: row.get(1)?,
                visible: row.get::<_, i64>(2)? != 0,
                name: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or(EngineError::SectionNotFound { course_id, number })
}

/// Inserts a section with an explicit name; used when restoring a course.
pub fn insert_section(
    conn: &Connection,
    course_id: i64,
    number: SectionNumber,
    name: Option<&str>,
    visible: bool,
) -> EngineResult<SectionId> {
    conn.execute(
        "INSERT INTO course_sections(course_id, section, name, visible) VALUES(?, ?, ?, ?)",
        (course_id, number, name, visible as i64),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_section(conn: &Connection, course_id: i64, name: Option<&str>) -> EngineResult<Section> {
    require_course(conn, course_id)?;
    let next: Option<u32> = conn.query_row(
        "SELECT MAX(section) FROM course_sections WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    let number = next.map(|n| n + 1).unwrap_or(0);
    insert_section(conn, course_id, number, name, true)?;
    get_section(conn, course_id, number)
}

pub fn update_section(
    conn: &Connection,
    course_id: i64,
    number: SectionNumber,
    name: Option<Option<&str>>,
    visible: Option<bool>,
) -> EngineResult<Section> {
    let current = get_section(conn, course_id, number)?;
    if let Some(name) = name {
        conn.execute(
            "UPDATE course_sections SET name = ? WHERE id = ?",
            (name, current.id),
        )?;
    }
    if let Some(visible) = visible {
        conn.execute(
            "UPDATE course_sections SET visible = ? WHERE id = ?",
            (visible as i64, current.id),
        )?;
    }
    get_section(conn, course_id, number)
}

/// Removes the section record and shifts higher numbers down so numbering stays contiguous.
/// Returns the deleted section; tab cleanup is the caller's job.
pub fn delete_section_record(
    conn: &Connection,
    course_id: i64,
    number: SectionNumber,
) -> EngineResult<Section> {
    if number == 0 {
        return Err(EngineError::malformed("section 0 cannot be deleted"));
    }
    let section = get_section(conn, course_id, number)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM course_sections WHERE id = ?", [section.id])?;
    // Shift in ascending order so the UNIQUE(course_id, section) constraint never collides.
    let mut stmt = tx.prepare(
        "SELECT id FROM course_sections WHERE course_id = ? AND section > ? ORDER BY section",
    )?;
    let later: Vec<SectionId> = stmt
        .query_map((course_id, number), |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);
    for id in later {
        tx.execute(
            "UPDATE course_sections SET section = section - 1 WHERE id = ?",
            [id],
        )?;
    }
    tx.commit()?;
    Ok(section)
}
