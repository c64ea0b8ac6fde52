use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::sections;
use crate::store::{OptionStore, SqliteStore};

const MANIFEST_ENTRY: &str = "manifest.json";
const COURSE_ENTRY: &str = "course.json";
pub const BUNDLE_FORMAT_V1: &str = "tabformat-course-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundledSection {
    id: i64,
    number: u32,
    name: Option<String>,
    visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoursePayload {
    course_id: i64,
    name: String,
    sections: Vec<BundledSection>,
    options: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub backup_id: String,
    pub sha256: String,
    pub section_count: usize,
    pub option_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub course_id: i64,
    pub backup_id: String,
    pub section_count: usize,
    pub option_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn course_name(conn: &Connection, course_id: i64) -> anyhow::Result<String> {
    conn.query_row("SELECT name FROM courses WHERE id = ?", [course_id], |r| {
        r.get(0)
    })
    .with_context(|| format!("course {} not found", course_id))
}

pub fn export_course_bundle(
    conn: &Connection,
    course_id: i64,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let name = course_name(conn, course_id)?;
    let sections = sections::list_sections(conn, course_id)?
        .into_iter()
        .map(|s| BundledSection {
            id: s.id,
            number: s.number,
            name: s.name,
            visible: s.visible,
        })
        .collect::<Vec<_>>();
    let options = SqliteStore::new(conn).load_all(course_id)?;
    let payload = CoursePayload {
        course_id,
        name,
        sections,
        options,
    };
    let payload_bytes =
        serde_json::to_vec_pretty(&payload).context("failed to serialize course payload")?;
    let sha256 = sha256_hex(&payload_bytes);
    let backup_id = Uuid::new_v4().to_string();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "backupId": backup_id,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "courseSha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(COURSE_ENTRY, opts)
        .context("failed to start course entry")?;
    zip.write_all(&payload_bytes)
        .context("failed to write course entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    tracing::info!(course_id, %backup_id, path = %out_path.to_string_lossy(), "course exported");
    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        backup_id,
        sha256,
        section_count: payload.sections.len(),
        option_count: payload.options.len(),
    })
}

/// Imports a bundle as a new course. Section numbers and option values are kept; section ids
/// are assigned afresh, so stored tab membership goes stale until the next render repairs it.
pub fn import_course_bundle(
    conn: &Connection,
    in_path: &Path,
    name_override: Option<&str>,
) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("courseSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let backup_id = manifest
        .get("backupId")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let mut payload_bytes = Vec::new();
    archive
        .by_name(COURSE_ENTRY)
        .context("bundle missing course.json")?
        .read_to_end(&mut payload_bytes)
        .context("failed to read course.json")?;
    let actual_sha = sha256_hex(&payload_bytes);
    if actual_sha != expected_sha {
        return Err(anyhow!(
            "course.json checksum mismatch: expected {}, got {}",
            expected_sha,
            actual_sha
        ));
    }
    let payload: CoursePayload =
        serde_json::from_slice(&payload_bytes).context("course.json is invalid")?;

    let tx = conn.unchecked_transaction()?;
    let name = name_override.unwrap_or(&payload.name);
    tx.execute("INSERT INTO courses(name) VALUES(?)", [name])?;
    let course_id = tx.last_insert_rowid();
    for s in &payload.sections {
        sections::insert_section(&tx, course_id, s.number, s.name.as_deref(), s.visible)?;
    }
    let store = SqliteStore::new(&tx);
    for (name, value) in &payload.options {
        store.set(course_id, name, value)?;
    }
    tx.commit()?;

    tracing::info!(
        course_id,
        source_course = payload.course_id,
        %backup_id,
        "course restored"
    );
    Ok(ImportSummary {
        course_id,
        backup_id,
        section_count: payload.sections.len(),
        option_count: payload.options.len(),
    })
}
