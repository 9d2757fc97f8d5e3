use anyhow::{anyhow, Context};
use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store::{self, AttendanceRecord, Student};

const MANIFEST_ENTRY: &str = "manifest.json";
const STUDENTS_ENTRY: &str = "collections/students.json";
const RECORDS_ENTRY: &str = "collections/attendanceRecords.json";
pub const BUNDLE_FORMAT_V1: &str = "attend-backup-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub students: usize,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub students: usize,
    pub records: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn export_bundle(conn: &Connection, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let roster = store::load_roster(conn).context("failed to read roster snapshot")?;
    let records = store::load_records(conn).context("failed to read records snapshot")?;

    let students_payload =
        serde_json::to_string_pretty(&roster).context("failed to serialize roster")?;
    let records_payload =
        serde_json::to_string_pretty(&records).context("failed to serialize records")?;

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

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "checksums": {
            STUDENTS_ENTRY: sha256_hex(students_payload.as_bytes()),
            RECORDS_ENTRY: sha256_hex(records_payload.as_bytes()),
        },
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(STUDENTS_ENTRY, opts)
        .context("failed to start students entry")?;
    zip.write_all(students_payload.as_bytes())
        .context("failed to write students entry")?;

    zip.start_file(RECORDS_ENTRY, opts)
        .context("failed to start records entry")?;
    zip.write_all(records_payload.as_bytes())
        .context("failed to write records entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        students: roster.len(),
        records: records.len(),
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<String> {
    let mut text = String::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle missing {}", name))?
        .read_to_string(&mut text)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(text)
}

fn expect_checksum(manifest: &serde_json::Value, entry: &str, payload: &str) -> anyhow::Result<()> {
    let expected = manifest
        .get("checksums")
        .and_then(|c| c.get(entry))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest missing checksum for {}", entry))?;
    if expected != sha256_hex(payload.as_bytes()) {
        return Err(anyhow!("checksum mismatch for {}", entry));
    }
    Ok(())
}

/// Restores both collections from a bundle. The format tag, checksums and
/// JSON payloads are all validated before the store is touched; the two
/// snapshot writes then commit in one transaction.
pub fn import_bundle(conn: &Connection, in_path: &Path) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest_text = read_entry(&mut archive, MANIFEST_ENTRY)?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let students_payload = read_entry(&mut archive, STUDENTS_ENTRY)?;
    let records_payload = read_entry(&mut archive, RECORDS_ENTRY)?;
    expect_checksum(&manifest, STUDENTS_ENTRY, &students_payload)?;
    expect_checksum(&manifest, RECORDS_ENTRY, &records_payload)?;

    let roster: Vec<Student> =
        serde_json::from_str(&students_payload).context("students snapshot is invalid JSON")?;
    let records: Vec<AttendanceRecord> =
        serde_json::from_str(&records_payload).context("records snapshot is invalid JSON")?;

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin import transaction")?;
    store::save_roster(&tx, &roster).context("failed to write roster snapshot")?;
    store::save_records(&tx, &records).context("failed to write records snapshot")?;
    tx.commit().context("failed to commit import")?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        students: roster.len(),
        records: records.len(),
    })
}
