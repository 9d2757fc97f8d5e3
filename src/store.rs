use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const STUDENTS_KEY: &str = "students";
pub const RECORDS_KEY: &str = "attendanceRecords";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Tardy,
}

impl AttendanceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            "Tardy" => Some(AttendanceStatus::Tardy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    // Earlier roster snapshots predate these two fields; absent values stay
    // absent on re-serialization instead of becoming nulls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: String,
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// Roster used when the `students` key has never been written.
pub fn default_roster() -> Vec<Student> {
    const SEED: [(&str, &str, &str, &str); 10] = [
        ("S001", "Aarav Sharma", "E24001", "A"),
        ("S002", "Diya Patel", "E24002", "A"),
        ("S003", "Rohan Singh", "E24003", "B"),
        ("S004", "Anika Gupta", "E24004", "A"),
        ("S005", "Vivaan Reddy", "E24005", "B"),
        ("S006", "Ishita Kumar", "E24006", "A"),
        ("S007", "Arjun Das", "E24007", "A"),
        ("S008", "Myra Joshi", "E24008", "B"),
        ("S009", "Kabir Khan", "E24009", "A"),
        ("S010", "Saanvi Rao", "E24010", "B"),
    ];
    SEED.iter()
        .map(|(id, name, enrollment_id, division)| Student {
            id: (*id).to_string(),
            name: (*name).to_string(),
            enrollment_id: Some((*enrollment_id).to_string()),
            division: Some((*division).to_string()),
        })
        .collect()
}

pub fn open_store(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attend.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// Read a whole-collection snapshot. A missing key yields the supplied
/// default; so does a snapshot that no longer decodes, matching the
/// dashboard's read-or-default storage contract.
pub fn read_collection<T: DeserializeOwned>(
    conn: &Connection,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM collections WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(raw
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(default))
}

/// Replace a whole-collection snapshot. The single upsert makes the write
/// atomic for readers: they see either the old snapshot or the new one.
pub fn write_collection<T: Serialize>(
    conn: &Connection,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO collections(key, value)
         VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, &text),
    )?;
    Ok(())
}

pub fn delete_collection(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM collections WHERE key = ?", [key])?;
    Ok(())
}

pub fn load_roster(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    read_collection(conn, STUDENTS_KEY, default_roster())
}

pub fn save_roster(conn: &Connection, roster: &[Student]) -> anyhow::Result<()> {
    write_collection(conn, STUDENTS_KEY, &roster)
}

pub fn load_records(conn: &Connection) -> anyhow::Result<Vec<AttendanceRecord>> {
    read_collection(conn, RECORDS_KEY, Vec::new())
}

pub fn save_records(conn: &Connection, records: &[AttendanceRecord]) -> anyhow::Result<()> {
    write_collection(conn, RECORDS_KEY, &records)
}
