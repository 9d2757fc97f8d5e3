use crate::agg;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttendanceRecord};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::collections::{HashMap, HashSet};

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

fn optional_filter(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "all")
        .map(str::to_string)
}

/// Filtered, newest-first page over the raw record log. Records whose date
/// does not parse are left out of both the rows and the date list; a record
/// pointing at a student no longer on the roster still shows, under the
/// name "Unknown".
fn logs_query(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date_filter = optional_filter(params, "date");
    let student_filter = optional_filter(params, "studentId");
    let page = params
        .get("page")
        .and_then(|v| v.as_u64())
        .unwrap_or(1)
        .max(1) as usize;
    let page_size = params
        .get("pageSize")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_PAGE_SIZE as u64)
        .clamp(1, MAX_PAGE_SIZE as u64) as usize;

    let roster = store::load_roster(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let records = store::load_records(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;

    let names: HashMap<&str, &str> = roster
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let dated: Vec<(&AttendanceRecord, NaiveDate)> = records
        .iter()
        .filter_map(|r| agg::parse_ymd(&r.date).map(|d| (r, d)))
        .collect();

    // Distinct dates over the whole log, newest first, regardless of the
    // active filters. The UI date picker is fed from this.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique: Vec<(String, NaiveDate)> = Vec::new();
    for (r, d) in &dated {
        if seen.insert(r.date.as_str()) {
            unique.push((r.date.clone(), *d));
        }
    }
    unique.sort_by(|a, b| b.1.cmp(&a.1));
    let unique_dates: Vec<String> = unique.into_iter().map(|(s, _)| s).collect();

    let mut rows: Vec<(&AttendanceRecord, NaiveDate)> = dated
        .into_iter()
        .filter(|(r, _)| {
            date_filter
                .as_deref()
                .map(|d| r.date == d)
                .unwrap_or(true)
        })
        .filter(|(r, _)| {
            student_filter
                .as_deref()
                .map(|s| r.student_id == s)
                .unwrap_or(true)
        })
        .collect();
    // Stable sort: records on the same day keep their stored order.
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    let total_records = rows.len();
    let page_count = if total_records == 0 {
        1
    } else {
        (total_records + page_size - 1) / page_size
    };
    let page = page.min(page_count);
    let start = (page - 1) * page_size;

    let page_rows: Vec<serde_json::Value> = rows
        .iter()
        .skip(start)
        .take(page_size)
        .map(|(r, _)| {
            json!({
                "date": r.date,
                "studentId": r.student_id,
                "studentName": names.get(r.student_id.as_str()).copied().unwrap_or("Unknown"),
                "status": r.status,
            })
        })
        .collect();

    Ok(json!({
        "records": page_rows,
        "page": page,
        "pageCount": page_count,
        "totalRecords": total_records,
        "uniqueDates": unique_dates,
    }))
}

fn handle_logs_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match logs_query(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "logs.query" => Some(handle_logs_query(state, req)),
        _ => None,
    }
}
