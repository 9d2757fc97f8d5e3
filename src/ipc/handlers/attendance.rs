use crate::agg;
use crate::clock::Clock;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{date_param_or_today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttendanceRecord, AttendanceStatus};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

fn db_query_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

fn attendance_day_open(
    conn: &Connection,
    params: &serde_json::Value,
    clock: &dyn Clock,
) -> Result<serde_json::Value, HandlerErr> {
    let day = date_param_or_today(params, "date", clock)?;
    let date = agg::format_ymd(day);

    let roster = store::load_roster(conn).map_err(db_query_failed)?;
    let records = store::load_records(conn).map_err(db_query_failed)?;

    let marked: HashMap<&str, AttendanceStatus> = records
        .iter()
        .filter(|r| r.date == date)
        .map(|r| (r.student_id.as_str(), r.status))
        .collect();
    let already_marked = records.iter().any(|r| r.date == date);

    // Unmarked students prefill as Absent so a full-day save always covers
    // the whole roster.
    let rows: Vec<serde_json::Value> = roster
        .iter()
        .map(|s| {
            let status = marked
                .get(s.id.as_str())
                .copied()
                .unwrap_or(AttendanceStatus::Absent);
            json!({ "student": s, "status": status })
        })
        .collect();

    Ok(json!({
        "date": date,
        "alreadyMarked": already_marked,
        "rows": rows
    }))
}

/// Full-day overwrite: every existing record for the target date is dropped
/// and replaced by the submitted map. Records for other dates are untouched.
fn attendance_save_day(
    conn: &Connection,
    params: &serde_json::Value,
    clock: &dyn Clock,
) -> Result<serde_json::Value, HandlerErr> {
    let day = date_param_or_today(params, "date", clock)?;
    let date = agg::format_ymd(day);

    let Some(statuses) = params.get("statuses").and_then(|v| v.as_object()) else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "missing statuses".to_string(),
            details: None,
        });
    };

    let roster = store::load_roster(conn).map_err(db_query_failed)?;
    let mut by_student: HashMap<String, AttendanceStatus> = HashMap::new();
    for (student_id, value) in statuses {
        let Some(text) = value.as_str() else {
            return Err(HandlerErr {
                code: "bad_params",
                message: format!("status for {} must be a string", student_id),
                details: None,
            });
        };
        let Some(status) = AttendanceStatus::parse(text) else {
            return Err(HandlerErr {
                code: "bad_params",
                message: format!("invalid status: {}", text),
                details: Some(json!({ "studentId": student_id })),
            });
        };
        if !roster.iter().any(|s| s.id == *student_id) {
            return Err(HandlerErr {
                code: "not_found",
                message: "student not found".to_string(),
                details: Some(json!({ "studentId": student_id })),
            });
        }
        by_student.insert(student_id.clone(), status);
    }

    let records = store::load_records(conn).map_err(db_query_failed)?;
    let mut next: Vec<AttendanceRecord> =
        records.into_iter().filter(|r| r.date != date).collect();
    let mut saved = 0usize;
    for student in &roster {
        if let Some(status) = by_student.get(&student.id) {
            next.push(AttendanceRecord {
                date: date.clone(),
                student_id: student.id.clone(),
                status: *status,
            });
            saved += 1;
        }
    }

    store::save_records(conn, &next).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({ "date": date, "saved": saved }))
}

fn attendance_clear_all(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    store::delete_collection(conn, store::RECORDS_KEY).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(json!({ "cleared": true }))
}

fn handle_attendance_day_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_day_open(conn, &req.params, state.clock.as_ref()) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_save_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_save_day(conn, &req.params, state.clock.as_ref()) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_clear_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_clear_all(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.dayOpen" => Some(handle_attendance_day_open(state, req)),
        "attendance.saveDay" => Some(handle_attendance_save_day(state, req)),
        "attendance.clearAll" => Some(handle_attendance_clear_all(state, req)),
        _ => None,
    }
}
