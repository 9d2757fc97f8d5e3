use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Student};
use rusqlite::Connection;
use serde_json::json;

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let roster = store::load_roster(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(json!({ "students": roster }))
}

/// Next free `S`-prefixed id. Only ids shaped `S<digits>` feed the counter;
/// anything else in the roster is ignored. Padding grows past three digits
/// rather than truncating.
fn next_student_id(roster: &[Student]) -> String {
    let max_suffix = roster
        .iter()
        .filter_map(|s| s.id.strip_prefix('S'))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("S{:03}", max_suffix + 1)
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.chars().count() < 2 {
        return Err(HandlerErr {
            code: "bad_params",
            message: "name must be at least 2 characters".to_string(),
            details: None,
        });
    }
    let enrollment_id = get_required_str(params, "enrollmentId")?.trim().to_string();
    if enrollment_id.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "enrollmentId must not be empty".to_string(),
            details: None,
        });
    }
    let division = get_required_str(params, "division")?.trim().to_string();
    if division.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "division must not be empty".to_string(),
            details: None,
        });
    }

    let mut roster = store::load_roster(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;

    let wanted = enrollment_id.to_lowercase();
    let taken = roster.iter().any(|s| {
        s.enrollment_id
            .as_ref()
            .map(|e| e.to_lowercase() == wanted)
            .unwrap_or(false)
    });
    if taken {
        return Err(HandlerErr {
            code: "already_exists",
            message: "a student with this enrollment ID already exists".to_string(),
            details: Some(json!({ "enrollmentId": enrollment_id })),
        });
    }

    let student = Student {
        id: next_student_id(&roster),
        name,
        enrollment_id: Some(enrollment_id),
        division: Some(division),
    };
    roster.push(student.clone());
    roster.sort_by(|a, b| a.name.cmp(&b.name));
    store::save_roster(conn, &roster).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({ "student": student }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        _ => None,
    }
}
