use crate::agg;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

/// Whole-history percentage report. With no recorded days every row is zero
/// and `best`/`worst` are null; otherwise rows are ranked best-first and the
/// two extremes are called out.
fn reports_attendance_summary(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
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

    let report = agg::attendance_report(&records, &roster);
    let best = if report.total_days == 0 {
        None
    } else {
        report.per_student.first().cloned()
    };
    let worst = if report.total_days == 0 {
        None
    } else {
        report.per_student.last().cloned()
    };

    Ok(json!({
        "overallPercentage": report.overall_percentage,
        "totalDays": report.total_days,
        "students": report.per_student,
        "best": best,
        "worst": worst,
    }))
}

fn handle_reports_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match reports_attendance_summary(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.attendanceSummary" => Some(handle_reports_attendance_summary(state, req)),
        _ => None,
    }
}
