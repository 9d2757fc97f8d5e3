use crate::agg;
use crate::clock::Clock;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{date_param_or_today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

const TREND_WINDOW_DAYS: u32 = 7;
const TOP_ABSENTEE_LIMIT: usize = 5;

/// Everything the landing view needs in one round trip: today's tally, the
/// seven-day trend, this month's worst absentees and whether attendance is
/// still pending for the day.
fn dashboard_open(
    conn: &Connection,
    params: &serde_json::Value,
    clock: &dyn Clock,
) -> Result<serde_json::Value, HandlerErr> {
    let day = date_param_or_today(params, "date", clock)?;
    let date = agg::format_ymd(day);

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

    let tally = agg::daily_tally(&records, &roster, &date);
    let pending = agg::attendance_pending(&records, &date);
    let trend = agg::weekly_trend(&records, &roster, day, TREND_WINDOW_DAYS);
    let (month_start, month_end) = agg::month_bounds(day);
    let absentees = agg::top_absentees(&records, &roster, month_start, month_end, TOP_ABSENTEE_LIMIT);

    let total_students = roster.len() as i64;
    // Tardy still counts as attended for the day's headline rate.
    let attendance_rate = if total_students > 0 {
        100.0 * (tally.present + tally.tardy) as f64 / total_students as f64
    } else {
        0.0
    };

    Ok(json!({
        "date": date,
        "totalStudents": total_students,
        "tally": tally,
        "attendanceRate": attendance_rate,
        "attendancePending": pending,
        "weeklyTrend": trend,
        "topAbsentees": absentees,
    }))
}

fn handle_dashboard_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match dashboard_open(conn, &req.params, state.clock.as_ref()) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(handle_dashboard_open(state, req)),
        _ => None,
    }
}
