use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::store::{AttendanceRecord, AttendanceStatus, Student};

/// Parse a stored `YYYY-MM-DD` date by explicit year/month/day decomposition.
/// Anything else (wrong component count, non-numeric parts, out-of-range
/// calendar values) is unparsable; callers drop such records from
/// date-ordered views instead of failing the whole computation.
pub fn parse_ymd(text: &str) -> Option<NaiveDate> {
    let mut parts = text.split('-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// First and last day of the calendar month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let year = date.year();
    let month = date.month();
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date);
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next_month
        .map(|first| first - Duration::days(1))
        .unwrap_or(start);
    (start, end)
}

fn attended(status: AttendanceStatus) -> bool {
    matches!(
        status,
        AttendanceStatus::Present | AttendanceStatus::Tardy
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayTally {
    pub present: i64,
    pub absent: i64,
    pub tardy: i64,
}

/// Same-day counts. Absence is inferred, not stored: every roster member
/// without a Present/Tardy record that day lands in `absent`, so
/// present + absent + tardy always equals the roster size.
pub fn daily_tally(records: &[AttendanceRecord], students: &[Student], date: &str) -> DayTally {
    let mut present = 0_i64;
    let mut tardy = 0_i64;
    for rec in records.iter().filter(|r| r.date == date) {
        match rec.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Tardy => tardy += 1,
            AttendanceStatus::Absent => {}
        }
    }
    let absent = students.len() as i64 - (present + tardy);
    DayTally {
        present,
        absent,
        tardy,
    }
}

/// True when no attendance has been recorded for `date` at all.
pub fn attendance_pending(records: &[AttendanceRecord], date: &str) -> bool {
    !records.iter().any(|r| r.date == date)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub label: String,
    pub date: String,
    pub present: i64,
    pub absent: i64,
}

/// One bucket per calendar day for the `window_days` days ending at
/// `end_date` inclusive, oldest first. Tardy counts as attended; a day with
/// no records shows the whole roster as absent.
pub fn weekly_trend(
    records: &[AttendanceRecord],
    students: &[Student],
    end_date: NaiveDate,
    window_days: u32,
) -> Vec<TrendBucket> {
    let roster_size = students.len() as i64;
    let mut buckets = Vec::with_capacity(window_days as usize);
    for offset in (0..i64::from(window_days)).rev() {
        let day = end_date - Duration::days(offset);
        let key = format_ymd(day);
        let present = records
            .iter()
            .filter(|r| r.date == key && attended(r.status))
            .count() as i64;
        buckets.push(TrendBucket {
            label: day.format("%a").to_string(),
            date: key,
            present,
            absent: roster_size - present,
        });
    }
    buckets
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsenteeEntry {
    pub student: Student,
    pub absences: i64,
}

/// Students with explicit Absent records inside the inclusive date range,
/// most absences first, zero-count students dropped. Only explicit marks
/// count here; inferred absences (no record at all) do not. Records whose
/// date does not parse are skipped.
pub fn top_absentees(
    records: &[AttendanceRecord],
    students: &[Student],
    range_start: NaiveDate,
    range_end: NaiveDate,
    limit: usize,
) -> Vec<AbsenteeEntry> {
    let mut entries: Vec<AbsenteeEntry> = students
        .iter()
        .map(|student| {
            let absences = records
                .iter()
                .filter(|r| {
                    r.student_id == student.id
                        && r.status == AttendanceStatus::Absent
                        && parse_ymd(&r.date)
                            .map(|d| d >= range_start && d <= range_end)
                            .unwrap_or(false)
                })
                .count() as i64;
            AbsenteeEntry {
                student: student.clone(),
                absences,
            }
        })
        .filter(|entry| entry.absences > 0)
        .collect();
    // Stable sort: equal counts keep roster order.
    entries.sort_by(|a, b| b.absences.cmp(&a.absences));
    entries.truncate(limit);
    entries
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReportRow {
    pub student: Student,
    pub present_days: i64,
    pub total_days: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub overall_percentage: f64,
    pub total_days: i64,
    pub per_student: Vec<StudentReportRow>,
}

/// Full per-student percentage report. `total_days` is the number of
/// distinct dates anywhere in the record set (days attendance was taken at
/// all) and is the denominator for every student. With no recorded days the
/// list is name-sorted and all-zero; otherwise it is sorted by percentage,
/// best first, ties keeping roster order.
pub fn attendance_report(
    records: &[AttendanceRecord],
    students: &[Student],
) -> AttendanceReport {
    let total_days = records
        .iter()
        .map(|r| r.date.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;

    if total_days == 0 {
        let mut per_student: Vec<StudentReportRow> = students
            .iter()
            .map(|student| StudentReportRow {
                student: student.clone(),
                present_days: 0,
                total_days: 0,
                percentage: 0.0,
            })
            .collect();
        per_student.sort_by(|a, b| a.student.name.cmp(&b.student.name));
        return AttendanceReport {
            overall_percentage: 0.0,
            total_days: 0,
            per_student,
        };
    }

    let attended_total = records.iter().filter(|r| attended(r.status)).count() as i64;
    let possible = students.len() as i64 * total_days;
    let overall_percentage = if possible > 0 {
        100.0 * attended_total as f64 / possible as f64
    } else {
        0.0
    };

    let mut per_student: Vec<StudentReportRow> = students
        .iter()
        .map(|student| {
            let present_days = records
                .iter()
                .filter(|r| r.student_id == student.id && attended(r.status))
                .count() as i64;
            StudentReportRow {
                student: student.clone(),
                present_days,
                total_days,
                percentage: 100.0 * present_days as f64 / total_days as f64,
            }
        })
        .collect();
    per_student.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    });

    AttendanceReport {
        overall_percentage,
        total_days,
        per_student,
    }
}
