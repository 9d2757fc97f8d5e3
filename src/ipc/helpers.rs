use chrono::NaiveDate;

use super::error::err;
use crate::agg;
use crate::clock::Clock;

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

/// Optional `YYYY-MM-DD` param. Absent or null falls back to the clock's
/// current day; a present value must parse as a real calendar date.
pub fn date_param_or_today(
    params: &serde_json::Value,
    key: &str,
    clock: &dyn Clock,
) -> Result<NaiveDate, HandlerErr> {
    match params.get(key) {
        None => Ok(clock.today()),
        Some(serde_json::Value::Null) => Ok(clock.today()),
        Some(v) => {
            let Some(text) = v.as_str() else {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: format!("{} must be a string", key),
                    details: None,
                });
            };
            agg::parse_ymd(text).ok_or_else(|| HandlerErr {
                code: "bad_params",
                message: format!("{} must be a YYYY-MM-DD date", key),
                details: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 5, 7).unwrap())
    }

    #[test]
    fn absent_or_null_date_falls_back_to_the_clock() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        let from_missing = date_param_or_today(&json!({}), "date", &clock()).unwrap();
        assert_eq!(from_missing, today);
        let from_null = date_param_or_today(&json!({ "date": null }), "date", &clock()).unwrap();
        assert_eq!(from_null, today);
    }

    #[test]
    fn explicit_date_overrides_the_clock() {
        let picked =
            date_param_or_today(&json!({ "date": "2024-05-01" }), "date", &clock()).unwrap();
        assert_eq!(picked, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        // Unpadded components are still a valid calendar date.
        let unpadded =
            date_param_or_today(&json!({ "date": "2024-5-1" }), "date", &clock()).unwrap();
        assert_eq!(unpadded, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn malformed_date_is_bad_params() {
        for bad in ["05/01/2024", "2024-13-01", "2024-02-30", "yesterday"] {
            let e = date_param_or_today(&json!({ "date": bad }), "date", &clock()).unwrap_err();
            assert_eq!(e.code, "bad_params");
        }
        let e = date_param_or_today(&json!({ "date": 20240501 }), "date", &clock()).unwrap_err();
        assert_eq!(e.code, "bad_params");
    }

    #[test]
    fn get_required_str_reports_the_missing_key() {
        let e = get_required_str(&json!({}), "name").unwrap_err();
        assert_eq!(e.code, "bad_params");
        assert_eq!(e.message, "missing name");
        assert_eq!(get_required_str(&json!({ "name": "Diya" }), "name").unwrap(), "Diya");
    }
}
