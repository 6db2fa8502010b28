// TIME_WINDOW: time-of-day + optional weekday filter against an IANA zone.
// Grounded on gateway_selector_v2/matchers/time_window.py.

use super::{get_field, Matcher};
use crate::context::Context;
use crate::error::MatcherBuildError;
use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// `TimeWindow(tz, start, end, days_of_week?)`.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub tz: Tz,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days_of_week: Option<std::sync::Arc<[u8]>>,
}

fn weekday_index(w: Weekday) -> u8 {
    // Mon=0 .. Sun=6, matching the spec's convention.
    w.num_days_from_monday() as u8
}

fn parse_hms(s: &str) -> Result<NaiveTime, MatcherBuildError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(MatcherBuildError::InvalidTimeLiteral(s.to_string()));
    }
    let parse = |p: &str| p.parse::<u32>().map_err(|_| MatcherBuildError::InvalidTimeLiteral(s.to_string()));
    let hh = parse(parts[0])?;
    let mm = parse(parts[1])?;
    let ss = if parts.len() == 3 { parse(parts[2])? } else { 0 };
    if hh > 23 || mm > 59 || ss > 59 {
        return Err(MatcherBuildError::InvalidTimeLiteral(s.to_string()));
    }
    NaiveTime::from_hms_opt(hh, mm, ss).ok_or_else(|| MatcherBuildError::InvalidTimeLiteral(s.to_string()))
}

fn parse_weekday(s: &str) -> Result<u8, MatcherBuildError> {
    match s.trim().to_lowercase().as_str() {
        "mon" | "monday" => Ok(0),
        "tue" | "tuesday" => Ok(1),
        "wed" | "wednesday" => Ok(2),
        "thu" | "thursday" => Ok(3),
        "fri" | "friday" => Ok(4),
        "sat" | "saturday" => Ok(5),
        "sun" | "sunday" => Ok(6),
        _ => Err(MatcherBuildError::InvalidWeekday(s.to_string())),
    }
}

impl TimeWindow {
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let now_in_tz = self.resolve_now(ctx);

        if let Some(days) = &self.days_of_week {
            let wd = weekday_index(now_in_tz.weekday());
            if !days.contains(&wd) {
                return false;
            }
        }

        let t = now_in_tz.time();
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }

    /// Resolves "now" in this matcher's timezone: if `ctx.now` is absent,
    /// uses the current wall clock; if present and parses as naive (no
    /// offset), attaches this tz; if present with an offset, converts.
    fn resolve_now(&self, ctx: &Context) -> DateTime<Tz> {
        let raw_now = get_field(ctx, "now").and_then(|v| v.as_str());
        match raw_now {
            None => Utc::now().with_timezone(&self.tz),
            Some(s) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    dt.with_timezone(&self.tz)
                } else if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    self.tz
                        .from_local_datetime(&naive)
                        .single()
                        .unwrap_or_else(|| Utc::now().with_timezone(&self.tz))
                } else {
                    Utc::now().with_timezone(&self.tz)
                }
            }
        }
    }
}

/// `{"type":"TIME_WINDOW","tz":str,"start":"HH:MM[:SS]","end":"HH:MM[:SS]",
///   "days_of_week"?:[str]}`.
pub fn build(cond: &serde_json::Value) -> Result<Matcher, MatcherBuildError> {
    let tz_name = cond.get("tz").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "TIME_WINDOW".into(), field: "tz".into() }
    })?;
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| MatcherBuildError::UnknownTimezone(tz_name.to_string()))?;

    let start_s = cond.get("start").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "TIME_WINDOW".into(), field: "start".into() }
    })?;
    let end_s = cond.get("end").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "TIME_WINDOW".into(), field: "end".into() }
    })?;
    let start = parse_hms(start_s)?;
    let end = parse_hms(end_s)?;

    let days_of_week = match cond.get("days_of_week") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => {
            let arr = v.as_array().ok_or_else(|| MatcherBuildError::InvalidField {
                matcher_type: "TIME_WINDOW".into(),
                field: "days_of_week".into(),
            })?;
            let mut days = Vec::with_capacity(arr.len());
            for d in arr {
                let s = d.as_str().ok_or_else(|| MatcherBuildError::InvalidWeekday(d.to_string()))?;
                days.push(parse_weekday(s)?);
            }
            days.sort_unstable();
            days.dedup();
            Some(std::sync::Arc::from(days))
        }
    };

    Ok(Matcher::TimeWindow(TimeWindow { tz, start, end, days_of_week }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_matcher(cond: serde_json::Value) -> Matcher {
        build(&cond).unwrap()
    }

    #[test]
    fn overnight_window_matches_early_morning_not_noon() {
        let m = build_matcher(json!({"type":"TIME_WINDOW","tz":"America/Sao_Paulo","start":"22:00","end":"06:00"}));
        let mut ctx = Context::new();
        ctx.set("now", "2023-01-01T05:00:00-03:00");
        assert!(m.evaluate(&ctx));
        ctx.set("now", "2023-01-01T12:00:00-03:00");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn same_day_window() {
        let m = build_matcher(json!({"type":"TIME_WINDOW","tz":"America/Sao_Paulo","start":"09:00","end":"18:00"}));
        let mut ctx = Context::new();
        ctx.set("now", "2023-01-01T12:00:00-03:00");
        assert!(m.evaluate(&ctx));
        ctx.set("now", "2023-01-01T20:00:00-03:00");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn days_of_week_filter() {
        // 2023-01-02 is a Monday.
        let m = build_matcher(json!({"type":"TIME_WINDOW","tz":"UTC","start":"00:00","end":"23:59:59","days_of_week":["sat","sun"]}));
        let mut ctx = Context::new();
        ctx.set("now", "2023-01-02T12:00:00+00:00");
        assert!(!m.evaluate(&ctx));
        ctx.set("now", "2023-01-01T12:00:00+00:00"); // Sunday
        assert!(m.evaluate(&ctx));
    }

    #[test]
    fn unknown_timezone_fails_build() {
        let cond = json!({"type":"TIME_WINDOW","tz":"Not/AZone","start":"00:00","end":"01:00"});
        assert!(build(&cond).is_err());
    }

    #[test]
    fn invalid_time_literal_fails_build() {
        let cond = json!({"type":"TIME_WINDOW","tz":"UTC","start":"25:00","end":"01:00"});
        assert!(build(&cond).is_err());
    }
}
