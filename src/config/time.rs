use chrono::{DateTime, Duration, Utc};

/// Point in time relative to the run start (`T+10s`) or absolute (RFC 3339,
/// optionally shifted: `2026-01-12T10:00:00Z - 10s`).
#[derive(Debug, Clone, PartialEq)]
pub enum TimeExpr {
    Relative(Duration),
    Absolute(DateTime<Utc>),
}

impl TimeExpr {
    /// `None` when the result falls outside the representable range.
    pub fn resolve(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeExpr::Relative(d) => start.checked_add_signed(*d),
            TimeExpr::Absolute(dt) => Some(*dt),
        }
    }
}

pub fn parse_time(s: &str) -> Result<TimeExpr, String> {
    let s = s.trim();

    // Relative: T+10s, T-5m
    if s.to_lowercase().starts_with('t') {
        let (neg, rest) = split_sign(&s[1..]);
        let dur = parse_offset(rest)?;
        let expr = TimeExpr::Relative(if neg { -dur } else { dur });
        return match expr.resolve(Utc::now()) {
            Some(_) => Ok(expr),
            None => Err(format!("offset out of range: {}", s)),
        };
    }

    // Absolute with offset: 2026-01-12T10:00:00Z - 10s
    if let Some(idx) = s.rfind(['+', '-']) {
        if idx > 10 {
            if let Ok(base) = DateTime::parse_from_rfc3339(s[..idx].trim()) {
                let (neg, rest) = split_sign(&s[idx..]);
                let dur = parse_offset(rest)?;
                let base = base.with_timezone(&Utc);
                let shifted = if neg {
                    base.checked_sub_signed(dur)
                } else {
                    base.checked_add_signed(dur)
                };
                return shifted
                    .map(TimeExpr::Absolute)
                    .ok_or_else(|| format!("time out of range: {}", s));
            }
        }
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| TimeExpr::Absolute(dt.with_timezone(&Utc)))
        .map_err(|e| e.to_string())
}

pub fn parse_duration(s: &str) -> Result<std::time::Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    }
}

fn parse_offset(s: &str) -> Result<Duration, String> {
    parse_duration(s).and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn relative_times() {
        assert_eq!(
            parse_time("T+10s").unwrap(),
            TimeExpr::Relative(Duration::seconds(10))
        );
        assert_eq!(
            parse_time("t-5m").unwrap(),
            TimeExpr::Relative(Duration::minutes(-5))
        );
        assert_eq!(
            parse_time("T1h").unwrap(),
            TimeExpr::Relative(Duration::hours(1))
        );
    }

    #[test]
    fn absolute_times() {
        let base = Utc.with_ymd_and_hms(2026, 1, 12, 10, 0, 0).unwrap();
        assert_eq!(
            parse_time("2026-01-12T10:00:00Z").unwrap(),
            TimeExpr::Absolute(base)
        );
        assert_eq!(
            parse_time("2026-01-12T10:00:00Z - 10s").unwrap(),
            TimeExpr::Absolute(base - Duration::seconds(10))
        );
        assert_eq!(
            parse_time("2026-01-12T12:00:00+02:00").unwrap(),
            TimeExpr::Absolute(base)
        );
    }

    #[test]
    fn resolve_relative_to_start() {
        let start = Utc.with_ymd_and_hms(2026, 1, 12, 10, 0, 0).unwrap();
        let expr = parse_time("T+1m").unwrap();
        assert_eq!(expr.resolve(start), Some(start + Duration::minutes(1)));
    }

    #[test]
    fn out_of_range_offsets_are_errors() {
        assert!(parse_time("2026-01-12T10:00:00Z + 300000y").is_err());
        assert!(parse_time("2026-01-12T10:00:00Z - 300000y").is_err());
        assert!(parse_time("T+300000y").is_err());

        let start = Utc.with_ymd_and_hms(2026, 1, 12, 10, 0, 0).unwrap();
        let far = TimeExpr::Relative(Duration::days(365 * 300_000));
        assert_eq!(far.resolve(start), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time("tomorrow").is_err());
        assert!(parse_time("noon").is_err());
        assert!(parse_duration("fast").is_err());
    }
}
