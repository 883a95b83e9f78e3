use std::ffi::OsString;
use std::time::Duration;

pub const TIMEOUT_VAR: &str = "ABORT_O_MAT_TIMEOUT";
pub const ARTIFACTS_VAR: &str = "ABORT_O_MAT_ARTIFACTS";

/// Looks up an environment variable. Unset, empty and non-Unicode values are
/// all treated as absent.
pub fn var(name: &str) -> Option<String> {
    var_with(name, |name| std::env::var_os(name))
}

/// Reads a humantime duration (`30s`, `5m`, `1h 30m`) from the environment.
pub fn duration(name: &str) -> Option<Duration> {
    duration_with(name, |name| std::env::var_os(name))
}

/// [`var`] against an arbitrary lookup instead of the process environment.
pub fn var_with<F>(name: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<OsString>,
{
    match lookup(name)?.into_string() {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(_) => {
            log::debug!("Ignoring non-unicode value of {}", name);
            None
        }
    }
}

pub fn duration_with<F>(name: &str, lookup: F) -> Option<Duration>
where
    F: Fn(&str) -> Option<OsString>,
{
    let value = var_with(name, lookup)?;
    match humantime::parse_duration(value.trim()) {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", name, value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn unset_is_none() {
        assert_eq!(var_with("UNSET", lookup(&[])), None);
        assert_eq!(duration_with("UNSET", lookup(&[])), None);
        assert_eq!(var("ABORT_O_MAT_TEST_NEVER_SET"), None);
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(var_with("EMPTY", lookup(&[("EMPTY", "")])), None);
    }

    #[test]
    fn reads_value() {
        assert_eq!(
            var_with("VALUE", lookup(&[("VALUE", "hello")])).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn parses_duration() {
        assert_eq!(
            duration_with("DURATION", lookup(&[("DURATION", " 1m 30s ")])),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn invalid_duration_is_ignored() {
        assert_eq!(duration_with("BAD", lookup(&[("BAD", "soon")])), None);
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_is_none() {
        use std::os::unix::ffi::OsStringExt;

        let raw = |_: &str| Some(OsString::from_vec(vec![0x66, 0x6f, 0x80]));
        assert_eq!(var_with("RAW", raw), None);
        assert_eq!(duration_with("RAW", raw), None);
    }
}
