//! Access log line parser
//!
//! Extracts the serving pool and upstream status from one nginx access log
//! line of the form:
//!
//! ```text
//! pool="blue" release="blue-v1.0.0" upstream="172.18.0.2:3000" upstream_status=200 ...
//! ```
//!
//! Field order and the presence of other fields are irrelevant.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Longest prefix of a raw line echoed in parse-failure traces
const TRACE_LINE_PREFIX: usize = 120;

/// Outcome of one request, as seen in the access log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    pub pool: String,
    pub is_error: bool,
}

impl LogOutcome {
    pub fn new(pool: impl Into<String>, is_error: bool) -> Self {
        Self {
            pool: pool.into(),
            is_error,
        }
    }
}

/// Substrings that identify a pool when the `pool` field is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHint {
    pool: String,
    needles: Vec<String>,
}

impl PoolHint {
    pub fn new(pool: impl Into<String>, needles: Vec<String>) -> Self {
        Self {
            pool: pool.into(),
            needles,
        }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn needles(&self) -> &[String] {
        &self.needles
    }

    fn matches(&self, line: &str) -> bool {
        self.needles.iter().any(|needle| line.contains(needle.as_str()))
    }
}

fn pool_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"pool="(\w+)""#).expect("pool pattern is valid"))
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"upstream_status=(\d+)").expect("status pattern is valid"))
}

/// Parses access log lines into [`LogOutcome`]s
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    hints: Vec<PoolHint>,
}

impl LineParser {
    /// Hints are tried in order; the first pool with a matching needle wins
    pub fn new(hints: Vec<PoolHint>) -> Self {
        Self { hints }
    }

    pub fn hints(&self) -> &[PoolHint] {
        &self.hints
    }

    /// Parse one line. Returns `None` when either the pool or the status
    /// cannot be determined.
    pub fn parse(&self, line: &str) -> Option<LogOutcome> {
        let pool = extract_pool(line)
            .map(str::to_string)
            .or_else(|| self.infer_pool(line));
        let status = extract_status(line);

        match (pool, status) {
            (Some(pool), Some(status)) => {
                let is_error = status >= 500;
                trace!(pool = %pool, status = status, is_error = is_error, "Parsed log line");
                Some(LogOutcome { pool, is_error })
            }
            (pool, status) => {
                debug!(
                    pool = ?pool,
                    status = ?status,
                    line = %truncate(line, TRACE_LINE_PREFIX),
                    "Failed to parse log line"
                );
                None
            }
        }
    }

    /// Best-effort pool inference from upstream address or host fragments.
    ///
    /// This is lossy: an address fragment such as `.2:` can match unrelated
    /// parts of a line. It only runs when the `pool` field is unusable.
    fn infer_pool(&self, line: &str) -> Option<String> {
        self.hints
            .iter()
            .find(|hint| hint.matches(line))
            .map(|hint| hint.pool.clone())
    }
}

/// `pool="<word>"`, ignoring empty and `-` values
fn extract_pool(line: &str) -> Option<&str> {
    pool_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|pool| !pool.is_empty() && *pool != "-")
}

/// `upstream_status=<digits>`; zero is undetermined
fn extract_status(line: &str) -> Option<u64> {
    status_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|status| *status != 0)
}

fn truncate(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::app_config::{parse_pool_hints, DEFAULT_POOL_HINTS};

    fn default_parser() -> LineParser {
        LineParser::new(parse_pool_hints(DEFAULT_POOL_HINTS).expect("default hints"))
    }

    #[test]
    fn should_parse_error_status_from_green_pool() {
        // Arrange
        let parser = default_parser();
        let line = r#"127.0.0.1 - - pool="green" release="green-v1.0.1" upstream="172.18.0.3:3000" upstream_status=502 request_time=0.010"#;

        // Act
        let outcome = parser.parse(line);

        // Assert
        assert_eq!(outcome, Some(LogOutcome::new("green", true)));
    }

    #[test]
    fn should_not_count_4xx_as_error() {
        let parser = default_parser();
        let line = r#"pool="green" upstream_status=404"#;

        assert_eq!(parser.parse(line), Some(LogOutcome::new("green", false)));
    }

    #[test]
    fn should_count_exactly_500_as_error() {
        let parser = default_parser();

        assert_eq!(
            parser.parse(r#"pool="blue" upstream_status=500"#),
            Some(LogOutcome::new("blue", true))
        );
        assert_eq!(
            parser.parse(r#"pool="blue" upstream_status=499"#),
            Some(LogOutcome::new("blue", false))
        );
    }

    #[test]
    fn should_ignore_field_order() {
        let parser = default_parser();
        let line = r#"upstream_status=200 method=GET pool="blue""#;

        assert_eq!(parser.parse(line), Some(LogOutcome::new("blue", false)));
    }

    #[test]
    fn should_infer_pool_from_upstream_address_when_pool_is_dash() {
        // Arrange
        let parser = default_parser();
        let line = r#"pool="-" upstream="172.18.0.3:3000" upstream_status=503"#;

        // Act
        let outcome = parser.parse(line);

        // Assert
        assert_eq!(outcome, Some(LogOutcome::new("green", true)));
    }

    #[test]
    fn should_infer_pool_from_hostname_when_pool_is_empty() {
        let parser = default_parser();
        let line = r#"pool="" upstream="app_blue:3000" upstream_status=200"#;

        assert_eq!(parser.parse(line), Some(LogOutcome::new("blue", false)));
    }

    #[test]
    fn should_prefer_first_hint_when_several_match() {
        // Both ".2:" and "app_green" appear; blue is listed first
        let parser = default_parser();
        let line = r#"upstream="172.18.0.2:3000, app_green:3000" upstream_status=200"#;

        assert_eq!(parser.parse(line), Some(LogOutcome::new("blue", false)));
    }

    #[test]
    fn should_use_custom_hints() {
        // Arrange
        let parser = LineParser::new(vec![PoolHint::new(
            "canary",
            vec!["10.1.0.7".to_string()],
        )]);
        let line = r#"upstream="10.1.0.7:8080" upstream_status=201"#;

        // Act & Assert
        assert_eq!(parser.parse(line), Some(LogOutcome::new("canary", false)));
        assert_eq!(parser.hints().len(), 1);
    }

    #[test]
    fn should_return_none_without_status() {
        let parser = default_parser();

        assert!(parser.parse(r#"pool="blue" upstream_status=-"#).is_none());
    }

    #[test]
    fn should_return_none_without_pool_or_hint() {
        let parser = default_parser();
        let line = r#"upstream="10.9.9.9:80" upstream_status=200"#;

        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn should_return_none_for_unrecognizable_line() {
        let parser = default_parser();

        assert!(parser.parse("GET /healthz HTTP/1.1").is_none());
    }

    #[test]
    fn should_treat_zero_status_as_undetermined() {
        let parser = default_parser();

        assert!(parser.parse(r#"pool="blue" upstream_status=0"#).is_none());
    }

    #[test]
    fn should_classify_oversized_status_as_error() {
        let parser = default_parser();

        assert_eq!(
            parser.parse(r#"pool="blue" upstream_status=70000"#),
            Some(LogOutcome::new("blue", true))
        );
        assert_eq!(
            parser.parse(r#"pool="green" upstream_status=99999999"#),
            Some(LogOutcome::new("green", true))
        );
    }

    #[test]
    fn should_take_first_status_of_retried_upstreams() {
        let parser = default_parser();
        let line = r#"pool="blue" upstream_status=502, 200"#;

        assert_eq!(parser.parse(line), Some(LogOutcome::new("blue", true)));
    }

    #[test]
    fn should_not_infer_without_hints() {
        let parser = LineParser::default();
        let line = r#"pool="-" upstream="172.18.0.2:3000" upstream_status=200"#;

        assert!(parser.parse(line).is_none());
    }

    #[test]
    fn should_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
