//! HTTP cache control module
//!
//! Provides `Last-Modified` formatting and `If-Modified-Since` handling.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::SystemTime;

/// Cache-Control value sent with every file response
pub const CACHE_CONTROL: &str = "private, max-age=3600";

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp as an HTTP date
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP date, `None` if it is not an IMF-fixdate
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| SystemTime::from(naive.and_utc()))
}

/// Check whether the client's cached copy is still fresh
///
/// Fresh only when `If-Modified-Since` parses to an instant strictly after
/// `mtime`. A missing or unparsable header always means "serve".
///
/// # Arguments
/// * `if_modified_since` - Client-sent If-Modified-Since header
/// * `mtime` - Modification time of the file being served
///
/// # Returns
/// Returns true if the response should be 304 Not Modified
pub fn is_fresh(if_modified_since: Option<&str>, mtime: SystemTime) -> bool {
    if_modified_since
        .and_then(parse_http_date)
        .is_some_and(|since| since > mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(format_http_date(at(784_111_777)), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(at(784_111_777))
        );
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn test_fresh_only_when_strictly_after() {
        let mtime = at(784_111_777);
        assert!(is_fresh(Some("Sun, 06 Nov 1994 08:49:38 GMT"), mtime));
        assert!(!is_fresh(Some("Sun, 06 Nov 1994 08:49:37 GMT"), mtime));
        assert!(!is_fresh(Some("Sun, 06 Nov 1994 08:49:36 GMT"), mtime));
    }

    #[test]
    fn test_missing_or_garbage_header_is_stale() {
        let mtime = at(784_111_777);
        assert!(!is_fresh(None, mtime));
        assert!(!is_fresh(Some("not a date"), mtime));
    }

    #[test]
    fn test_sub_second_mtime_is_not_fresh_for_same_second() {
        let mtime = at(784_111_777) + Duration::from_millis(250);
        assert!(!is_fresh(Some("Sun, 06 Nov 1994 08:49:37 GMT"), mtime));
        assert!(is_fresh(Some("Sun, 06 Nov 1994 08:49:38 GMT"), mtime));
    }
}
