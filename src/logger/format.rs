//! Access log line formats
//!
//! `combined`, `common`, `json`, or any other string as a `$variable`
//! pattern.

use chrono::{DateTime, Local};
use std::time::Instant;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    pub path: String,
    /// Query string without the leading `?`
    pub query: Option<String>,
    pub http_version: String,
    pub status: u16,
    /// Declared body size (`Content-Length`), 0 when unknown
    pub body_bytes: u64,
    /// `Range` request header
    pub range: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Entry stamped with the current local time
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            range: None,
            referer: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Record the time elapsed since `started`
    pub fn finish(&mut self, started: Instant) {
        self.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    }

    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => format!(
                "{} \"{}\" \"{}\"",
                self.format_common(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    fn request_uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.request_uri(), self.http_version)
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn format_json(&self) -> String {
        format!(
            r#"{{"remote_addr":{},"time":"{}","method":{},"path":{},"query":{},"http_version":{},"status":{},"body_bytes":{},"range":{},"referer":{},"user_agent":{},"request_time_us":{}}}"#,
            json_string(&self.remote_addr),
            self.time.to_rfc3339(),
            json_string(&self.method),
            json_string(&self.path),
            json_optional(self.query.as_deref()),
            json_string(&self.http_version),
            self.status,
            self.body_bytes,
            json_optional(self.range.as_deref()),
            json_optional(self.referer.as_deref()),
            json_optional(self.user_agent.as_deref()),
            self.request_time_us,
        )
    }

    /// Substitute `$variables` in `pattern`
    ///
    /// `$remote_addr`, `$time_local`, `$time_iso8601`, `$request`,
    /// `$request_method`, `$request_uri`, `$request_time` (seconds),
    /// `$status`, `$body_bytes_sent`, `$http_range`, `$http_referer`,
    /// `$http_user_agent`.
    fn format_custom(&self, pattern: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let request_time = self.request_time_us as f64 / 1_000_000.0;

        // Longer names first: `$request_time` and friends before `$request`
        let vars = [
            ("$remote_addr", self.remote_addr.clone()),
            ("$time_local", self.time.format(CLF_TIME).to_string()),
            ("$time_iso8601", self.time.to_rfc3339()),
            ("$request_time", format!("{request_time:.3}")),
            ("$request_method", self.method.clone()),
            ("$request_uri", self.request_uri()),
            ("$request", self.request_line()),
            ("$status", self.status.to_string()),
            ("$body_bytes_sent", self.body_bytes.to_string()),
            ("$http_range", self.range.clone().unwrap_or_else(|| "-".to_string())),
            ("$http_referer", self.referer.clone().unwrap_or_else(|| "-".to_string())),
            ("$http_user_agent", self.user_agent.clone().unwrap_or_else(|| "-".to_string())),
        ];

        vars.iter()
            .fold(pattern.to_string(), |line, (name, value)| line.replace(name, value))
    }
}

fn json_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    format!("\"{escaped}\"")
}

fn json_optional(s: Option<&str>) -> String {
    s.map_or_else(|| "null".to_string(), json_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "10.0.0.7".to_string(),
            "GET".to_string(),
            "/download".to_string(),
        );
        entry.query = Some("path=movie.mp4".to_string());
        entry.status = 206;
        entry.body_bytes = 65536;
        entry.range = Some("bytes=0-65535".to_string());
        entry.user_agent = Some("VLC/3.0".to_string());
        entry.request_time_us = 2000;
        entry
    }

    #[test]
    fn test_format_combined() {
        let log = entry().format("combined");
        assert!(log.starts_with("10.0.0.7 - - ["));
        assert!(log.contains("\"GET /download?path=movie.mp4 HTTP/1.1\" 206 65536"));
        assert!(log.ends_with("\"-\" \"VLC/3.0\""));
    }

    #[test]
    fn test_format_common_omits_agent() {
        let log = entry().format("common");
        assert!(log.ends_with("206 65536"));
        assert!(!log.contains("VLC"));
    }

    #[test]
    fn test_format_json() {
        let log = entry().format("json");
        assert!(log.contains(r#""remote_addr":"10.0.0.7""#));
        assert!(log.contains(r#""status":206"#));
        assert!(log.contains(r#""range":"bytes=0-65535""#));
        assert!(log.contains(r#""referer":null"#));
    }

    #[test]
    fn test_json_escapes_quotes() {
        let mut e = entry();
        e.user_agent = Some("a \"quoted\" agent".to_string());
        assert!(e.format("json").contains(r#""user_agent":"a \"quoted\" agent""#));
    }

    #[test]
    fn test_format_custom() {
        let log = entry().format("$request_method $request_uri $status $http_range $request_time");
        assert_eq!(log, "GET /download?path=movie.mp4 206 bytes=0-65535 0.002");
    }
}
