//! Line encoding for stream records.
//!
//! One record is one line:
//! `time \t level \t stream \t caller \t message [\t {fields}]`

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};

use super::Level;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A structured record ready to be encoded.
#[derive(Debug)]
pub struct Record<'a> {
    pub level: Level,
    pub stream: &'a str,
    pub caller: Option<String>,
    pub message: &'a str,
    pub fields: &'a Map<String, Value>,
}

impl Record<'_> {
    /// Encode as a single newline-terminated line.
    pub fn encode(&self, at: DateTime<Utc>, local_time: bool) -> String {
        let mut line = String::with_capacity(64 + self.message.len());
        if local_time {
            let _ = write!(line, "{}", at.with_timezone(&Local).format(TIME_FORMAT));
        } else {
            let _ = write!(line, "{}", at.format(TIME_FORMAT));
        }
        line.push('\t');
        line.push_str(self.level.as_str());
        line.push('\t');
        line.push_str(self.stream);
        line.push('\t');
        line.push_str(self.caller.as_deref().unwrap_or("-"));
        line.push('\t');
        push_escaped(&mut line, self.message);
        if !self.fields.is_empty() {
            line.push('\t');
            // Map<String, Value> serialization cannot fail.
            let _ = write!(line, "{}", Value::Object(self.fields.clone()));
        }
        line.push('\n');
        line
    }
}

/// `dir/file.rs:line` from a full source path.
pub fn short_caller(file: &str, line: u32) -> String {
    let mut parts = file.rsplit(['/', '\\']);
    let name = parts.next().unwrap_or(file);
    match parts.next() {
        Some(dir) if !dir.is_empty() => format!("{dir}/{name}:{line}"),
        _ => format!("{name}:{line}"),
    }
}

/// Keep one record per line.
fn push_escaped(line: &mut String, message: &str) {
    for c in message.chars() {
        match c {
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            _ => line.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_encode_layout() {
        let mut fields = Map::new();
        fields.insert("status".into(), json!(200));
        fields.insert("path".into(), json!("/health"));
        let record = Record {
            level: Level::Warn,
            stream: "access",
            caller: Some(short_caller("/home/app/src/http/server.rs", 42)),
            message: "slow\nrequest",
            fields: &fields,
        };

        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            record.encode(at, false),
            concat!(
                "2024-01-02 03:04:05\twarn\taccess\thttp/server.rs:42\tslow\\nrequest\t",
                "{\"path\":\"/health\",\"status\":200}\n",
            )
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let fields = Map::new();
        let record = Record {
            level: Level::Info,
            stream: "journal",
            caller: None,
            message: "started",
            fields: &fields,
        };

        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(record.encode(at, false), "2024-01-02 03:04:05\tinfo\tjournal\t-\tstarted\n");
    }

    #[test]
    fn test_short_caller() {
        assert_eq!(short_caller("src/main.rs", 7), "src/main.rs:7");
        assert_eq!(short_caller("main.rs", 7), "main.rs:7");
        assert_eq!(short_caller("C:\\work\\src\\lib.rs", 3), "src/lib.rs:3");
    }
}
