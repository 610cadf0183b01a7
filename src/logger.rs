/*
 * This file is part of hddsaver.
 *
 * Copyright (C) 2025 hddsaver contributors
 *
 * hddsaver is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hddsaver is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hddsaver. If not, see <https://www.gnu.org/licenses/>.
 */

//! Optional JSON-lines event log (`--logging`).
//!
//! Records what happened to the HDD Saver switch: probe results, toggles,
//! suspend and resume. Diagnostics go through `tracing`; this file is the
//! audit trail.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

use crate::constants::paths;

const FALLBACK_LOG_PATH: &str = "/tmp/hddsaver_events.json";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Opens the default event log, falling back to /tmp when /var/log is unavailable
pub fn init_logging() {
    if init_logging_at(Path::new(paths::EVENT_LOG)).is_err() {
        let _ = init_logging_at(Path::new(FALLBACK_LOG_PATH));
    }
}

pub fn init_logging_at(path: &Path) -> io::Result<()> {
    let f = open_append(path)?;
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(f);
    }
    Ok(())
}

/// Closes the event log; later events are dropped
pub fn shutdown_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = None;
    }
}

/// Appends one event. A no-op unless logging was initialized.
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_events_written_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.json");
        init_logging_at(&path).unwrap();

        log_event("toggle", json!({ "from": "Off", "to": "On" }));
        log_event("resume", json!({ "status": 0 }));
        shutdown_logging();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "toggle");
        assert_eq!(lines[0]["data"]["to"], "On");
        assert_eq!(lines[1]["event"], "resume");
        assert!(lines[1]["ts_ms"].as_u64().unwrap() > 0);
    }

    #[test]
    #[serial]
    fn test_events_dropped_when_not_initialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        init_logging_at(&path).unwrap();
        shutdown_logging();

        log_event("probe", json!({}));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
