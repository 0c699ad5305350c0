//! Host snapshot for get_system_info: os-release fields, kernel, hostname,
//! architecture, and memory figures.
//!
//! Everything comes from plain file reads (`/etc/os-release`, `/proc`);
//! missing sources degrade to absent fields, never to an error.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Collect the system snapshot from the live host.
pub fn collect() -> Map<String, Value> {
    collect_from(Path::new("/etc/os-release"), Path::new("/proc"))
}

fn collect_from(os_release: &Path, proc_root: &Path) -> Map<String, Value> {
    let mut info = Map::new();

    if let Ok(content) = fs::read_to_string(os_release) {
        for (key, value) in parse_os_release(&content) {
            info.insert(key, Value::String(value));
        }
    }

    if let Ok(kernel) = fs::read_to_string(proc_root.join("sys/kernel/osrelease")) {
        info.insert("kernel".to_string(), Value::String(kernel.trim().to_string()));
    }
    if let Ok(hostname) = fs::read_to_string(proc_root.join("sys/kernel/hostname")) {
        info.insert(
            "hostname".to_string(),
            Value::String(hostname.trim().to_string()),
        );
    }

    info.insert(
        "architecture".to_string(),
        Value::String(std::env::consts::ARCH.to_string()),
    );

    if let Ok(meminfo) = fs::read_to_string(proc_root.join("meminfo")) {
        let (total, available) = parse_meminfo(&meminfo);
        if let Some(total) = total {
            info.insert("memory_total".to_string(), Value::String(total));
        }
        if let Some(available) = available {
            info.insert("memory_available".to_string(), Value::String(available));
        }
    }

    info
}

/// Parse `KEY=value` lines, stripping surrounding quotes from values.
fn parse_os_release(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.starts_with('#') {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Extract MemTotal and MemAvailable (kB figures, as reported).
fn parse_meminfo(content: &str) -> (Option<String>, Option<String>) {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = rest.split_whitespace().next().map(|s| s.to_string());
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = rest.split_whitespace().next().map(|s| s.to_string());
        }
    }
    (total, available)
}
