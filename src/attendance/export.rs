use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;

use super::model::{GuildStore, Session};
use super::stats::{SessionStats, compute_stats};
use crate::duration::format_stored;

pub const CSV_HEADER: &str = "Username,Display Name,Channel,Join Time,Leave Time,Duration,Status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Detailed,
}

impl ExportFormat {
    pub fn parse(arg: Option<&str>) -> Option<Self> {
        match arg.map(str::to_ascii_lowercase).as_deref() {
            None | Some("csv") => Some(Self::Csv),
            Some("detailed") | Some("json") => Some(Self::Detailed),
            Some(_) => None,
        }
    }

    pub fn file_name(&self, now: NaiveDateTime) -> String {
        let stamp = now.format("%Y%m%d_%H%M%S");
        match self {
            Self::Csv => format!("attendance_export_{stamp}.csv"),
            Self::Detailed => format!("detailed_attendance_export_{stamp}.json"),
        }
    }
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%B %d, %Y at %I:%M:%S %p").to_string()
}

pub fn leave_label(session: &Session) -> String {
    session
        .leave_time
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "Still in channel".to_string())
}

pub fn duration_label(session: &Session) -> String {
    session
        .duration
        .as_deref()
        .map(format_stored)
        .unwrap_or_else(|| "Ongoing".to_string())
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn to_csv(guild: &GuildStore) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for record in guild.values() {
        for session in &record.sessions {
            let status = if session.is_open() { "Active" } else { "Completed" };
            let row = [
                csv_field(&record.username),
                csv_field(record.name()),
                csv_field(&session.channel_name),
                csv_field(&format_timestamp(&session.join_time)),
                csv_field(&leave_label(session)),
                csv_field(&duration_label(session)),
                csv_field(status),
            ];
            out.push_str(&row.join(","));
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct DetailedSession {
    channel_name: String,
    join_time: String,
    leave_time: String,
    duration: String,
}

#[derive(Debug, Serialize)]
struct DetailedUser {
    statistics: SessionStats,
    sessions: Vec<DetailedSession>,
}

/// Per-user statistics and human-readable sessions, keyed by display name.
pub fn to_detailed_json(guild: &GuildStore) -> Result<String, serde_json::Error> {
    let export: IndexMap<&str, DetailedUser> = guild
        .values()
        .map(|record| {
            let sessions = record
                .sessions
                .iter()
                .map(|s| DetailedSession {
                    channel_name: s.channel_name.clone(),
                    join_time: format_timestamp(&s.join_time),
                    leave_time: leave_label(s),
                    duration: duration_label(s),
                })
                .collect();
            (
                record.name(),
                DetailedUser {
                    statistics: compute_stats(&record.sessions),
                    sessions,
                },
            )
        })
        .collect();
    serde_json::to_string_pretty(&export)
}
