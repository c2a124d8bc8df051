use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use super::model::{GuildStore, Session};
use crate::duration::{format_compact, format_seconds};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub active_sessions: usize,
    pub total_time: String,
    pub avg_session: String,
    pub longest_session: String,
    #[serde(skip)]
    pub total_seconds: u64,
}

pub fn compute_stats(sessions: &[Session]) -> SessionStats {
    let durations: Vec<i64> = sessions
        .iter()
        .filter_map(|s| s.elapsed())
        .filter_map(|d| d.num_microseconds())
        .map(|us| us.max(0))
        .collect();

    let total_micros = durations.iter().fold(0i64, |acc, d| acc.saturating_add(*d));
    let avg_micros = if durations.is_empty() {
        0
    } else {
        total_micros / durations.len() as i64
    };
    let longest_micros = durations.iter().copied().max().unwrap_or(0);
    let total_seconds = (total_micros / 1_000_000) as u64;

    SessionStats {
        total_sessions: sessions.len(),
        completed_sessions: sessions.iter().filter(|s| s.is_completed()).count(),
        active_sessions: sessions.iter().filter(|s| s.is_open()).count(),
        total_time: format_seconds(total_seconds),
        avg_session: format_seconds((avg_micros / 1_000_000) as u64),
        longest_session: format_seconds((longest_micros / 1_000_000) as u64),
        total_seconds,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub user_id: String,
    pub name: String,
    pub stats: SessionStats,
}

impl UserSummary {
    pub fn is_active(&self) -> bool {
        self.stats.active_sessions > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSummary {
    pub total_users: usize,
    pub total_sessions: usize,
    pub currently_active: usize,
    pub top_users: Vec<UserSummary>,
}

/// Guild totals plus the `top_n` users by session count. Ties keep the
/// order users were first seen in.
pub fn summarize_guild(guild: &GuildStore, top_n: usize) -> GuildSummary {
    let mut users: Vec<UserSummary> = guild
        .iter()
        .map(|(user_id, record)| UserSummary {
            user_id: user_id.clone(),
            name: record.name().to_string(),
            stats: compute_stats(&record.sessions),
        })
        .collect();

    let total_sessions = users.iter().map(|u| u.stats.total_sessions).sum();
    let currently_active = users.iter().map(|u| u.stats.active_sessions).sum();

    users.sort_by(|a, b| b.stats.total_sessions.cmp(&a.stats.total_sessions));
    users.truncate(top_n);

    GuildSummary {
        total_users: guild.len(),
        total_sessions,
        currently_active,
        top_users: users,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUsage {
    pub channel_name: String,
    pub sessions: usize,
    pub total_seconds: u64,
}

impl ChannelUsage {
    pub fn total_time(&self) -> String {
        format_compact(self.total_seconds)
    }
}

/// Per-channel counts for one user, busiest first.
pub fn channel_breakdown(sessions: &[Session]) -> Vec<ChannelUsage> {
    let mut by_channel: IndexMap<&str, ChannelUsage> = IndexMap::new();
    for session in sessions {
        let usage = by_channel
            .entry(session.channel_name.as_str())
            .or_insert_with(|| ChannelUsage {
                channel_name: session.channel_name.clone(),
                sessions: 0,
                total_seconds: 0,
            });
        usage.sessions += 1;
        if let Some(elapsed) = session.elapsed() {
            usage.total_seconds = usage
                .total_seconds
                .saturating_add(elapsed.num_seconds().max(0) as u64);
        }
    }
    let mut out: Vec<ChannelUsage> = by_channel.into_values().collect();
    out.sort_by(|a, b| b.sessions.cmp(&a.sessions));
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPopularity {
    pub channel_name: String,
    pub sessions: usize,
    pub unique_users: usize,
}

/// Sessions and distinct users per channel across the guild, busiest first.
pub fn channel_popularity(guild: &GuildStore) -> Vec<ChannelPopularity> {
    let mut by_channel: IndexMap<&str, (usize, HashSet<&str>)> = IndexMap::new();
    for (user_id, record) in guild {
        for session in &record.sessions {
            let (count, users) = by_channel.entry(session.channel_name.as_str()).or_default();
            *count += 1;
            users.insert(user_id.as_str());
        }
    }
    let mut out: Vec<ChannelPopularity> = by_channel
        .into_iter()
        .map(|(name, (sessions, users))| ChannelPopularity {
            channel_name: name.to_string(),
            sessions,
            unique_users: users.len(),
        })
        .collect();
    out.sort_by(|a, b| b.sessions.cmp(&a.sessions));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::model::{ChannelRef, MemberRef, UserRecord};
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn closed(channel: &str, secs: i64) -> Session {
        let mut s = Session::open(&ChannelRef::new(channel, channel), t0());
        s.close(t0() + TimeDelta::seconds(secs));
        s
    }

    fn open(channel: &str) -> Session {
        Session::open(&ChannelRef::new(channel, channel), t0())
    }

    fn record(name: &str, sessions: Vec<Session>) -> UserRecord {
        let mut r = UserRecord::new(&MemberRef {
            id: name.into(),
            username: name.into(),
            display_name: name.to_uppercase(),
        });
        r.sessions = sessions;
        r
    }

    #[test]
    fn empty_sessions_are_all_zero() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.completed_sessions, 0);
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.total_time, "0s");
        assert_eq!(stats.avg_session, "0s");
        assert_eq!(stats.longest_session, "0s");
    }

    #[test]
    fn totals_average_and_longest() {
        let sessions = vec![closed("a", 10), closed("a", 20), closed("b", 30), open("b")];
        let stats = compute_stats(&sessions);
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.completed_sessions, 3);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_time, "1m");
        assert_eq!(stats.avg_session, "20s");
        assert_eq!(stats.longest_session, "30s");
    }

    #[test]
    fn malformed_duration_counts_as_completed_but_adds_no_time() {
        let mut broken = closed("a", 10);
        broken.duration = Some("garbage".into());
        let stats = compute_stats(&[broken, closed("a", 5)]);
        assert_eq!(stats.completed_sessions, 2);
        assert_eq!(stats.total_time, "5s");
    }

    #[test]
    fn hand_edited_huge_durations_do_not_overflow() {
        let mut huge = closed("a", 10);
        huge.duration = Some("2000000000:00:00".into());
        let mut absurd = closed("a", 10);
        absurd.duration = Some("999999999999999 days, 0:00:00".into());
        let sessions = vec![huge.clone(), huge, absurd, closed("a", 5)];
        let stats = compute_stats(&sessions);
        assert_eq!(stats.completed_sessions, 4);
        assert_eq!(channel_breakdown(&sessions)[0].sessions, 4);
    }

    #[test]
    fn guild_ranking_is_stable_on_ties() {
        let mut guild = GuildStore::new();
        guild.insert("first".into(), record("first", vec![closed("a", 1)]));
        guild.insert("busy".into(), record("busy", vec![closed("a", 1), open("a")]));
        guild.insert("second".into(), record("second", vec![closed("b", 1)]));

        let summary = summarize_guild(&guild, 10);
        assert_eq!(summary.total_users, 3);
        assert_eq!(summary.total_sessions, 4);
        assert_eq!(summary.currently_active, 1);
        let order: Vec<_> = summary.top_users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(order, vec!["busy", "first", "second"]);
        assert!(summary.top_users[0].is_active());

        assert_eq!(summarize_guild(&guild, 2).top_users.len(), 2);
    }

    #[test]
    fn breakdown_and_popularity() {
        let mut guild = GuildStore::new();
        guild.insert(
            "u1".into(),
            record("u1", vec![closed("Lobby", 3700), closed("Gaming", 30), closed("Gaming", 45)]),
        );
        guild.insert("u2".into(), record("u2", vec![closed("Lobby", 5), open("Lobby")]));

        let breakdown = channel_breakdown(&guild["u1"].sessions);
        assert_eq!(breakdown[0].channel_name, "Gaming");
        assert_eq!(breakdown[0].sessions, 2);
        assert_eq!(breakdown[0].total_time(), "1m 15s");
        assert_eq!(breakdown[1].total_time(), "1h 1m");

        let popularity = channel_popularity(&guild);
        assert_eq!(popularity[0].channel_name, "Lobby");
        assert_eq!(popularity[0].sessions, 3);
        assert_eq!(popularity[0].unique_users, 2);
        assert_eq!(popularity[1].unique_users, 1);
    }
}
