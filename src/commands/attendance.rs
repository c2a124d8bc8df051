use anyhow::Result;
use serenity::all::CreateEmbed;

use super::Invocation;
use super::parser::parse_user_mention;
use crate::attendance::export::{duration_label, format_timestamp, leave_label};
use crate::attendance::model::{GuildStore, UserRecord};
use crate::attendance::stats::{
    channel_breakdown, channel_popularity, compute_stats, summarize_guild,
};
use crate::embeds::{self, BLUE, GREEN, ORANGE, footer, truncate_field};
use crate::error::CommandError;

const TOP_USERS: usize = 10;
const RECENT_SESSIONS: usize = 5;

const NO_GUILD_DATA: &str = "No attendance data found for this server.";
const NO_USER_DATA: &str = "❌ No attendance data found for this user.";

fn mentioned_user(raw: &str) -> Result<String, CommandError> {
    parse_user_mention(raw)
        .map(|id| id.to_string())
        .ok_or_else(|| CommandError::usage("Invalid user mention. Use @username format."))
}

/// `attendance [@user]`
pub async fn attendance(inv: &Invocation<'_>) -> Result<()> {
    let guild_id = inv.guild_id()?.to_string();
    let target = inv.arg(0).map(mentioned_user).transpose()?;

    let embed = {
        let store = inv.state.sessions.lock().await;
        let Some(guild) = store.guild(&guild_id) else {
            drop(store);
            return inv.say(NO_GUILD_DATA).await;
        };
        match target {
            Some(user_id) => match guild.get(&user_id) {
                Some(record) => user_report(record, &inv.msg.author.name),
                None => {
                    drop(store);
                    return inv.say(NO_USER_DATA).await;
                }
            },
            None => guild_report(guild, inv.prefix()),
        }
    };
    inv.embed(embed).await
}

fn user_report(record: &UserRecord, requested_by: &str) -> CreateEmbed {
    let stats = compute_stats(&record.sessions);
    let mut embed = embeds::titled(format!("📊 Attendance Report for {}", record.name()), GREEN)
        .field(
            "📈 Statistics",
            format!(
                "**Total Sessions:** {}\n**Completed Sessions:** {}\n**Currently Active:** {}\n\
                 **Total Time:** {}\n**Average Session:** {}\n**Longest Session:** {}",
                stats.total_sessions,
                stats.completed_sessions,
                stats.active_sessions,
                stats.total_time,
                stats.avg_session,
                stats.longest_session
            ),
            false,
        );

    let skip = record.sessions.len().saturating_sub(RECENT_SESSIONS);
    let recent = &record.sessions[skip..];
    if !recent.is_empty() {
        embed = embed.field("🕒 Recent Sessions", "_ _", false);
        for session in recent {
            let status = if session.is_open() {
                "🔴 Active"
            } else {
                "✅ Completed"
            };
            embed = embed.field(
                format!("{status} - {}", session.channel_name),
                format!(
                    "**Joined:** {}\n**Left:** {}\n**Duration:** {}",
                    format_timestamp(&session.join_time),
                    leave_label(session),
                    duration_label(session)
                ),
                true,
            );
        }
    }
    embed.footer(footer(format!("Requested by {requested_by}")))
}

fn guild_report(guild: &GuildStore, prefix: &str) -> CreateEmbed {
    let summary = summarize_guild(guild, TOP_USERS);
    let mut embed = embeds::titled("📊 Server Attendance Summary", BLUE).field(
        "📈 Server Statistics",
        format!(
            "**Total Users Tracked:** {}\n**Total Sessions:** {}\n**Currently Active:** {}",
            summary.total_users, summary.total_sessions, summary.currently_active
        ),
        false,
    );

    if !summary.top_users.is_empty() {
        let listing: String = summary
            .top_users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let marker = if user.is_active() { "🔴" } else { "⚪" };
                format!(
                    "{}. {marker} **{}**\n   Sessions: {} | Total Time: {}\n\n",
                    i + 1,
                    user.name,
                    user.stats.total_sessions,
                    user.stats.total_time
                )
            })
            .collect();
        embed = embed.field("👥 Top Users by Activity", truncate_field(&listing), false);
    }
    embed.footer(footer(format!(
        "Use {prefix}attendance @user for detailed reports"
    )))
}

/// `stats [@user]`
pub async fn stats(inv: &Invocation<'_>) -> Result<()> {
    let guild_id = inv.guild_id()?.to_string();
    let target = inv.arg(0).map(mentioned_user).transpose()?;

    let embed = {
        let store = inv.state.sessions.lock().await;
        let Some(guild) = store.guild(&guild_id) else {
            drop(store);
            return inv.say(NO_GUILD_DATA).await;
        };
        match target {
            Some(user_id) => match guild.get(&user_id) {
                Some(record) => user_analytics(record),
                None => {
                    drop(store);
                    return inv.say(NO_USER_DATA).await;
                }
            },
            None => guild_analytics(guild),
        }
    };
    inv.embed(embed).await
}

fn user_analytics(record: &UserRecord) -> CreateEmbed {
    let embed = embeds::titled(format!("📈 Detailed Analytics for {}", record.name()), ORANGE);
    let breakdown = channel_breakdown(&record.sessions);
    if breakdown.is_empty() {
        return embed.description("No sessions recorded yet.");
    }
    let listing: String = breakdown
        .iter()
        .map(|c| {
            format!(
                "**{}:** {} sessions, {}\n",
                c.channel_name,
                c.sessions,
                c.total_time()
            )
        })
        .collect();
    embed.field("📍 Channel Breakdown", truncate_field(&listing), false)
}

fn guild_analytics(guild: &GuildStore) -> CreateEmbed {
    let embed = embeds::titled("📈 Detailed Server Analytics", ORANGE);
    let popularity = channel_popularity(guild);
    if popularity.is_empty() {
        return embed.description("No sessions recorded yet.");
    }
    let listing: String = popularity
        .iter()
        .map(|c| {
            format!(
                "**{}:** {} sessions, {} users\n",
                c.channel_name, c.sessions, c.unique_users
            )
        })
        .collect();
    embed.field("📍 Channel Popularity", truncate_field(&listing), false)
}
