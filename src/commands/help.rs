use std::time::Instant;

use anyhow::Result;
use serenity::all::EditMessage;

use super::Invocation;
use crate::embeds::{self, BLUE, footer};

/// `ping`: measures one REST round trip.
pub async fn ping(inv: &Invocation<'_>) -> Result<()> {
    let started = Instant::now();
    let mut reply = inv.msg.channel_id.say(&inv.ctx.http, "🏓 Pong!").await?;
    let elapsed = started.elapsed().as_millis();
    reply
        .edit(
            &inv.ctx.http,
            EditMessage::new().content(format!("🏓 Pong! Round trip: **{elapsed}ms**")),
        )
        .await?;
    Ok(())
}

const ATTENDANCE_HELP: &[(&str, &str)] = &[
    ("attendance [@user]", "Server summary, or one member's report"),
    ("stats [@user]", "Channel popularity, or one member's channel breakdown"),
    ("export [csv|detailed]", "Upload the server's sessions as a file"),
    ("clear_data", "Delete this server's attendance data (admin)"),
];

const MUSIC_HELP: &[(&str, &str)] = &[
    ("play <url|search>", "Queue a track and join your voice channel"),
    ("skip", "Skip the current track"),
    ("queue", "Show upcoming tracks"),
    ("nowplaying", "Show the current track"),
    ("loop [off|song|queue]", "Set or cycle the loop mode"),
    ("shuffle", "Toggle shuffle"),
    ("remove <n>", "Remove a track from the queue"),
    ("move <from> <to>", "Reorder the queue"),
    ("clear", "Drop every upcoming track"),
    ("history", "Recently played tracks"),
    ("volume [0-100]", "Show or set the volume"),
    ("stop", "Stop and clear the queue"),
    ("leave", "Stop and disconnect"),
];

fn listing(prefix: &str, entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(usage, about)| format!("`{prefix}{usage}` {about}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `help`
pub async fn help(inv: &Invocation<'_>) -> Result<()> {
    let prefix = inv.prefix();
    let embed = embeds::titled("📖 Commands", BLUE)
        .field("📊 Attendance", listing(prefix, ATTENDANCE_HELP), false)
        .field("🎵 Music", listing(prefix, MUSIC_HELP), false)
        .footer(footer(format!("{prefix}ping checks latency")));
    inv.embed(embed).await
}
