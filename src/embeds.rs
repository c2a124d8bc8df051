//! Embed builders shared by the command handlers and the player loop.

use serenity::all::{CreateEmbed, CreateEmbedFooter, Mentionable, Timestamp};

use crate::duration::{format_clock, format_seconds};
use crate::music::queue::{LoopMode, MusicQueue, QueueEntry};

pub const GREEN: u32 = 0x00FF00;
pub const BLUE: u32 = 0x0099FF;
pub const ORANGE: u32 = 0xFF6B35;
pub const MUSIC: u32 = 0x1DB954;

/// Platform limit for a single embed field value.
pub const FIELD_LIMIT: usize = 1024;

/// Cuts `text` to at most `FIELD_LIMIT` bytes on a char boundary.
pub fn truncate_field(text: &str) -> String {
    if text.len() <= FIELD_LIMIT {
        return text.to_string();
    }
    let mut end = FIELD_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

pub fn titled(title: impl Into<String>, colour: u32) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .colour(colour)
        .timestamp(Timestamp::now())
}

pub fn footer(text: impl Into<String>) -> CreateEmbedFooter {
    CreateEmbedFooter::new(text)
}

pub fn track_line(entry: &QueueEntry) -> String {
    let length = entry
        .duration_secs
        .map(format_clock)
        .unwrap_or_else(|| "live".to_string());
    format!("[{}]({}) `{}`", entry.title, entry.url, length)
}

fn mode_summary(queue: &MusicQueue) -> String {
    let looping = match queue.loop_mode() {
        LoopMode::Off => "🔁 off".to_string(),
        mode => format!("🔁 {mode}"),
    };
    let shuffle = if queue.shuffle() { "🔀 on" } else { "🔀 off" };
    format!("{looping} | {shuffle} | 🔊 {}%", queue.volume())
}

pub fn now_playing(entry: &QueueEntry, queue: &MusicQueue) -> CreateEmbed {
    let mut embed = titled("🎵 Now Playing", MUSIC)
        .description(track_line(entry))
        .field("Requested by", entry.requested_by.mention().to_string(), true)
        .field(
            "Uploader",
            entry.uploader.clone().unwrap_or_else(|| "Unknown".to_string()),
            true,
        )
        .field("Up next", queue.len().to_string(), true)
        .footer(footer(mode_summary(queue)));
    if let Some(thumb) = &entry.thumbnail {
        embed = embed.thumbnail(thumb);
    }
    embed
}

pub fn queue_overview(queue: &MusicQueue, limit: usize) -> CreateEmbed {
    let mut embed = titled("🎶 Current Queue", MUSIC);
    if let Some(current) = queue.current() {
        embed = embed.field("Now playing", track_line(current), false);
    }
    if queue.is_empty() {
        embed = embed.description("The queue is currently empty.");
    } else {
        let listing = queue
            .pending()
            .take(limit)
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, track_line(e)))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Up next", truncate_field(&listing), false);
        if queue.len() > limit {
            embed = embed.field("\u{200b}", format!("…and {} more", queue.len() - limit), false);
        }
    }
    embed.footer(footer(format!(
        "{} track(s) | {} total | {}",
        queue.len(),
        format_seconds(queue.total_pending_secs()),
        mode_summary(queue)
    )))
}

pub fn history(queue: &MusicQueue, limit: usize) -> CreateEmbed {
    let listing = queue
        .history()
        .rev()
        .take(limit)
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, track_line(e)))
        .collect::<Vec<_>>()
        .join("\n");
    let embed = titled("📜 Recently Played", MUSIC);
    if listing.is_empty() {
        embed.description("Nothing has been played yet.")
    } else {
        embed.description(truncate_field(&listing))
    }
}
