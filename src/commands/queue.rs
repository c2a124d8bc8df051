//! Queue inspection and editing. Positions typed by users are 1-based.

use anyhow::Result;

use super::Invocation;
use crate::embeds;
use crate::error::CommandError;
use crate::music::LoopMode;

const SHOWN_ENTRIES: usize = 10;
const SHOWN_HISTORY: usize = 10;

/// Parses a 1-based position typed by a user into a 0-based index.
fn position(raw: Option<&str>, usage: &str) -> Result<usize, CommandError> {
    raw.and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .map(|n| n - 1)
        .ok_or_else(|| CommandError::usage(usage))
}

/// `queue`
pub async fn show(inv: &Invocation<'_>) -> Result<()> {
    let Some(player) = inv.state.existing_player(inv.guild_id()?) else {
        return inv.say("📭 The queue is currently empty.").await;
    };
    let embed = embeds::queue_overview(&*player.queue.lock().await, SHOWN_ENTRIES);
    inv.embed(embed).await
}

/// `remove <n>`
pub async fn remove(inv: &Invocation<'_>) -> Result<()> {
    let usage = format!("Usage: `{}remove <position>`", inv.prefix());
    let index = position(inv.arg(0), &usage)?;
    let player = inv.existing_player()?;
    let removed = {
        let mut queue = player.queue.lock().await;
        let len = queue.len();
        queue.remove_at(index).map_err(|_| {
            CommandError::usage(format!("Position must be between 1 and {len}."))
        })?
    };
    inv.say(format!("🗑️ Removed **{}** from the queue.", removed.title))
        .await
}

/// `move <from> <to>`
pub async fn move_entry(inv: &Invocation<'_>) -> Result<()> {
    let usage = format!("Usage: `{}move <from> <to>`", inv.prefix());
    let from = position(inv.arg(0), &usage)?;
    let to = position(inv.arg(1), &usage)?;
    let player = inv.existing_player()?;
    let title = {
        let mut queue = player.queue.lock().await;
        let len = queue.len();
        queue.move_entry(from, to).map_err(|_| {
            CommandError::usage(format!("Positions must be between 1 and {len}."))
        })?;
        queue
            .pending()
            .nth(to)
            .map(|e| e.title.clone())
            .unwrap_or_default()
    };
    inv.say(format!(
        "↕️ Moved **{title}** from position {} to {}.",
        from + 1,
        to + 1
    ))
    .await
}

/// `clear`: drops the pending tracks, the current one keeps playing.
pub async fn clear(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    let dropped = player.queue.lock().await.clear_pending();
    inv.say(format!("🧹 Cleared {dropped} track(s) from the queue."))
        .await
}

/// `shuffle`: toggles random picking.
pub async fn shuffle(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    let enabled = player.queue.lock().await.toggle_shuffle();
    if enabled {
        inv.say("🔀 Shuffle enabled.").await
    } else {
        inv.say("🔀 Shuffle disabled, original order restored.").await
    }
}

/// `loop [off|song|queue]`: cycles through the modes without an argument.
pub async fn loop_mode(inv: &Invocation<'_>) -> Result<()> {
    let requested = match inv.arg(0) {
        Some(raw) => Some(LoopMode::parse(raw).ok_or_else(|| {
            CommandError::usage(format!("Usage: `{}loop [off|song|queue]`", inv.prefix()))
        })?),
        None => None,
    };
    let player = inv.existing_player()?;
    let mode = {
        let mut queue = player.queue.lock().await;
        let mode = requested.unwrap_or_else(|| queue.loop_mode().next());
        queue.set_loop_mode(mode);
        mode
    };
    let label = match mode {
        LoopMode::Off => "🔁 Looping disabled.",
        LoopMode::Track => "🔂 Looping the current song.",
        LoopMode::Queue => "🔁 Looping the whole queue.",
    };
    inv.say(label).await
}

/// `history`
pub async fn history(inv: &Invocation<'_>) -> Result<()> {
    let Some(player) = inv.state.existing_player(inv.guild_id()?) else {
        return inv.say("📜 Nothing has been played yet.").await;
    };
    let embed = embeds::history(&*player.queue.lock().await, SHOWN_HISTORY);
    inv.embed(embed).await
}
