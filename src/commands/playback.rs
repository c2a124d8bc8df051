//! Transport controls for the guild player.

use anyhow::{Result, anyhow};
use tracing::info;

use super::Invocation;
use crate::embeds;
use crate::error::CommandError;
use crate::music::PlayerEvent;
use crate::music::queue::MAX_VOLUME;

/// `skip`: moves on even when the current track is on repeat.
pub async fn skip(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    let (entry_id, title) = {
        let mut queue = player.queue.lock().await;
        let Some(current) = queue.current() else {
            drop(queue);
            return inv.say("❌ Nothing is playing right now.").await;
        };
        let skipped = (current.id, current.title.clone());
        queue.skip();
        skipped
    };
    player.send(PlayerEvent::Skip { entry_id });
    inv.say(format!("⏭️ Skipped **{title}**")).await
}

/// `stop`: clears everything but stays in the channel.
pub async fn stop(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    player.queue.lock().await.clear();
    player.send(PlayerEvent::Halt);
    inv.say("⏹️ Stopped playback and cleared the queue.").await
}

/// `leave`: stop, then disconnect from voice.
pub async fn leave(inv: &Invocation<'_>) -> Result<()> {
    let guild_id = inv.guild_id()?;
    let manager = songbird::get(inv.ctx)
        .await
        .ok_or_else(|| anyhow!("songbird voice client is not registered"))?;
    if manager.get(guild_id).is_none() {
        return Err(CommandError::NotConnected.into());
    }

    if let Some(player) = inv.state.existing_player(guild_id) {
        player.queue.lock().await.clear();
        player.send(PlayerEvent::Halt);
    }
    manager.remove(guild_id).await?;
    info!("left voice in guild {guild_id}");
    inv.say("👋 Disconnected from the voice channel.").await
}

/// `volume [0-100]`: shows the level without an argument.
pub async fn volume(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    let Some(raw) = inv.arg(0) else {
        let level = player.queue.lock().await.volume();
        return inv.say(format!("🔊 Current volume: **{level}%**")).await;
    };
    let level: u8 = raw.parse().map_err(|_| {
        CommandError::usage(format!("Volume must be a number between 0 and {MAX_VOLUME}."))
    })?;
    player
        .queue
        .lock()
        .await
        .set_volume(level)
        .map_err(CommandError::from)?;
    player.send(PlayerEvent::Volume(level));
    inv.say(format!("🔊 Volume set to **{level}%**")).await
}

/// `nowplaying`
pub async fn now_playing(inv: &Invocation<'_>) -> Result<()> {
    let player = inv.existing_player()?;
    let embed = {
        let queue = player.queue.lock().await;
        queue
            .current()
            .map(|current| embeds::now_playing(current, &queue))
    };
    match embed {
        Some(embed) => inv.embed(embed).await,
        None => inv.say("❌ Nothing is playing right now.").await,
    }
}
