use anyhow::{Result, anyhow};
use tracing::{debug, info};

use super::Invocation;
use crate::error::CommandError;
use crate::music::source::search_target;
use crate::music::spotify;
use crate::music::{PlayerEvent, QueueEntry};

/// `play <url or search>`
pub async fn play(inv: &Invocation<'_>) -> Result<()> {
    let query = inv.args().remainder();
    if query.is_empty() {
        return Err(CommandError::usage(format!(
            "Usage: `{}play <url or search terms>`",
            inv.prefix()
        ))
        .into());
    }

    let guild_id = inv.guild_id()?;
    let channel_id = inv.author_voice_channel()?;

    let manager = songbird::get(inv.ctx)
        .await
        .ok_or_else(|| anyhow!("songbird voice client is not registered"))?;
    manager.join(guild_id, channel_id).await?;
    debug!("joined {channel_id} in guild {guild_id}");

    let target = match (spotify::track_id(query), &inv.state.spotify) {
        (Some(id), Some(resolver)) => resolver
            .search_query(&id)
            .await
            .map_err(CommandError::from)?,
        _ => query.to_string(),
    };

    inv.say(format!("🔍 Searching for `{target}`…")).await?;
    let info = inv
        .state
        .media
        .probe(&target)
        .await
        .map_err(CommandError::from)?;

    let entry = QueueEntry {
        id: 0,
        url: info.locator(&search_target(&target)),
        duration_secs: info.duration_secs(),
        title: info.title,
        thumbnail: info.thumbnail,
        uploader: info.uploader,
        requested_by: inv.msg.author.id,
    };
    let title = entry.title.clone();

    let player = inv.state.player(inv.ctx, guild_id).await?;
    player.set_announce_channel(inv.msg.channel_id).await;
    let (position, idle) = {
        let mut queue = player.queue.lock().await;
        let idle = queue.is_idle();
        (queue.enqueue(entry), idle)
    };
    player.send(PlayerEvent::Kick);
    info!("{} queued {title} in guild {guild_id}", inv.msg.author.name);

    if idle {
        inv.say(format!("🎵 Loading **{title}**…")).await
    } else {
        inv.say(format!("✅ Added to queue #{position}: **{title}**"))
            .await
    }
}
