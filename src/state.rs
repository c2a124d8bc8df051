use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use serenity::all::{Context as SerenityContext, GuildId};
use tokio::sync::Mutex;
use tracing::info;

use crate::attendance::SessionStore;
use crate::config::Config;
use crate::music::source::MediaSource;
use crate::music::spotify::SpotifyResolver;
use crate::music::{GuildPlayer, PlayerDeps};

/// Everything the event handlers share, keyed by guild where it is per-guild.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// A single lock serializes every attendance mutation and its save.
    pub sessions: Arc<Mutex<SessionStore>>,
    pub media: MediaSource,
    pub spotify: Option<Arc<SpotifyResolver>>,
    players: Arc<RwLock<HashMap<GuildId, GuildPlayer>>>,
}

impl AppState {
    pub fn new(config: Config, sessions: SessionStore) -> Self {
        let media = MediaSource::new(config.download_dir.clone());
        let spotify = config
            .spotify
            .clone()
            .map(|creds| Arc::new(SpotifyResolver::new(creds)));
        Self {
            config: Arc::new(config),
            sessions: Arc::new(Mutex::new(sessions)),
            media,
            spotify,
            players: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The guild's player if one was ever created.
    pub fn existing_player(&self, guild_id: GuildId) -> Option<GuildPlayer> {
        self.players
            .read()
            .ok()
            .and_then(|players| players.get(&guild_id).cloned())
    }

    /// The guild's player, created on first use.
    pub async fn player(&self, ctx: &SerenityContext, guild_id: GuildId) -> Result<GuildPlayer> {
        if let Some(player) = self.existing_player(guild_id) {
            return Ok(player);
        }
        let songbird = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow!("songbird voice client is not registered"))?;

        let mut players = self
            .players
            .write()
            .map_err(|_| anyhow!("player registry lock poisoned"))?;
        let player = players.entry(guild_id).or_insert_with(|| {
            info!("creating player for guild {guild_id}");
            GuildPlayer::spawn(
                guild_id,
                PlayerDeps {
                    songbird,
                    http: ctx.http.clone(),
                    media: self.media.clone(),
                    bitrate: self.config.bitrate,
                    default_volume: self.config.default_volume,
                },
            )
        });
        Ok(player.clone())
    }
}
