use anyhow::Result;
use serenity::{
    all::{ChannelId, Context as SerenityContext, GatewayIntents, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use songbird::{Config as VoiceConfig, serenity::SerenityInit};
use tracing::{debug, error, info};

mod attendance;
mod commands;
mod config;
mod duration;
mod embeds;
mod error;
mod music;
mod state;

use attendance::{ChannelRef, MemberRef, SessionStore, TransitionOutcome, VoiceTransition};
use config::Config;
use state::AppState;

struct Handler {
    state: AppState,
}

fn channel_ref(ctx: &SerenityContext, guild_id: GuildId, channel_id: ChannelId) -> ChannelRef {
    let name = ctx
        .cache
        .guild(guild_id)
        .and_then(|guild| guild.channels.get(&channel_id).map(|c| c.name.clone()))
        .unwrap_or_else(|| channel_id.to_string());
    ChannelRef::new(channel_id.to_string(), name)
}

fn member_ref(ctx: &SerenityContext, state: &VoiceState) -> MemberRef {
    match &state.member {
        Some(member) => MemberRef {
            id: state.user_id.to_string(),
            username: member.user.name.clone(),
            display_name: member.display_name().to_string(),
        },
        None => {
            let username = ctx
                .cache
                .user(state.user_id)
                .map(|u| u.name.clone())
                .unwrap_or_else(|| state.user_id.to_string());
            MemberRef {
                id: state.user_id.to_string(),
                display_name: username.clone(),
                username,
            }
        }
    }
}

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, _ctx: SerenityContext, ready: Ready) {
        info!("Logged in as {}", ready.user.name);
        for guild in &ready.guilds {
            info!("Connected to guild {}", guild.id);
        }
        info!("Command prefix: {}", self.state.config.prefix);
    }

    async fn message(&self, ctx: SerenityContext, msg: Message) {
        commands::dispatch(&ctx, &msg, &self.state).await;
    }

    async fn voice_state_update(&self, ctx: SerenityContext, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        // The bot's own moves come from music playback, not attendance.
        if new.user_id == ctx.cache.current_user().id {
            return;
        }

        let transition = VoiceTransition {
            guild_id: guild_id.to_string(),
            member: member_ref(&ctx, &new),
            previous: old
                .and_then(|o| o.channel_id)
                .map(|id| channel_ref(&ctx, guild_id, id)),
            next: new.channel_id.map(|id| channel_ref(&ctx, guild_id, id)),
            at: chrono::Local::now().naive_local(),
        };

        let outcome = self.state.sessions.lock().await.apply(&transition).await;
        let who = &transition.member.display_name;
        match outcome {
            Ok(TransitionOutcome::Joined { .. }) => {
                if let Some(next) = &transition.next {
                    info!("{who} joined {} in guild {guild_id}", next.name);
                }
            }
            Ok(TransitionOutcome::Left) => {
                if let Some(prev) = &transition.previous {
                    info!("{who} left {} in guild {guild_id}", prev.name);
                }
            }
            Ok(TransitionOutcome::Switched { .. }) => {
                if let (Some(prev), Some(next)) = (&transition.previous, &transition.next) {
                    info!("{who} switched from {} to {} in guild {guild_id}", prev.name, next.name);
                }
            }
            Ok(other) => debug!("voice update for {who} in guild {guild_id}: {other:?}"),
            Err(e) => error!("Error handling voice state update for {who}: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };
    if config.spotify.is_none() {
        info!("Spotify credentials not set, Spotify links are passed through as-is");
    }

    let sessions = SessionStore::load_or_empty(&config.attendance_file).await;
    let token = config.token.clone();
    info!(
        "Attendance file: {} ({} guild(s))",
        sessions.path().display(),
        sessions.data().len()
    );
    let state = AppState::new(config, sessions);
    info!("Download cache dir: {}", state.media.download_dir().display());

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    // One track plays at a time per guild.
    let voice_cfg = VoiceConfig::default()
        .preallocated_tracks(2)
        .use_softclip(false);

    let mut client = serenity::Client::builder(token, intents)
        .event_handler(Handler { state })
        .register_songbird_from_config(voice_cfg)
        .await?;

    if let Err(why) = client.start_autosharded().await {
        error!("Client error: {why:?}");
    }
    Ok(())
}
