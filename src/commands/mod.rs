pub mod attendance;
pub mod export;
pub mod help;
pub mod parser;
pub mod play;
pub mod playback;
pub mod queue;

use anyhow::Result;
use serenity::all::{
    ChannelId, Context as SerenityContext, CreateEmbed, CreateMessage, GuildId, Message,
};
use tracing::{error, info, warn};

use crate::error::CommandError;
use crate::music::GuildPlayer;
use crate::state::AppState;
use parser::Arguments;

/// One parsed prefix command and everything a handler needs to answer it.
pub struct Invocation<'a> {
    pub ctx: &'a SerenityContext,
    pub msg: &'a Message,
    pub state: &'a AppState,
    pub name: String,
    args: Arguments<'a>,
}

impl<'a> Invocation<'a> {
    pub fn args(&self) -> Arguments<'a> {
        self.args.clone()
    }

    pub fn arg(&self, n: usize) -> Option<&'a str> {
        self.args().nth(n)
    }

    pub fn prefix(&self) -> &str {
        &self.state.config.prefix
    }

    pub fn guild_id(&self) -> Result<GuildId, CommandError> {
        self.msg.guild_id.ok_or(CommandError::NotInGuild)
    }

    pub async fn say(&self, content: impl Into<String>) -> Result<()> {
        self.msg.channel_id.say(&self.ctx.http, content).await?;
        Ok(())
    }

    pub async fn embed(&self, embed: CreateEmbed) -> Result<()> {
        self.msg
            .channel_id
            .send_message(&self.ctx.http, CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }

    /// The voice channel the author is sitting in, from the gateway cache.
    pub fn author_voice_channel(&self) -> Result<ChannelId, CommandError> {
        let guild_id = self.guild_id()?;
        let guild = self
            .ctx
            .cache
            .guild(guild_id)
            .ok_or(CommandError::NotInGuild)?;
        guild
            .voice_states
            .get(&self.msg.author.id)
            .and_then(|vs| vs.channel_id)
            .ok_or(CommandError::NotInVoice)
    }

    pub async fn require_admin(&self) -> Result<()> {
        let guild_id = self.guild_id()?;
        let member = self.msg.member(self.ctx).await?;
        let allowed = self
            .ctx
            .cache
            .guild(guild_id)
            .map(|guild| guild.member_permissions(&member).administrator())
            .unwrap_or(false);
        if !allowed {
            return Err(CommandError::MissingPermission.into());
        }
        Ok(())
    }

    /// The guild's player, or [`CommandError::NotConnected`] when music was
    /// never started here.
    pub fn existing_player(&self) -> Result<GuildPlayer, CommandError> {
        let guild_id = self.guild_id()?;
        self.state
            .existing_player(guild_id)
            .ok_or(CommandError::NotConnected)
    }
}

/// Entry point for every guild or DM message.
pub async fn dispatch(ctx: &SerenityContext, msg: &Message, state: &AppState) {
    if msg.author.bot {
        return;
    }
    let Some(parsed) = parser::parse(&msg.content, &state.config.prefix) else {
        return;
    };
    let name = parsed.name.to_ascii_lowercase();
    let inv = Invocation {
        ctx,
        msg,
        state,
        name: name.clone(),
        args: parsed.arguments(),
    };
    info!("{}{} invoked by {}", state.config.prefix, name, msg.author.name);

    let result = match name.as_str() {
        "attendance" => attendance::attendance(&inv).await,
        "stats" => attendance::stats(&inv).await,
        "export" => export::export(&inv).await,
        "clear_data" => export::clear_data(&inv).await,
        "play" | "p" => play::play(&inv).await,
        "skip" | "next" => playback::skip(&inv).await,
        "stop" => playback::stop(&inv).await,
        "leave" | "disconnect" => playback::leave(&inv).await,
        "volume" | "vol" => playback::volume(&inv).await,
        "nowplaying" | "np" => playback::now_playing(&inv).await,
        "queue" | "q" => queue::show(&inv).await,
        "remove" => queue::remove(&inv).await,
        "move" => queue::move_entry(&inv).await,
        "clear" => queue::clear(&inv).await,
        "shuffle" => queue::shuffle(&inv).await,
        "loop" => queue::loop_mode(&inv).await,
        "history" => queue::history(&inv).await,
        "ping" => help::ping(&inv).await,
        "help" => help::help(&inv).await,
        _ => Err(CommandError::UnknownCommand {
            prefix: state.config.prefix.clone(),
        }
        .into()),
    };

    if let Err(err) = result {
        report_failure(&inv, err).await;
    }
}

/// Known failures get their own message; anything else is logged and answered
/// generically.
async fn report_failure(inv: &Invocation<'_>, err: anyhow::Error) {
    let reply = match err.downcast_ref::<CommandError>() {
        Some(cmd_err) => {
            warn!("{}{} rejected: {cmd_err}", inv.prefix(), inv.name);
            format!("❌ {cmd_err}")
        }
        None => {
            error!("{}{} failed: {err:?}", inv.prefix(), inv.name);
            "❌ An error occurred while running that command.".to_string()
        }
    };
    if let Err(e) = inv.say(reply).await {
        error!("could not report failure to {}: {e}", inv.msg.channel_id);
    }
}
