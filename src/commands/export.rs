use anyhow::Result;
use serenity::all::{CreateAttachment, CreateMessage};
use tokio::fs;
use tracing::{error, info};

use super::Invocation;
use crate::attendance::export::{ExportFormat, to_csv, to_detailed_json};
use crate::error::CommandError;

/// `export [csv|detailed]`: uploads the guild's sessions as a file.
pub async fn export(inv: &Invocation<'_>) -> Result<()> {
    let guild_id = inv.guild_id()?.to_string();
    let format = ExportFormat::parse(inv.arg(0)).ok_or_else(|| {
        CommandError::usage(format!("Usage: `{}export [csv|detailed]`", inv.prefix()))
    })?;

    let body = {
        let store = inv.state.sessions.lock().await;
        match store.guild(&guild_id) {
            Some(guild) if !guild.is_empty() => match format {
                ExportFormat::Csv => to_csv(guild),
                ExportFormat::Detailed => to_detailed_json(guild)?,
            },
            _ => {
                drop(store);
                return inv.say("No attendance data to export.").await;
            }
        }
    };

    let file_name = format.file_name(chrono::Local::now().naive_local());
    let staged = tempfile::Builder::new()
        .prefix("rollcall-export-")
        .tempfile()?;
    fs::write(staged.path(), body.as_bytes()).await?;

    let mut attachment = CreateAttachment::path(staged.path()).await?;
    attachment.filename = file_name.clone();
    let sent = inv
        .msg
        .channel_id
        .send_message(
            &inv.ctx.http,
            CreateMessage::new()
                .content("📊 Attendance data export:")
                .add_file(attachment),
        )
        .await;
    if let Err(e) = staged.close() {
        error!("could not remove staged export: {e}");
    }
    sent?;
    info!("exported {file_name} for guild {guild_id}");
    Ok(())
}

/// `clear_data`: administrators only.
pub async fn clear_data(inv: &Invocation<'_>) -> Result<()> {
    inv.require_admin().await?;
    let guild_id = inv.guild_id()?.to_string();

    let cleared = inv.state.sessions.lock().await.clear_guild(&guild_id).await;
    match cleared {
        Ok(true) => {
            info!("{} cleared attendance data for guild {guild_id}", inv.msg.author.name);
            inv.say("✅ Attendance data cleared for this server.").await
        }
        Ok(false) => inv.say("No attendance data found for this server.").await,
        Err(e) => {
            error!("clearing attendance data for guild {guild_id} failed: {e}");
            inv.say("❌ An error occurred while clearing data.").await
        }
    }
}
