use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("attendance file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("attendance file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("position {index} is out of range, the queue has {len} track(s)")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot move from {from} to {to}, the queue has {len} track(s)")]
    InvalidMove { from: usize, to: usize, len: usize },

    #[error("volume must be between 0 and {max}")]
    VolumeOutOfRange { max: u8 },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("yt-dlp is unavailable: {0}")]
    ToolUnavailable(String),

    #[error("could not read track info: {0}")]
    Extraction(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("streaming service lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failures that are answered with a specific message instead of the generic
/// one.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),

    #[error("You don't have permission to use this command.")]
    MissingPermission,

    #[error("This command only works inside a server.")]
    NotInGuild,

    #[error("You need to be in a voice channel to use this command.")]
    NotInVoice,

    #[error("I'm not connected to a voice channel.")]
    NotConnected,

    #[error("Command not found. Use `{prefix}help` to see available commands.")]
    UnknownCommand { prefix: String },

    #[error("{0}")]
    Queue(#[from] QueueError),

    #[error("Couldn't load that track: {0}")]
    Source(#[from] SourceError),
}

impl CommandError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}
