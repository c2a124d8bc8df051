use std::path::PathBuf;

use anyhow::{Result, anyhow};

const TOKEN_CANDIDATES: &[&str] = &["DISCORD_TOKEN", "DISCORD_BOT_TOKEN", "BOT_TOKEN"];

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub prefix: String,
    pub attendance_file: PathBuf,
    pub download_dir: PathBuf,
    pub bitrate: u32,
    pub default_volume: u8,
    pub spotify: Option<SpotifyCredentials>,
}

#[derive(Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let token = TOKEN_CANDIDATES
            .iter()
            .find_map(|key| get(*key))
            .ok_or_else(|| {
                anyhow!("Set one of DISCORD_TOKEN, DISCORD_BOT_TOKEN, or BOT_TOKEN in environment")
            })?;

        let download_dir = match get("DOWNLOAD_FOLDER") {
            Some(dir) => {
                let p = PathBuf::from(dir);
                if p.is_absolute() {
                    p
                } else {
                    std::env::current_dir()?.join(p)
                }
            }
            None => dirs::cache_dir()
                .ok_or_else(|| anyhow!("no cache dir available on this system"))?
                .join("rollcall")
                .join("downloads"),
        };

        let bitrate = get("ROLLCALL_BITRATE")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|v| (16_000..=192_000).contains(v))
            .unwrap_or(96_000);

        let default_volume = get("ROLLCALL_DEFAULT_VOLUME")
            .and_then(|s| s.parse::<u8>().ok())
            .filter(|v| *v <= 100)
            .unwrap_or(50);

        let spotify = match (get("SPOTIFY_CLIENT_ID"), get("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Ok(Self {
            token,
            prefix: get("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),
            attendance_file: get("ATTENDANCE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("attendance_data.json")),
            download_dir,
            bitrate,
            default_volume,
            spotify,
        })
    }
}
