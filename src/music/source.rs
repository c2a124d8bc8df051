//! Media lookup and download through yt-dlp.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use once_cell::sync::Lazy;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tokio::{fs, process::Command as TokioCommand, sync::OnceCell};
use tracing::{debug, info};

use crate::error::SourceError;

pub(crate) static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("rollcall-bot/0.1")
        .build()
        .unwrap_or_default()
});

const GITHUB_RELEASES_API: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    assets: Vec<ReleaseAsset>,
}

/// What yt-dlp reports about a single video.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackInfo {
    pub id: Option<String>,
    pub title: String,
    pub webpage_url: Option<String>,
    pub original_url: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
}

impl TrackInfo {
    pub fn locator(&self, fallback: &str) -> String {
        self.webpage_url
            .clone()
            .or_else(|| self.original_url.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    entries: Vec<TrackInfo>,
}

/// Release asset and installed file name for this platform.
#[cfg(all(windows, target_arch = "x86_64"))]
const YT_DLP_BINARY: (&str, &str) = ("yt-dlp.exe", "yt-dlp.exe");
#[cfg(all(windows, not(target_arch = "x86_64")))]
const YT_DLP_BINARY: (&str, &str) = ("yt-dlp_x86.exe", "yt-dlp.exe");
#[cfg(target_os = "linux")]
const YT_DLP_BINARY: (&str, &str) = ("yt-dlp_linux", "yt-dlp");
#[cfg(target_os = "macos")]
const YT_DLP_BINARY: (&str, &str) = ("yt-dlp_macos", "yt-dlp");
#[cfg(not(any(windows, target_os = "linux", target_os = "macos")))]
const YT_DLP_BINARY: (&str, &str) = ("yt-dlp", "yt-dlp");

/// Turns user input into something yt-dlp accepts. Bare text becomes a
/// single-result search.
pub fn search_target(query: &str) -> String {
    let query = query.trim();
    match url::Url::parse(query) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{query}"),
    }
}

fn parse_probe_output(raw: &[u8]) -> Result<TrackInfo, SourceError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| SourceError::Extraction(e.to_string()))?;
    if value.get("entries").is_some() {
        let search: SearchResult =
            serde_json::from_value(value).map_err(|e| SourceError::Extraction(e.to_string()))?;
        return search
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Extraction("no results".to_string()));
    }
    serde_json::from_value(value).map_err(|e| SourceError::Extraction(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct MediaSource {
    download_dir: PathBuf,
    tool_dir: PathBuf,
    /// Resolved once per process, shared by every clone.
    yt_dlp: Arc<OnceCell<PathBuf>>,
}

impl MediaSource {
    pub fn new(download_dir: PathBuf) -> Self {
        let tool_dir = download_dir
            .parent()
            .map(|p| p.join("yt-dlp"))
            .unwrap_or_else(|| download_dir.join("yt-dlp"));
        Self {
            download_dir,
            tool_dir,
            yt_dlp: Arc::new(OnceCell::new()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// yt-dlp from `PATH`, an earlier install in the tool dir, or a fresh
    /// release download.
    async fn yt_dlp(&self) -> Result<&Path, SourceError> {
        let path = self
            .yt_dlp
            .get_or_try_init(|| async {
                if let Ok(found) = which::which("yt-dlp") {
                    return Ok::<_, SourceError>(found);
                }
                let installed = self.tool_dir.join(YT_DLP_BINARY.1);
                if !fs::try_exists(&installed).await.unwrap_or(false) {
                    self.install_yt_dlp(&installed).await?;
                }
                Ok(installed)
            })
            .await?;
        debug!("using yt-dlp at {}", path.display());
        Ok(path)
    }

    async fn install_yt_dlp(&self, target: &Path) -> Result<(), SourceError> {
        let (asset_name, _) = YT_DLP_BINARY;
        info!("yt-dlp not found, installing {asset_name} into {}", self.tool_dir.display());
        let release: ReleaseInfo = HTTP
            .get(GITHUB_RELEASES_API)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let url = release
            .assets
            .into_iter()
            .find(|a| a.name == asset_name)
            .map(|a| a.browser_download_url)
            .ok_or_else(|| {
                SourceError::ToolUnavailable(format!("latest release has no {asset_name}"))
            })?;
        let binary = HTTP.get(url).send().await?.error_for_status()?.bytes().await?;

        // Write beside the target first so a half-written binary is never run.
        fs::create_dir_all(&self.tool_dir).await?;
        let partial = target.with_extension("partial");
        fs::write(&partial, &binary).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755)).await?;
        }
        fs::rename(&partial, target).await?;
        Ok(())
    }

    /// Metadata for a URL or search text, without downloading.
    pub async fn probe(&self, query: &str) -> Result<TrackInfo, SourceError> {
        let ytdlp = self.yt_dlp().await?;
        let target = search_target(query);
        debug!("probing {target}");
        let out = TokioCommand::new(&ytdlp)
            .arg("-J")
            .arg("--no-playlist")
            .arg("--skip-download")
            .arg("-q")
            .arg(&target)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(SourceError::Extraction(format!(
                "yt-dlp exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        parse_probe_output(&out.stdout)
    }

    /// Downloads the audio as mp3 into the cache, reusing an earlier download
    /// of the same video.
    pub async fn download(&self, url: &str) -> Result<PathBuf, SourceError> {
        let ytdlp = self.yt_dlp().await?;
        fs::create_dir_all(&self.download_dir).await?;

        let info = self.probe(url).await.ok();
        let vid = info
            .and_then(|i| i.id)
            .unwrap_or_else(|| format!("ts-{}", unique_suffix()));
        let cached = self.download_dir.join(format!("{vid}.mp3"));
        if fs::try_exists(&cached).await.unwrap_or(false) {
            return Ok(cached);
        }

        // A private job directory keeps concurrent downloads apart.
        let dir = self.download_dir.join(format!("job-{}", unique_suffix()));
        fs::create_dir_all(&dir).await?;

        let status = TokioCommand::new(&ytdlp)
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("0")
            .arg("--postprocessor-args")
            .arg("ffmpeg:-ar 48000 -ac 2")
            .arg("--no-playlist")
            .arg("-q")
            .arg("-o")
            .arg(dir.join("%(id)s.%(ext)s").to_string_lossy().to_string())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            let _ = fs::remove_dir_all(&dir).await;
            return Err(SourceError::Download(format!("yt-dlp exited with {status}")));
        }

        let mut produced = None;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(e) = entries.next_entry().await? {
            let p = e.path();
            if p.extension().and_then(|s| s.to_str()) == Some("mp3") {
                produced = Some(p);
                break;
            }
        }
        let produced =
            produced.ok_or_else(|| SourceError::Download("no mp3 produced".to_string()))?;

        let final_path = if fs::try_exists(&cached).await.unwrap_or(false)
            || fs::rename(&produced, &cached).await.is_ok()
        {
            cached
        } else if fs::copy(&produced, &cached).await.is_ok() {
            cached
        } else {
            return Err(SourceError::Download(format!(
                "could not move {} into the cache",
                produced.display()
            )));
        };
        let _ = fs::remove_dir_all(&dir).await;
        Ok(final_path)
    }
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
