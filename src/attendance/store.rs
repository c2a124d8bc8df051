use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info, warn};

use super::model::{AttendanceData, GuildStore};
use super::tracker::{TransitionOutcome, VoiceTransition, handle_transition};
use crate::error::StoreError;

/// All attendance data plus the JSON file it is mirrored to. Every mutation
/// rewrites the whole file.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    data: AttendanceData,
}

impl SessionStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: AttendanceData::new(),
        }
    }

    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !fs::try_exists(&path).await? {
            info!("No attendance data at {}, starting fresh", path.display());
            return Ok(Self::empty(path));
        }
        let raw = fs::read(&path).await?;
        let data: AttendanceData = serde_json::from_slice(&raw)?;
        info!("Loaded attendance data for {} guild(s)", data.len());
        Ok(Self { path, data })
    }

    /// Like [`SessionStore::load`], but a broken or unreadable file only costs
    /// the history, not the bot. A file that is not valid JSON is moved aside
    /// to `*.json.bad` so the next save cannot overwrite it.
    pub async fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path).await {
            Ok(store) => store,
            Err(e) => {
                error!("Error loading attendance data from {}: {e}", path.display());
                if matches!(e, StoreError::Json(_)) {
                    let aside = path.with_extension("json.bad");
                    match fs::rename(&path, &aside).await {
                        Ok(()) => warn!("Moved unreadable attendance data to {}", aside.display()),
                        Err(e) => error!("Could not move {} aside: {e}", path.display()),
                    }
                }
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &AttendanceData {
        &self.data
    }

    pub fn guild(&self, guild_id: &str) -> Option<&GuildStore> {
        self.data.get(guild_id)
    }

    /// Writes to a sibling temp file and renames it over the target so a crash
    /// mid-write leaves the previous file intact.
    pub async fn save(&self) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&self.data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Attendance data saved to {}", self.path.display());
        Ok(())
    }

    /// Apply a transition and persist if anything changed.
    pub async fn apply(&mut self, t: &VoiceTransition) -> Result<TransitionOutcome, StoreError> {
        let outcome = handle_transition(&mut self.data, t);
        if outcome.changed_store() {
            self.save().await?;
        }
        Ok(outcome)
    }

    /// Drops every record for the guild. Returns `false` when there was none.
    pub async fn clear_guild(&mut self, guild_id: &str) -> Result<bool, StoreError> {
        if self.data.shift_remove(guild_id).is_none() {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::model::{ChannelRef, MemberRef};
    use chrono::{NaiveDate, TimeDelta};

    fn transition(user: &str, prev: Option<&str>, next: Option<&str>, secs: i64) -> VoiceTransition {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(9, 30, 0, 250_000)
            .unwrap();
        VoiceTransition {
            guild_id: "g1".into(),
            member: MemberRef {
                id: user.into(),
                username: format!("{user}_name"),
                display_name: format!("{user} display"),
            },
            previous: prev.map(|id| ChannelRef::new(id, format!("chan-{id}"))),
            next: next.map(|id| ChannelRef::new(id, format!("chan-{id}"))),
            at: base + TimeDelta::seconds(secs),
        }
    }

    #[tokio::test]
    async fn apply_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance_data.json");
        let mut store = SessionStore::empty(&path);

        store.apply(&transition("u1", None, Some("10"), 0)).await.unwrap();
        store.apply(&transition("u2", None, Some("10"), 5)).await.unwrap();
        store.apply(&transition("u1", Some("10"), None, 65)).await.unwrap();

        let reloaded = SessionStore::load(&path).await.unwrap();
        assert_eq!(reloaded.data(), store.data());
        let guild = reloaded.guild("g1").unwrap();
        assert_eq!(guild.keys().collect::<Vec<_>>(), vec!["u1", "u2"]);
        assert_eq!(guild["u1"].sessions[0].duration.as_deref(), Some("0:01:05"));
        assert!(guild["u2"].sessions[0].leave_time.is_none());
    }

    #[tokio::test]
    async fn file_layout_uses_iso_timestamps_and_null_while_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut store = SessionStore::empty(&path);
        store.apply(&transition("u1", None, Some("10"), 0)).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        let session = &raw["g1"]["u1"]["sessions"][0];
        assert_eq!(session["join_time"], "2024-01-02T09:30:00.250");
        assert!(session["leave_time"].is_null());
        assert!(session["duration"].is_null());
        assert_eq!(raw["g1"]["u1"]["display_name"], "u1 display");
    }

    #[tokio::test]
    async fn loads_files_written_by_older_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let legacy = r#"{
          "7": {
            "99": {
              "username": "bob#0001",
              "display_name": "Bob",
              "sessions": [
                {"channel_name": "Lobby", "channel_id": "5",
                 "join_time": "2023-05-01T10:00:00.123456",
                 "leave_time": "2023-05-01T11:00:00.123456",
                 "duration": "1:00:00"}
              ]
            }
          }
        }"#;
        tokio::fs::write(&path, legacy).await.unwrap();
        let store = SessionStore::load(&path).await.unwrap();
        let session = &store.guild("7").unwrap()["99"].sessions[0];
        assert_eq!(session.elapsed(), Some(TimeDelta::hours(1)));
    }

    #[tokio::test]
    async fn missing_file_starts_empty_and_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SessionStore::load(dir.path().join("nope.json")).await.unwrap();
        assert!(missing.data().is_empty());

        let corrupt = dir.path().join("corrupt.json");
        tokio::fs::write(&corrupt, b"{ not json").await.unwrap();
        assert!(SessionStore::load(&corrupt).await.is_err());
        let mut store = SessionStore::load_or_empty(&corrupt).await;
        assert!(store.data().is_empty());

        let aside = dir.path().join("corrupt.json.bad");
        assert_eq!(tokio::fs::read(&aside).await.unwrap(), b"{ not json");
        store.apply(&transition("u1", None, Some("10"), 0)).await.unwrap();
        assert_eq!(tokio::fs::read(&aside).await.unwrap(), b"{ not json");
        assert!(SessionStore::load(&corrupt).await.unwrap().guild("g1").is_some());
    }

    #[tokio::test]
    async fn unmatched_leave_keeps_file_and_memory_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut store = SessionStore::empty(&path);

        let out = store.apply(&transition("u1", Some("10"), None, 0)).await.unwrap();
        assert_eq!(out, TransitionOutcome::Unmatched);
        assert!(store.data().is_empty());
        assert_eq!(SessionStore::load(&path).await.unwrap().data(), store.data());

        store.apply(&transition("u1", None, Some("10"), 5)).await.unwrap();
        store.apply(&transition("u1", Some("10"), None, 10)).await.unwrap();
        let mut renamed = transition("u1", Some("20"), None, 15);
        renamed.member.display_name = "renamed".into();
        let out = store.apply(&renamed).await.unwrap();
        assert_eq!(out, TransitionOutcome::Unmatched);
        let reloaded = SessionStore::load(&path).await.unwrap();
        assert_eq!(reloaded.data(), store.data());
        assert_eq!(reloaded.guild("g1").unwrap()["u1"].display_name, "renamed");
    }

    #[tokio::test]
    async fn clear_guild_removes_only_that_guild() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::empty(dir.path().join("data.json"));
        store.apply(&transition("u1", None, Some("10"), 0)).await.unwrap();
        assert!(store.clear_guild("g1").await.unwrap());
        assert!(!store.clear_guild("g1").await.unwrap());
        assert!(store.guild("g1").is_none());
    }
}
