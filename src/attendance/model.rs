use chrono::{NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::duration;

/// A voice channel as seen at the moment of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

/// One continuous stay of a user in one voice channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub channel_name: String,
    pub channel_id: String,
    pub join_time: NaiveDateTime,
    pub leave_time: Option<NaiveDateTime>,
    /// `H:MM:SS.ffffff`, kept as text so hand-edited files still load.
    pub duration: Option<String>,
}

impl Session {
    pub fn open(channel: &ChannelRef, at: NaiveDateTime) -> Self {
        Self {
            channel_name: channel.name.clone(),
            channel_id: channel.id.clone(),
            join_time: at,
            leave_time: None,
            duration: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.leave_time.is_none()
    }

    pub fn close(&mut self, at: NaiveDateTime) {
        let elapsed = (at - self.join_time).max(TimeDelta::zero());
        self.leave_time = Some(at);
        self.duration = Some(duration::to_storage(elapsed));
    }

    pub fn is_completed(&self) -> bool {
        self.duration.is_some()
    }

    /// Parsed duration; `None` while open or when the stored text is malformed.
    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.duration.as_deref().and_then(duration::parse_storage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl UserRecord {
    pub fn new(member: &MemberRef) -> Self {
        Self {
            username: member.username.clone(),
            display_name: member.display_name.clone(),
            sessions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }
}

/// user id -> record, in first-seen order.
pub type GuildStore = IndexMap<String, UserRecord>;

/// guild id -> guild store. This is the whole persisted document.
pub type AttendanceData = IndexMap<String, GuildStore>;
