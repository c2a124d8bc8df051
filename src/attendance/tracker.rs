use chrono::NaiveDateTime;
use tracing::warn;

use super::model::{AttendanceData, ChannelRef, MemberRef, Session, UserRecord};

/// A voice-state change reduced to what attendance cares about.
#[derive(Debug, Clone)]
pub struct VoiceTransition {
    pub guild_id: String,
    pub member: MemberRef,
    pub previous: Option<ChannelRef>,
    pub next: Option<ChannelRef>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Same channel on both sides (mute/deafen) or no channel at all.
    Ignored,
    /// `stale` counts sessions that were still open and got closed first.
    Joined { stale: usize },
    Left,
    Switched { closed_previous: bool },
    /// A leave arrived with no open session in that channel.
    Unmatched,
}

impl TransitionOutcome {
    /// Everything but `Ignored` may have touched the data, if only to refresh
    /// the member's names.
    pub fn changed_store(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Apply one transition to the in-memory data.
pub fn handle_transition(data: &mut AttendanceData, t: &VoiceTransition) -> TransitionOutcome {
    match (&t.previous, &t.next) {
        (None, None) => TransitionOutcome::Ignored,
        (Some(prev), Some(next)) if prev.id == next.id => TransitionOutcome::Ignored,
        (None, Some(next)) => {
            let record = user_record(data, t);
            let stale = open_session(record, next, t.at);
            TransitionOutcome::Joined { stale }
        }
        (Some(prev), None) => {
            let closed = existing_record(data, t)
                .map(|record| close_session(record, &prev.id, t.at))
                .unwrap_or(false);
            if closed {
                TransitionOutcome::Left
            } else {
                warn!(
                    "no open session for {} in {} ({}), leave ignored",
                    t.member.display_name, prev.name, prev.id
                );
                TransitionOutcome::Unmatched
            }
        }
        (Some(prev), Some(next)) => {
            let record = user_record(data, t);
            let closed_previous = close_session(record, &prev.id, t.at);
            if !closed_previous {
                warn!(
                    "no open session for {} in {} ({}) while switching",
                    t.member.display_name, prev.name, prev.id
                );
            }
            open_session(record, next, t.at);
            TransitionOutcome::Switched { closed_previous }
        }
    }
}

fn user_record<'a>(data: &'a mut AttendanceData, t: &VoiceTransition) -> &'a mut UserRecord {
    let record = data
        .entry(t.guild_id.clone())
        .or_default()
        .entry(t.member.id.clone())
        .or_insert_with(|| UserRecord::new(&t.member));
    refresh_names(record, &t.member);
    record
}

/// A leave never creates a record; there is nothing to close for a stranger.
fn existing_record<'a>(
    data: &'a mut AttendanceData,
    t: &VoiceTransition,
) -> Option<&'a mut UserRecord> {
    let record = data.get_mut(&t.guild_id)?.get_mut(&t.member.id)?;
    refresh_names(record, &t.member);
    Some(record)
}

fn refresh_names(record: &mut UserRecord, member: &MemberRef) {
    record.username.clone_from(&member.username);
    record.display_name.clone_from(&member.display_name);
}

/// Closes whatever is still open for this user, then opens the new session.
fn open_session(record: &mut UserRecord, channel: &ChannelRef, at: NaiveDateTime) -> usize {
    let mut stale = 0;
    for session in record.sessions.iter_mut().filter(|s| s.is_open()) {
        warn!(
            "closing stale open session in {} ({}) for {}",
            session.channel_name,
            session.channel_id,
            record.username
        );
        session.close(at);
        stale += 1;
    }
    record.sessions.push(Session::open(channel, at));
    stale
}

/// Closes the most recent open session in `channel_id`.
fn close_session(record: &mut UserRecord, channel_id: &str, at: NaiveDateTime) -> bool {
    match record
        .sessions
        .iter_mut()
        .rev()
        .find(|s| s.is_open() && s.channel_id == channel_id)
    {
        Some(session) => {
            session.close(at);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn at(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs)
    }

    fn member() -> MemberRef {
        MemberRef {
            id: "42".into(),
            username: "alice".into(),
            display_name: "Alice".into(),
        }
    }

    fn general() -> ChannelRef {
        ChannelRef::new("100", "General")
    }

    fn gaming() -> ChannelRef {
        ChannelRef::new("200", "Gaming")
    }

    fn transition(
        previous: Option<ChannelRef>,
        next: Option<ChannelRef>,
        secs: i64,
    ) -> VoiceTransition {
        VoiceTransition {
            guild_id: "1".into(),
            member: member(),
            previous,
            next,
            at: at(secs),
        }
    }

    fn sessions(data: &AttendanceData) -> &Vec<Session> {
        &data["1"]["42"].sessions
    }

    #[test]
    fn join_then_leave_records_duration() {
        let mut data = AttendanceData::new();
        let out = handle_transition(&mut data, &transition(None, Some(general()), 0));
        assert_eq!(out, TransitionOutcome::Joined { stale: 0 });
        assert!(sessions(&data)[0].is_open());

        let out = handle_transition(&mut data, &transition(Some(general()), None, 95));
        assert_eq!(out, TransitionOutcome::Left);
        let s = &sessions(&data)[0];
        assert_eq!(s.leave_time, Some(at(95)));
        assert_eq!(s.duration.as_deref(), Some("0:01:35"));
        assert_eq!(data["1"]["42"].display_name, "Alice");
    }

    #[test]
    fn switch_closes_and_opens_at_same_instant() {
        let mut data = AttendanceData::new();
        handle_transition(&mut data, &transition(None, Some(general()), 0));
        let out = handle_transition(&mut data, &transition(Some(general()), Some(gaming()), 60));
        assert_eq!(
            out,
            TransitionOutcome::Switched {
                closed_previous: true
            }
        );
        let list = sessions(&data);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].leave_time, Some(at(60)));
        assert_eq!(list[1].join_time, at(60));
        assert_eq!(list[1].channel_name, "Gaming");
        assert!(list[1].is_open());
    }

    #[test]
    fn same_channel_update_is_ignored() {
        let mut data = AttendanceData::new();
        handle_transition(&mut data, &transition(None, Some(general()), 0));
        let out = handle_transition(&mut data, &transition(Some(general()), Some(general()), 5));
        assert_eq!(out, TransitionOutcome::Ignored);
        assert_eq!(sessions(&data).len(), 1);
        assert!(sessions(&data)[0].is_open());
    }

    #[test]
    fn leave_without_open_session_is_unmatched() {
        let mut data = AttendanceData::new();
        let out = handle_transition(&mut data, &transition(Some(general()), None, 5));
        assert_eq!(out, TransitionOutcome::Unmatched);
        assert!(out.changed_store());
        assert!(data.is_empty());
    }

    #[test]
    fn unmatched_leave_for_known_member_refreshes_names() {
        let mut data = AttendanceData::new();
        handle_transition(&mut data, &transition(None, Some(general()), 0));
        handle_transition(&mut data, &transition(Some(general()), None, 10));

        let mut renamed = transition(Some(gaming()), None, 20);
        renamed.member.display_name = "Alice B".into();
        let out = handle_transition(&mut data, &renamed);
        assert_eq!(out, TransitionOutcome::Unmatched);
        assert_eq!(data["1"]["42"].display_name, "Alice B");
        assert_eq!(sessions(&data).len(), 1);
    }

    #[test]
    fn rejoin_after_missed_leave_closes_stale_session() {
        let mut data = AttendanceData::new();
        handle_transition(&mut data, &transition(None, Some(general()), 0));
        let out = handle_transition(&mut data, &transition(None, Some(gaming()), 30));
        assert_eq!(out, TransitionOutcome::Joined { stale: 1 });
        let list = sessions(&data);
        assert_eq!(list.iter().filter(|s| s.is_open()).count(), 1);
        assert_eq!(list[0].duration.as_deref(), Some("0:00:30"));
    }

    #[test]
    fn at_most_one_open_session_across_a_long_sequence() {
        let mut data = AttendanceData::new();
        let channels = [general(), gaming(), ChannelRef::new("300", "Music")];
        let mut current: Option<ChannelRef> = None;
        let mut closes = 0;
        for step in 0..60i64 {
            let next = match step % 5 {
                0 | 3 => None,
                n => Some(channels[(n as usize + step as usize) % 3].clone()),
            };
            let out = handle_transition(&mut data, &transition(current.clone(), next.clone(), step));
            match out {
                TransitionOutcome::Left => closes += 1,
                TransitionOutcome::Switched {
                    closed_previous: true,
                } => closes += 1,
                TransitionOutcome::Joined { stale } => closes += stale,
                _ => {}
            }
            current = next;
            if data.contains_key("1") {
                let record = &data["1"]["42"];
                assert!(record.sessions.iter().filter(|s| s.is_open()).count() <= 1);
                let closed = record.sessions.iter().filter(|s| !s.is_open()).count();
                assert_eq!(closed, closes);
            }
        }
    }
}
