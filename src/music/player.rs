//! Per-guild playback loop. The queue engine decides what plays; this task
//! turns its decisions into songbird calls and feeds track-end notifications
//! back in as [`PlayerEvent::Finished`].

use std::sync::Arc;

use anyhow::{Result, anyhow};
use serenity::all::{ChannelId, CreateMessage, GuildId, Http};
use serenity::async_trait;
use songbird::{
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
    driver::Bitrate, input::Input, tracks::TrackHandle,
};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use super::queue::{MusicQueue, QueueEntry};
use super::source::MediaSource;
use crate::embeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Something was enqueued; start playing if nothing is.
    Kick,
    /// The track started for this entry has ended or was stopped.
    Finished { entry_id: u64 },
    /// Stop this entry's track if it is still the current one.
    Skip { entry_id: u64 },
    /// Stop whatever is running. Whether anything follows is up to the queue.
    Halt,
    Volume(u8),
}

/// What the loop does in response to one event.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Nothing,
    /// Play this entry, or go idle on `None`.
    Start(Option<QueueEntry>),
    StopTrack,
    SetVolume(u8),
}

/// Applies `event` to the queue. Events naming an entry that is no longer
/// current are stale and do nothing.
fn decide(queue: &mut MusicQueue, event: PlayerEvent) -> Step {
    let current = queue.current().map(|c| c.id);
    match event {
        PlayerEvent::Kick if current.is_some() => Step::Nothing,
        PlayerEvent::Kick => match queue.advance() {
            Some(entry) => Step::Start(Some(entry)),
            None => Step::Nothing,
        },
        PlayerEvent::Finished { entry_id } if current == Some(entry_id) => {
            Step::Start(queue.advance())
        }
        PlayerEvent::Skip { entry_id } if current == Some(entry_id) => Step::StopTrack,
        PlayerEvent::Finished { .. } | PlayerEvent::Skip { .. } => Step::Nothing,
        PlayerEvent::Halt => Step::StopTrack,
        PlayerEvent::Volume(volume) => Step::SetVolume(volume),
    }
}

/// The entry to try after `failed` could not be played. Nothing when the
/// queue moved on while it was loading.
fn after_failure(queue: &mut MusicQueue, failed: u64) -> Option<QueueEntry> {
    if queue.current().map(|c| c.id) != Some(failed) {
        return None;
    }
    queue.skip();
    queue.advance()
}

/// Handle shared by command handlers. Cheap to clone.
#[derive(Clone)]
pub struct GuildPlayer {
    pub queue: Arc<Mutex<MusicQueue>>,
    announce_channel: Arc<Mutex<Option<ChannelId>>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

pub struct PlayerDeps {
    pub songbird: Arc<Songbird>,
    pub http: Arc<Http>,
    pub media: MediaSource,
    pub bitrate: u32,
    pub default_volume: u8,
}

impl GuildPlayer {
    /// Creates the queue for `guild_id` and spawns its playback task. The
    /// task lives as long as the process.
    pub fn spawn(guild_id: GuildId, deps: PlayerDeps) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Self {
            queue: Arc::new(Mutex::new(MusicQueue::new(deps.default_volume))),
            announce_channel: Arc::new(Mutex::new(None)),
            events: tx.clone(),
        };
        let task = PlayerTask {
            guild_id,
            queue: player.queue.clone(),
            announce_channel: player.announce_channel.clone(),
            events: tx,
            deps,
            track: None,
        };
        tokio::spawn(task.run(rx));
        player
    }

    pub fn send(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            error!("player task is gone, dropped {event:?}");
        }
    }

    pub async fn set_announce_channel(&self, channel_id: ChannelId) {
        *self.announce_channel.lock().await = Some(channel_id);
    }
}

struct PlayerTask {
    guild_id: GuildId,
    queue: Arc<Mutex<MusicQueue>>,
    announce_channel: Arc<Mutex<Option<ChannelId>>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    deps: PlayerDeps,
    track: Option<TrackHandle>,
}

impl PlayerTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PlayerEvent>) {
        while let Some(event) = rx.recv().await {
            debug!("guild {} player event {event:?}", self.guild_id);
            let step = decide(&mut *self.queue.lock().await, event);
            match step {
                Step::Nothing => {}
                Step::Start(next) => self.start(next).await,
                Step::StopTrack => {
                    if let Some(track) = self.track.take() {
                        let _ = track.stop();
                    }
                }
                Step::SetVolume(volume) => {
                    if let Some(track) = &self.track {
                        let _ = track.set_volume(f32::from(volume) / 100.0);
                    }
                }
            }
        }
    }

    /// Plays `next`; entries that fail to load are skipped until one works
    /// or the queue runs dry.
    async fn start(&mut self, mut next: Option<QueueEntry>) {
        while let Some(entry) = next.take() {
            match self.play(&entry).await {
                Ok(track) => {
                    let embed = {
                        let queue = self.queue.lock().await;
                        // Cleared or replaced while downloading.
                        if queue.current().map(|c| c.id) != Some(entry.id) {
                            let _ = track.stop();
                            return;
                        }
                        embeds::now_playing(&entry, &queue)
                    };
                    self.track = Some(track);
                    info!("guild {} now playing {}", self.guild_id, entry.title);
                    self.announce(CreateMessage::new().embed(embed)).await;
                    return;
                }
                Err(e) => {
                    warn!("guild {} failed to play {}: {e:#}", self.guild_id, entry.url);
                    self.announce(
                        CreateMessage::new()
                            .content(format!("❌ Couldn't play **{}**: {e}", entry.title)),
                    )
                    .await;
                    next = after_failure(&mut *self.queue.lock().await, entry.id);
                }
            }
        }
        self.track = None;
        info!("guild {} queue finished", self.guild_id);
    }

    async fn play(&self, entry: &QueueEntry) -> Result<TrackHandle> {
        let call_lock = self
            .deps
            .songbird
            .get(self.guild_id)
            .ok_or_else(|| anyhow!("not connected to voice"))?;
        let path = self.deps.media.download(&entry.url).await?;
        let source: Input = songbird::input::File::new(path).into();
        let volume = self.queue.lock().await.volume();

        let track = {
            let mut call = call_lock.lock().await;
            call.set_bitrate(Bitrate::BitsPerSecond(self.deps.bitrate as i32));
            call.play_only_input(source)
        };
        let _ = track.set_volume(f32::from(volume) / 100.0);
        track.add_event(
            Event::Track(TrackEvent::End),
            TrackEndNotifier {
                events: self.events.clone(),
                entry_id: entry.id,
            },
        )?;
        Ok(track)
    }

    async fn announce(&self, message: CreateMessage) {
        let Some(channel_id) = *self.announce_channel.lock().await else {
            return;
        };
        if let Err(e) = channel_id.send_message(&*self.deps.http, message).await {
            warn!("failed to post to {channel_id}: {e}");
        }
    }
}

/// Forwards songbird's end-of-track event into the player loop.
struct TrackEndNotifier {
    events: mpsc::UnboundedSender<PlayerEvent>,
    entry_id: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let _ = self.events.send(PlayerEvent::Finished {
            entry_id: self.entry_id,
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::LoopMode;
    use serenity::all::UserId;

    fn entry(title: &str) -> QueueEntry {
        QueueEntry {
            id: 0,
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            duration_secs: Some(60),
            thumbnail: None,
            uploader: None,
            requested_by: UserId::new(3),
        }
    }

    fn queue_of(titles: &[&str]) -> MusicQueue {
        let mut queue = MusicQueue::default();
        for title in titles {
            queue.enqueue(entry(title));
        }
        queue
    }

    fn started(step: Step) -> Option<String> {
        match step {
            Step::Start(next) => next.map(|e| e.title),
            other => panic!("expected a start, got {other:?}"),
        }
    }

    fn current_id(queue: &MusicQueue) -> u64 {
        queue.current().map(|c| c.id).unwrap()
    }

    #[test]
    fn kick_starts_only_when_idle() {
        let mut queue = MusicQueue::default();
        assert_eq!(decide(&mut queue, PlayerEvent::Kick), Step::Nothing);

        queue.enqueue(entry("A"));
        assert_eq!(started(decide(&mut queue, PlayerEvent::Kick)).as_deref(), Some("A"));
        queue.enqueue(entry("B"));
        assert_eq!(decide(&mut queue, PlayerEvent::Kick), Step::Nothing);
        assert_eq!(queue.current().unwrap().title, "A");
    }

    #[test]
    fn finished_advances_only_for_the_current_entry() {
        let mut queue = queue_of(&["A", "B", "C"]);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);

        let stale = PlayerEvent::Finished { entry_id: a + 100 };
        assert_eq!(decide(&mut queue, stale), Step::Nothing);
        assert_eq!(queue.current().unwrap().title, "A");

        let done = PlayerEvent::Finished { entry_id: a };
        assert_eq!(started(decide(&mut queue, done)).as_deref(), Some("B"));
        // A second end notification for A is stale now.
        assert_eq!(decide(&mut queue, done), Step::Nothing);
        assert_eq!(queue.current().unwrap().title, "B");
    }

    #[test]
    fn finishing_the_last_entry_goes_idle() {
        let mut queue = queue_of(&["A"]);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);
        assert_eq!(started(decide(&mut queue, PlayerEvent::Finished { entry_id: a })), None);
        assert!(queue.is_idle());
    }

    #[test]
    fn skip_stops_only_the_entry_it_names() {
        let mut queue = queue_of(&["A", "B"]);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);
        assert_eq!(decide(&mut queue, PlayerEvent::Skip { entry_id: a }), Step::StopTrack);
        assert_eq!(decide(&mut queue, PlayerEvent::Skip { entry_id: a + 1 }), Step::Nothing);
        assert_eq!(decide(&mut queue, PlayerEvent::Halt), Step::StopTrack);
        assert_eq!(decide(&mut queue, PlayerEvent::Volume(30)), Step::SetVolume(30));
    }

    #[test]
    fn skip_while_loading_a_failing_entry_drops_only_that_entry() {
        let mut queue = queue_of(&["A", "B", "C", "D"]);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);
        let b = started(decide(&mut queue, PlayerEvent::Finished { entry_id: a }));
        assert_eq!(b.as_deref(), Some("B"));
        let b = current_id(&queue);

        // The user skips B while it is still downloading.
        queue.skip();
        let pending_skip = PlayerEvent::Skip { entry_id: b };

        // B fails to load, so the loop moves on to C by itself.
        assert_eq!(after_failure(&mut queue, b).unwrap().title, "C");

        // The queued skip is for B and must leave C alone.
        assert_eq!(decide(&mut queue, pending_skip), Step::Nothing);
        assert_eq!(queue.current().unwrap().title, "C");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn skip_bypasses_repeat_once() {
        let mut queue = queue_of(&["A", "B"]);
        queue.set_loop_mode(LoopMode::Track);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);
        assert_eq!(
            started(decide(&mut queue, PlayerEvent::Finished { entry_id: a })).as_deref(),
            Some("A")
        );

        queue.skip();
        assert_eq!(decide(&mut queue, PlayerEvent::Skip { entry_id: a }), Step::StopTrack);
        assert_eq!(
            started(decide(&mut queue, PlayerEvent::Finished { entry_id: a })).as_deref(),
            Some("B")
        );
    }

    #[test]
    fn failure_after_the_queue_was_cleared_stays_idle() {
        let mut queue = queue_of(&["A", "B"]);
        decide(&mut queue, PlayerEvent::Kick);
        let a = current_id(&queue);
        queue.clear();
        assert_eq!(after_failure(&mut queue, a), None);
        assert!(queue.is_idle());
    }

    #[test]
    fn consecutive_failures_walk_the_queue() {
        let mut queue = queue_of(&["A", "B", "C"]);
        decide(&mut queue, PlayerEvent::Kick);
        let mut tried = vec![queue.current().unwrap().title.clone()];
        let mut failed = current_id(&queue);
        while let Some(next) = after_failure(&mut queue, failed) {
            tried.push(next.title.clone());
            failed = next.id;
        }
        assert_eq!(tried, ["A", "B", "C"]);
        assert!(queue.is_idle());
        assert_eq!(queue.history().count(), 3);
    }
}
