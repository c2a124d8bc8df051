//! Per-guild playback order: pending queue, bounded history, loop and
//! shuffle. Knows nothing about voice connections.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serenity::all::UserId;

use crate::error::QueueError;

pub const HISTORY_CAPACITY: usize = 50;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Assigned on enqueue; identifies this particular play request.
    pub id: u64,
    pub title: String,
    pub url: String,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub requested_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    pub fn parse(arg: &str) -> Option<Self> {
        match arg.to_ascii_lowercase().as_str() {
            "off" | "none" | "disable" => Some(Self::Off),
            "song" | "track" | "current" | "one" => Some(Self::Track),
            "queue" | "all" => Some(Self::Queue),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Track,
            Self::Track => Self::Queue,
            Self::Queue => Self::Off,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Track => "song",
            Self::Queue => "queue",
        })
    }
}

#[derive(Debug)]
pub struct MusicQueue {
    queue: VecDeque<QueueEntry>,
    history: VecDeque<QueueEntry>,
    current: Option<QueueEntry>,
    loop_mode: LoopMode,
    shuffle: bool,
    /// Pre-shuffle order, restored when shuffle is switched off.
    baseline: Option<Vec<u64>>,
    volume: u8,
    skip_requested: bool,
    next_id: u64,
}

impl Default for MusicQueue {
    fn default() -> Self {
        Self::new(50)
    }
}

impl MusicQueue {
    pub fn new(volume: u8) -> Self {
        Self {
            queue: VecDeque::new(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            current: None,
            loop_mode: LoopMode::Off,
            shuffle: false,
            baseline: None,
            volume: volume.min(MAX_VOLUME),
            skip_requested: false,
            next_id: 1,
        }
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &QueueEntry> {
        self.queue.iter()
    }

    /// Oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &QueueEntry> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<(), QueueError> {
        if volume > MAX_VOLUME {
            return Err(QueueError::VolumeOutOfRange { max: MAX_VOLUME });
        }
        self.volume = volume;
        Ok(())
    }

    /// Appends to the tail and returns the 1-based position in the queue.
    pub fn enqueue(&mut self, mut entry: QueueEntry) -> usize {
        entry.id = self.next_id;
        self.next_id += 1;
        if self.shuffle {
            let baseline = self
                .baseline
                .get_or_insert_with(|| self.queue.iter().map(|e| e.id).collect());
            baseline.push(entry.id);
        }
        self.queue.push_back(entry);
        self.queue.len()
    }

    /// Makes the next call to [`MusicQueue::advance`] move on even when the
    /// current entry is on repeat.
    pub fn skip(&mut self) {
        if self.current.is_some() {
            self.skip_requested = true;
        }
    }

    /// Decides what plays after the current entry finishes. `None` means
    /// nothing is left and the player goes idle.
    pub fn advance(&mut self) -> Option<QueueEntry> {
        let forced = std::mem::take(&mut self.skip_requested);
        if self.loop_mode == LoopMode::Track
            && !forced
            && let Some(current) = &self.current
        {
            return Some(current.clone());
        }

        if let Some(finished) = self.current.take() {
            self.push_history(finished);
        }

        if self.loop_mode == LoopMode::Queue && self.queue.is_empty() && !self.history.is_empty()
        {
            self.queue = std::mem::take(&mut self.history);
        }

        let next = if self.queue.is_empty() {
            None
        } else if self.shuffle {
            let pick = rand::rng().random_range(0..self.queue.len());
            self.queue.remove(pick)
        } else {
            self.queue.pop_front()
        };
        self.current = next.clone();
        next
    }

    fn push_history(&mut self, entry: QueueEntry) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// Flips shuffle and returns the new state.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.baseline = Some(self.queue.iter().map(|e| e.id).collect());
            self.queue.make_contiguous().shuffle(&mut rand::rng());
        } else if let Some(baseline) = self.baseline.take() {
            self.restore_order(&baseline);
        }
        self.shuffle
    }

    /// Puts the live queue back in baseline order. Entries added after the
    /// baseline was taken keep their relative order at the end.
    fn restore_order(&mut self, baseline: &[u64]) {
        let rank: HashMap<u64, usize> = baseline.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        self.queue
            .make_contiguous()
            .sort_by_key(|e| rank.get(&e.id).copied().unwrap_or(usize::MAX));
    }

    /// 0-based removal from the pending queue.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueEntry, QueueError> {
        let len = self.queue.len();
        self.queue
            .remove(index)
            .ok_or(QueueError::OutOfRange { index, len })
    }

    /// 0-based move within the pending queue.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        let len = self.queue.len();
        if from >= len || to >= len {
            return Err(QueueError::InvalidMove { from, to, len });
        }
        if let Some(entry) = self.queue.remove(from) {
            self.queue.insert(to, entry);
        }
        Ok(())
    }

    /// Empties queue, history, baseline and current together.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.history.clear();
        self.baseline = None;
        self.current = None;
        self.skip_requested = false;
    }

    /// Drops the pending entries only; the current entry keeps playing.
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.baseline = None;
        dropped
    }

    pub fn total_pending_secs(&self) -> u64 {
        self.queue.iter().filter_map(|e| e.duration_secs).sum()
    }
}
