//! Voice-channel attendance: session bookkeeping, persistence, and reports.

pub mod export;
pub mod model;
pub mod stats;
pub mod store;
pub mod tracker;

pub use model::{ChannelRef, MemberRef};
pub use store::SessionStore;
pub use tracker::{TransitionOutcome, VoiceTransition};
