//! Recording, data log and replay module
//!
//! This module owns the on-disk recording format. A running pipeline writes
//! it through a [`DataLog`]; the replay source and the `inspect` command read
//! it back as a [`Recording`].
//!
//! # Features
//!
//! - JSON Lines recording format with channel declarations and debug events
//! - Buffered log writer with periodic flushing
//! - Per-cycle log file naming for rotation
//! - Cycling replay cursor over a recorded sensor group

pub mod player;
pub mod recorder;
pub mod types;

pub use player::ReplayCursor;
pub use recorder::{DataLog, JsonLinesLog, LogFiles, DEFAULT_FLUSH_EVERY};
pub use types::{ChannelDecl, EventEntry, LogEntry, Recording};
