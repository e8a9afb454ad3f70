//! Scrub scheduling for a storage node.
//!
//! Decides which shard to scrub next, when, and whether time-of-day, system
//! load and the node's scrub slots currently allow it. Scrub execution itself
//! is behind [`attempt::ScrubInitiator`].

pub mod config;
pub mod logging;

pub mod attempt;
pub mod driver;
pub mod env;
pub mod gate;
pub mod job;
pub mod queue;
pub mod resources;

pub use attempt::{AttemptOutcome, ScrubInitiator, ScrubPreconds};
pub use job::{SchedParams, ScrubJob, ScrubJobRef, ShardId};
pub use queue::ScrubQueue;
