//! Session runtime for the possession tracker.
//!
//! This crate provides:
//! - Detection feeds and the frame sequencer
//! - Interaction gateways (in-process channels, JSON lines)
//! - The per-session processing loop with user-input suspension
//! - A session executor with a concurrency limit and graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod feed;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod session;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{SessionExecutor, SessionHandle};
pub use feed::{DetectionFeed, FeedFrame, FrameSequencer, JsonLinesFeed, VecFeed};
pub use gateway::{
    ChannelGateway, GatewayClient, GatewayEvent, InteractionGateway, LineGateway, StdioGateway,
};
pub use logging::SessionLogger;
pub use session::{Session, SessionControl, SessionController, SessionReport};
