//! # Maurina Console
//!
//! Core of a desktop log console that receives UDP datagrams from
//! instrumented processes and shows them as per-channel log streams.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     INSTRUMENTED PROCESSES                           │
//! │   ┌────────────┐   ┌────────────┐   ┌────────────┐                  │
//! │   │ Connector  │   │ Connector  │   │  Any UDP   │                  │
//! │   │ (JSON)     │   │ (JSON)     │   │  "0:text"  │                  │
//! │   └─────┬──────┘   └─────┬──────┘   └─────┬──────┘                  │
//! └─────────┼────────────────┼────────────────┼─────────────────────────┘
//!           │                │                │   UDP
//!           ▼                ▼                ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           CONSOLE                                    │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │        DatagramRouter (network::receiver) - Single Socket      │ │
//! │  │        decode (protocol) → reset countdown → dispatch          │ │
//! │  └───────────────┬──────────────────────────────┬─────────────────┘ │
//! │                  │                              │                   │
//! │                  ▼                              ▼                   │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────┐   │
//! │  │  ChannelSet (channels)       │◄──│ TimeoutScheduler         │   │
//! │  │  Ch 0 │ Ch 1 │ Ch 2 │ Ch 3   │   │ (timeout) idle clear-all │   │
//! │  └───────────────┬──────────────┘   └──────────────────────────┘   │
//! │                  │ CoreEvent (events)                               │
//! │                  ▼                                                  │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │  Presentation shell: snapshots, captions, layout (layout)      │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! │                                                                      │
//! │  AppConfig (config) loaded at start, saved at exit                   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`app::Console`] is the application context that owns every component
//! and is the only surface a presentation layer calls into.

pub mod app;
pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod network;
pub mod protocol;
pub mod timeout;

pub use app::Console;
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default listening address
    pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1";

    /// Default UDP port, the one connectors send to out of the box
    pub const DEFAULT_UDP_PORT: u16 = 1947;

    /// Default idle period before logs are cleared
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Captions used when the configuration names no channels
    pub const DEFAULT_CAPTIONS: [&str; 4] = ["User", "Errors", "Request", "Session"];

    /// Maximum number of channels
    pub const MAX_CHANNELS: usize = 16;

    /// Receive buffer size; holds the largest UDP payload over IPv4 or IPv6
    pub const MAX_PACKET_SIZE: usize = 65_535;

    /// Kernel receive buffer requested for the listening socket
    pub const SOCKET_RECV_BUFFER: usize = 1 << 20;

    /// Per-subscriber event queue depth
    pub const EVENT_QUEUE_CAPACITY: usize = 1024;

    /// File name of the persisted configuration
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}
