//! Log channel management

pub mod channel;
pub mod manager;

pub use channel::{Channel, ChannelSnapshot, LogEntry};
pub use manager::ChannelSet;
