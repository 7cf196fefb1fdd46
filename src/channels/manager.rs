//! Fixed collection of log channels
//!
//! Every operation takes the same lock, so an append can never interleave
//! with a clear and a snapshot never mixes pre- and post-clear state.

use parking_lot::Mutex;

use crate::channels::channel::{Channel, ChannelSnapshot, LogEntry};
use crate::constants::MAX_CHANNELS;
use crate::error::ChannelError;

/// The console's channels, indexed contiguously from 0
pub struct ChannelSet {
    channels: Mutex<Vec<Channel>>,
    len: usize,
}

impl ChannelSet {
    /// Build channels 0..n from captions in order
    pub fn with_captions<I, S>(captions: I) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_indexed(captions.into_iter().enumerate())
    }

    /// Build from explicit `(index, caption)` pairs in any order
    ///
    /// Indices must be unique and cover `0..n` with no gap.
    pub fn from_indexed<I, S>(pairs: I) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut slots: Vec<Option<Channel>> = Vec::new();

        for (index, caption) in pairs {
            if index >= MAX_CHANNELS {
                return Err(ChannelError::TooMany(index.saturating_add(1)));
            }
            if index >= slots.len() {
                slots.resize_with(index + 1, || None);
            }
            if slots[index].is_some() {
                return Err(ChannelError::Duplicate(index));
            }
            slots[index] = Some(Channel::new(index, caption));
        }

        if slots.is_empty() {
            return Err(ChannelError::Empty);
        }

        let channels = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ChannelError::NotContiguous(index)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            len: channels.len(),
            channels: Mutex::new(channels),
        })
    }

    /// Number of channels, fixed at construction
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len
    }

    /// Append an entry; returns the new entry count, or None out of range
    pub fn append(&self, index: usize, text: impl Into<String>) -> Option<usize> {
        self.append_entry(index, LogEntry::new(text))
    }

    /// Append a prepared entry; returns the new entry count, or None out of range
    pub fn append_entry(&self, index: usize, entry: LogEntry) -> Option<usize> {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(index)?;
        Some(channel.append(entry))
    }

    /// Empty one channel; returns false out of range
    pub fn clear(&self, index: usize) -> bool {
        let mut channels = self.channels.lock();
        match channels.get_mut(index) {
            Some(channel) => {
                channel.clear();
                true
            }
            None => false,
        }
    }

    /// Empty every channel
    pub fn clear_all(&self) {
        let mut channels = self.channels.lock();
        for channel in channels.iter_mut() {
            channel.clear();
        }
    }

    /// Rename a channel; returns false out of range
    pub fn set_caption(&self, index: usize, caption: impl Into<String>) -> bool {
        let mut channels = self.channels.lock();
        match channels.get_mut(index) {
            Some(channel) => {
                channel.set_caption(caption);
                true
            }
            None => false,
        }
    }

    pub fn caption(&self, index: usize) -> Option<String> {
        self.channels.lock().get(index).map(|c| c.caption().to_string())
    }

    /// Captions in index order
    pub fn captions(&self) -> Vec<String> {
        self.channels
            .lock()
            .iter()
            .map(|c| c.caption().to_string())
            .collect()
    }

    pub fn snapshot(&self, index: usize) -> Option<ChannelSnapshot> {
        self.channels.lock().get(index).map(Channel::snapshot)
    }

    /// Every channel, taken under a single lock
    pub fn snapshot_all(&self) -> Vec<ChannelSnapshot> {
        self.channels.lock().iter().map(Channel::snapshot).collect()
    }
}
