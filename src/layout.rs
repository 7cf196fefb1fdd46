//! Presentation layout state

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Which channels the presentation layer renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Only the active channel is visible
    #[default]
    Detailed,
    /// All channels are visible side by side
    Compact,
}

impl LayoutMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            LayoutMode::Detailed => LayoutMode::Compact,
            LayoutMode::Compact => LayoutMode::Detailed,
        }
    }

    /// Name used in the configuration file
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutMode::Detailed => "detailed",
            LayoutMode::Compact => "compact",
        }
    }

    /// Parse a configuration value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "detailed" => Some(LayoutMode::Detailed),
            "compact" => Some(LayoutMode::Compact),
            _ => None,
        }
    }
}

/// Layout mode plus the channel shown in Detailed mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutController {
    mode: LayoutMode,
    active: usize,
    channel_count: usize,
}

impl LayoutController {
    pub fn new(mode: LayoutMode, channel_count: usize) -> Self {
        Self {
            mode,
            active: 0,
            channel_count,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Switch to the other mode and return it
    pub fn toggle(&mut self) -> LayoutMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Returns true if the mode changed
    pub fn set_mode(&mut self, mode: LayoutMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    /// Select the channel shown in Detailed mode
    pub fn set_active(&mut self, index: usize) -> bool {
        if index >= self.channel_count || index == self.active {
            return false;
        }
        self.active = index;
        true
    }

    /// Channels the presentation layer should show
    pub fn visible_channels(&self) -> Range<usize> {
        match self.mode {
            LayoutMode::Detailed if self.channel_count > 0 => self.active..self.active + 1,
            LayoutMode::Detailed => 0..0,
            LayoutMode::Compact => 0..self.channel_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        let mut layout = LayoutController::new(LayoutMode::Detailed, 4);
        assert_eq!(layout.toggle(), LayoutMode::Compact);
        assert_eq!(layout.toggle(), LayoutMode::Detailed);
    }

    #[test]
    fn test_visible_channels() {
        let mut layout = LayoutController::new(LayoutMode::Detailed, 4);
        assert_eq!(layout.visible_channels(), 0..1);

        assert!(layout.set_active(2));
        assert_eq!(layout.visible_channels(), 2..3);

        layout.set_mode(LayoutMode::Compact);
        assert_eq!(layout.visible_channels(), 0..4);
    }

    #[test]
    fn test_set_active_rejects_out_of_range() {
        let mut layout = LayoutController::new(LayoutMode::Detailed, 2);
        assert!(!layout.set_active(2));
        assert!(!layout.set_active(0));
        assert_eq!(layout.active(), 0);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(LayoutMode::parse("Compact"), Some(LayoutMode::Compact));
        assert_eq!(LayoutMode::parse(" detailed "), Some(LayoutMode::Detailed));
        assert_eq!(LayoutMode::parse("grid"), None);
    }
}
