//! Application context
//!
//! [`Console`] owns every core component and is the only surface the
//! presentation shell calls into. The shell learns about changes through
//! [`Console::subscribe`] instead of being invoked directly.

use crossbeam_channel::Receiver;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::channels::{ChannelSet, ChannelSnapshot};
use crate::config::{self, AppConfig, WindowState};
use crate::error::{BindError, ConfigError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::layout::{LayoutController, LayoutMode};
use crate::network::{DatagramRouter, RouterStats, ServerEndpoint};
use crate::protocol::Packet;
use crate::timeout::{CountdownState, TimeoutPolicy, TimeoutScheduler};

/// The console core
pub struct Console {
    config_path: PathBuf,
    endpoint: ServerEndpoint,
    window: WindowState,
    channels: Arc<ChannelSet>,
    events: Arc<EventBus>,
    scheduler: TimeoutScheduler,
    router: DatagramRouter,
    layout: LayoutController,
}

impl Console {
    /// Build the core from a configuration
    ///
    /// Fails with [`Error::NoRuntime`](crate::Error::NoRuntime) outside a
    /// tokio runtime. `config_path` is where [`Console::save_config`] writes.
    pub fn new(config: AppConfig, config_path: impl Into<PathBuf>) -> Result<Self> {
        let channels = Arc::new(ChannelSet::with_captions(config.captions)?);
        let events = Arc::new(EventBus::new());

        let scheduler = {
            let channels = channels.clone();
            let events = events.clone();
            TimeoutScheduler::spawn(config.timeout, move || {
                channels.clear_all();
                events.publish(CoreEvent::CountdownExpired);
            })?
        };

        let router = DatagramRouter::new(channels.clone(), scheduler.handle(), events.clone());
        let layout = LayoutController::new(config.layout, channels.len());

        Ok(Self {
            config_path: config_path.into(),
            endpoint: config.server,
            window: config.window,
            channels,
            events,
            scheduler,
            router,
            layout,
        })
    }

    /// Load the configuration at `path` and build the core from it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::new(config::load(path), path)
    }

    /// Start listening on the configured endpoint
    pub fn start_server(&mut self) -> std::result::Result<SocketAddr, BindError> {
        self.router.start(&self.endpoint)
    }

    /// Start listening on a new endpoint, which becomes the configured one
    pub fn start_server_on(
        &mut self,
        endpoint: ServerEndpoint,
    ) -> std::result::Result<SocketAddr, BindError> {
        if let Some(addr) = self.router.local_addr() {
            return Err(BindError::AlreadyRunning(addr.to_string()));
        }
        let addr = self.router.start(&endpoint)?;
        self.endpoint = endpoint;
        Ok(addr)
    }

    pub async fn stop_server(&mut self) {
        self.router.stop().await;
    }

    pub fn is_server_running(&self) -> bool {
        self.router.is_running()
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        self.endpoint
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.router.local_addr()
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Feed a raw datagram as if it had arrived on the socket
    pub fn on_datagram(&self, raw: &[u8]) -> Option<Packet> {
        self.router.on_datagram(raw)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_snapshot(&self, index: usize) -> Option<ChannelSnapshot> {
        self.channels.snapshot(index)
    }

    pub fn caption(&self, index: usize) -> Option<String> {
        self.channels.caption(index)
    }

    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        self.channels.snapshot_all()
    }

    /// Snapshots of the channels the current layout shows
    pub fn visible_snapshots(&self) -> Vec<ChannelSnapshot> {
        self.layout
            .visible_channels()
            .filter_map(|index| self.channels.snapshot(index))
            .collect()
    }

    pub fn set_caption(&self, index: usize, caption: impl Into<String>) -> bool {
        let caption = caption.into();
        if !self.channels.set_caption(index, caption.as_str()) {
            return false;
        }
        self.events
            .publish(CoreEvent::CaptionChanged { index, caption });
        true
    }

    pub fn clear_channel(&self, index: usize) -> bool {
        if !self.channels.clear(index) {
            return false;
        }
        self.events.publish(CoreEvent::ChannelCleared { index });
        true
    }

    pub fn clear_all(&self) {
        self.channels.clear_all();
        self.events.publish(CoreEvent::AllCleared);
    }

    pub fn set_timeout_policy(&self, policy: TimeoutPolicy) {
        self.scheduler.set_policy(policy);
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.scheduler.policy()
    }

    pub fn countdown_state(&self) -> CountdownState {
        self.scheduler.state()
    }

    pub fn countdown_remaining(&self) -> Option<Duration> {
        self.scheduler.handle().remaining()
    }

    pub fn layout(&self) -> &LayoutController {
        &self.layout
    }

    pub fn toggle_layout(&mut self) -> LayoutMode {
        let mode = self.layout.toggle();
        self.publish_layout();
        mode
    }

    pub fn set_layout(&mut self, mode: LayoutMode) {
        if self.layout.set_mode(mode) {
            self.publish_layout();
        }
    }

    pub fn set_active_channel(&mut self, index: usize) -> bool {
        let changed = self.layout.set_active(index);
        if changed {
            self.publish_layout();
        }
        changed
    }

    fn publish_layout(&self) {
        self.events.publish(CoreEvent::LayoutChanged {
            mode: self.layout.mode(),
            active: self.layout.active(),
        });
    }

    pub fn window_state(&self) -> WindowState {
        self.window
    }

    pub fn set_window_state(&mut self, window: WindowState) {
        self.window = window;
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Snapshot of everything that is persisted
    pub fn current_config(&self) -> AppConfig {
        AppConfig {
            layout: self.layout.mode(),
            captions: self.channels.captions(),
            server: self.endpoint,
            timeout: self.scheduler.policy(),
            window: self.window,
        }
    }

    pub fn save_config(&self) -> std::result::Result<(), ConfigError> {
        config::save(&self.config_path, &self.current_config())
    }

    /// Stop listening, cancel the countdown and persist the configuration
    pub async fn shutdown(&mut self) -> std::result::Result<(), ConfigError> {
        let config = self.current_config();
        self.router.stop().await;
        self.scheduler.shutdown().await;
        config::save(&self.config_path, &config)
    }
}
