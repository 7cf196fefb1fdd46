//! Datagram router
//!
//! Owns the listening socket, decodes every datagram and dispatches the
//! result into the channel set. Bad input from the network is counted and
//! dropped; it never stops the receive loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channels::{ChannelSet, LogEntry};
use crate::constants::MAX_PACKET_SIZE;
use crate::error::BindError;
use crate::events::{CoreEvent, EventBus};
use crate::network::udp::{create_socket, ServerEndpoint, UdpSocket};
use crate::protocol::{self, Packet};
use crate::timeout::TimeoutHandle;

/// Receive counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub datagrams_accepted: u64,
    pub datagrams_dropped: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    bytes: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

struct Dispatcher {
    channels: Arc<ChannelSet>,
    timeout: TimeoutHandle,
    events: Arc<EventBus>,
    counters: Counters,
}

impl Dispatcher {
    fn dispatch(&self, raw: &[u8], from: Option<SocketAddr>) -> Option<Packet> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes
            .fetch_add(raw.len() as u64, Ordering::Relaxed);

        let packet = match protocol::decode(raw, self.channels.len()) {
            Ok(packet) => packet,
            Err(reason) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Dropped datagram from {:?}: {}", from, reason);
                self.events
                    .publish(CoreEvent::DatagramDropped { from, reason });
                return None;
            }
        };

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        self.timeout.reset();

        if let Some(captions) = &packet.captions {
            for (index, caption) in captions.iter().enumerate() {
                let Some(caption) = caption else {
                    continue;
                };
                if self.channels.caption(index).as_deref() == Some(caption.as_str()) {
                    continue;
                }
                if self.channels.set_caption(index, caption.as_str()) {
                    self.events.publish(CoreEvent::CaptionChanged {
                        index,
                        caption: caption.clone(),
                    });
                }
            }
        }

        for (index, text) in &packet.entries {
            let entry = LogEntry::new(text.as_str());
            if let Some(entry_count) = self.channels.append_entry(*index, entry.clone()) {
                self.events.publish(CoreEvent::LogAppended {
                    index: *index,
                    entry_count,
                    entry,
                });
            }
        }

        Some(packet)
    }
}

struct Listener {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// UDP listener feeding the channel set
pub struct DatagramRouter {
    dispatcher: Arc<Dispatcher>,
    listener: Option<Listener>,
}

impl DatagramRouter {
    pub fn new(channels: Arc<ChannelSet>, timeout: TimeoutHandle, events: Arc<EventBus>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher {
                channels,
                timeout,
                events,
                counters: Counters::default(),
            }),
            listener: None,
        }
    }

    /// Bind `endpoint` and start receiving; returns the bound address
    ///
    /// Fails with [`BindError::NoRuntime`] outside a tokio runtime. A failed
    /// bind is reported once and not retried.
    pub fn start(&mut self, endpoint: &ServerEndpoint) -> Result<SocketAddr, BindError> {
        if let Some(listener) = &self.listener {
            return Err(BindError::AlreadyRunning(listener.local_addr.to_string()));
        }
        let runtime = Handle::try_current().map_err(|_| BindError::NoRuntime)?;

        let std_socket = create_socket(endpoint)?;
        let socket = UdpSocket::from_std(std_socket)?;
        let local_addr = socket.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(receive_loop(
            socket,
            self.dispatcher.clone(),
            shutdown_rx,
        ));

        self.listener = Some(Listener {
            local_addr,
            shutdown_tx,
            task,
        });

        tracing::info!("Listening for datagrams on {}", local_addr);
        self.dispatcher
            .events
            .publish(CoreEvent::ServerStarted { local_addr });
        Ok(local_addr)
    }

    /// Release the socket; does nothing when not running
    pub async fn stop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        let _ = listener.shutdown_tx.send(true);
        if let Err(e) = listener.task.await {
            tracing::warn!("Receive task ended abnormally: {}", e);
        }

        tracing::info!("Stopped listening on {}", listener.local_addr);
        self.dispatcher.events.publish(CoreEvent::ServerStopped);
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr)
    }

    /// Decode and dispatch one raw datagram
    ///
    /// Returns the accepted packet, or None if it was dropped.
    pub fn on_datagram(&self, raw: &[u8]) -> Option<Packet> {
        self.dispatcher.dispatch(raw, None)
    }

    pub fn stats(&self) -> RouterStats {
        let counters = &self.dispatcher.counters;
        RouterStats {
            datagrams_received: counters.received.load(Ordering::Relaxed),
            bytes_received: counters.bytes.load(Ordering::Relaxed),
            datagrams_accepted: counters.accepted.load(Ordering::Relaxed),
            datagrams_dropped: counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DatagramRouter {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.shutdown_tx.send(true);
            listener.task.abort();
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, from)) => {
                    dispatcher.dispatch(&buf[..len], Some(from));
                }
                Err(e) => {
                    tracing::warn!("Receive error: {}", e);
                }
            },
        }
    }
}
