//! Headless Maurina Console
//!
//! Listens for log datagrams and prints every entry to stdout. The
//! configuration is read at startup and written back on Ctrl+C.
//!
//! Usage: `maurina-console [CONFIG_PATH]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maurina_console::{
    config::default_config_path,
    constants::CONFIG_FILE_NAME,
    events::CoreEvent,
    Console,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Maurina Console {}", env!("CARGO_PKG_VERSION"));

    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path().unwrap_or_else(|e| {
            tracing::warn!("{}, using ./{}", e, CONFIG_FILE_NAME);
            PathBuf::from(CONFIG_FILE_NAME)
        }),
    };
    tracing::info!("Configuration: {}", config_path.display());

    let mut console = Console::open(&config_path).context("Failed to set up channels")?;
    let events = console.subscribe();

    println!("\n=== Channels ===");
    for snapshot in console.snapshots() {
        println!("  [{}] {}", snapshot.index, snapshot.caption);
    }
    let policy = console.timeout_policy();
    if policy.enabled {
        println!("Auto-clear after {}s without traffic", policy.idle_seconds);
    }
    println!();

    let local_addr = console
        .start_server()
        .with_context(|| format!("Failed to listen on {}", console.endpoint()))?;
    tracing::info!("Waiting for datagrams on {} - press Ctrl+C to stop", local_addr);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut poll = tokio::time::interval(Duration::from_millis(50));
    let mut stats = tokio::time::interval(Duration::from_secs(30));
    let mut last_received = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = poll.tick() => {
                while let Ok(event) = events.try_recv() {
                    print_event(&console, event);
                }
            }
            _ = stats.tick() => {
                let s = console.router_stats();
                if s.datagrams_received != last_received {
                    last_received = s.datagrams_received;
                    tracing::info!(
                        "Receiver stats: {} datagrams, {} bytes, {} accepted, {} dropped",
                        s.datagrams_received,
                        s.bytes_received,
                        s.datagrams_accepted,
                        s.datagrams_dropped
                    );
                }
            }
        }
    }

    tracing::info!("Shutting down");
    if let Err(e) = console.shutdown().await {
        tracing::error!("Could not save configuration: {}", e);
    }

    Ok(())
}

fn print_event(console: &Console, event: CoreEvent) {
    match event {
        CoreEvent::CaptionChanged { index, caption } => {
            tracing::info!("Channel {} renamed to {}", index, caption);
        }
        CoreEvent::DatagramDropped { from, reason } => {
            tracing::debug!("Dropped datagram from {:?}: {}", from, reason);
        }
        event => {
            if let Some(line) = event_line(console, &event) {
                println!("{}", line);
            }
        }
    }
}

/// Terminal line for events that are shown to the user
fn event_line(console: &Console, event: &CoreEvent) -> Option<String> {
    match event {
        CoreEvent::LogAppended {
            index,
            entry_count,
            entry,
        } => {
            let title = format!("{} ({})", console.caption(*index)?, entry_count);
            Some(format!(
                "{} {:<12} {}",
                entry.received_at.format("[%H:%M:%S]"),
                title,
                entry.text.trim_end()
            ))
        }
        CoreEvent::CountdownExpired => Some("--- idle timeout, logs cleared ---".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_prints_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let console = Console::open(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        let events = console.subscribe();

        for raw in [b"0:a", b"0:b", b"0:c"] {
            console.on_datagram(raw);
        }

        let lines: Vec<String> = events
            .try_iter()
            .filter_map(|event| event_line(&console, &event))
            .collect();
        assert_eq!(lines.len(), 3);
        for (line, (title, text)) in lines
            .iter()
            .zip([("User (1)", "a"), ("User (2)", "b"), ("User (3)", "c")])
        {
            assert!(line.contains(title), "{}", line);
            assert!(line.ends_with(&format!(" {}", text)), "{}", line);
        }
    }
}
