//! Idle countdown that clears every channel after a quiet period
//!
//! [`Countdown`] is the state machine; [`TimeoutScheduler`] drives it from
//! a tokio task. The expiry check and the expiry action run under the
//! countdown lock, so once [`TimeoutScheduler::set_policy`] has disabled
//! the policy no pending expiry can fire.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::constants::DEFAULT_TIMEOUT_SECS;
use crate::error::{Error, Result};

/// Auto-clear policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub enabled: bool,
    /// Only meaningful while enabled
    pub idle_seconds: u64,
}

impl TimeoutPolicy {
    pub fn enabled(idle_seconds: u64) -> Self {
        Self {
            enabled: true,
            idle_seconds,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Idle period, if the policy is in force
    pub fn idle_period(&self) -> Option<Duration> {
        (self.enabled && self.idle_seconds > 0).then(|| Duration::from_secs(self.idle_seconds))
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Countdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Disabled,
    Armed { deadline: Instant },
    /// Fired; waits for traffic before arming again
    Expired,
}

/// Restartable idle countdown
#[derive(Debug, Clone)]
pub struct Countdown {
    policy: TimeoutPolicy,
    state: CountdownState,
}

impl Countdown {
    pub fn new(policy: TimeoutPolicy, now: Instant) -> Self {
        let mut countdown = Self {
            policy,
            state: CountdownState::Disabled,
        };
        countdown.set_policy(policy, now);
        countdown
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Apply a new policy
    ///
    /// An active policy starts a fresh countdown, except after expiry:
    /// an expired countdown only arms again on traffic.
    pub fn set_policy(&mut self, policy: TimeoutPolicy, now: Instant) {
        self.policy = policy;
        self.state = match (policy.idle_period(), self.state) {
            (None, _) => CountdownState::Disabled,
            (Some(_), CountdownState::Expired) => CountdownState::Expired,
            (Some(period), _) => CountdownState::Armed {
                deadline: now + period,
            },
        };
    }

    /// Restart after traffic; returns false while disabled
    pub fn reset(&mut self, now: Instant) -> bool {
        match (self.state, self.policy.idle_period()) {
            (CountdownState::Disabled, _) | (_, None) => false,
            (_, Some(period)) => {
                self.state = CountdownState::Armed {
                    deadline: now + period,
                };
                true
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            CountdownState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Move to Expired if the deadline has passed; returns true if it did
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.state {
            CountdownState::Armed { deadline } if now >= deadline => {
                self.state = CountdownState::Expired;
                true
            }
            _ => false,
        }
    }
}

struct Shared {
    countdown: Mutex<Countdown>,
    wake: Notify,
}

/// Cloneable handle used by the receive path to restart the countdown
#[derive(Clone)]
pub struct TimeoutHandle {
    shared: Arc<Shared>,
}

impl TimeoutHandle {
    /// Restart the countdown after an accepted datagram
    pub fn reset(&self) {
        let armed = self.shared.countdown.lock().reset(Instant::now());
        if armed {
            self.shared.wake.notify_one();
        }
    }

    pub fn state(&self) -> CountdownState {
        self.shared.countdown.lock().state()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.shared.countdown.lock().remaining(Instant::now())
    }
}

/// Drives a [`Countdown`] and runs an action on expiry
pub struct TimeoutScheduler {
    handle: TimeoutHandle,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TimeoutScheduler {
    /// Spawn the driver task on the current tokio runtime
    ///
    /// Fails with [`Error::NoRuntime`] outside a runtime. `on_expire` runs
    /// with the countdown locked and must not call back into the scheduler.
    pub fn spawn<F>(policy: TimeoutPolicy, on_expire: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let shared = Arc::new(Shared {
            countdown: Mutex::new(Countdown::new(policy, Instant::now())),
            wake: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = runtime.spawn(run(shared.clone(), shutdown_rx, on_expire));

        Ok(Self {
            handle: TimeoutHandle { shared },
            shutdown_tx,
            task: Some(task),
        })
    }

    pub fn handle(&self) -> TimeoutHandle {
        self.handle.clone()
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.handle.shared.countdown.lock().policy()
    }

    pub fn state(&self) -> CountdownState {
        self.handle.state()
    }

    /// Change the policy; disabling cancels any pending expiry before returning
    pub fn set_policy(&self, policy: TimeoutPolicy) {
        self.handle
            .shared
            .countdown
            .lock()
            .set_policy(policy, Instant::now());
        self.handle.shared.wake.notify_one();
        tracing::debug!(
            "Timeout policy set: enabled={}, idle={}s",
            policy.enabled,
            policy.idle_seconds
        );
    }

    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Cancel the countdown and wait for the driver task to exit
    pub async fn shutdown(&mut self) {
        self.disarm();
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn disarm(&self) {
        let mut countdown = self.handle.shared.countdown.lock();
        let policy = countdown.policy();
        countdown.set_policy(
            TimeoutPolicy {
                enabled: false,
                ..policy
            },
            Instant::now(),
        );
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.disarm();
            task.abort();
        }
    }
}

async fn run<F>(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>, on_expire: F)
where
    F: Fn() + Send + Sync + 'static,
{
    loop {
        let deadline = shared.countdown.lock().deadline();

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = shared.wake.notified() => {}
            _ = sleep_until_deadline(deadline) => fire_if_due(&shared, &on_expire),
        }
    }
    tracing::debug!("Timeout scheduler stopped");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn fire_if_due<F: Fn()>(shared: &Shared, on_expire: &F) {
    let mut countdown = shared.countdown.lock();
    if countdown.expire_if_due(Instant::now()) {
        tracing::info!(
            "No traffic for {}s, clearing logs",
            countdown.policy().idle_seconds
        );
        on_expire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = {
            let fired = fired.clone();
            move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        };
        (fired, hook)
    }

    #[test]
    fn test_countdown_transitions() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(TimeoutPolicy::enabled(30), t0);
        assert_eq!(countdown.deadline(), Some(t0 + Duration::from_secs(30)));

        assert!(!countdown.expire_if_due(t0 + Duration::from_secs(29)));
        assert!(countdown.reset(t0 + Duration::from_secs(29)));
        assert!(!countdown.expire_if_due(t0 + Duration::from_secs(58)));
        assert!(countdown.expire_if_due(t0 + Duration::from_secs(59)));
        assert_eq!(countdown.state(), CountdownState::Expired);

        // No self-rearm without traffic
        assert!(!countdown.expire_if_due(t0 + Duration::from_secs(500)));

        assert!(countdown.reset(t0 + Duration::from_secs(600)));
        assert_eq!(
            countdown.remaining(t0 + Duration::from_secs(610)),
            Some(Duration::from_secs(20))
        );
    }

    #[test]
    fn test_disabled_countdown_ignores_traffic() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(TimeoutPolicy::disabled(), t0);
        assert!(!countdown.reset(t0));
        assert_eq!(countdown.state(), CountdownState::Disabled);

        // Zero seconds is not an active policy
        countdown.set_policy(TimeoutPolicy::enabled(0), t0);
        assert_eq!(countdown.state(), CountdownState::Disabled);
    }

    #[test]
    fn test_reapplying_policy_after_expiry_waits_for_traffic() {
        let t0 = Instant::now();
        let mut countdown = Countdown::new(TimeoutPolicy::enabled(30), t0);
        assert!(countdown.expire_if_due(t0 + Duration::from_secs(30)));

        countdown.set_policy(TimeoutPolicy::enabled(10), t0 + Duration::from_secs(40));
        assert_eq!(countdown.state(), CountdownState::Expired);
        assert_eq!(countdown.policy(), TimeoutPolicy::enabled(10));
        assert!(!countdown.expire_if_due(t0 + Duration::from_secs(500)));

        assert!(countdown.reset(t0 + Duration::from_secs(600)));
        assert_eq!(countdown.deadline(), Some(t0 + Duration::from_secs(610)));

        // Disabling and re-enabling starts over
        countdown.expire_if_due(t0 + Duration::from_secs(610));
        countdown.set_policy(TimeoutPolicy::disabled(), t0 + Duration::from_secs(700));
        countdown.set_policy(TimeoutPolicy::enabled(10), t0 + Duration::from_secs(700));
        assert_eq!(countdown.deadline(), Some(t0 + Duration::from_secs(710)));
    }

    #[test]
    fn test_spawn_outside_runtime_is_an_error() {
        let result = TimeoutScheduler::spawn(TimeoutPolicy::enabled(30), || {});
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_clears_once() {
        let (fired, hook) = counter();
        let mut scheduler = TimeoutScheduler::spawn(TimeoutPolicy::enabled(30), hook).unwrap();

        sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), CountdownState::Expired);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.reset();
        sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_before_deadline_postpones_clear() {
        let (fired, hook) = counter();
        let mut scheduler = TimeoutScheduler::spawn(TimeoutPolicy::enabled(30), hook).unwrap();
        let handle = scheduler.handle();

        sleep(Duration::from_secs(29)).await;
        handle.reset();

        sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_cancels_pending_expiry() {
        let (fired, hook) = counter();
        let mut scheduler = TimeoutScheduler::spawn(TimeoutPolicy::enabled(30), hook).unwrap();

        sleep(Duration::from_secs(10)).await;
        scheduler.set_policy(TimeoutPolicy::disabled());
        assert_eq!(scheduler.state(), CountdownState::Disabled);

        scheduler.reset();
        sleep(Duration::from_secs(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        scheduler.set_policy(TimeoutPolicy::enabled(5));
        sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_no_pending_expiry() {
        let (fired, hook) = counter();
        let mut scheduler = TimeoutScheduler::spawn(TimeoutPolicy::enabled(1), hook).unwrap();

        scheduler.shutdown().await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), CountdownState::Disabled);
    }
}
