//! Reconnect state machine.
//!
//! `Disconnected -> Connecting -> Connected -> (Disconnected | Reconnecting)`.
//! Every unintentional close schedules the next attempt after
//! `base_delay * 2^(attempt - 1)`; once `max_attempts` consecutive attempts
//! have failed the machine moves to `Failed` and stays there. The machine
//! never sleeps itself: callers ask [`ReconnectMachine::poll`] what to do
//! and the injected [`Clock`] decides whether the wait is over.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use chathub_core::config::ReconnectConfig;

use crate::connection::CloseReason;

use super::clock::{Clock, SystemClock};

/// Where the client is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Idle; nothing scheduled.
    Disconnected,
    /// A connection attempt (transport plus handshake) is in flight.
    Connecting,
    /// Handshake accepted.
    Connected,
    /// Waiting to retry.
    Reconnecting,
    /// Gave up; only [`ReconnectMachine::reset`] leaves this state.
    Failed,
}

/// Why the machine gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// The server refused the credentials; the user must log in again.
    Terminal(CloseReason),
    /// Too many consecutive failed attempts.
    AttemptsExhausted(u32),
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Open a transport and send a fresh handshake.
    Connect,
    /// Refresh the access token first, then connect.
    RefreshThenConnect,
    /// Ask again after this long.
    Wait(Duration),
    /// Nothing to do.
    Idle,
    /// Surface a fatal connectivity error.
    Fail(FailReason),
}

/// `base * 2^(attempt - 1)`, saturating. Attempt numbering starts at 1.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

/// Reconnect bookkeeping for one client.
#[derive(Debug)]
pub struct ReconnectMachine {
    state: ConnectionState,
    attempt: u32,
    base_delay: Duration,
    max_attempts: u32,
    retry_at: Option<Instant>,
    needs_refresh: bool,
    failure: Option<FailReason>,
    clock: Arc<dyn Clock>,
}

impl ReconnectMachine {
    /// Create a machine on the system clock.
    pub fn new(config: &ReconnectConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a machine on an injected clock.
    pub fn with_clock(config: &ReconnectConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_attempts: config.max_attempts,
            retry_at: None,
            needs_refresh: false,
            failure: None,
            clock,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful handshake.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Begin connecting from `Disconnected`.
    pub fn start(&mut self) -> ReconnectAction {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                ReconnectAction::Connect
            }
            _ => self.poll(),
        }
    }

    /// The handshake was accepted.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        self.retry_at = None;
        self.needs_refresh = false;
    }

    /// The user closed the connection on purpose.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.attempt = 0;
        self.retry_at = None;
        self.needs_refresh = false;
    }

    /// Leave `Failed` (for example after a fresh login).
    pub fn reset(&mut self) {
        self.failure = None;
        self.disconnect();
    }

    /// The connection or connection attempt ended with `close_code`
    /// (`None` when the transport failed without a close frame).
    pub fn on_closed(&mut self, close_code: Option<u16>) -> ReconnectAction {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return self.poll();
        }

        let reason = close_code.and_then(CloseReason::from_code);
        if let Some(reason) = reason.filter(CloseReason::is_terminal) {
            return self.fail(FailReason::Terminal(reason));
        }
        self.needs_refresh = reason == Some(CloseReason::Expired);

        if self.attempt >= self.max_attempts {
            return self.fail(FailReason::AttemptsExhausted(self.attempt));
        }
        self.attempt += 1;
        let delay = backoff_delay(self.base_delay, self.attempt);
        self.retry_at = Some(self.clock.now() + delay);
        self.state = ConnectionState::Reconnecting;
        ReconnectAction::Wait(delay)
    }

    /// What to do now.
    pub fn poll(&mut self) -> ReconnectAction {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Connected => ReconnectAction::Idle,
            ConnectionState::Connecting => self.connect_action(),
            ConnectionState::Failed => match self.failure {
                Some(reason) => ReconnectAction::Fail(reason),
                None => ReconnectAction::Idle,
            },
            ConnectionState::Reconnecting => {
                let now = self.clock.now();
                match self.retry_at {
                    Some(at) if at > now => ReconnectAction::Wait(at - now),
                    _ => {
                        self.retry_at = None;
                        self.state = ConnectionState::Connecting;
                        self.connect_action()
                    }
                }
            }
        }
    }

    fn connect_action(&self) -> ReconnectAction {
        if self.needs_refresh {
            ReconnectAction::RefreshThenConnect
        } else {
            ReconnectAction::Connect
        }
    }

    fn fail(&mut self, reason: FailReason) -> ReconnectAction {
        self.state = ConnectionState::Failed;
        self.retry_at = None;
        self.failure = Some(reason);
        ReconnectAction::Fail(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::ManualClock;

    fn machine(max_attempts: u32) -> (ReconnectMachine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = ReconnectConfig {
            base_delay_ms: 1000,
            max_attempts,
        };
        (ReconnectMachine::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 200), backoff_delay(base, 32));
    }

    #[test]
    fn test_schedule_and_give_up() {
        let (mut machine, clock) = machine(3);
        assert_eq!(machine.start(), ReconnectAction::Connect);
        machine.on_connected();
        assert_eq!(machine.state(), ConnectionState::Connected);

        for (attempt, secs) in [(1, 1), (2, 2), (3, 4)] {
            let action = machine.on_closed(Some(CloseReason::ServerShutdown.code()));
            assert_eq!(action, ReconnectAction::Wait(Duration::from_secs(secs)));
            assert_eq!(machine.attempt(), attempt);
            assert_eq!(machine.state(), ConnectionState::Reconnecting);

            clock.advance(Duration::from_millis(secs * 1000 - 1));
            assert_eq!(machine.poll(), ReconnectAction::Wait(Duration::from_millis(1)));
            clock.advance(Duration::from_millis(1));
            assert_eq!(machine.poll(), ReconnectAction::Connect);
            assert_eq!(machine.state(), ConnectionState::Connecting);
        }

        assert_eq!(
            machine.on_closed(None),
            ReconnectAction::Fail(FailReason::AttemptsExhausted(3))
        );
        assert_eq!(machine.state(), ConnectionState::Failed);
        assert_eq!(
            machine.poll(),
            ReconnectAction::Fail(FailReason::AttemptsExhausted(3))
        );
    }

    #[test]
    fn test_successful_handshake_resets_attempts() {
        let (mut machine, clock) = machine(2);
        machine.start();
        machine.on_connected();
        machine.on_closed(None);
        clock.advance(Duration::from_secs(1));
        machine.poll();
        machine.on_connected();
        assert_eq!(machine.attempt(), 0);
        assert_eq!(
            machine.on_closed(None),
            ReconnectAction::Wait(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_revoked_is_terminal() {
        let (mut machine, _) = machine(5);
        machine.start();
        machine.on_connected();
        assert_eq!(
            machine.on_closed(Some(CloseReason::Revoked.code())),
            ReconnectAction::Fail(FailReason::Terminal(CloseReason::Revoked))
        );
    }

    #[test]
    fn test_replaced_does_not_reconnect() {
        let (mut machine, clock) = machine(5);
        machine.start();
        machine.on_connected();
        assert_eq!(
            machine.on_closed(Some(CloseReason::Replaced.code())),
            ReconnectAction::Fail(FailReason::Terminal(CloseReason::Replaced))
        );
        clock.advance(Duration::from_secs(60));
        assert_eq!(
            machine.poll(),
            ReconnectAction::Fail(FailReason::Terminal(CloseReason::Replaced))
        );
        assert_eq!(machine.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_expired_refreshes_before_retry() {
        let (mut machine, clock) = machine(5);
        machine.start();
        machine.on_closed(Some(CloseReason::Expired.code()));
        clock.advance(Duration::from_secs(1));
        assert_eq!(machine.poll(), ReconnectAction::RefreshThenConnect);
        machine.on_connected();
        machine.on_closed(None);
        clock.advance(Duration::from_secs(1));
        assert_eq!(machine.poll(), ReconnectAction::Connect);
    }

    #[test]
    fn test_intentional_disconnect_stops() {
        let (mut machine, _) = machine(5);
        machine.start();
        machine.on_connected();
        machine.disconnect();
        assert_eq!(machine.on_closed(None), ReconnectAction::Idle);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}
