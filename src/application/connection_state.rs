// Connection lifecycle state machine and reconnect backoff
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What observers see on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub attempts: u32,
}

/// `delay(n) = min(base * 2^n, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30_000))
    }
}

/// Side effects the owner of the machine must carry out, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenTransport,
    CloseTransport,
    StartHeartbeat,
    StopHeartbeat,
    ScheduleReconnect(Duration),
    CancelReconnect,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
    backoff: Backoff,
}

impl ConnectionMachine {
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            max_attempts,
            backoff,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state,
            attempts: self.attempts,
        }
    }

    /// Explicit connect; a no-op while connected or already connecting
    pub fn connect_requested(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => Vec::new(),
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.state = ConnectionState::Connecting;
                vec![Effect::CancelReconnect, Effect::OpenTransport]
            }
        }
    }

    /// A scheduled reconnect fired
    pub fn reconnect_due(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.state = ConnectionState::Connecting;
                vec![Effect::OpenTransport]
            }
            _ => Vec::new(),
        }
    }

    pub fn transport_connected(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        vec![Effect::StartHeartbeat]
    }

    /// The transport dropped, for any reason
    pub fn transport_closed(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;
        let mut effects = vec![Effect::StopHeartbeat, Effect::CloseTransport];
        effects.extend(self.schedule_retry());
        effects
    }

    /// The transport could not be opened or failed mid-session
    pub fn transport_failed(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::StopHeartbeat, Effect::CloseTransport];
        effects.extend(self.schedule_retry());
        self.state = ConnectionState::Error;
        effects
    }

    /// Explicit teardown from any state
    pub fn disconnect_requested(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;
        self.attempts = 0;
        vec![
            Effect::CancelReconnect,
            Effect::StopHeartbeat,
            Effect::CloseTransport,
        ]
    }

    fn schedule_retry(&mut self) -> Option<Effect> {
        if self.attempts >= self.max_attempts {
            self.state = ConnectionState::Error;
            return None;
        }
        let delay = self.backoff.delay(self.attempts);
        self.attempts += 1;
        Some(Effect::ScheduleReconnect(delay))
    }
}
