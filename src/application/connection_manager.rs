// Connection manager - Owns the real-time link, reconnects with backoff, feeds the device store
use crate::application::connection_state::{
    Backoff, ConnectionMachine, ConnectionSnapshot, ConnectionState, Effect,
};
use crate::application::device_store::DeviceStore;
use crate::application::timer::Timer;
use crate::application::transport::{Transport, TransportEvent};
use crate::domain::events::OutboundCommand;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub backoff: Backoff,
    pub max_attempts: u32,
    pub heartbeat_interval: Duration,
    /// Re-send known subscriptions after every successful reconnect
    pub resubscribe_on_reconnect: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            max_attempts: 10,
            heartbeat_interval: Duration::from_secs(30),
            resubscribe_on_reconnect: true,
        }
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<DeviceStore>,
    options: ConnectionOptions,
    control: Mutex<Control>,
    status: watch::Sender<ConnectionSnapshot>,
}

struct Control {
    machine: ConnectionMachine,
    /// Bumped whenever a link is opened or torn down; work tagged with an
    /// older epoch is ignored
    epoch: u64,
    outbound: Option<mpsc::Sender<OutboundCommand>>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Timer,
    reconnect: Timer,
    subscriptions: BTreeSet<String>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<DeviceStore>,
        options: ConnectionOptions,
    ) -> Self {
        let machine = ConnectionMachine::new(options.backoff, options.max_attempts);
        let (status, _) = watch::channel(machine.snapshot());

        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                options,
                control: Mutex::new(Control {
                    machine,
                    epoch: 0,
                    outbound: None,
                    reader: None,
                    heartbeat: Timer::default(),
                    reconnect: Timer::default(),
                    subscriptions: BTreeSet::new(),
                }),
                status,
            }),
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        *self.inner.status.borrow()
    }

    /// Observe every status transition
    pub fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.status.subscribe()
    }

    /// Start connecting. Does nothing while connected or connecting.
    pub fn connect(&self) {
        let mut control = self.inner.control();
        let effects = control.machine.connect_requested();
        if effects.is_empty() {
            tracing::debug!("Connect ignored, already {:?}", control.machine.state());
            return;
        }
        tracing::info!("Connecting to event source");
        self.inner.run(&mut control, effects);
        self.inner.publish(&control);
    }

    /// Tear everything down; no reconnect is attempted after this returns
    pub fn disconnect(&self) {
        let mut control = self.inner.control();
        control.epoch += 1;
        let effects = control.machine.disconnect_requested();
        self.inner.run(&mut control, effects);
        self.inner.publish(&control);
        tracing::info!("Disconnected from event source");
    }

    /// Forwarded only while connected; otherwise dropped
    pub fn subscribe(&self, device_ids: Vec<String>) -> bool {
        let mut control = self.inner.control();
        let sent = Inner::send_now(&control, OutboundCommand::subscribe(device_ids.clone()));
        if sent {
            control.subscriptions.extend(device_ids);
        }
        sent
    }

    pub fn unsubscribe(&self, device_ids: Vec<String>) -> bool {
        let mut control = self.inner.control();
        let sent = Inner::send_now(&control, OutboundCommand::unsubscribe(device_ids.clone()));
        if sent {
            for id in &device_ids {
                control.subscriptions.remove(id);
            }
        }
        sent
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.control().subscriptions.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.control().reconnect.is_armed()
    }

    #[cfg(test)]
    pub fn has_heartbeat(&self) -> bool {
        self.inner.control().heartbeat.is_armed()
    }
}

impl Inner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, control: &Control) {
        self.status.send_replace(control.machine.snapshot());
    }

    fn send_now(control: &Control, command: OutboundCommand) -> bool {
        if control.machine.state() != ConnectionState::Connected {
            tracing::debug!("Dropping {:?} while {:?}", command, control.machine.state());
            return false;
        }
        let Some(outbound) = control.outbound.as_ref() else {
            return false;
        };
        match outbound.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to queue outbound command: {}", e);
                false
            }
        }
    }

    fn run(self: &Arc<Self>, control: &mut Control, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenTransport => {
                    control.epoch += 1;
                    let epoch = control.epoch;
                    tokio::spawn(self.clone().open_link(epoch));
                }
                Effect::CloseTransport => {
                    control.outbound = None;
                    if let Some(reader) = control.reader.take() {
                        reader.abort();
                    }
                }
                Effect::StartHeartbeat => {
                    let Some(outbound) = control.outbound.clone() else {
                        continue;
                    };
                    let period = self.options.heartbeat_interval;
                    if period.is_zero() {
                        tracing::warn!("Heartbeat disabled, interval is zero");
                        continue;
                    }
                    control.heartbeat.arm(async move {
                        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                        loop {
                            ticker.tick().await;
                            if outbound.send(OutboundCommand::Heartbeat).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Effect::StopHeartbeat => {
                    control.heartbeat.cancel();
                }
                Effect::ScheduleReconnect(delay) => {
                    let epoch = control.epoch;
                    let inner = self.clone();
                    tracing::info!(
                        "Reconnecting in {:?} (attempt {})",
                        delay,
                        control.machine.attempts()
                    );
                    control.reconnect.arm(async move {
                        tokio::time::sleep(delay).await;
                        inner.reconnect_fired(epoch);
                    });
                }
                Effect::CancelReconnect => {
                    control.reconnect.cancel();
                }
            }
        }
    }

    fn reconnect_fired(self: &Arc<Self>, epoch: u64) {
        let mut control = self.control();
        if control.epoch != epoch {
            return;
        }
        control.reconnect.disarm();
        let effects = control.machine.reconnect_due();
        self.run(&mut control, effects);
        self.publish(&control);
    }

    async fn open_link(self: Arc<Self>, epoch: u64) {
        let result = self.transport.open().await;

        let mut control = self.control();
        if control.epoch != epoch {
            tracing::debug!("Discarding superseded connection attempt");
            return;
        }

        match result {
            Ok(link) => {
                control.outbound = Some(link.outbound);
                let effects = control.machine.transport_connected();
                self.run(&mut control, effects);
                tracing::info!("Connected to event source");

                if self.options.resubscribe_on_reconnect && !control.subscriptions.is_empty() {
                    let ids: Vec<String> = control.subscriptions.iter().cloned().collect();
                    tracing::debug!("Restoring {} subscriptions", ids.len());
                    Self::send_now(&control, OutboundCommand::subscribe(ids));
                }

                control.reader = Some(tokio::spawn(self.clone().read_link(epoch, link.inbound)));
            }
            Err(e) => {
                tracing::warn!("Connection attempt failed: {}", e);
                let effects = control.machine.transport_failed();
                self.run(&mut control, effects);
            }
        }
        self.publish(&control);
    }

    async fn read_link(self: Arc<Self>, epoch: u64, mut inbound: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Message(message) => {
                    if self.control().epoch != epoch {
                        return;
                    }
                    if let Some(device_id) = message.device_id() {
                        tracing::debug!("Inbound event for device {}", device_id);
                    }
                    self.store.apply_event(message);
                }
                TransportEvent::Closed(reason) => {
                    tracing::info!(
                        "Event source closed the connection: {}",
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    self.link_lost(epoch, false);
                    return;
                }
                TransportEvent::Failed(e) => {
                    tracing::warn!("Event source connection failed: {}", e);
                    self.link_lost(epoch, true);
                    return;
                }
            }
        }
        self.link_lost(epoch, false);
    }

    fn link_lost(self: &Arc<Self>, epoch: u64, failed: bool) {
        let mut control = self.control();
        if control.epoch != epoch {
            return;
        }
        // Called from the reader itself, so detach instead of aborting
        control.reader = None;
        let effects = if failed {
            control.machine.transport_failed()
        } else {
            control.machine.transport_closed()
        };
        self.run(&mut control, effects);
        self.publish(&control);
    }
}
