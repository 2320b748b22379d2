use crate::codec::RespValue;
use crate::multiplexer::config::ServerRole;
use crate::multiplexer::events::MultiplexerEvent;
use crate::multiplexer::retry::ReconnectRetryPolicy;
use crate::network::connection::{PendingCommand, RedirectedCommand};
use crate::network::{
    lock, CommandErrors, ConnectionFailureType, ConnectionState, ConnectionType, PhysicalConnection, ServerInfo,
    Transition,
};
use embedded_nal::{SocketAddr, TcpClientStack};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkStatus {
    /// Never connected
    Unknown,
    Up,
    Down,
}

/// What happened during one poll of a connection slot
#[derive(Default)]
pub(crate) struct SlotReport {
    pub events: Vec<MultiplexerEvent>,
    /// Server info of a connection established during this poll
    pub established: Option<ServerInfo>,
    pub failed: bool,
    pub redirects: Vec<RedirectedCommand>,
    pub pushes: Vec<RespValue>,
}

/// A physical connection with its reconnect bookkeeping
pub(crate) struct ConnectionSlot<N: TcpClientStack> {
    pub connection: PhysicalConnection<N>,
    pub status: LinkStatus,
    /// Failed attempts since the last success
    pub attempts: u32,
    pub next_attempt_at: Option<u64>,
}

impl<N: TcpClientStack> ConnectionSlot<N> {
    pub fn new(connection: PhysicalConnection<N>) -> Self {
        Self {
            connection,
            status: LinkStatus::Unknown,
            attempts: 0,
            next_attempt_at: None,
        }
    }

    /// Reconnects if due, polls the connection and translates its transitions into events
    pub fn poll(&mut self, now: u64, retry: &dyn ReconnectRetryPolicy) -> SlotReport {
        let endpoint = self.connection.endpoint();
        let kind = self.connection.kind();

        if self.connection.state() == ConnectionState::Failed {
            match self.next_attempt_at {
                Some(due) if now >= due => self.reconnect(),
                _ => {}
            }
        }

        let mut report = SlotReport::default();
        for transition in self.connection.poll(now) {
            match transition {
                Transition::Established => {
                    if self.status == LinkStatus::Down {
                        report.events.push(MultiplexerEvent::ConnectionRestored {
                            endpoint,
                            connection_type: kind,
                        });
                    }

                    self.status = LinkStatus::Up;
                    self.attempts = 0;
                    self.next_attempt_at = None;
                    report.established = Some(self.connection.info().clone());
                }
                Transition::Failed { failure, message } => {
                    if self.status != LinkStatus::Down {
                        report.events.push(MultiplexerEvent::ConnectionFailed {
                            endpoint,
                            connection_type: kind,
                            failure,
                            message,
                        });
                    }

                    self.status = LinkStatus::Down;
                    self.attempts = self.attempts.saturating_add(1);
                    self.next_attempt_at = Some(now.saturating_add(retry.delay(self.attempts).0 as u64));
                    report.established = None;
                    report.failed = true;
                }
            }
        }

        report.redirects = self.connection.take_redirects();
        report.pushes = self.connection.take_pushes();
        report
    }

    /// Starts a new connection attempt right away
    pub fn reconnect(&mut self) {
        log::info!(
            "Reconnecting to {} ({}, attempt {})",
            self.connection.endpoint(),
            self.connection.kind(),
            self.attempts.max(1)
        );

        self.next_attempt_at = None;
        self.connection.reconnect();
    }

    pub fn is_up(&self) -> bool {
        self.connection.is_established()
    }
}

/// Handshake results relevant for routing
#[derive(Debug, Clone, Default)]
pub(crate) struct EndpointInfo {
    /// Role reported by ROLE
    pub detected: Option<ServerRole>,
    pub tie_breaker: Option<bytes::Bytes>,
}

/// One logical server with separate connections for commands and pub/sub
pub(crate) struct ServerEndpoint<N: TcpClientStack> {
    pub address: SocketAddr,
    /// Configured role hint
    pub hint: ServerRole,
    /// Effective role used for routing
    pub role: Mutex<ServerRole>,
    pub info: Mutex<EndpointInfo>,
    pub interactive: Mutex<ConnectionSlot<N>>,
    pub subscription: Mutex<ConnectionSlot<N>>,
    /// Commands waiting for the interactive connection
    pub backlog: Mutex<VecDeque<PendingCommand>>,
    /// Set once the endpoint left the cluster topology
    retired: AtomicBool,
}

impl<N: TcpClientStack> ServerEndpoint<N> {
    pub fn new(
        address: SocketAddr,
        hint: ServerRole,
        interactive: PhysicalConnection<N>,
        subscription: PhysicalConnection<N>,
    ) -> Self {
        Self {
            address,
            hint,
            role: Mutex::new(hint),
            info: Mutex::new(EndpointInfo::default()),
            interactive: Mutex::new(ConnectionSlot::new(interactive)),
            subscription: Mutex::new(ConnectionSlot::new(subscription)),
            backlog: Mutex::new(VecDeque::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn slot(&self, kind: ConnectionType) -> &Mutex<ConnectionSlot<N>> {
        match kind {
            ConnectionType::Interactive => &self.interactive,
            ConnectionType::Subscription => &self.subscription,
        }
    }

    pub fn is_up(&self, kind: ConnectionType) -> bool {
        lock(self.slot(kind)).is_up()
    }

    /// True once both connections either succeeded or failed at least once
    pub fn is_settled(&self) -> bool {
        let interactive = lock(&self.interactive).status;
        let subscription = lock(&self.subscription).status;
        interactive != LinkStatus::Unknown && subscription != LinkStatus::Unknown
    }

    pub fn role(&self) -> ServerRole {
        *lock(&self.role)
    }

    pub fn set_role(&self, role: ServerRole) {
        *lock(&self.role) = role;
    }

    /// Closes both connections and fails everything still waiting for this endpoint
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);

        let message = format!("{} left the cluster topology", self.address);
        lock(&self.interactive).connection.fail(ConnectionFailureType::InternalFailure, &message);
        lock(&self.subscription).connection.fail(ConnectionFailureType::InternalFailure, &message);

        let backlog: Vec<PendingCommand> = lock(&self.backlog).drain(..).collect();
        for command in backlog {
            command.complete(Err(CommandErrors::NoConnectionAvailable(message.clone())));
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}
