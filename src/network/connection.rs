use crate::codec::{CommandFrame, DecodeOptions, ReceiveArena, RespValue};
use crate::commands::auth::AuthCommand;
use crate::commands::cluster::ClusterSlotsCommand;
use crate::commands::get::GetCommand;
use crate::commands::hello::HelloCommand;
use crate::commands::ping::PingCommand;
use crate::commands::role::RoleCommand;
use crate::commands::{Command, CommandBuilder, CommandFlags};
use crate::multiplexer::slots::{parse_redirect, Redirect};
use crate::network::error::{CommandErrors, ConnectionFailureType, TimeoutDiagnostics};
use crate::network::future::Completion;
use crate::network::handler::{ConnectionError, ConnectionOptions};
use crate::network::response::ResponseBuffer;
use crate::network::timeout::Timeout;
use crate::processors::{HelloResponse, NullableBytesProcessor, ResultProcessor, Role, SlotRange};
use bytes::{Buf, Bytes, BytesMut};
use core::fmt::{Display, Formatter};
use embedded_nal::{SocketAddr, TcpClientStack, TcpError};
use std::collections::VecDeque;
use std::sync::Arc;

/// Max. number of socket reads per poll
const MAX_READS_PER_POLL: usize = 64;

/// Purpose of a physical connection. Each endpoint keeps one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Interactive,
    Subscription,
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionType::Interactive => f.write_str("interactive"),
            ConnectionType::Subscription => f.write_str("subscription"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initializing,
    Connecting,
    ConnectedEstablished,
    Failed,
}

/// State change observed during a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Handshake completed
    Established,
    /// Connection failed, all pending commands have been failed
    Failed {
        failure: ConnectionFailureType,
        message: String,
    },
}

/// Server details queried during the handshake
#[derive(Debug, Clone, Default)]
pub struct Probes {
    /// Query ROLE
    pub role: bool,
    /// GET the given tie-breaker key
    pub tie_breaker: Option<Bytes>,
    /// Query CLUSTER SLOTS
    pub cluster_slots: bool,
}

/// Results of the handshake
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub hello: Option<HelloResponse>,
    pub role: Option<Role>,
    pub tie_breaker: Option<Bytes>,
    /// None if the server is not a cluster node
    pub slots: Option<Vec<SlotRange>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeStep {
    Auth,
    Hello,
    ClientName,
    Role,
    TieBreaker,
    ClusterSlots,
}

/// Receiver of a reply
pub(crate) enum ReplyTarget {
    Caller(Arc<dyn Completion>),
    Handshake(HandshakeStep),
    Heartbeat,
    /// Internal command without caller, errors are logged
    Discard,
}

/// A request on its way to the server or waiting for its reply
pub(crate) struct PendingCommand {
    pub frame: CommandFrame,
    pub target: ReplyTarget,
    pub timeout: Timeout,
    pub flags: CommandFlags,
    pub key: Option<Bytes>,

    /// Number of MOVED/ASK hops so far
    pub redirects: usize,
    pub submitted_at: u64,

    /// Replies of the attached preamble not yet received
    skip: usize,
}

impl PendingCommand {
    pub fn new(frame: CommandFrame, completion: Arc<dyn Completion>, timeout: Timeout, now: u64) -> Self {
        Self::with_target(frame, ReplyTarget::Caller(completion), timeout, now)
    }

    pub fn with_target(frame: CommandFrame, target: ReplyTarget, timeout: Timeout, now: u64) -> Self {
        Self {
            frame,
            target,
            timeout,
            flags: CommandFlags::empty(),
            key: None,
            redirects: 0,
            submitted_at: now,
            skip: 0,
        }
    }

    /// True once the caller got an outcome, e.g. by timeout or cancellation
    pub fn is_done(&self) -> bool {
        match &self.target {
            ReplyTarget::Caller(completion) => completion.is_completed(),
            _ => false,
        }
    }

    /// Completes the caller, if any
    pub fn complete(&self, outcome: Result<RespValue, CommandErrors>) -> bool {
        match &self.target {
            ReplyTarget::Caller(completion) => completion.complete(outcome),
            _ => false,
        }
    }

    pub fn diagnostics(&self, now: u64, endpoint: Option<SocketAddr>) -> TimeoutDiagnostics {
        TimeoutDiagnostics {
            command: self.frame.command_name().to_string(),
            endpoint,
            sent_bytes: self.frame.len(),
            elapsed_micros: now.saturating_sub(self.submitted_at),
            last_read_micros: None,
            last_write_micros: None,
            pending: 0,
        }
    }
}

/// Reply redirected by MOVED or ASK, handed over to the multiplexer
pub(crate) struct RedirectedCommand {
    pub command: PendingCommand,
    pub redirect: Redirect,
    pub origin: SocketAddr,
}

/// One socket-level duplex stream to a server
///
/// Frames are written in issue order, replies are matched to the oldest pending command. Timed
/// out and cancelled commands stay in the queue until their reply arrived, so the order is never
/// broken. The connection is driven by [PhysicalConnection::poll].
pub struct PhysicalConnection<N: TcpClientStack> {
    endpoint: SocketAddr,
    kind: ConnectionType,
    options: Arc<ConnectionOptions>,
    probes: Probes,

    stack: N,
    socket: Option<N::TcpSocket>,
    state: ConnectionState,
    tcp_connected: bool,
    connect_timeout: Timeout,

    arena: ReceiveArena,
    buffer: ResponseBuffer,

    /// Encoded but not yet written data
    outgoing: BytesMut,
    pending: VecDeque<PendingCommand>,
    handshake_remaining: usize,
    info: ServerInfo,

    heartbeat_sent_at: Option<u64>,
    last_heartbeat: u64,
    last_read: Option<u64>,
    last_write: Option<u64>,
    now: u64,

    last_failure: Option<(ConnectionFailureType, String)>,
    transitions: Vec<Transition>,
    redirects: Vec<RedirectedCommand>,
    pushes: Vec<RespValue>,
}

impl<N: TcpClientStack> PhysicalConnection<N> {
    pub fn new(
        endpoint: SocketAddr,
        kind: ConnectionType,
        options: Arc<ConnectionOptions>,
        probes: Probes,
        stack: N,
    ) -> Self {
        let chunk_size = options.chunk_size;
        Self {
            endpoint,
            kind,
            options,
            probes,
            stack,
            socket: None,
            state: ConnectionState::Initializing,
            tcp_connected: false,
            connect_timeout: Timeout::never(),
            arena: ReceiveArena::new(chunk_size),
            buffer: ResponseBuffer::new(DecodeOptions::default()),
            outgoing: BytesMut::new(),
            pending: VecDeque::new(),
            handshake_remaining: 0,
            info: ServerInfo::default(),
            heartbeat_sent_at: None,
            last_heartbeat: 0,
            last_read: None,
            last_write: None,
            now: 0,
            last_failure: None,
            transitions: vec![],
            redirects: vec![],
            pushes: vec![],
        }
    }

    /// Drives connect, handshake, writing, reading, timeouts and heartbeats
    pub fn poll(&mut self, now: u64) -> Vec<Transition> {
        self.now = now;

        match self.state {
            ConnectionState::Initializing => self.open(now),
            ConnectionState::Connecting if !self.tcp_connected => self.connect(now),
            _ => {}
        }

        if self.tcp_connected {
            self.flush();
            self.receive(now);
            self.check_timeouts(now);
            self.heartbeat(now);
            self.flush();
        }

        core::mem::take(&mut self.transitions)
    }

    /// Writes the command, if the connection is established. Otherwise it is handed back.
    pub(crate) fn send(&mut self, command: PendingCommand) -> Result<(), PendingCommand> {
        if self.state != ConnectionState::ConnectedEstablished {
            return Err(command);
        }

        self.enqueue(command);
        self.flush();
        Ok(())
    }

    /// Fails the connection: closes the socket and fails all pending commands
    pub fn fail(&mut self, failure: ConnectionFailureType, message: &str) {
        self.fail_pending_with(failure, message.to_string(), None);
    }

    /// Simulates a connection failure of the given category
    pub fn simulate_failure(&mut self, failure: ConnectionFailureType) {
        self.fail(failure, "simulated connection failure");
    }

    /// Starts a new connection attempt on the next poll. Only has an effect on failed connections.
    pub fn reconnect(&mut self) {
        if self.state == ConnectionState::Failed {
            self.state = ConnectionState::Initializing;
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn kind(&self) -> ConnectionType {
        self.kind
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::ConnectedEstablished
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn last_failure(&self) -> Option<&(ConnectionFailureType, String)> {
        self.last_failure.as_ref()
    }

    /// Number of commands waiting for a reply, including timed out ones
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn take_redirects(&mut self) -> Vec<RedirectedCommand> {
        core::mem::take(&mut self.redirects)
    }

    pub(crate) fn take_pushes(&mut self) -> Vec<RespValue> {
        core::mem::take(&mut self.pushes)
    }

    fn open(&mut self, now: u64) {
        self.buffer.clear();
        self.outgoing.clear();
        self.info = ServerInfo::default();
        self.tcp_connected = false;
        self.heartbeat_sent_at = None;

        match self.stack.socket() {
            Ok(socket) => self.socket = Some(socket),
            Err(error) => {
                let message = format!("{}: {:?}", ConnectionError::TcpSocketError, error);
                self.fail_pending_with(ConnectionFailureType::UnableToConnect, message, None);
                return;
            }
        }

        self.state = ConnectionState::Connecting;
        self.connect_timeout = Timeout::starting_at(now, self.options.connect_timeout);
        self.connect(now);
    }

    fn connect(&mut self, now: u64) {
        let socket = match self.socket.as_mut() {
            Some(socket) => socket,
            None => return self.fail(ConnectionFailureType::InternalFailure, "socket missing"),
        };

        match self.stack.connect(socket, self.endpoint) {
            Ok(()) => {
                self.tcp_connected = true;
                self.start_handshake(now);
            }
            Err(nb::Error::WouldBlock) => {
                if self.connect_timeout.expired_at(now) {
                    let message = ConnectionError::ConnectTimeout.to_string();
                    self.fail_pending_with(ConnectionFailureType::UnableToConnect, message, None);
                }
            }
            Err(nb::Error::Other(error)) => {
                let message = format!("{}: {:?}", ConnectionError::TcpConnectionFailed, error);
                self.fail_pending_with(ConnectionFailureType::UnableToConnect, message, None);
            }
        }
    }

    /// Queues AUTH, HELLO, CLIENT SETNAME and the configured probes
    fn start_handshake(&mut self, now: u64) {
        let mut steps: Vec<(CommandBuilder, HandshakeStep)> = vec![];

        if let Some(credentials) = &self.options.credentials {
            steps.push((AuthCommand::from(credentials).encode(), HandshakeStep::Auth));
        }

        if self.options.protocol.requires_hello() {
            let hello = HelloCommand::new(self.options.protocol.version());
            steps.push((hello.encode(), HandshakeStep::Hello));
        }

        if let Some(name) = &self.options.client_name {
            let builder = CommandBuilder::new("CLIENT")
                .arg_static("SETNAME")
                .arg(&Bytes::from(name.clone()));
            steps.push((builder, HandshakeStep::ClientName));
        }

        if self.probes.role {
            steps.push((RoleCommand.encode(), HandshakeStep::Role));
        }

        if let Some(key) = &self.probes.tie_breaker {
            steps.push((GetCommand::new(key.clone()).encode(), HandshakeStep::TieBreaker));
        }

        if self.probes.cluster_slots {
            steps.push((ClusterSlotsCommand.encode(), HandshakeStep::ClusterSlots));
        }

        self.handshake_remaining = steps.len();
        for (builder, step) in steps {
            let command = PendingCommand::with_target(
                builder.to_frame(),
                ReplyTarget::Handshake(step),
                self.connect_timeout,
                now,
            );
            self.enqueue(command);
        }

        if self.handshake_remaining == 0 {
            self.establish(now);
        }
    }

    fn establish(&mut self, now: u64) {
        self.state = ConnectionState::ConnectedEstablished;
        self.last_heartbeat = now;
        log::info!("Connection to {} ({}) established", self.endpoint, self.kind);
        self.transitions.push(Transition::Established);
    }

    fn enqueue(&mut self, mut command: PendingCommand) {
        self.outgoing.extend_from_slice(command.frame.as_bytes());
        command.skip = command.frame.preamble_replies();
        self.pending.push_back(command);
    }

    fn flush(&mut self) {
        while !self.outgoing.is_empty() {
            let socket = match self.socket.as_mut() {
                Some(socket) => socket,
                None => return,
            };

            match self.stack.send(socket, &self.outgoing) {
                Ok(0) | Err(nb::Error::WouldBlock) => return,
                Ok(count) => {
                    self.outgoing.advance(count.min(self.outgoing.len()));
                    self.last_write = Some(self.now);
                }
                Err(nb::Error::Other(error)) => {
                    let message = format!("send failed: {:?}", error);
                    self.fail_pending_with(ConnectionFailureType::from_tcp(error.kind()), message, None);
                    return;
                }
            }
        }
    }

    fn receive(&mut self, now: u64) {
        for _ in 0..MAX_READS_PER_POLL {
            if self.state == ConnectionState::Failed {
                return;
            }

            let socket = match self.socket.as_mut() {
                Some(socket) => socket,
                None => return,
            };
            let stack = &mut self.stack;

            match self.arena.fill(|buffer| stack.receive(socket, buffer)) {
                Ok(chunk) if chunk.is_empty() => {
                    self.fail(ConnectionFailureType::SocketClosed, "connection closed by peer");
                    return;
                }
                Ok(chunk) => {
                    self.last_read = Some(now);
                    self.buffer.append(chunk);
                    self.process_buffer(now);
                }
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(error)) => {
                    let message = format!("receive failed: {:?}", error);
                    self.fail_pending_with(ConnectionFailureType::from_tcp(error.kind()), message, None);
                    return;
                }
            }
        }
    }

    fn process_buffer(&mut self, now: u64) {
        while self.state != ConnectionState::Failed {
            match self.buffer.next() {
                Ok(Some(value)) => self.dispatch(value, now),
                Ok(None) => return,
                Err(error) => {
                    let message = error.to_string();
                    let pending_error = CommandErrors::ProtocolViolation(error);
                    self.fail_pending_with(ConnectionFailureType::ProtocolFailure, message, Some(pending_error));
                }
            }
        }
    }

    /// Out-of-band messages bypass the FIFO
    fn is_push_message(&self, value: &RespValue) -> bool {
        let elements = match value.skip_attributes() {
            RespValue::Push(elements) => elements,
            RespValue::Array(Some(elements)) if self.kind == ConnectionType::Subscription => elements,
            _ => return false,
        };

        let kind = elements.first().and_then(RespValue::as_str).map(str::to_ascii_lowercase);
        match kind.as_deref() {
            Some("message" | "pmessage" | "smessage") => true,
            Some(
                "subscribe" | "psubscribe" | "ssubscribe" | "unsubscribe" | "punsubscribe" | "sunsubscribe" | "pong",
            ) => false,
            _ => matches!(value.skip_attributes(), RespValue::Push(_)),
        }
    }

    fn dispatch(&mut self, value: RespValue, now: u64) {
        if self.is_push_message(&value) {
            self.pushes.push(value);
            return;
        }

        let front = match self.pending.front_mut() {
            Some(front) => front,
            None => {
                let message = format!("unexpected {} without pending command", value.kind());
                return self.fail(ConnectionFailureType::ProtocolFailure, &message);
            }
        };

        if front.skip > 0 {
            front.skip -= 1;
            if let Some(message) = value.error_message() {
                log::warn!("Preamble of {} to {} failed: {}", front.frame.command_name(), self.endpoint, message);
            }
            return;
        }

        let command = match self.pending.pop_front() {
            Some(command) => command,
            None => return,
        };

        let redirect = match &command.target {
            ReplyTarget::Caller(completion)
                if self.kind == ConnectionType::Interactive
                    && !completion.is_completed()
                    && !command.flags.contains(CommandFlags::NO_REDIRECT) =>
            {
                parse_redirect(&value)
            }
            _ => None,
        };

        if let Some(redirect) = redirect {
            self.redirects.push(RedirectedCommand {
                command,
                redirect,
                origin: self.endpoint,
            });
            return;
        }

        match command.target {
            ReplyTarget::Caller(completion) => {
                if !completion.complete(Ok(value)) {
                    log::trace!("Discarding late reply to {} from {}", command.frame.command_name(), self.endpoint);
                }
            }
            ReplyTarget::Handshake(step) => self.handshake_reply(step, value, now),
            ReplyTarget::Heartbeat => self.heartbeat_sent_at = None,
            ReplyTarget::Discard => {
                if let Some(message) = value.error_message() {
                    log::warn!("{} on {} failed: {}", command.frame.command_name(), self.endpoint, message);
                }
            }
        }
    }

    fn handshake_reply(&mut self, step: HandshakeStep, value: RespValue, now: u64) {
        let error = value.error_message();

        match step {
            HandshakeStep::Auth => {
                if let Some(message) = error {
                    let error = ConnectionError::AuthenticationError(CommandErrors::ErrorResponse(message));
                    return self.fail_pending_with(ConnectionFailureType::AuthenticationFailure, error.to_string(), None);
                }
            }
            HandshakeStep::Hello => {
                let result = match error {
                    Some(message) => Err(CommandErrors::ErrorResponse(message)),
                    None => HelloCommand::default()
                        .eval_response(value)
                        .map_err(CommandErrors::CommandResponseViolation),
                };

                match result {
                    Ok(response) => self.info.hello = Some(response),
                    Err(error) => {
                        let error = ConnectionError::ProtocolSwitchError(error);
                        return self.fail_pending_with(ConnectionFailureType::ProtocolFailure, error.to_string(), None);
                    }
                }
            }
            HandshakeStep::ClientName => {
                if let Some(message) = error {
                    log::warn!("CLIENT SETNAME on {} failed: {}", self.endpoint, message);
                }
            }
            HandshakeStep::Role => match RoleCommand.eval_response(value) {
                Ok(role) if error.is_none() => self.info.role = Some(role),
                _ => log::warn!("Unable to detect role of {}", self.endpoint),
            },
            HandshakeStep::TieBreaker => {
                if error.is_none() {
                    self.info.tie_breaker = NullableBytesProcessor.process(&value).ok().flatten();
                }
            }
            HandshakeStep::ClusterSlots => match error {
                Some(message) => log::debug!("{} is not a cluster node: {}", self.endpoint, message),
                None => match ClusterSlotsCommand.eval_response(value) {
                    Ok(slots) => self.info.slots = Some(slots),
                    Err(error) => log::warn!("Invalid CLUSTER SLOTS reply of {}: {}", self.endpoint, error),
                },
            },
        }

        self.handshake_remaining = self.handshake_remaining.saturating_sub(1);
        if self.handshake_remaining == 0 && self.state == ConnectionState::Connecting {
            self.establish(now);
        }
    }

    fn check_timeouts(&mut self, now: u64) {
        if self.state == ConnectionState::Failed {
            return;
        }

        let mut handshake_expired = false;
        for command in self.pending.iter() {
            if !command.timeout.expired_at(now) {
                continue;
            }

            match &command.target {
                ReplyTarget::Caller(completion) if !completion.is_completed() => {
                    let mut diagnostics = command.diagnostics(now, Some(self.endpoint));
                    diagnostics.last_read_micros = self.last_read.map(|read| now.saturating_sub(read));
                    diagnostics.last_write_micros = self.last_write.map(|write| now.saturating_sub(write));
                    diagnostics.pending = self.pending.len();

                    log::debug!("{}", diagnostics);
                    completion.complete(Err(CommandErrors::Timeout(diagnostics)));
                }
                ReplyTarget::Handshake(_) => handshake_expired = true,
                _ => {}
            }
        }

        if handshake_expired {
            let message = ConnectionError::ConnectTimeout.to_string();
            self.fail_pending_with(ConnectionFailureType::UnableToConnect, message, None);
        }
    }

    fn heartbeat(&mut self, now: u64) {
        let interval = self.options.heartbeat_interval.0 as u64;
        if self.state != ConnectionState::ConnectedEstablished || interval == 0 {
            return;
        }

        if let Some(sent_at) = self.heartbeat_sent_at {
            let timeout = self.options.heartbeat_timeout.0 as u64;
            if timeout > 0 && now.saturating_sub(sent_at) >= timeout {
                let message = format!("no heartbeat reply within {}us", timeout);
                self.fail_pending_with(ConnectionFailureType::HeartbeatFailure, message, None);
            }
            return;
        }

        if now.saturating_sub(self.last_heartbeat) >= interval {
            let frame = PingCommand::new(None).encode().to_frame();
            self.enqueue(PendingCommand::with_target(frame, ReplyTarget::Heartbeat, Timeout::never(), now));
            self.heartbeat_sent_at = Some(now);
            self.last_heartbeat = now;
        }
    }

    fn fail_pending_with(&mut self, failure: ConnectionFailureType, message: String, error: Option<CommandErrors>) {
        if self.state == ConnectionState::Failed {
            return;
        }

        log::warn!("Connection to {} ({}) failed: {} ({})", self.endpoint, self.kind, failure, message);

        self.state = ConnectionState::Failed;
        if let Some(socket) = self.socket.take() {
            let _ = self.stack.close(socket);
        }

        self.tcp_connected = false;
        self.heartbeat_sent_at = None;
        self.handshake_remaining = 0;
        self.buffer.clear();
        self.outgoing.clear();

        let error = error.unwrap_or_else(|| CommandErrors::ConnectionFailure {
            failure,
            endpoint: self.endpoint,
            message: message.clone(),
        });
        for command in self.pending.drain(..) {
            command.complete(Err(error.clone()));
        }

        self.last_failure = Some((failure, message.clone()));
        self.transitions.push(Transition::Failed { failure, message });
    }
}

impl<N: TcpClientStack> Drop for PhysicalConnection<N> {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = self.stack.close(socket);
        }
    }
}
