//! In-memory Redis servers behind a fake network stack
//!
//! Emulates the subset of Redis used by the multiplexer: handshake commands, strings, ROLE,
//! CLUSTER SLOTS and Pub/Sub. Tests control the servers (kill, restart, hold replies, inject
//! redirects) and inspect the commands received.
use crate::codec::{DecodeOptions, Decoder, RespValue};
use crate::subscribe::channel::glob_match;
use bytes::{Bytes, BytesMut};
use embedded_nal::{SocketAddr, TcpClientStack, TcpError, TcpErrorKind};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeError {
    Refused,
    Closed,
    UnknownSocket,
}

impl TcpError for FakeError {
    fn kind(&self) -> TcpErrorKind {
        match self {
            FakeError::Closed => TcpErrorKind::PipeClosed,
            _ => TcpErrorKind::Other,
        }
    }
}

#[derive(Debug)]
pub struct FakeSocket {
    id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeRole {
    Primary,
    Replica(SocketAddr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SubKind {
    Channel,
    Pattern,
    Shard,
}

struct Server {
    up: bool,
    role: FakeRole,
    password: Option<String>,
    data: HashMap<Bytes, Bytes>,
    cluster_slots: Option<Vec<(u16, u16, SocketAddr)>>,
    /// Error replies returned to the next data command on the key instead of executing it
    scripted: VecDeque<(Bytes, String)>,
    hold: bool,
    log: Vec<String>,
    accepted: usize,
}

impl Server {
    fn new(role: FakeRole) -> Self {
        Self {
            up: true,
            role,
            password: None,
            data: HashMap::new(),
            cluster_slots: None,
            scripted: VecDeque::new(),
            hold: false,
            log: vec![],
            accepted: 0,
        }
    }
}

#[derive(Default)]
struct Socket {
    server: Option<SocketAddr>,
    broken: bool,
    input: BytesMut,
    output: BytesMut,
    held: BytesMut,
    resp3: bool,
    authenticated: bool,
    subscriptions: Vec<(SubKind, Bytes)>,
}

#[derive(Default)]
struct State {
    servers: HashMap<SocketAddr, Server>,
    sockets: HashMap<usize, Socket>,
    next_socket: usize,
}

/// Handle for configuring and inspecting the fake servers
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<State>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// New network stack connected to this network
    pub fn stack(&self) -> FakeStack {
        FakeStack {
            state: self.state.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_primary(&self, address: SocketAddr) -> &Self {
        self.state().servers.insert(address, Server::new(FakeRole::Primary));
        self
    }

    pub fn add_replica(&self, address: SocketAddr, primary: SocketAddr) -> &Self {
        self.state().servers.insert(address, Server::new(FakeRole::Replica(primary)));
        self
    }

    pub fn set_role(&self, address: SocketAddr, role: FakeRole) {
        self.with_server(address, |server| server.role = role);
    }

    pub fn set_password(&self, address: SocketAddr, password: &str) {
        self.with_server(address, |server| server.password = Some(password.to_string()));
    }

    pub fn set_value(&self, address: SocketAddr, key: &str, value: &str) {
        self.with_server(address, |server| {
            server.data.insert(Bytes::from(key.to_string()), Bytes::from(value.to_string()));
        });
    }

    pub fn value(&self, address: SocketAddr, key: &str) -> Option<Bytes> {
        self.state().servers.get(&address)?.data.get(key.as_bytes()).cloned()
    }

    pub fn set_cluster_slots(&self, address: SocketAddr, slots: Vec<(u16, u16, SocketAddr)>) {
        self.with_server(address, |server| server.cluster_slots = Some(slots));
    }

    /// The next data command (GET, SET, DEL) on the key receives the given error reply
    pub fn script_error(&self, address: SocketAddr, key: &str, reply: &str) {
        self.with_server(address, |server| {
            server.scripted.push_back((Bytes::from(key.to_string()), reply.to_string()))
        });
    }

    /// Replies are buffered until [FakeNetwork::release]
    pub fn hold(&self, address: SocketAddr) {
        self.with_server(address, |server| server.hold = true);
    }

    pub fn release(&self, address: SocketAddr) {
        let mut state = self.state();
        if let Some(server) = state.servers.get_mut(&address) {
            server.hold = false;
        }

        for socket in state.sockets.values_mut().filter(|socket| socket.server == Some(address)) {
            let held = socket.held.split();
            socket.output.extend_from_slice(&held);
        }
    }

    /// Stops the server: established connections break, new ones are refused
    pub fn kill_server(&self, address: SocketAddr) {
        self.with_server(address, |server| server.up = false);
        self.break_matching(address, |_| true);
    }

    pub fn restart_server(&self, address: SocketAddr) {
        self.with_server(address, |server| server.up = true);
    }

    /// Breaks all established connections to the server
    pub fn break_sockets(&self, address: SocketAddr) {
        self.break_matching(address, |_| true);
    }

    /// Breaks the connections carrying subscriptions
    pub fn break_subscribed_sockets(&self, address: SocketAddr) {
        self.break_matching(address, |socket| !socket.subscriptions.is_empty());
    }

    /// Publishes from the server side, returns the number of receivers
    pub fn publish(&self, address: SocketAddr, channel: &str, payload: &str) -> i64 {
        let mut state = self.state();
        publish(
            &mut state,
            address,
            SubKind::Channel,
            Bytes::from(channel.to_string()),
            Bytes::from(payload.to_string()),
        )
    }

    /// Commands received by the server, arguments separated by space
    pub fn commands(&self, address: SocketAddr) -> Vec<String> {
        self.state()
            .servers
            .get(&address)
            .map(|server| server.log.clone())
            .unwrap_or_default()
    }

    /// Number of received commands starting with the given text
    pub fn count(&self, address: SocketAddr, prefix: &str) -> usize {
        self.commands(address)
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self, address: SocketAddr) -> usize {
        self.state().servers.get(&address).map(|server| server.accepted).unwrap_or(0)
    }

    /// Number of open connections subscribed to at least one channel
    pub fn subscribed_sockets(&self, address: SocketAddr) -> usize {
        self.state()
            .sockets
            .values()
            .filter(|socket| socket.server == Some(address) && !socket.broken && !socket.subscriptions.is_empty())
            .count()
    }

    fn with_server<F: FnOnce(&mut Server)>(&self, address: SocketAddr, f: F) {
        if let Some(server) = self.state().servers.get_mut(&address) {
            f(server);
        }
    }

    fn break_matching<F: Fn(&Socket) -> bool>(&self, address: SocketAddr, filter: F) {
        for socket in self.state().sockets.values_mut() {
            if socket.server == Some(address) && filter(socket) {
                socket.broken = true;
            }
        }
    }
}

/// Network stack of one connection
pub struct FakeStack {
    state: Arc<Mutex<State>>,
}

impl FakeStack {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TcpClientStack for FakeStack {
    type TcpSocket = FakeSocket;
    type Error = FakeError;

    fn socket(&mut self) -> Result<Self::TcpSocket, Self::Error> {
        let mut state = self.state();
        state.next_socket += 1;
        let id = state.next_socket;
        state.sockets.insert(id, Socket::default());
        Ok(FakeSocket { id })
    }

    fn connect(&mut self, socket: &mut Self::TcpSocket, remote: SocketAddr) -> nb::Result<(), Self::Error> {
        let mut state = self.state();
        match state.servers.get_mut(&remote) {
            Some(server) if server.up => server.accepted += 1,
            _ => return Err(nb::Error::Other(FakeError::Refused)),
        }

        let entry = state.sockets.get_mut(&socket.id).ok_or(nb::Error::Other(FakeError::UnknownSocket))?;
        entry.server = Some(remote);
        Ok(())
    }

    fn send(&mut self, socket: &mut Self::TcpSocket, buffer: &[u8]) -> nb::Result<usize, Self::Error> {
        let mut state = self.state();
        let entry = state.sockets.get_mut(&socket.id).ok_or(nb::Error::Other(FakeError::UnknownSocket))?;
        if entry.broken {
            return Err(nb::Error::Other(FakeError::Closed));
        }
        entry.input.extend_from_slice(buffer);

        loop {
            let entry = match state.sockets.get_mut(&socket.id) {
                Some(entry) => entry,
                None => break,
            };

            let (value, consumed) = match Decoder::new(DecodeOptions::default()).decode_slice(&entry.input) {
                Ok(Some(decoded)) => decoded,
                _ => break,
            };
            let _ = entry.input.split_to(consumed);

            let args: Vec<Bytes> = value
                .as_elements()
                .unwrap_or_default()
                .iter()
                .filter_map(|arg| arg.as_bytes().cloned())
                .collect();
            if !args.is_empty() {
                execute(&mut state, socket.id, args);
            }
        }

        Ok(buffer.len())
    }

    fn receive(&mut self, socket: &mut Self::TcpSocket, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let mut state = self.state();
        let entry = state.sockets.get_mut(&socket.id).ok_or(nb::Error::Other(FakeError::UnknownSocket))?;
        if entry.broken {
            return Ok(0);
        }

        if entry.output.is_empty() {
            return Err(nb::Error::WouldBlock);
        }

        let count = buffer.len().min(entry.output.len());
        buffer[..count].copy_from_slice(&entry.output.split_to(count));
        Ok(count)
    }

    fn close(&mut self, socket: Self::TcpSocket) -> Result<(), Self::Error> {
        self.state().sockets.remove(&socket.id);
        Ok(())
    }
}

fn execute(state: &mut State, id: usize, args: Vec<Bytes>) {
    let address = match state.sockets.get(&id).and_then(|socket| socket.server) {
        Some(address) => address,
        None => return,
    };

    let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
    let line = args
        .iter()
        .enumerate()
        .map(|(index, arg)| match index {
            0 => name.clone(),
            _ => String::from_utf8_lossy(arg).to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ");

    let State { servers, sockets, .. } = &mut *state;
    let (server, socket) = match (servers.get_mut(&address), sockets.get_mut(&id)) {
        (Some(server), Some(socket)) => (server, socket),
        _ => return,
    };
    server.log.push(line);

    let resp3 = socket.resp3;
    let null = if resp3 { RespValue::Null } else { RespValue::BulkString(None) };

    if server.password.is_some() && !socket.authenticated && !matches!(name.as_str(), "AUTH" | "HELLO") {
        return emit(state, id, RespValue::error("NOAUTH Authentication required."));
    }

    let scripted = match name.as_str() {
        "GET" | "SET" | "DEL" => scripted(server, args.get(1)),
        _ => None,
    };
    if let Some(reply) = scripted {
        return emit(state, id, RespValue::error(reply));
    }

    let reply = match name.as_str() {
        "AUTH" => match (&server.password, args.last()) {
            (Some(password), Some(given)) if password.as_bytes() == &given[..] => {
                socket.authenticated = true;
                RespValue::simple("OK")
            }
            (None, _) => RespValue::error("ERR AUTH <password> called without any password configured"),
            _ => RespValue::error("WRONGPASS invalid username-password pair or user is disabled."),
        },
        "HELLO" => {
            if args.get(1).map(|version| &version[..] == b"3").unwrap_or(false) {
                socket.resp3 = true;
            }
            hello(id, server)
        }
        "CLIENT" | "ASKING" => RespValue::simple("OK"),
        "PING" => match (socket.subscriptions.is_empty() || resp3, args.get(1)) {
            (true, Some(message)) => RespValue::bulk(message.clone()),
            (true, None) => RespValue::simple("PONG"),
            (false, message) => RespValue::array(vec![
                RespValue::bulk("pong"),
                RespValue::bulk(message.cloned().unwrap_or_default()),
            ]),
        },
        "ECHO" => match args.get(1) {
            Some(message) => RespValue::bulk(message.clone()),
            None => RespValue::error("ERR wrong number of arguments for 'echo' command"),
        },
        "ROLE" => role(server.role),
        "CLUSTER" => match &server.cluster_slots {
            Some(slots) => cluster_slots(slots),
            None => RespValue::error("ERR This instance has cluster support disabled"),
        },
        "GET" => match args.get(1).and_then(|key| server.data.get(key)) {
            Some(value) => RespValue::bulk(value.clone()),
            None => null,
        },
        "SET" => match (args.get(1), args.get(2)) {
            (Some(key), Some(value)) => {
                server.data.insert(key.clone(), value.clone());
                RespValue::simple("OK")
            }
            _ => RespValue::error("ERR wrong number of arguments for 'set' command"),
        },
        "DEL" => RespValue::Integer(args[1..].iter().filter(|key| server.data.remove(*key).is_some()).count() as i64),
        "SUBSCRIBE" | "PSUBSCRIBE" | "SSUBSCRIBE" => {
            let kind = sub_kind(&name);
            let channel = args.get(1).cloned().unwrap_or_default();
            if !socket.subscriptions.contains(&(kind, channel.clone())) {
                socket.subscriptions.push((kind, channel.clone()));
            }
            let count = socket.subscriptions.len() as i64;
            pubsub_reply(resp3, &name.to_ascii_lowercase(), channel, count)
        }
        "UNSUBSCRIBE" | "PUNSUBSCRIBE" | "SUNSUBSCRIBE" => {
            let kind = sub_kind(&name);
            let channel = args.get(1).cloned().unwrap_or_default();
            socket.subscriptions.retain(|entry| entry != &(kind, channel.clone()));
            let count = socket.subscriptions.len() as i64;
            pubsub_reply(resp3, &name.to_ascii_lowercase(), channel, count)
        }
        "PUBLISH" | "SPUBLISH" => {
            let kind = if name == "SPUBLISH" { SubKind::Shard } else { SubKind::Channel };
            let channel = args.get(1).cloned().unwrap_or_default();
            let payload = args.get(2).cloned().unwrap_or_default();
            let receivers = publish(state, address, kind, channel, payload);
            RespValue::Integer(receivers)
        }
        _ => RespValue::error(format!("ERR unknown command '{}'", name)),
    };

    emit(state, id, reply);
}

/// Takes the scripted reply for the key
fn scripted(server: &mut Server, key: Option<&Bytes>) -> Option<String> {
    let index = server.scripted.iter().position(|(scripted, _)| Some(scripted) == key)?;
    server.scripted.remove(index).map(|(_, reply)| reply)
}

fn emit(state: &mut State, id: usize, value: RespValue) {
    let hold = state
        .sockets
        .get(&id)
        .and_then(|socket| socket.server)
        .and_then(|address| state.servers.get(&address))
        .map(|server| server.hold)
        .unwrap_or(false);

    if let Some(socket) = state.sockets.get_mut(&id) {
        match hold {
            true => value.encode(&mut socket.held),
            false => value.encode(&mut socket.output),
        }
    }
}

fn publish(state: &mut State, address: SocketAddr, kind: SubKind, channel: Bytes, payload: Bytes) -> i64 {
    let mut deliveries = vec![];
    for (id, socket) in state.sockets.iter() {
        if socket.server != Some(address) || socket.broken {
            continue;
        }

        for (sub_kind, name) in socket.subscriptions.iter() {
            let message = match (kind, sub_kind) {
                (SubKind::Channel, SubKind::Channel) if name == &channel => {
                    vec![RespValue::bulk("message"), RespValue::bulk(channel.clone()), RespValue::bulk(payload.clone())]
                }
                (SubKind::Channel, SubKind::Pattern) if glob_match(name, &channel) => vec![
                    RespValue::bulk("pmessage"),
                    RespValue::bulk(name.clone()),
                    RespValue::bulk(channel.clone()),
                    RespValue::bulk(payload.clone()),
                ],
                (SubKind::Shard, SubKind::Shard) if name == &channel => {
                    vec![RespValue::bulk("smessage"), RespValue::bulk(channel.clone()), RespValue::bulk(payload.clone())]
                }
                _ => continue,
            };

            let value = match socket.resp3 {
                true => RespValue::Push(message),
                false => RespValue::array(message),
            };
            deliveries.push((*id, value));
        }
    }

    let count = deliveries.len() as i64;
    for (id, value) in deliveries {
        emit(state, id, value);
    }
    count
}

fn sub_kind(command: &str) -> SubKind {
    match command.as_bytes().first() {
        Some(b'P') => SubKind::Pattern,
        Some(b'S') if command.starts_with("SSUB") || command.starts_with("SUNSUB") => SubKind::Shard,
        _ => SubKind::Channel,
    }
}

fn pubsub_reply(resp3: bool, kind: &str, channel: Bytes, count: i64) -> RespValue {
    let elements = vec![
        RespValue::bulk(kind.to_string()),
        RespValue::bulk(channel),
        RespValue::Integer(count),
    ];

    match resp3 {
        true => RespValue::Push(elements),
        false => RespValue::array(elements),
    }
}

fn hello(id: usize, server: &Server) -> RespValue {
    let mode = if server.cluster_slots.is_some() { "cluster" } else { "standalone" };
    let role = match server.role {
        FakeRole::Primary => "master",
        FakeRole::Replica(_) => "replica",
    };

    RespValue::Map(vec![
        (RespValue::bulk("server"), RespValue::bulk("redis")),
        (RespValue::bulk("version"), RespValue::bulk("7.2.0")),
        (RespValue::bulk("proto"), RespValue::Integer(3)),
        (RespValue::bulk("id"), RespValue::Integer(id as i64)),
        (RespValue::bulk("mode"), RespValue::bulk(mode)),
        (RespValue::bulk("role"), RespValue::bulk(role)),
        (RespValue::bulk("modules"), RespValue::array(vec![])),
    ])
}

fn role(role: FakeRole) -> RespValue {
    match role {
        FakeRole::Primary => RespValue::array(vec![
            RespValue::bulk("master"),
            RespValue::Integer(0),
            RespValue::array(vec![]),
        ]),
        FakeRole::Replica(primary) => RespValue::array(vec![
            RespValue::bulk("slave"),
            RespValue::bulk(primary.ip().to_string()),
            RespValue::Integer(primary.port() as i64),
            RespValue::bulk("connected"),
            RespValue::Integer(0),
        ]),
    }
}

fn cluster_slots(slots: &[(u16, u16, SocketAddr)]) -> RespValue {
    RespValue::array(
        slots
            .iter()
            .map(|(start, end, node)| {
                RespValue::array(vec![
                    RespValue::Integer(*start as i64),
                    RespValue::Integer(*end as i64),
                    RespValue::array(vec![
                        RespValue::bulk(node.ip().to_string()),
                        RespValue::Integer(node.port() as i64),
                        RespValue::bulk(format!("node-{}", node.port())),
                    ]),
                ])
            })
            .collect(),
    )
}
