//! # Connection multiplexer
//!
//! A [ConnectionMultiplexer] shares one interactive and one subscription connection per server
//! between any number of callers. It selects the target server by command flags and cluster hash
//! slot, elects a primary if several servers claim that role, reconnects failed connections
//! following a [ReconnectRetryPolicy] and follows MOVED/ASK redirects.
//!
//! ## Driving the I/O loop
//!
//! By default a background thread polls all connections. Without it (see
//! [MultiplexerConfig::background_worker]) every blocking wait and every polled future drives
//! the I/O loop itself, the same way a single threaded client would.
//!
//! ## Failure handling
//!
//! A failed connection fails its pending commands with
//! [CommandErrors::ConnectionFailure], commands on other connections are not affected.
//! Commands for a server without established connection are queued or rejected according to the
//! [BacklogPolicy]. [MultiplexerEvent]s report every state change exactly once.
use crate::codec::RespValue;
use crate::commands::cluster::ClusterSlotsCommand;
use crate::commands::custom::CustomCommand;
use crate::commands::publish::PublishCommand;
use crate::commands::{Command, CommandBuilder, CommandFlags};
use crate::network::connection::{PendingCommand, RedirectedCommand, ReplyTarget};
use crate::network::{
    lock, read, write, AsyncResponse, AsyncResultBox, CommandErrors, Completion, ConnectionError,
    ConnectionFailureType, ConnectionOptions, ConnectionState, ConnectionType, Driver, MonotonicClock,
    PhysicalConnection, Probes, RequestContext, ResponseFuture, ServerInfo, SyncResultBox, Timeout,
};
use crate::processors::{ClusterSlotsProcessor, ResultProcessor, Role, SlotRange};
use crate::subscribe::channel::{ChannelKind, RedisChannel};
use crate::subscribe::manager::{Sink, SubscriptionManager, SubscriptionState, ViewId};
use crate::subscribe::subscriber::PubSubBackend;
use crate::subscribe::Subscriber;
use bytes::Bytes;
use embedded_nal::{SocketAddr, TcpClientStack};
use endpoint::ServerEndpoint;
use events::EventHub;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

pub use config::{BacklogPolicy, EndpointConfig, MultiplexerConfig, ServerRole, DEFAULT_TIE_BREAKER};
pub use election::{elect, ElectionKind, ElectionOutcome};
pub use events::{EventListener, MultiplexerEvent};
pub use retry::{ExponentialRetry, LinearRetry, ReconnectRetryPolicy};
pub use slots::{hash_slot, parse_redirect, Redirect, RedirectKind, SlotMap, MAX_REDIRECTS, SLOT_COUNT};

pub(crate) mod config;
pub(crate) mod election;
pub(crate) mod endpoint;
pub(crate) mod events;
pub(crate) mod retry;
pub(crate) mod slots;

#[cfg(test)]
pub(crate) mod tests;

type StackFactory<N> = Box<dyn Fn() -> N + Send + Sync>;
type Endpoints<N> = Arc<Vec<Arc<ServerEndpoint<N>>>>;

/// Connection states of an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub address: SocketAddr,
    pub role: ServerRole,
    pub interactive: ConnectionState,
    pub subscription: ConnectionState,
}

/// Command that could neither be sent nor queued
struct Rejected {
    command: PendingCommand,
    error: CommandErrors,
}

/// State shared between callers, the I/O worker and subscribers
pub(crate) struct Shared<N: TcpClientStack> {
    this: Weak<Shared<N>>,
    config: MultiplexerConfig,
    options: Arc<ConnectionOptions>,
    clock: Arc<dyn MonotonicClock>,
    factory: StackFactory<N>,

    /// Snapshot swapped on topology changes, routing works on a consistent copy
    endpoints: RwLock<Endpoints<N>>,
    slots: RwLock<SlotMap>,
    cluster: AtomicBool,
    /// Set by MOVED replies and by callers, served by the next I/O round
    refresh_requested: AtomicBool,
    topology_refresh: Mutex<Option<Arc<SyncResultBox>>>,

    subscriptions: SubscriptionManager,
    confirmations: Mutex<HashMap<RedisChannel, Arc<SyncResultBox>>>,
    events: EventHub,
    election: Mutex<Option<ElectionOutcome>>,
    round_robin: AtomicUsize,

    /// Serializes I/O rounds
    tick_lock: Mutex<()>,
    connected: AtomicBool,
    worker_running: AtomicBool,
    shutdown: AtomicBool,
}

impl<N> Shared<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    fn new(config: MultiplexerConfig, clock: Arc<dyn MonotonicClock>, factory: StackFactory<N>) -> Arc<Self> {
        Arc::new_cyclic(|this| {
            let options = Arc::new(config.options.clone());
            let shared = Shared {
                this: this.clone(),
                config,
                options,
                clock,
                factory,
                endpoints: RwLock::new(Arc::new(vec![])),
                slots: RwLock::new(SlotMap::default()),
                cluster: AtomicBool::new(false),
                refresh_requested: AtomicBool::new(false),
                topology_refresh: Mutex::new(None),
                subscriptions: SubscriptionManager::new(),
                confirmations: Mutex::new(HashMap::new()),
                events: EventHub::default(),
                election: Mutex::new(None),
                round_robin: AtomicUsize::new(0),
                tick_lock: Mutex::new(()),
                connected: AtomicBool::new(false),
                worker_running: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
            };

            let endpoints: Vec<Arc<ServerEndpoint<N>>> = shared
                .config
                .endpoints
                .iter()
                .map(|endpoint| Arc::new(shared.create_endpoint(endpoint.address, endpoint.role)))
                .collect();
            *write(&shared.endpoints) = Arc::new(endpoints);
            shared
        })
    }

    fn create_endpoint(&self, address: SocketAddr, role: ServerRole) -> ServerEndpoint<N> {
        let probes = Probes {
            role: true,
            tie_breaker: self.config.tie_breaker.clone(),
            cluster_slots: self.config.cluster_discovery,
        };

        let interactive = PhysicalConnection::new(
            address,
            ConnectionType::Interactive,
            self.options.clone(),
            probes,
            (self.factory)(),
        );
        let subscription = PhysicalConnection::new(
            address,
            ConnectionType::Subscription,
            self.options.clone(),
            Probes::default(),
            (self.factory)(),
        );

        ServerEndpoint::new(address, role, interactive, subscription)
    }

    fn snapshot(&self) -> Endpoints<N> {
        read(&self.endpoints).clone()
    }

    fn find(&self, address: SocketAddr) -> Option<Arc<ServerEndpoint<N>>> {
        self.snapshot().iter().find(|endpoint| endpoint.address == address).cloned()
    }

    /// Returns the endpoint of the address, creating it if unknown
    fn ensure_endpoint(&self, address: SocketAddr, role: ServerRole) -> Arc<ServerEndpoint<N>> {
        if let Some(endpoint) = self.find(address) {
            return endpoint;
        }

        let mut endpoints = write(&self.endpoints);
        if let Some(endpoint) = endpoints.iter().find(|endpoint| endpoint.address == address) {
            return endpoint.clone();
        }

        log::info!("Discovered endpoint {} ({:?})", address, role);
        let endpoint = Arc::new(self.create_endpoint(address, role));
        let mut next: Vec<Arc<ServerEndpoint<N>>> = endpoints.iter().cloned().collect();
        next.push(endpoint.clone());
        *endpoints = Arc::new(next);
        endpoint
    }

    fn driver(&self) -> Option<Arc<dyn Driver>> {
        if self.worker_running.load(Ordering::Acquire) {
            return None;
        }

        self.this.upgrade().map(|shared| shared as Arc<dyn Driver>)
    }

    /// One I/O round over all connections
    fn tick(&self) {
        let _guard = match self.tick_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let now = match self.clock.now_micros() {
            Ok(now) => now,
            Err(error) => {
                log::error!("Clock failure: {}", error);
                return;
            }
        };

        let mut events = vec![];
        let mut redirects: Vec<RedirectedCommand> = vec![];
        let mut pushes = vec![];
        let mut lost = vec![];
        let mut topology_changed = false;

        for endpoint in self.snapshot().iter() {
            if endpoint.is_retired() {
                continue;
            }

            let report = lock(&endpoint.interactive).poll(now, self.config.retry.as_ref());
            if let Some(info) = report.established {
                self.record_info(endpoint, info);
                topology_changed = true;
            }
            topology_changed |= report.failed;
            for value in report.pushes {
                log::debug!("Ignoring {} on interactive connection to {}", value.kind(), endpoint.address);
            }
            events.extend(report.events);
            redirects.extend(report.redirects);

            self.flush_backlog(endpoint, now);

            let report = lock(&endpoint.subscription).poll(now, self.config.retry.as_ref());
            if report.failed {
                lost.push(endpoint.address);
            }
            events.extend(report.events);
            pushes.extend(report.pushes.into_iter().map(|value| (endpoint.address, value)));
        }

        for (origin, value) in pushes {
            self.subscriptions.deliver(origin, &value);
        }

        for address in lost {
            self.subscriptions.connection_lost(address);
        }

        for event in events {
            self.events.emit(event);
        }

        for redirected in redirects {
            self.redirect(redirected, now);
        }

        topology_changed |= self.refresh_topology(now);

        if topology_changed && self.connected.load(Ordering::Acquire) {
            self.run_election();
        }

        self.heal_subscriptions(now);
    }

    /// Stores the handshake results of an established interactive connection
    fn record_info(&self, endpoint: &ServerEndpoint<N>, info: ServerInfo) {
        let detected = info.role.as_ref().map(|role| match role {
            Role::Primary { .. } => ServerRole::Primary,
            Role::Replica { .. } => ServerRole::Replica,
            Role::Sentinel { .. } => ServerRole::Unknown,
        });

        {
            let mut stored = lock(&endpoint.info);
            stored.detected = detected;
            stored.tie_breaker = info.tie_breaker;
        }
        endpoint.set_role(detected.unwrap_or(endpoint.hint));

        if let Some(ranges) = info.slots.filter(|ranges| !ranges.is_empty()) {
            self.apply_topology(&ranges);
        }
    }

    /// Replaces slot map and endpoint set by the reported cluster topology.
    ///
    /// Endpoints neither reported nor configured are retired: their connections close, their
    /// backlog fails and their subscriptions are assigned to other servers.
    fn apply_topology(&self, ranges: &[SlotRange]) {
        let mut reported = vec![];
        for range in ranges {
            if let Some(address) = range.primary.to_socket_addr() {
                self.ensure_endpoint(address, ServerRole::Primary);
                reported.push(address);
            }
            for address in range.replicas.iter().filter_map(|node| node.to_socket_addr()) {
                self.ensure_endpoint(address, ServerRole::Replica);
                reported.push(address);
            }
        }

        *write(&self.slots) = SlotMap::from_ranges(ranges);
        self.cluster.store(true, Ordering::Release);

        let retired: Vec<Arc<ServerEndpoint<N>>> = {
            let mut endpoints = write(&self.endpoints);
            let (kept, retired): (Vec<_>, Vec<_>) = endpoints.iter().cloned().partition(|endpoint| {
                reported.contains(&endpoint.address)
                    || self.config.endpoints.iter().any(|seed| seed.address == endpoint.address)
            });
            if !retired.is_empty() {
                *endpoints = Arc::new(kept);
            }
            retired
        };

        for endpoint in retired {
            log::info!("Endpoint {} left the cluster topology", endpoint.address);
            endpoint.retire();
            self.subscriptions.connection_lost(endpoint.address);
        }
    }

    /// Applies a finished CLUSTER SLOTS request and sends a new one if requested.
    ///
    /// Returns true if a new topology was applied.
    fn refresh_topology(&self, now: u64) -> bool {
        let mut applied = false;
        {
            let mut pending = lock(&self.topology_refresh);
            let completed = pending.as_ref().map(|result| result.is_completed());
            match completed {
                Some(false) => return false,
                Some(true) => {
                    let outcome = pending.take().and_then(|result| result.take());
                    drop(pending);
                    applied = self.apply_refresh(outcome);
                }
                None => {}
            }
        }

        if !self.refresh_requested.swap(false, Ordering::AcqRel) {
            return applied;
        }

        let endpoints = self.snapshot();
        let target = endpoints
            .iter()
            .filter(|endpoint| endpoint.is_up(ConnectionType::Interactive))
            .min_by_key(|endpoint| endpoint.role() != ServerRole::Primary);
        let target = match target {
            Some(target) => target,
            None => {
                self.refresh_requested.store(true, Ordering::Release);
                return applied;
            }
        };

        let result = SyncResultBox::new();
        let frame = ClusterSlotsCommand.encode().to_frame();
        let timeout = Timeout::starting_at(now, self.options.response_timeout);
        let command = PendingCommand::new(frame, result.clone(), timeout, now);

        if lock(&target.interactive).connection.send(command).is_err() {
            self.refresh_requested.store(true, Ordering::Release);
            return applied;
        }

        log::debug!("Refreshing cluster topology from {}", target.address);
        *lock(&self.topology_refresh) = Some(result);
        applied
    }

    fn apply_refresh(&self, outcome: Option<Result<RespValue, CommandErrors>>) -> bool {
        let value = match outcome {
            Some(Ok(value)) => value,
            Some(Err(error)) => {
                log::debug!("Cluster topology refresh failed: {}", error);
                return false;
            }
            None => return false,
        };

        match ClusterSlotsProcessor.process(&value) {
            Ok(ranges) if !ranges.is_empty() => {
                self.apply_topology(&ranges);
                true
            }
            Ok(_) => false,
            Err(error) => {
                log::debug!("Unexpected CLUSTER SLOTS reply: {}", error);
                false
            }
        }
    }

    /// Determines the primary among reachable endpoints. Cluster nodes keep their roles.
    fn run_election(&self) {
        if self.cluster.load(Ordering::Acquire) {
            return;
        }

        let endpoints = self.snapshot();
        let mut candidates = vec![];
        let mut votes = vec![];

        for endpoint in endpoints.iter() {
            if !endpoint.is_up(ConnectionType::Interactive) {
                continue;
            }

            let info = lock(&endpoint.info).clone();
            let role = info.detected.unwrap_or(endpoint.hint);
            endpoint.set_role(role);

            if role == ServerRole::Primary {
                candidates.push(endpoint.address);
            }
            votes.push(info.tie_breaker);
        }

        let outcome = elect(&candidates, &votes);
        if let Some(primary) = outcome.primary {
            for endpoint in endpoints.iter() {
                if endpoint.address != primary && endpoint.role() == ServerRole::Primary {
                    endpoint.set_role(ServerRole::Unknown);
                }
            }
        }

        let primary = outcome.primary;
        let previous = lock(&self.election).replace(outcome);
        if let Some(previous) = previous {
            if previous.primary != primary {
                self.events.emit(MultiplexerEvent::TopologyChanged {
                    previous: previous.primary,
                    primary,
                });
            }
        }
    }

    /// Endpoints eligible for the flags, best first
    fn ordered(&self, flags: CommandFlags, key: Option<&[u8]>) -> Vec<Arc<ServerEndpoint<N>>> {
        if let Some(key) = key {
            let slot = hash_slot(key);
            let (primary, replicas) = {
                let slots = read(&self.slots);
                (slots.primary(slot), slots.replicas(slot).to_vec())
            };

            if let Some(primary) = primary {
                let primary = self.ensure_endpoint(primary, ServerRole::Primary);
                let mut replicas: Vec<Arc<ServerEndpoint<N>>> = replicas
                    .into_iter()
                    .map(|address| self.ensure_endpoint(address, ServerRole::Replica))
                    .collect();
                self.rotate(&mut replicas);
                return order(flags, vec![primary], vec![], replicas);
            }
        }

        let mut primaries = vec![];
        let mut unknown = vec![];
        let mut replicas = vec![];
        for endpoint in self.snapshot().iter() {
            match endpoint.role() {
                ServerRole::Primary => primaries.push(endpoint.clone()),
                ServerRole::Unknown => unknown.push(endpoint.clone()),
                ServerRole::Replica => replicas.push(endpoint.clone()),
            }
        }

        self.rotate(&mut replicas);
        order(flags, primaries, unknown, replicas)
    }

    /// Round robin among replicas
    fn rotate(&self, replicas: &mut [Arc<ServerEndpoint<N>>]) {
        if replicas.len() > 1 {
            let offset = self.round_robin.fetch_add(1, Ordering::Relaxed) % replicas.len();
            replicas.rotate_left(offset);
        }
    }

    /// Prefers endpoints with established connection, falls back to the best eligible one
    fn select(&self, flags: CommandFlags, key: Option<&[u8]>) -> Option<Arc<ServerEndpoint<N>>> {
        let ordered = self.ordered(flags, key);
        ordered
            .iter()
            .find(|endpoint| endpoint.is_up(ConnectionType::Interactive))
            .or_else(|| ordered.first())
            .cloned()
    }

    fn submit<Cmd: Command>(
        &self,
        command: &Cmd,
        context: &RequestContext,
        completion: Arc<dyn Completion>,
    ) -> Result<(), CommandErrors> {
        let frame = command.encode().to_frame();
        let name = frame.command_name().to_string();

        if self.config.is_disabled(&name) {
            return Err(CommandErrors::CommandDisabled(name));
        }

        let mut flags = command.flags();
        if let Some(overrides) = context.flags() {
            if overrides.intersects(CommandFlags::ROLE_MASK) {
                flags.remove(CommandFlags::ROLE_MASK);
            }
            flags |= overrides;
        }

        if flags.contains(CommandFlags::ADMIN) && !self.config.allow_admin {
            return Err(CommandErrors::AdminModeNotEnabled(name));
        }

        if context.token().map(|token| token.is_cancelled()).unwrap_or(false) {
            return Err(CommandErrors::Cancelled);
        }

        let now = self.clock.now_micros()?;
        let duration = context.timeout().unwrap_or(self.options.response_timeout);
        let mut pending = PendingCommand::new(frame, completion.clone(), Timeout::starting_at(now, duration), now);
        pending.flags = flags;
        pending.key = command.key().cloned();

        let endpoint = self
            .select(flags, pending.key.as_deref())
            .ok_or_else(|| CommandErrors::NoConnectionAvailable(format!("no server eligible for {}", name)))?;
        self.dispatch(&endpoint, pending, now).map_err(|rejected| rejected.error)?;

        if let Some(token) = context.token() {
            token.register(&completion);
        }
        Ok(())
    }

    /// Sends the command or queues it according to the backlog policy
    fn dispatch(&self, endpoint: &ServerEndpoint<N>, command: PendingCommand, now: u64) -> Result<(), Rejected> {
        let mut slot = lock(&endpoint.interactive);
        let mut backlog = lock(&endpoint.backlog);

        if slot.is_up() && !backlog.is_empty() {
            drain_backlog(&mut slot.connection, &mut backlog, now);
        }

        let command = match backlog.is_empty() {
            true => match slot.connection.send(command) {
                Ok(()) => return Ok(()),
                Err(command) => command,
            },
            false => command,
        };

        match self.config.backlog {
            BacklogPolicy::FailFast => Err(Rejected {
                command,
                error: CommandErrors::NoConnectionAvailable(format!("{} is not connected", endpoint.address)),
            }),
            BacklogPolicy::Queue { max } if backlog.len() >= max => Err(Rejected {
                command,
                error: CommandErrors::BacklogFull,
            }),
            BacklogPolicy::Queue { .. } => {
                backlog.push_back(command);
                Ok(())
            }
        }
    }

    /// Sends queued commands once connected, expires the others
    fn flush_backlog(&self, endpoint: &ServerEndpoint<N>, now: u64) {
        let mut slot = lock(&endpoint.interactive);
        let mut backlog = lock(&endpoint.backlog);
        if backlog.is_empty() {
            return;
        }

        if slot.is_up() {
            drain_backlog(&mut slot.connection, &mut backlog, now);
            return;
        }

        backlog.retain(|command| {
            if command.is_done() {
                return false;
            }

            if command.timeout.expired_at(now) {
                let diagnostics = command.diagnostics(now, None);
                command.complete(Err(CommandErrors::Timeout(diagnostics)));
                return false;
            }
            true
        });
    }

    fn redirect(&self, redirected: RedirectedCommand, now: u64) {
        let RedirectedCommand {
            mut command,
            redirect,
            origin,
        } = redirected;

        command.redirects += 1;
        if command.redirects > MAX_REDIRECTS {
            command.complete(Err(CommandErrors::TooManyRedirects));
            return;
        }

        command.frame.detach_preamble();
        let target = match redirect.kind {
            RedirectKind::Moved => {
                write(&self.slots).set(redirect.slot, redirect.address);
                if redirect.address == origin {
                    return self.force_reconnect(origin, command);
                }
                if self.config.cluster_discovery {
                    self.refresh_requested.store(true, Ordering::Release);
                }
                self.ensure_endpoint(redirect.address, ServerRole::Primary)
            }
            RedirectKind::Ask => {
                let asking = CommandBuilder::new("ASKING").to_frame();
                if let Err(error) = command.frame.attach_preamble(asking.payload(), 1) {
                    log::warn!("Unable to attach ASKING to {}: {}", command.frame.command_name(), error);
                }
                self.ensure_endpoint(redirect.address, ServerRole::Unknown)
            }
        };

        if let Err(rejected) = self.dispatch(&target, command, now) {
            rejected.command.complete(Err(rejected.error));
        }
    }

    /// MOVED pointing to the queried address: the next TCP connection may reach another node
    fn force_reconnect(&self, address: SocketAddr, command: PendingCommand) {
        log::warn!("MOVED to same endpoint {}; forcing reconnect", address);

        let endpoint = match self.find(address) {
            Some(endpoint) => endpoint,
            None => {
                command.complete(Err(CommandErrors::NoConnectionAvailable(address.to_string())));
                return;
            }
        };

        {
            let mut slot = lock(&endpoint.interactive);
            slot.connection.fail(ConnectionFailureType::InternalFailure, "MOVED to same endpoint");
            slot.reconnect();
        }

        lock(&endpoint.backlog).push_back(command);
    }

    /// Assigns pending subscriptions to eligible servers
    fn heal_subscriptions(&self, now: u64) {
        lock(&self.confirmations).retain(|_, result| !result.is_completed());

        for (channel, flags) in self.subscriptions.orphans() {
            let key = match channel.kind() {
                ChannelKind::Sharded => channel.routing_key().map(|key| &key[..]),
                _ => None,
            };

            let endpoint = match self
                .ordered(flags, key)
                .into_iter()
                .find(|endpoint| endpoint.is_up(ConnectionType::Subscription))
            {
                Some(endpoint) => endpoint,
                None => continue,
            };

            let previous = match self.subscriptions.claim(&channel, endpoint.address) {
                Some(previous) => previous,
                None => continue,
            };

            let result = SyncResultBox::new();
            let frame = CommandBuilder::new(channel.subscribe_command()).arg(channel.name()).to_frame();
            let timeout = Timeout::starting_at(now, self.options.response_timeout);
            let command = PendingCommand::new(frame, result.clone(), timeout, now);

            if lock(&endpoint.subscription).connection.send(command).is_err() {
                self.subscriptions.release(&channel, endpoint.address);
                continue;
            }

            match previous {
                Some(previous) if previous != endpoint.address => {
                    log::info!("Subscription {} moved from {} to {}", channel, previous, endpoint.address)
                }
                _ => log::debug!("Subscription {} assigned to {}", channel, endpoint.address),
            }

            lock(&self.confirmations).insert(channel, result);
        }
    }

    fn send_unsubscribe(&self, channel: &RedisChannel, owner: SocketAddr) {
        let endpoint = match self.find(owner) {
            Some(endpoint) => endpoint,
            None => return,
        };

        let now = self.clock.now_micros().unwrap_or(0);
        let frame = CommandBuilder::new(channel.unsubscribe_command()).arg(channel.name()).to_frame();
        let command = PendingCommand::with_target(frame, ReplyTarget::Discard, Timeout::never(), now);
        if lock(&endpoint.subscription).connection.send(command).is_err() {
            log::debug!("Subscription connection to {} is down, {} ends with it", owner, channel);
        }
    }

    fn run_worker(&self) {
        let interval = Duration::from_micros(self.config.poll_interval.0 as u64);
        while !self.shutdown.load(Ordering::Acquire) {
            self.tick();
            std::thread::sleep(interval);
        }
    }
}

/// Orders endpoints by the role flags
fn order<T>(flags: CommandFlags, primaries: Vec<T>, unknown: Vec<T>, replicas: Vec<T>) -> Vec<T> {
    let mut ordered = vec![];
    if flags.contains(CommandFlags::DEMAND_REPLICA) {
        ordered.extend(replicas);
    } else if flags.contains(CommandFlags::DEMAND_MASTER) {
        ordered.extend(primaries);
        ordered.extend(unknown);
    } else if flags.prefers_replica() {
        ordered.extend(replicas);
        ordered.extend(primaries);
        ordered.extend(unknown);
    } else {
        ordered.extend(primaries);
        ordered.extend(unknown);
        ordered.extend(replicas);
    }
    ordered
}

/// Sends queued commands in order. Skips completed ones, expires overdue ones.
fn drain_backlog<N: TcpClientStack>(
    connection: &mut PhysicalConnection<N>,
    backlog: &mut VecDeque<PendingCommand>,
    now: u64,
) {
    while let Some(command) = backlog.pop_front() {
        if command.is_done() {
            continue;
        }

        if command.timeout.expired_at(now) {
            let diagnostics = command.diagnostics(now, None);
            command.complete(Err(CommandErrors::Timeout(diagnostics)));
            continue;
        }

        if let Err(command) = connection.send(command) {
            backlog.push_front(command);
            return;
        }
    }
}

impl<N> Driver for Shared<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    fn drive(&self) {
        self.tick();
    }
}

impl<N> PubSubBackend for Shared<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    fn subscribe(&self, channel: RedisChannel, flags: CommandFlags, view: ViewId, sink: Sink) -> Result<(), CommandErrors> {
        if !self.subscriptions.add(channel.clone(), flags, view, sink) {
            return Ok(());
        }

        let now = self.clock.now_micros()?;
        self.heal_subscriptions(now);

        let result = match lock(&self.confirmations).get(&channel).cloned() {
            Some(result) => result,
            None => {
                log::info!("Subscription {} pending, no eligible server reachable", channel);
                return Ok(());
            }
        };

        let command = CustomCommand::new(CommandBuilder::new(channel.subscribe_command()).arg(channel.name()));
        match ResponseFuture::new(command, result, self.driver()).wait() {
            Ok(_) => Ok(()),
            Err(CommandErrors::ConnectionFailure { .. }) => Ok(()),
            Err(CommandErrors::ErrorResponse(message)) => {
                self.subscriptions.remove(&channel, view);
                Err(CommandErrors::ErrorResponse(message))
            }
            Err(error) => Err(error),
        }
    }

    fn unsubscribe(&self, channel: &RedisChannel, view: ViewId) -> Result<(), CommandErrors> {
        if let Some(Some(owner)) = self.subscriptions.remove(channel, view) {
            self.send_unsubscribe(channel, owner);
        }
        Ok(())
    }

    fn unsubscribe_all(&self, view: ViewId) {
        for (channel, owner) in self.subscriptions.remove_view(view) {
            if let Some(owner) = owner {
                self.send_unsubscribe(&channel, owner);
            }
        }
    }

    fn publish(&self, channel: &RedisChannel, payload: Bytes) -> Result<i64, CommandErrors> {
        let mut command = PublishCommand::new(channel.name().clone(), payload);
        if channel.kind() == ChannelKind::Sharded {
            command = command.sharded();
        }

        let result = SyncResultBox::new();
        self.submit(&command, &RequestContext::default(), result.clone())?;
        ResponseFuture::new(command, result, self.driver()).wait()
    }

    fn subscribed_endpoint(&self, channel: &RedisChannel) -> Option<SocketAddr> {
        self.subscriptions.owner(channel)
    }

    fn subscriptions(&self) -> Vec<SubscriptionState> {
        self.subscriptions.states()
    }
}

/// Shares physical connections to a set of Redis servers between any number of callers
pub struct ConnectionMultiplexer<N: TcpClientStack> {
    shared: Arc<Shared<N>>,
    worker: Option<JoinHandle<()>>,
}

impl<N> ConnectionMultiplexer<N>
where
    N: TcpClientStack + Send + 'static,
    N::TcpSocket: Send,
{
    /// Connects to the configured endpoints and elects the primary
    ///
    /// Every connection gets its own network stack created by `factory`. Fails with
    /// [ConnectionError::NoServerReachable] if no server could be reached and
    /// [MultiplexerConfig::abort_on_connect_fail] is set.
    pub fn connect<C, F>(config: MultiplexerConfig, clock: C, factory: F) -> Result<Self, ConnectionError>
    where
        C: MonotonicClock + 'static,
        F: Fn() -> N + Send + Sync + 'static,
    {
        if config.endpoints.is_empty() {
            return Err(ConnectionError::NoServerReachable);
        }

        let shared = Shared::new(config, Arc::new(clock), Box::new(factory));
        let interval = Duration::from_micros(shared.config.poll_interval.0 as u64);

        for _ in 0..shared.config.connect_rounds.max(1) {
            shared.tick();
            if shared.snapshot().iter().all(|endpoint| endpoint.is_settled()) {
                break;
            }
            std::thread::sleep(interval);
        }

        let reachable = shared
            .snapshot()
            .iter()
            .any(|endpoint| endpoint.is_up(ConnectionType::Interactive));
        if !reachable && shared.config.abort_on_connect_fail {
            return Err(ConnectionError::NoServerReachable);
        }

        shared.run_election();
        shared.connected.store(true, Ordering::Release);

        let worker = match shared.config.background_worker {
            true => Self::spawn_worker(&shared),
            false => None,
        };

        Ok(Self { shared, worker })
    }

    fn spawn_worker(shared: &Arc<Shared<N>>) -> Option<JoinHandle<()>> {
        shared.worker_running.store(true, Ordering::Release);

        let worker_shared = shared.clone();
        match std::thread::Builder::new()
            .name("redis-mux-io".to_string())
            .spawn(move || worker_shared.run_worker())
        {
            Ok(worker) => Some(worker),
            Err(error) => {
                log::warn!("Unable to start I/O worker, callers drive the I/O loop: {}", error);
                shared.worker_running.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Sends a command using default timeout and flags
    pub fn send<Cmd: Command>(&self, command: Cmd) -> Result<ResponseFuture<Cmd>, CommandErrors> {
        self.send_with(command, &RequestContext::default())
    }

    /// Sends a command with the timeout, cancellation token and flags of the context
    pub fn send_with<Cmd: Command>(&self, command: Cmd, context: &RequestContext) -> Result<ResponseFuture<Cmd>, CommandErrors> {
        let result = SyncResultBox::new();
        self.shared.submit(&command, context, result.clone())?;
        Ok(ResponseFuture::new(command, result, self.shared.driver()))
    }

    /// Sends a command, the response is awaited asynchronously
    pub fn send_async<Cmd: Command + Unpin>(&self, command: Cmd) -> Result<AsyncResponse<Cmd>, CommandErrors> {
        self.send_async_with(command, &RequestContext::default())
    }

    pub fn send_async_with<Cmd: Command + Unpin>(
        &self,
        command: Cmd,
        context: &RequestContext,
    ) -> Result<AsyncResponse<Cmd>, CommandErrors> {
        let result = AsyncResultBox::new();
        self.shared.submit(&command, context, result.clone())?;
        Ok(AsyncResponse::new(command, result, self.shared.driver()))
    }

    /// Pub/Sub interface sharing the subscription connections of this multiplexer
    pub fn subscriber(&self) -> Subscriber {
        Subscriber::new(self.shared.clone())
    }

    /// Registers a listener for connection and topology events
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&MultiplexerEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(Box::new(listener));
    }

    /// Runs one I/O round. Only needed without background worker and without waiting callers.
    pub fn poll(&self) {
        self.shared.tick();
    }

    /// Last election outcome
    pub fn election(&self) -> Option<ElectionOutcome> {
        lock(&self.shared.election).clone()
    }

    /// Elected primary
    pub fn primary(&self) -> Option<SocketAddr> {
        lock(&self.shared.election).as_ref().and_then(|outcome| outcome.primary)
    }

    pub fn endpoints(&self) -> Vec<EndpointStatus> {
        self.shared
            .snapshot()
            .iter()
            .map(|endpoint| EndpointStatus {
                address: endpoint.address,
                role: endpoint.role(),
                interactive: lock(&endpoint.interactive).connection.state(),
                subscription: lock(&endpoint.subscription).connection.state(),
            })
            .collect()
    }

    /// True if at least one interactive connection is established
    pub fn is_connected(&self) -> bool {
        self.shared
            .snapshot()
            .iter()
            .any(|endpoint| endpoint.is_up(ConnectionType::Interactive))
    }

    /// Primary owning the key's hash slot, if cluster topology is known
    pub fn slot_owner(&self, key: &[u8]) -> Option<SocketAddr> {
        read(&self.shared.slots).primary(hash_slot(key))
    }

    /// Requests the cluster topology again with the next I/O round.
    ///
    /// Endpoints missing from the new topology are removed unless they were configured.
    pub fn refresh_topology(&self) {
        self.shared.refresh_requested.store(true, Ordering::Release);
        if !self.shared.worker_running.load(Ordering::Acquire) {
            self.shared.tick();
        }
    }

    /// Number of ConnectionFailed events so far
    pub fn failed_count(&self) -> usize {
        self.shared.events.failed_count()
    }

    /// Number of ConnectionRestored events so far
    pub fn restored_count(&self) -> usize {
        self.shared.events.restored_count()
    }

    /// Fails the given connection as if the failure happened on the socket. Returns false for unknown endpoints.
    pub fn simulate_failure(&self, address: SocketAddr, kind: ConnectionType, failure: ConnectionFailureType) -> bool {
        match self.shared.find(address) {
            Some(endpoint) => {
                lock(endpoint.slot(kind)).connection.simulate_failure(failure);
                true
            }
            None => false,
        }
    }
}

impl<N: TcpClientStack> Drop for ConnectionMultiplexer<N> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            self.shared.worker_running.store(false, Ordering::Release);
        }
    }
}
