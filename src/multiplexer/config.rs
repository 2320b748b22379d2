use crate::multiplexer::retry::{ExponentialRetry, ReconnectRetryPolicy};
use crate::network::ConnectionOptions;
use bytes::Bytes;
use embedded_nal::SocketAddr;
use embedded_time::duration::Microseconds;
use std::sync::Arc;

/// Default key used for agreeing on a primary
pub const DEFAULT_TIE_BREAKER: &str = "__Booksleeve_TieBreak";

/// Role an endpoint is configured or detected with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerRole {
    #[default]
    Unknown,
    Primary,
    Replica,
}

/// Configured server address with an optional role hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub address: SocketAddr,
    pub role: ServerRole,
}

/// Handling of commands for which no connection is available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogPolicy {
    /// Fail at once with [CommandErrors::NoConnectionAvailable](crate::network::CommandErrors::NoConnectionAvailable)
    FailFast,
    /// Queue up to `max` commands per endpoint until it reconnects
    Queue { max: usize },
}

impl Default for BacklogPolicy {
    fn default() -> Self {
        BacklogPolicy::Queue { max: 1024 }
    }
}

/// Configuration of a [ConnectionMultiplexer](crate::multiplexer::ConnectionMultiplexer)
///
/// Setters can be chained:
///
/// ```text
/// let mut config = MultiplexerConfig::new();
/// config.endpoint(primary).replica(replica).allow_admin(true);
/// ```
#[derive(Clone)]
pub struct MultiplexerConfig {
    pub(crate) endpoints: Vec<EndpointConfig>,
    pub(crate) options: ConnectionOptions,
    pub(crate) retry: Arc<dyn ReconnectRetryPolicy>,
    pub(crate) backlog: BacklogPolicy,
    pub(crate) tie_breaker: Option<Bytes>,
    pub(crate) allow_admin: bool,
    pub(crate) disabled_commands: Vec<String>,
    pub(crate) cluster_discovery: bool,
    pub(crate) background_worker: bool,
    pub(crate) poll_interval: Microseconds,
    pub(crate) abort_on_connect_fail: bool,
    pub(crate) connect_rounds: usize,
}

impl MultiplexerConfig {
    pub fn new() -> Self {
        Self {
            endpoints: vec![],
            options: ConnectionOptions::default(),
            retry: Arc::new(ExponentialRetry::default()),
            backlog: BacklogPolicy::default(),
            tie_breaker: Some(Bytes::from_static(DEFAULT_TIE_BREAKER.as_bytes())),
            allow_admin: false,
            disabled_commands: vec![],
            cluster_discovery: true,
            background_worker: true,
            poll_interval: Microseconds(1_000),
            abort_on_connect_fail: true,
            connect_rounds: 1_000,
        }
    }

    /// Adds an endpoint without role hint
    pub fn endpoint(&mut self, address: SocketAddr) -> &mut Self {
        self.endpoint_with_role(address, ServerRole::Unknown)
    }

    /// Adds an endpoint expected to be a replica
    pub fn replica(&mut self, address: SocketAddr) -> &mut Self {
        self.endpoint_with_role(address, ServerRole::Replica)
    }

    pub fn endpoint_with_role(&mut self, address: SocketAddr, role: ServerRole) -> &mut Self {
        if !self.endpoints.iter().any(|endpoint| endpoint.address == address) {
            self.endpoints.push(EndpointConfig { address, role });
        }
        self
    }

    pub fn options(&mut self, options: ConnectionOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Mutable access to the per connection options
    pub fn options_mut(&mut self) -> &mut ConnectionOptions {
        &mut self.options
    }

    pub fn retry_policy<P: ReconnectRetryPolicy + 'static>(&mut self, policy: P) -> &mut Self {
        self.retry = Arc::new(policy);
        self
    }

    pub fn backlog(&mut self, policy: BacklogPolicy) -> &mut Self {
        self.backlog = policy;
        self
    }

    /// Sets the tie-breaker key. An empty key disables the tie-breaker.
    pub fn tie_breaker(&mut self, key: &str) -> &mut Self {
        self.tie_breaker = match key.is_empty() {
            true => None,
            false => Some(Bytes::from(key.to_string())),
        };
        self
    }

    /// Enables commands flagged as admin
    pub fn allow_admin(&mut self, allow: bool) -> &mut Self {
        self.allow_admin = allow;
        self
    }

    /// Rejects the given command locally, e.g. commands renamed or blocked by ACLs
    pub fn disable_command(&mut self, name: &str) -> &mut Self {
        self.disabled_commands.push(name.to_ascii_uppercase());
        self
    }

    /// Query CLUSTER SLOTS on connect and route keyed commands by hash slot
    pub fn cluster_discovery(&mut self, enabled: bool) -> &mut Self {
        self.cluster_discovery = enabled;
        self
    }

    /// Runs the I/O loop on a dedicated thread. Otherwise waiting callers drive it.
    pub fn background_worker(&mut self, enabled: bool) -> &mut Self {
        self.background_worker = enabled;
        self
    }

    /// Sleep between two ticks of the background worker
    pub fn poll_interval(&mut self, interval: Microseconds) -> &mut Self {
        self.poll_interval = interval;
        self
    }

    /// Fails connect() if no endpoint could be reached
    pub fn abort_on_connect_fail(&mut self, abort: bool) -> &mut Self {
        self.abort_on_connect_fail = abort;
        self
    }

    /// Max. number of I/O rounds connect() waits for the endpoints to settle
    pub fn connect_rounds(&mut self, rounds: usize) -> &mut Self {
        self.connect_rounds = rounds;
        self
    }

    pub(crate) fn is_disabled(&self, command: &str) -> bool {
        self.disabled_commands.iter().any(|name| name.eq_ignore_ascii_case(command))
    }
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self::new()
    }
}
