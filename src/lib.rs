//! This crate offers a multiplexed Redis client core for RESP2 and RESP3.
//!
//! Any number of callers share one interactive and one subscription connection per server. The
//! [ConnectionMultiplexer](crate::multiplexer::ConnectionMultiplexer) picks the server per command,
//! elects a primary, reconnects failed connections, follows cluster redirects and moves Pub/Sub
//! subscriptions to another server if their connection fails.
//!
//! The crate consists of the following parts:
//! * [codec module](crate::codec) for RESP encoding and incremental decoding
//! * [processors module](crate::processors) for turning replies into typed results
//! * [commands module](crate::commands) for Redis command abstractions
//! * [network module](crate::network) for physical connections, futures, timeouts and cancellation
//! * [multiplexer module](crate::multiplexer) for routing, failover and redirects
//! * [subscribe module](crate::subscribe) for Pub/Sub
//!
//! Connecting requires a factory creating one [embedded-nal](https://docs.rs/embedded-nal) network
//! stack per connection and an [embedded-time](https://docs.rs/embedded-time) clock:
//!
//! ```text
//! let mut config = MultiplexerConfig::new();
//! config.endpoint(primary).replica(replica);
//!
//! let multiplexer = ConnectionMultiplexer::connect(config, StandardClock::default(), Stack::default)?;
//!
//! let future = multiplexer.set("key", "value")?;
//! future.wait()?;
//!
//! let subscriber = multiplexer.subscriber();
//! subscriber.subscribe(RedisChannel::literal("news"), |message| println!("{:?}", message.payload))?;
//! ```
#![cfg_attr(feature = "strict", deny(warnings))]

/// # RESP codec
///
/// [RespValue](crate::codec::RespValue) covers all RESP2 and RESP3 types. The
/// [Decoder](crate::codec::Decoder) works incrementally on partial input and
/// [CommandFrame](crate::codec::CommandFrame) holds an encoded command, optionally preceded by a
/// preamble such as `ASKING`.
pub mod codec;

/// # Redis command abstractions
///
/// This crate includes abstractions for some Redis commands like
/// [AUTH](crate::commands::auth),
/// [HELLO](crate::commands::hello),
/// [GET](crate::commands::get),
/// [SET](crate::commands::set),
/// [PUBLISH](crate::commands::publish), ...
///
/// Each abstraction is implementing the [Command](crate::commands::Command) trait.
///
/// For executing arbitrary (not yet implemented) commands, [CustomCommand](crate::commands::custom)
/// may be used. As alternative you can create new commands by implementing the [Command](crate::commands::Command) trait.
pub mod commands;

/// # Connection multiplexer
///
/// The [ConnectionMultiplexer](crate::multiplexer::ConnectionMultiplexer) keeps one endpoint per
/// known server. Commands are routed by their [CommandFlags](crate::commands::CommandFlags) and, in
/// cluster mode, by hash slot.
/// Commands without an available connection are parked in the endpoint backlog according to the
/// [BacklogPolicy](crate::multiplexer::BacklogPolicy).
///
/// `MOVED` replies update the slot map and trigger a `CLUSTER SLOTS` refresh. Endpoints no longer
/// reported by the cluster are removed, their backlog fails and their subscriptions move elsewhere.
pub mod multiplexer;

/// # Connections and response management
///
/// A [PhysicalConnection](crate::network::PhysicalConnection) owns one socket. It performs the
/// handshake (AUTH, HELLO, CLIENT SETNAME and topology probes), pipelines commands and matches
/// replies in FIFO order. It sends heartbeats when idle and fails all pending commands if the
/// socket breaks.
///
/// ## Non-blocking response management
///
/// Responses are returned as [ResponseFuture](crate::network::ResponseFuture) or, for async
/// callers, as [AsyncResponse](crate::network::AsyncResponse). Multiple commands can be in flight
/// and their responses handled in any order:
///
/// ```text
/// let future1 = multiplexer.set("key", "value")?;
/// let future2 = multiplexer.set("other", "key")?;
///
/// let _ = future2.wait();
/// let _ = future1.wait();
/// ```
///
/// ### Timeout and cancellation
///
/// Every command has a deadline, either the connection default or the one of its
/// [RequestContext](crate::network::RequestContext). An expired command fails with
/// [Timeout](crate::network::CommandErrors::Timeout), its late reply is discarded while the
/// connection keeps working. A [CancellationToken](crate::network::CancellationToken) completes
/// the command with [Cancelled](crate::network::CommandErrors::Cancelled).
pub mod network;

/// # Result processors
///
/// A [ResultProcessor](crate::processors::ResultProcessor) turns a decoded
/// [RespValue](crate::codec::RespValue) into a typed result. Attributes are skipped and null
/// replies of RESP2 and RESP3 are treated alike.
pub mod processors;

/// # Pub/Sub
///
/// A [Subscriber](crate::subscribe::Subscriber) shares the subscription connections of the
/// multiplexer. Handlers run on a dispatcher thread, queues are backed by crossbeam channels.
pub mod subscribe;
