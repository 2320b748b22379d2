use crate::network::{lock, ConnectionFailureType, ConnectionType};
use embedded_nal::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// State change of an endpoint, reported to registered listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiplexerEvent {
    /// A connection went down. Reported once per transition, not per failed command.
    ConnectionFailed {
        endpoint: SocketAddr,
        connection_type: ConnectionType,
        failure: ConnectionFailureType,
        message: String,
    },
    /// A previously failed connection is up again
    ConnectionRestored {
        endpoint: SocketAddr,
        connection_type: ConnectionType,
    },
    /// Elected primary changed
    TopologyChanged {
        previous: Option<SocketAddr>,
        primary: Option<SocketAddr>,
    },
}

pub type EventListener = Box<dyn Fn(&MultiplexerEvent) + Send + Sync>;

/// Fans out events to listeners and counts transitions
#[derive(Default)]
pub(crate) struct EventHub {
    listeners: Mutex<Vec<Arc<EventListener>>>,
    failed: AtomicUsize,
    restored: AtomicUsize,
}

impl EventHub {
    pub fn subscribe(&self, listener: EventListener) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    /// Logs and delivers the event. Must not be called while holding other internal locks.
    pub fn emit(&self, event: MultiplexerEvent) {
        match &event {
            MultiplexerEvent::ConnectionFailed { .. } => {
                self.failed.fetch_add(1, Ordering::AcqRel);
            }
            MultiplexerEvent::ConnectionRestored {
                endpoint,
                connection_type,
            } => {
                log::info!("Connection to {} ({}) restored", endpoint, connection_type);
                self.restored.fetch_add(1, Ordering::AcqRel);
            }
            MultiplexerEvent::TopologyChanged { previous, primary } => {
                log::info!("Topology changed, primary {:?} -> {:?}", previous, primary);
            }
        }

        let listeners: Vec<Arc<EventListener>> = lock(&self.listeners).clone();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn restored_count(&self) -> usize {
        self.restored.load(Ordering::Acquire)
    }
}
