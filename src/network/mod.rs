pub use cancel::{CancellationToken, RequestContext};
pub use connection::{
    ConnectionState, ConnectionType, PhysicalConnection, Probes, ServerInfo, Transition,
};
pub use error::{CommandErrors, ConnectionFailureType, TimeoutDiagnostics};
pub use future::{AsyncResponse, AsyncResultBox, Completion, Driver, ResponseFuture, SyncResultBox};
pub use handler::{ConnectionError, ConnectionOptions, Credentials};
pub use protocol::Protocol;
pub use timeout::{MonotonicClock, Timeout, TimeoutError};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) mod cancel;
pub(crate) mod connection;
pub(crate) mod error;
pub(crate) mod future;
pub mod handler;
pub(crate) mod protocol;
pub(crate) mod response;
pub(crate) mod timeout;

pub(crate) mod tests;

/// Locks the mutex. A panic of another lock holder does not render the state unusable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
