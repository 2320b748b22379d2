use crate::multiplexer::{ConnectionMultiplexer, LinearRetry, MultiplexerConfig};
use crate::network::tests::fake::{FakeNetwork, FakeStack};
use embedded_nal::SocketAddr;
use embedded_time::duration::Extensions;
use std::time::Duration;
use std_embedded_time::StandardClock;

#[cfg(test)]
mod routing;

pub(crate) fn address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Config without background worker and with fast reconnects
pub(crate) fn config(ports: &[u16]) -> MultiplexerConfig {
    let mut config = MultiplexerConfig::new();
    for port in ports {
        config.endpoint(address(*port));
    }
    config
        .background_worker(false)
        .retry_policy(LinearRetry::new(1_000.microseconds()));
    config
}

pub(crate) fn connect(network: &FakeNetwork, config: MultiplexerConfig) -> ConnectionMultiplexer<FakeStack> {
    match try_connect(network, config) {
        Ok(multiplexer) => multiplexer,
        Err(error) => panic!("Connect failed: {}", error),
    }
}

pub(crate) fn try_connect(
    network: &FakeNetwork,
    config: MultiplexerConfig,
) -> Result<ConnectionMultiplexer<FakeStack>, crate::network::ConnectionError> {
    let network = network.clone();
    ConnectionMultiplexer::connect(config, StandardClock::default(), move || network.stack())
}

/// Polls until the condition holds, panics after about one second
pub(crate) fn poll_until<F: Fn() -> bool>(multiplexer: &ConnectionMultiplexer<FakeStack>, condition: F) {
    for _ in 0..1_000 {
        multiplexer.poll();
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    panic!("Condition not reached");
}
