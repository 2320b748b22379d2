use crate::commands::custom::CustomCommand;
use crate::commands::get::GetCommand;
use crate::commands::{CommandBuilder, CommandFlags};
use crate::multiplexer::tests::{address, config, connect, poll_until};
use crate::multiplexer::{BacklogPolicy, ConnectionMultiplexer, ElectionKind, MultiplexerEvent, ServerRole};
use crate::network::tests::fake::{FakeNetwork, FakeRole, FakeStack};
use crate::network::{CommandErrors, ConnectionState, RequestContext};
use std::sync::{Arc, Mutex};

fn primary_and_replica() -> FakeNetwork {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    network.add_replica(address(7001), address(7000));
    network
}

fn echo(flags: CommandFlags) -> CustomCommand {
    CustomCommand::new(CommandBuilder::new("ECHO").arg_static("hello")).with_flags(flags)
}

fn role_of(multiplexer: &ConnectionMultiplexer<FakeStack>, port: u16) -> ServerRole {
    multiplexer
        .endpoints()
        .into_iter()
        .find(|endpoint| endpoint.address == address(port))
        .map(|endpoint| endpoint.role)
        .unwrap()
}

#[test]
fn test_roles_detected_on_connect() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7001, 7000]));

    assert_eq!(ServerRole::Replica, role_of(&multiplexer, 7001));
    assert_eq!(ServerRole::Primary, role_of(&multiplexer, 7000));
    assert_eq!(Some(address(7000)), multiplexer.primary());
    assert_eq!(ElectionKind::Single, multiplexer.election().unwrap().kind);
}

#[test]
fn test_default_routes_to_primary() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7001, 7000]));

    multiplexer.send(echo(CommandFlags::empty())).unwrap().wait().unwrap();
    multiplexer.get("a").unwrap().wait().unwrap();

    assert_eq!(1, network.count(address(7000), "ECHO"));
    assert_eq!(1, network.count(address(7000), "GET a"));
    assert_eq!(0, network.count(address(7001), "ECHO"));
}

#[test]
fn test_demand_replica() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7000, 7001]));

    multiplexer.send(echo(CommandFlags::DEMAND_REPLICA)).unwrap().wait().unwrap();
    assert_eq!(1, network.count(address(7001), "ECHO"));
    assert_eq!(0, network.count(address(7000), "ECHO"));
}

#[test]
fn test_replicas_used_round_robin() {
    let network = primary_and_replica();
    network.add_replica(address(7002), address(7000));
    let multiplexer = connect(&network, config(&[7000, 7001, 7002]));

    for _ in 0..4 {
        multiplexer.send(echo(CommandFlags::DEMAND_REPLICA)).unwrap().wait().unwrap();
    }

    assert_eq!(2, network.count(address(7001), "ECHO"));
    assert_eq!(2, network.count(address(7002), "ECHO"));
    assert_eq!(0, network.count(address(7000), "ECHO"));
}

#[test]
fn test_context_flags_override_command_flags() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7000, 7001]));

    let context = RequestContext::new().with_flags(CommandFlags::DEMAND_REPLICA);
    let response = multiplexer
        .send_with(GetCommand::new("a"), &context)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(None, response);
    assert_eq!(1, network.count(address(7001), "GET a"));
}

#[test]
fn test_prefer_replica_falls_back_to_primary() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7000, 7001]));

    multiplexer.send(echo(CommandFlags::PREFER_REPLICA)).unwrap().wait().unwrap();
    assert_eq!(1, network.count(address(7001), "ECHO"));

    network.kill_server(address(7001));
    poll_until(&multiplexer, || multiplexer.failed_count() == 2);

    multiplexer.send(echo(CommandFlags::PREFER_REPLICA)).unwrap().wait().unwrap();
    assert_eq!(1, network.count(address(7000), "ECHO"));
    assert_eq!(1, network.count(address(7001), "ECHO"));
}

#[test]
fn test_demand_master_without_primary() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7001]));

    match multiplexer.send(echo(CommandFlags::DEMAND_MASTER)) {
        Err(CommandErrors::NoConnectionAvailable(message)) => assert_eq!("no server eligible for ECHO", message),
        result => panic!("Unexpected result: {:?}", result.err()),
    }
}

#[test]
fn test_demand_replica_fails_fast_when_replica_down() {
    let network = primary_and_replica();
    let mut config = config(&[7000, 7001]);
    config.backlog(BacklogPolicy::FailFast);
    let multiplexer = connect(&network, config);

    network.kill_server(address(7001));
    poll_until(&multiplexer, || multiplexer.failed_count() == 2);

    assert!(matches!(
        multiplexer.send(echo(CommandFlags::DEMAND_REPLICA)).err(),
        Some(CommandErrors::NoConnectionAvailable(_))
    ));
}

#[test]
fn test_replica_hint_used_before_detection() {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    let mut config = config(&[7000]);
    config.replica(address(7001));
    config.abort_on_connect_fail(false);
    let multiplexer = connect(&network, config);

    assert_eq!(ServerRole::Replica, role_of(&multiplexer, 7001));
    assert_eq!(ConnectionState::Failed, multiplexer.endpoints()[1].interactive);
}

#[test]
fn test_tie_breaker_decides_between_primaries() {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    network.add_primary(address(7001));
    network.set_value(address(7000), "__Booksleeve_TieBreak", "127.0.0.1:7001");
    network.set_value(address(7001), "__Booksleeve_TieBreak", "127.0.0.1:7001");
    let multiplexer = connect(&network, config(&[7000, 7001]));

    let election = multiplexer.election().unwrap();
    assert_eq!(Some(address(7001)), election.primary);
    assert_eq!(ElectionKind::Unanimous, election.kind);
    assert_eq!(ServerRole::Unknown, role_of(&multiplexer, 7000));
    assert_eq!(ServerRole::Primary, role_of(&multiplexer, 7001));

    multiplexer.send(echo(CommandFlags::DEMAND_MASTER)).unwrap().wait().unwrap();
    assert_eq!(1, network.count(address(7001), "ECHO"));
}

#[test]
fn test_custom_tie_breaker_key() {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    network.add_primary(address(7001));
    network.set_value(address(7000), "election", "127.0.0.1:7001");
    let mut config = config(&[7000, 7001]);
    config.tie_breaker("election");
    let multiplexer = connect(&network, config);

    assert_eq!(Some(address(7001)), multiplexer.primary());
    assert_eq!(1, network.count(address(7000), "GET election"));
}

#[test]
fn test_disabled_tie_breaker_is_arbitrary() {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    network.add_primary(address(7001));
    let mut config = config(&[7001, 7000]);
    config.tie_breaker("");
    let multiplexer = connect(&network, config);

    let election = multiplexer.election().unwrap();
    assert_eq!(Some(address(7001)), election.primary);
    assert_eq!(ElectionKind::Arbitrary, election.kind);
    assert_eq!(0, network.count(address(7000), "GET"));
}

#[test]
fn test_topology_change_after_primary_failure() {
    let network = FakeNetwork::new();
    network.add_primary(address(7000));
    network.add_primary(address(7001));
    let multiplexer = connect(&network, config(&[7000, 7001]));
    assert_eq!(Some(address(7000)), multiplexer.primary());

    let events = Arc::new(Mutex::new(vec![]));
    let captured = events.clone();
    multiplexer.on_event(move |event| {
        if let MultiplexerEvent::TopologyChanged { .. } = event {
            captured.lock().unwrap().push(event.clone());
        }
    });

    network.kill_server(address(7000));
    poll_until(&multiplexer, || multiplexer.primary() == Some(address(7001)));

    assert_eq!(
        vec![MultiplexerEvent::TopologyChanged {
            previous: Some(address(7000)),
            primary: Some(address(7001)),
        }],
        *events.lock().unwrap()
    );
    assert_eq!(ElectionKind::Single, multiplexer.election().unwrap().kind);
}

#[test]
fn test_replica_promoted_after_role_change() {
    let network = primary_and_replica();
    let multiplexer = connect(&network, config(&[7000, 7001]));

    network.kill_server(address(7000));
    network.set_role(address(7001), FakeRole::Primary);
    network.break_sockets(address(7001));

    poll_until(&multiplexer, || multiplexer.primary() == Some(address(7001)));
    assert_eq!(ServerRole::Primary, role_of(&multiplexer, 7001));
    assert_ne!(ConnectionState::ConnectedEstablished, multiplexer.endpoints()[0].interactive);
}
