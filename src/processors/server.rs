use crate::codec::RespValue;
use crate::commands::ResponseTypeError;
use crate::processors::{integer_of, string_of, strip_attributes, ResultProcessor};
use embedded_nal::{IpAddr, SocketAddr};

/// Replica as listed by the ROLE reply of a primary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInfo {
    pub host: String,
    pub port: u16,
    pub offset: i64,
}

/// Reply of ROLE
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Primary {
        replication_offset: i64,
        replicas: Vec<ReplicaInfo>,
    },
    Replica {
        primary_host: String,
        primary_port: u16,
        state: String,
        offset: i64,
    },
    Sentinel {
        primaries: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleProcessor;

impl ResultProcessor for RoleProcessor {
    type Output = Role;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        let elements = value.as_elements().ok_or_else(|| ResponseTypeError::new("array", value))?;
        let kind = elements
            .first()
            .and_then(string_of)
            .ok_or_else(|| ResponseTypeError::new("role name", value))?;

        match (kind.as_str(), elements) {
            ("master", [_, offset, replicas]) => Ok(Role::Primary {
                replication_offset: integer_of(offset).ok_or_else(|| ResponseTypeError::new("offset", offset))?,
                replicas: replicas
                    .as_elements()
                    .ok_or_else(|| ResponseTypeError::new("replica list", replicas))?
                    .iter()
                    .map(replica_info)
                    .collect::<Result<Vec<_>, _>>()?,
            }),
            ("slave" | "replica", [_, host, port, state, offset]) => Ok(Role::Replica {
                primary_host: string_of(host).ok_or_else(|| ResponseTypeError::new("host", host))?,
                primary_port: port_of(port)?,
                state: string_of(state).ok_or_else(|| ResponseTypeError::new("state", state))?,
                offset: integer_of(offset).ok_or_else(|| ResponseTypeError::new("offset", offset))?,
            }),
            ("sentinel", [_, primaries]) => Ok(Role::Sentinel {
                primaries: primaries
                    .as_elements()
                    .ok_or_else(|| ResponseTypeError::new("primary list", primaries))?
                    .iter()
                    .map(|name| string_of(name).ok_or_else(|| ResponseTypeError::new("primary name", name)))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
            _ => Err(ResponseTypeError::new("master, slave or sentinel role", value)),
        }
    }
}

fn replica_info(value: &RespValue) -> Result<ReplicaInfo, ResponseTypeError> {
    match value.as_elements() {
        Some([host, port, offset]) => Ok(ReplicaInfo {
            host: string_of(host).ok_or_else(|| ResponseTypeError::new("host", host))?,
            port: port_of(port)?,
            offset: integer_of(offset).ok_or_else(|| ResponseTypeError::new("offset", offset))?,
        }),
        _ => Err(ResponseTypeError::new("[host, port, offset]", value)),
    }
}

fn port_of(value: &RespValue) -> Result<u16, ResponseTypeError> {
    integer_of(value)
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| ResponseTypeError::new("port", value))
}

/// Mapped response to HELLO command
#[derive(Debug, Clone, PartialEq)]
pub struct HelloResponse {
    pub server: String,
    pub version: String,
    pub protocol: i64,
    pub id: i64,
    pub mode: String,
    pub role: String,
    pub modules: Vec<RespValue>,
}

/// HELLO reply, as RESP3 map or RESP2 flat array
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloProcessor;

impl ResultProcessor for HelloProcessor {
    type Output = HelloResponse;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        let pairs = super::MapProcessor.process(value)?;
        let find = |name: &'static str| {
            pairs
                .iter()
                .find(|(key, _)| key.as_str() == Some(name))
                .map(|(_, value)| value)
                .ok_or_else(|| ResponseTypeError::new(name, value))
        };
        let find_string = |name: &'static str| {
            let field = find(name)?;
            string_of(field).ok_or_else(|| ResponseTypeError::new(name, field))
        };
        let find_integer = |name: &'static str| {
            let field = find(name)?;
            integer_of(field).ok_or_else(|| ResponseTypeError::new(name, field))
        };

        let modules = find("modules")?;

        Ok(HelloResponse {
            server: find_string("server")?,
            version: find_string("version")?,
            protocol: find_integer("proto")?,
            id: find_integer("id")?,
            mode: find_string("mode")?,
            role: find_string("role")?,
            modules: modules
                .as_elements()
                .ok_or_else(|| ResponseTypeError::new("modules", modules))?
                .iter()
                .map(strip_attributes)
                .collect(),
        })
    }
}

/// Host and port of a cluster node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    /// Socket address, if the host is an IP address
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let ip: IpAddr = self.host.parse().ok()?;
        Some(SocketAddr::new(ip, self.port))
    }
}

/// Slot range served by one primary and its replicas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub primary: NodeAddress,
    pub replicas: Vec<NodeAddress>,
}

/// Reply of CLUSTER SLOTS
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterSlotsProcessor;

impl ResultProcessor for ClusterSlotsProcessor {
    type Output = Vec<SlotRange>;

    fn process(&self, value: &RespValue) -> Result<Self::Output, ResponseTypeError> {
        value
            .as_elements()
            .ok_or_else(|| ResponseTypeError::new("array", value))?
            .iter()
            .map(slot_range)
            .collect()
    }
}

fn slot_range(value: &RespValue) -> Result<SlotRange, ResponseTypeError> {
    let elements = match value.as_elements() {
        Some(elements) if elements.len() >= 3 => elements,
        _ => return Err(ResponseTypeError::new("[start, end, primary, replicas...]", value)),
    };

    let slot = |value: &RespValue| {
        integer_of(value)
            .and_then(|slot| u16::try_from(slot).ok())
            .filter(|slot| *slot < 16384)
            .ok_or_else(|| ResponseTypeError::new("slot", value))
    };

    Ok(SlotRange {
        start: slot(&elements[0])?,
        end: slot(&elements[1])?,
        primary: node_address(&elements[2])?,
        replicas: elements[3..].iter().map(node_address).collect::<Result<Vec<_>, _>>()?,
    })
}

fn node_address(value: &RespValue) -> Result<NodeAddress, ResponseTypeError> {
    match value.as_elements() {
        Some([host, port, ..]) => Ok(NodeAddress {
            host: string_of(host).ok_or_else(|| ResponseTypeError::new("host", host))?,
            port: port_of(port)?,
        }),
        _ => Err(ResponseTypeError::new("[host, port, ...]", value)),
    }
}
