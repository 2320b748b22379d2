/// RESP protocol version spoken on a connection
///
/// RESP3 requires Redis version >= 6.0 and is negotiated with `HELLO 3` during the handshake.
/// Push messages and the RESP3 types are decoded on both versions, so the version only decides
/// whether the protocol switch is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Resp2,
    Resp3,
}

impl Protocol {
    /// Returns true if protocol switch, respectively HELLO command, is needed
    pub fn requires_hello(&self) -> bool {
        matches!(self, Protocol::Resp3)
    }

    /// Version number as used by HELLO
    pub fn version(&self) -> usize {
        match self {
            Protocol::Resp2 => 2,
            Protocol::Resp3 => 3,
        }
    }
}
