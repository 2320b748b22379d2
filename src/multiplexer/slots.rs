//! Cluster hash slots and redirects
//!
//! Keys map to one of 16384 slots by CRC16 of the key, or of its `{hash tag}`. A slot map built
//! from `CLUSTER SLOTS` and updated by `MOVED` replies routes keyed commands to the owning node.
use crate::codec::RespValue;
use crate::processors::SlotRange;
use embedded_nal::SocketAddr;

/// Max. number of MOVED/ASK hops of a single command
pub const MAX_REDIRECTS: usize = 5;

/// Total number of hash slots
pub const SLOT_COUNT: u16 = 16384;

/// CRC16-XMODEM lookup table
#[rustfmt::skip]
static CRC16_TABLE: [u16; 256] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50A5, 0x60C6, 0x70E7,
    0x8108, 0x9129, 0xA14A, 0xB16B, 0xC18C, 0xD1AD, 0xE1CE, 0xF1EF,
    0x1231, 0x0210, 0x3273, 0x2252, 0x52B5, 0x4294, 0x72F7, 0x62D6,
    0x9339, 0x8318, 0xB37B, 0xA35A, 0xD3BD, 0xC39C, 0xF3FF, 0xE3DE,
    0x2462, 0x3443, 0x0420, 0x1401, 0x64E6, 0x74C7, 0x44A4, 0x5485,
    0xA56A, 0xB54B, 0x8528, 0x9509, 0xE5EE, 0xF5CF, 0xC5AC, 0xD58D,
    0x3653, 0x2672, 0x1611, 0x0630, 0x76D7, 0x66F6, 0x5695, 0x46B4,
    0xB75B, 0xA77A, 0x9719, 0x8738, 0xF7DF, 0xE7FE, 0xD79D, 0xC7BC,
    0x48C4, 0x58E5, 0x6886, 0x78A7, 0x0840, 0x1861, 0x2802, 0x3823,
    0xC9CC, 0xD9ED, 0xE98E, 0xF9AF, 0x8948, 0x9969, 0xA90A, 0xB92B,
    0x5AF5, 0x4AD4, 0x7AB7, 0x6A96, 0x1A71, 0x0A50, 0x3A33, 0x2A12,
    0xDBFD, 0xCBDC, 0xFBBF, 0xEB9E, 0x9B79, 0x8B58, 0xBB3B, 0xAB1A,
    0x6CA6, 0x7C87, 0x4CE4, 0x5CC5, 0x2C22, 0x3C03, 0x0C60, 0x1C41,
    0xEDAE, 0xFD8F, 0xCDEC, 0xDDCD, 0xAD2A, 0xBD0B, 0x8D68, 0x9D49,
    0x7E97, 0x6EB6, 0x5ED5, 0x4EF4, 0x3E13, 0x2E32, 0x1E51, 0x0E70,
    0xFF9F, 0xEFBE, 0xDFDD, 0xCFFC, 0xBF1B, 0xAF3A, 0x9F59, 0x8F78,
    0x9188, 0x81A9, 0xB1CA, 0xA1EB, 0xD10C, 0xC12D, 0xF14E, 0xE16F,
    0x1080, 0x00A1, 0x30C2, 0x20E3, 0x5004, 0x4025, 0x7046, 0x6067,
    0x83B9, 0x9398, 0xA3FB, 0xB3DA, 0xC33D, 0xD31C, 0xE37F, 0xF35E,
    0x02B1, 0x1290, 0x22F3, 0x32D2, 0x4235, 0x5214, 0x6277, 0x7256,
    0xB5EA, 0xA5CB, 0x95A8, 0x8589, 0xF56E, 0xE54F, 0xD52C, 0xC50D,
    0x34E2, 0x24C3, 0x14A0, 0x0481, 0x7466, 0x6447, 0x5424, 0x4405,
    0xA7DB, 0xB7FA, 0x8799, 0x97B8, 0xE75F, 0xF77E, 0xC71D, 0xD73C,
    0x26D3, 0x36F2, 0x0691, 0x16B0, 0x6657, 0x7676, 0x4615, 0x5634,
    0xD94C, 0xC96D, 0xF90E, 0xE92F, 0x99C8, 0x89E9, 0xB98A, 0xA9AB,
    0x5844, 0x4865, 0x7806, 0x6827, 0x18C0, 0x08E1, 0x3882, 0x28A3,
    0xCB7D, 0xDB5C, 0xEB3F, 0xFB1E, 0x8BF9, 0x9BD8, 0xABBB, 0xBB9A,
    0x4A75, 0x5A54, 0x6A37, 0x7A16, 0x0AF1, 0x1AD0, 0x2AB3, 0x3A92,
    0xFD2E, 0xED0F, 0xDD6C, 0xCD4D, 0xBDAA, 0xAD8B, 0x9DE8, 0x8DC9,
    0x7C26, 0x6C07, 0x5C64, 0x4C45, 0x3CA2, 0x2C83, 0x1CE0, 0x0CC1,
    0xEF1F, 0xFF3E, 0xCF5D, 0xDF7C, 0xAF9B, 0xBFBA, 0x8FD9, 0x9FF8,
    0x6E17, 0x7E36, 0x4E55, 0x5E74, 0x2E93, 0x3EB2, 0x0ED1, 0x1EF0,
];

/// CRC16-XMODEM, as used by Redis for key slots
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, byte| {
        let index = ((crc >> 8) ^ *byte as u16) as u8;
        (crc << 8) ^ CRC16_TABLE[index as usize]
    })
}

/// Slot of the given key
///
/// If the key contains a non-empty hash tag (first `{` up to the next `}`), only the tag is hashed.
pub fn hash_slot(key: &[u8]) -> u16 {
    let tagged = key.iter().position(|byte| *byte == b'{').and_then(|open| {
        let rest = &key[open + 1..];
        match rest.iter().position(|byte| *byte == b'}') {
            Some(0) | None => None,
            Some(close) => Some(&rest[..close]),
        }
    });

    crc16(tagged.unwrap_or(key)) % SLOT_COUNT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Slot permanently owned by another node
    Moved,
    /// One-time redirect during slot migration
    Ask,
}

/// Parsed MOVED or ASK error reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub slot: u16,
    pub address: SocketAddr,
}

/// Parses a MOVED or ASK redirect from an error reply
///
/// Returns None for other values and for targets given as host names.
pub fn parse_redirect(value: &RespValue) -> Option<Redirect> {
    let message = value.error_message()?;
    let (kind, rest) = if let Some(rest) = message.strip_prefix("MOVED ") {
        (RedirectKind::Moved, rest)
    } else if let Some(rest) = message.strip_prefix("ASK ") {
        (RedirectKind::Ask, rest)
    } else {
        return None;
    };

    let mut parts = rest.trim().splitn(2, ' ');
    let slot = parts.next()?.parse::<u16>().ok().filter(|slot| *slot < SLOT_COUNT)?;
    let address = parts.next()?.parse::<SocketAddr>().ok()?;

    Some(Redirect { kind, slot, address })
}

/// Owner of each slot
#[derive(Debug, Clone, Default)]
pub struct SlotMap {
    /// Primary of each slot, empty if cluster mode is unknown
    primaries: Vec<Option<SocketAddr>>,

    /// Replicas of each slot range, by start slot
    replicas: Vec<(u16, u16, Vec<SocketAddr>)>,
}

impl SlotMap {
    /// Builds the map from a CLUSTER SLOTS reply. Nodes given as host names are skipped.
    pub fn from_ranges(ranges: &[SlotRange]) -> Self {
        let mut map = SlotMap::default();
        for range in ranges {
            let primary = match range.primary.to_socket_addr() {
                Some(address) => address,
                None => continue,
            };

            for slot in range.start..=range.end {
                map.set(slot, primary);
            }

            let replicas: Vec<SocketAddr> = range.replicas.iter().filter_map(|node| node.to_socket_addr()).collect();
            if !replicas.is_empty() {
                map.replicas.push((range.start, range.end, replicas));
            }
        }

        map
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.iter().all(Option::is_none)
    }

    /// Primary owning the slot
    pub fn primary(&self, slot: u16) -> Option<SocketAddr> {
        self.primaries.get(slot as usize).copied().flatten()
    }

    /// Replicas serving the slot
    pub fn replicas(&self, slot: u16) -> &[SocketAddr] {
        self.replicas
            .iter()
            .find(|(start, end, _)| *start <= slot && slot <= *end)
            .map(|(_, _, replicas)| replicas.as_slice())
            .unwrap_or(&[])
    }

    /// Assigns the slot to a new primary, as announced by MOVED. Returns true if the owner changed.
    pub fn set(&mut self, slot: u16, primary: SocketAddr) -> bool {
        if slot >= SLOT_COUNT {
            return false;
        }

        if self.primaries.is_empty() {
            self.primaries = vec![None; SLOT_COUNT as usize];
        }

        let previous = self.primaries[slot as usize].replace(primary);
        previous != Some(primary)
    }

    /// All known primaries, in order of first slot
    pub fn nodes(&self) -> Vec<SocketAddr> {
        let mut nodes: Vec<SocketAddr> = vec![];
        for address in self.primaries.iter().flatten() {
            if !nodes.contains(address) {
                nodes.push(*address);
            }
        }
        for (_, _, replicas) in &self.replicas {
            for address in replicas {
                if !nodes.contains(address) {
                    nodes.push(*address);
                }
            }
        }
        nodes
    }
}
