use bytes::{Bytes, BytesMut};
use core::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Channel name matched literally (SUBSCRIBE)
    Literal,
    /// Glob-style pattern (PSUBSCRIBE)
    Pattern,
    /// Cluster sharded channel (SSUBSCRIBE)
    Sharded,
}

/// Pub/Sub channel or pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedisChannel {
    name: Bytes,
    kind: ChannelKind,
}

impl RedisChannel {
    pub fn literal<B: Into<Bytes>>(name: B) -> Self {
        Self::new(name, ChannelKind::Literal)
    }

    pub fn pattern<B: Into<Bytes>>(pattern: B) -> Self {
        Self::new(pattern, ChannelKind::Pattern)
    }

    pub fn sharded<B: Into<Bytes>>(name: B) -> Self {
        Self::new(name, ChannelKind::Sharded)
    }

    pub fn new<B: Into<Bytes>>(name: B, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &Bytes {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_pattern(&self) -> bool {
        self.kind == ChannelKind::Pattern
    }

    /// Copy of the channel with the given prefix in front of the name
    pub fn with_prefix(&self, prefix: &[u8]) -> RedisChannel {
        if prefix.is_empty() {
            return self.clone();
        }

        let mut name = BytesMut::with_capacity(prefix.len() + self.name.len());
        name.extend_from_slice(prefix);
        name.extend_from_slice(&self.name);
        Self::new(name.freeze(), self.kind)
    }

    /// True if a message published to `channel` is received by this subscription
    pub fn matches(&self, channel: &[u8]) -> bool {
        match self.kind {
            ChannelKind::Pattern => glob_match(&self.name, channel),
            ChannelKind::Literal | ChannelKind::Sharded => self.name[..] == *channel,
        }
    }

    pub(crate) fn subscribe_command(&self) -> &'static str {
        match self.kind {
            ChannelKind::Literal => "SUBSCRIBE",
            ChannelKind::Pattern => "PSUBSCRIBE",
            ChannelKind::Sharded => "SSUBSCRIBE",
        }
    }

    pub(crate) fn unsubscribe_command(&self) -> &'static str {
        match self.kind {
            ChannelKind::Literal => "UNSUBSCRIBE",
            ChannelKind::Pattern => "PUNSUBSCRIBE",
            ChannelKind::Sharded => "SUNSUBSCRIBE",
        }
    }

    /// Key used for slot routing. Patterns are not bound to a slot.
    pub(crate) fn routing_key(&self) -> Option<&Bytes> {
        match self.kind {
            ChannelKind::Pattern => None,
            ChannelKind::Literal | ChannelKind::Sharded => Some(&self.name),
        }
    }
}

impl Display for RedisChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.name))
    }
}

/// Redis glob matching: `*`, `?`, `[abc]`, `[^a]`, `[a-z]` and `\` escapes
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;

    // Position after the last `*` and the text position it currently covers
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                while pattern.get(p) == Some(&b'*') {
                    p += 1;
                }
                if p == pattern.len() {
                    return true;
                }
                backtrack = Some((p, t));
                continue;
            }
            Some(b'?') => Some(p + 1),
            Some(b'[') => match_class(pattern, p, text[t]),
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == text[t]).then_some(p + 2),
            Some(byte) => (*byte == text[t]).then_some(p + 1),
            None => None,
        };

        match step {
            Some(next) => {
                p = next;
                t += 1;
            }
            None => match backtrack {
                Some((star, covered)) => {
                    p = star;
                    t = covered + 1;
                    backtrack = Some((star, covered + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|byte| *byte == b'*')
}

/// Matches a `[...]` class starting at `start`. Returns the pattern position after the class.
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<usize> {
    let mut p = start + 1;
    let negate = pattern.get(p) == Some(&b'^');
    if negate {
        p += 1;
    }

    let mut matched = false;
    loop {
        match pattern.get(p) {
            // Unterminated class ends at the end of the pattern
            None => break,
            Some(b']') => {
                p += 1;
                break;
            }
            Some(b'\\') if p + 1 < pattern.len() => {
                matched |= pattern[p + 1] == byte;
                p += 2;
            }
            Some(low) if pattern.get(p + 1) == Some(&b'-') && p + 2 < pattern.len() && pattern[p + 2] != b']' => {
                let (low, high) = match *low <= pattern[p + 2] {
                    true => (*low, pattern[p + 2]),
                    false => (pattern[p + 2], *low),
                };
                matched |= low <= byte && byte <= high;
                p += 3;
            }
            Some(other) => {
                matched |= *other == byte;
                p += 1;
            }
        }
    }

    (matched != negate).then_some(p)
}
