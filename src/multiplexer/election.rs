use bytes::Bytes;
use embedded_nal::SocketAddr;

/// How the primary was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionKind {
    /// No endpoint claims to be primary
    NoCandidate,
    /// Exactly one endpoint claims to be primary
    Single,
    /// Every tie-breaker value names the same candidate
    Unanimous,
    /// More than half of the tie-breaker values name the same candidate
    Majority { votes: usize, voters: usize },
    /// No consensus, first candidate in configuration order
    Arbitrary,
}

/// Result of an election, kept for auditing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionOutcome {
    pub primary: Option<SocketAddr>,
    pub kind: ElectionKind,
    /// Diagnostic line, as logged
    pub message: String,
}

/// Picks the primary among the endpoints claiming that role
///
/// `votes` holds the tie-breaker value read from every reachable endpoint. Null values abstain.
/// Values not naming a candidate count as voters without supporting anyone.
pub fn elect(candidates: &[SocketAddr], votes: &[Option<Bytes>]) -> ElectionOutcome {
    let (primary, kind) = match candidates {
        [] => (None, ElectionKind::NoCandidate),
        [single] => (Some(*single), ElectionKind::Single),
        _ => tally(candidates, votes),
    };

    let message = match (kind, primary) {
        (ElectionKind::Single, Some(address)) => format!("Election: single primary {}", address),
        (ElectionKind::Unanimous, Some(address)) => format!("Election: tie-break is unanimous at {}", address),
        (ElectionKind::Majority { votes, voters }, Some(address)) => {
            format!("Election: tie-break majority ({} of {}) at {}", votes, voters, address)
        }
        (ElectionKind::Arbitrary, Some(address)) => format!("Election: Choosing primary arbitrarily: {}", address),
        _ => "Election: no primary available".to_string(),
    };

    match kind {
        ElectionKind::Arbitrary | ElectionKind::NoCandidate => log::warn!("{}", message),
        _ => log::info!("{}", message),
    }

    ElectionOutcome { primary, kind, message }
}

fn tally(candidates: &[SocketAddr], votes: &[Option<Bytes>]) -> (Option<SocketAddr>, ElectionKind) {
    let mut tally: Vec<(SocketAddr, usize)> = candidates.iter().map(|address| (*address, 0)).collect();
    let mut voters = 0;

    for vote in votes.iter().flatten() {
        voters += 1;

        let address = match core::str::from_utf8(vote).ok().and_then(|text| text.trim().parse::<SocketAddr>().ok()) {
            Some(address) => address,
            None => continue,
        };

        if let Some((_, count)) = tally.iter_mut().find(|(candidate, _)| *candidate == address) {
            *count += 1;
        }
    }

    // Ties resolve to the earlier candidate
    let mut leader: Option<(SocketAddr, usize)> = None;
    for (address, count) in &tally {
        if *count > leader.map(|(_, votes)| votes).unwrap_or(0) {
            leader = Some((*address, *count));
        }
    }

    match leader {
        Some((address, votes)) if votes == voters => (Some(address), ElectionKind::Unanimous),
        Some((address, votes)) if votes * 2 > voters => (Some(address), ElectionKind::Majority { votes, voters }),
        _ => (candidates.first().copied(), ElectionKind::Arbitrary),
    }
}
