use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase derived from a raffle's fields.
///
/// `discovered -> expired -> {claimed} -> resolved`, with `inactive`
/// reachable from any non-resolved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RafflePhase {
    /// Tracked, end time not yet reached.
    Discovered,
    /// End time passed, winner not yet known.
    Expired,
    /// A claim was recorded and not yet superseded by a winner.
    Claimed,
    /// A winner is recorded. Terminal, cannot regress.
    Resolved,
    /// Unreachable through the gateway (unauthorized or hard server
    /// failure).
    Inactive,
}

impl RafflePhase {
    /// Check if this is a terminal state (no further transitions expected)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Check if the resolution engine still has work to do here
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Discovered | Self::Expired | Self::Claimed)
    }
}

impl Default for RafflePhase {
    fn default() -> Self {
        Self::Discovered
    }
}

impl fmt::Display for RafflePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Expired => write!(f, "expired"),
            Self::Claimed => write!(f, "claimed"),
            Self::Resolved => write!(f, "resolved"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for RafflePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(Self::Discovered),
            "expired" => Ok(Self::Expired),
            "claimed" => Ok(Self::Claimed),
            "resolved" => Ok(Self::Resolved),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Invalid raffle phase: {s}")),
        }
    }
}

/// Classification of the last external call's outcome. Always overwritten on
/// every attempt; never sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// The call succeeded.
    Ok,
    /// The gateway answered with a non-success HTTP status.
    Http(u16),
    /// The call never completed (DNS, connection reset, TLS).
    NetworkError,
    /// The call exceeded its deadline.
    Timeout,
}

impl Transport {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Outcomes that derive an `inactive` phase: unauthorized or a hard
    /// server failure.
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Self::Http(401) | Self::Http(500))
    }

    /// A 500 parks the raffle permanently ("deleted" upstream); it is never
    /// retried, unlike a 401 which a fresh credential can revive.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, Self::Http(500))
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Http(code) => write!(f, "http-{code}"),
            Self::NetworkError => write!(f, "network-error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "network-error" => Ok(Self::NetworkError),
            "timeout" => Ok(Self::Timeout),
            _ => {
                if let Some(code) = s.strip_prefix("http-") {
                    code.parse::<u16>()
                        .map(Self::Http)
                        .map_err(|_| format!("Invalid transport: {s}"))
                } else {
                    Err(format!("Invalid transport: {s}"))
                }
            }
        }
    }
}

// Persisted as its display string ("ok", "http-401", ...) to match the
// storage dump format.
impl Serialize for Transport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Transport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
