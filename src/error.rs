use std::fmt::{Display, Formatter};

/// An invalid [`Config`](crate::node::Config).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    // Heartbeats could not reliably suppress follower elections
    ElectionTooShort {
        election_timeout_ticks: u32,
        heartbeat_interval_ticks: u32,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ElectionTooShort {
                election_timeout_ticks,
                heartbeat_interval_ticks,
            } => write!(
                f,
                "election must be at least three times as long as heartbeat [election: {}, heartbeat: {}]",
                election_timeout_ticks, heartbeat_interval_ticks
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
