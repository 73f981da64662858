//! Higher-level API for a Raft node.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use log::{error, info};
use prost::Message as _;

use crate::core::State;
use crate::error::ConfigError;
use crate::log::{InMemoryLog, Log};
use crate::message::*;

/// A Raft node, used for replicating a strongly-consistent distributed log of entries with arbitrary data amongst its
/// peers.
///
/// # Proposing entries to the distributed log
///
/// Data passed to [`propose`] is not guaranteed to ultimately be appended to the distributed log. A follower forwards
/// proposals to the leader it knows of, and a node without a known leader holds on to them until it either becomes
/// leader or learns of one. Entries are returned from [`take_committed`] in the same order on every node once they are
/// committed, possibly on a node different than that to which they were proposed.
///
/// # Timer ticks
///
/// Timeouts in [`Node`] are driven by a timer ticking at fixed interval, with the number of ticks between timeouts
/// configured by the provided [`Config`]. A follower hearing from its leader, or granting its vote, restarts its
/// election timer. Nodes which are not members of their group never time out.
///
/// # Message delivery
///
/// Messages queued by [`propose`], [`step`] or [`tick`] are collected with [`take_messages`] and must be delivered by
/// the caller to [`step`] on their destination, which can be looked up with [`address`]. Messages may be lost,
/// delivered out-of-order or more than once.
///
/// [`address`]: Self::address
/// [`propose`]: Self::propose
/// [`step`]: Self::step
/// [`take_committed`]: Self::take_committed
/// [`take_messages`]: Self::take_messages
/// [`tick`]: Self::tick
pub struct Node<L = InMemoryLog> {
    state: State<L>,
    config: Config,
    elapsed: u32,
    addresses: BTreeMap<NodeId, String>,
}

/// Configurable parameters of a Raft node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of timer ticks without hearing from a leader before starting an election.
    pub election_timeout_ticks: u32,

    /// The number of timer ticks between sending heartbeats to peers.
    pub heartbeat_interval_ticks: u32,
}

impl Config {
    /// Checks that heartbeats are frequent enough to keep followers from starting elections.
    ///
    /// # Errors
    ///
    /// If the election timeout is shorter than three heartbeat intervals, an error is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_election_timeout_ticks = u64::from(self.heartbeat_interval_ticks) * 3;
        if u64::from(self.election_timeout_ticks) < min_election_timeout_ticks {
            return Err(ConfigError::ElectionTooShort {
                election_timeout_ticks: self.election_timeout_ticks,
                heartbeat_interval_ticks: self.heartbeat_interval_ticks,
            });
        }
        Ok(())
    }
}

impl Node<InMemoryLog> {
    /// Constructs a new Raft node which is the only member of its group, backed by an [`InMemoryLog`].
    ///
    /// Other nodes join the group by being added with [`add_member`](Self::add_member).
    ///
    /// # Panics
    ///
    /// If `config` is invalid according to [`Config::validate`].
    pub fn new(node_id: NodeId, config: Config) -> Self {
        Self::with_state(State::new(node_id, BTreeSet::new(), InMemoryLog::new()), config)
    }
}

impl<L: Log> Node<L> {
    /// Constructs a Raft node driving an existing `state`, e.g. one constructed with a known set of peers.
    ///
    /// # Panics
    ///
    /// If `config` is invalid according to [`Config::validate`].
    pub fn with_state(state: State<L>, config: Config) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid raft config: {}", err);
        }
        Self {
            state,
            config,
            elapsed: 0,
            addresses: BTreeMap::new(),
        }
    }

    /// Proposes appending an entry with arbitrary `data` to the distributed log.
    ///
    /// Returns `false` if the proposal was refused outright.
    pub fn propose<T: Into<Bytes>>(&mut self, data: T) -> bool {
        self.propose_entry(EntryKind::Normal, data.into())
    }

    /// Starts an election immediately, without waiting for the election timeout.
    pub fn campaign(&mut self) -> bool {
        self.step(Message::local(Rpc::ElectionTimeout(ElectionTimeout {})))
    }

    /// Proposes adding `node_id`, reachable at `address`, to the group.
    ///
    /// The member is added once the proposal is committed and returned from [`take_committed`]. Returns `false` if
    /// the proposal was refused outright, e.g. because another membership change is still pending.
    ///
    /// [`take_committed`]: Self::take_committed
    pub fn add_member<T: Into<String>>(&mut self, node_id: NodeId, address: T) -> bool {
        let config = MemberConfig {
            node_id,
            address: address.into(),
        };
        self.propose_entry(EntryKind::AddMember, config.encode_to_vec().into())
    }

    /// Proposes removing `node_id` from the group.
    ///
    /// The member is removed once the proposal is committed and returned from [`take_committed`].
    ///
    /// [`take_committed`]: Self::take_committed
    pub fn remove_member(&mut self, node_id: NodeId) -> bool {
        let config = MemberConfig {
            node_id,
            address: String::new(),
        };
        self.propose_entry(EntryKind::RemoveMember, config.encode_to_vec().into())
    }

    /// Processes a message from a peer, or a local trigger.
    ///
    /// Returns `false` if the message was rejected without effect, e.g. because it carries a stale term.
    pub fn step(&mut self, msg: Message) -> bool {
        let queued_len = self.state.msgs().len();
        let accepted = self.state.step(msg);
        if accepted && self.state.msgs().iter().skip(queued_len).any(resets_election_timer) {
            self.elapsed = 0;
        }
        accepted
    }

    /// Returns the committed entries which have not been returned before, in log order, and applies the membership
    /// changes among them.
    ///
    /// # Panics
    ///
    /// If a committed entry has a kind other than those of [`EntryKind`].
    pub fn take_committed(&mut self) -> Vec<LogEntry> {
        let entries = self.state.next_entries();
        for entry in &entries {
            match EntryKind::try_from(entry.kind) {
                Ok(EntryKind::Normal) => (),
                Ok(EntryKind::AddMember) => match MemberConfig::decode(entry.data.clone()) {
                    Ok(MemberConfig { node_id, address }) => {
                        info!("applying new member {} at {}", node_id, &address);
                        self.state.add_member(node_id);
                        self.addresses.insert(node_id, address);
                    }
                    Err(err) => error!("ignored malformed member config at {}: {}", &entry.index, err),
                },
                Ok(EntryKind::RemoveMember) => match MemberConfig::decode(entry.data.clone()) {
                    Ok(MemberConfig { node_id, .. }) => {
                        info!("applying removal of member {}", node_id);
                        self.state.remove_member(node_id);
                        self.addresses.remove(&node_id);
                    }
                    Err(err) => error!("ignored malformed member config at {}: {}", &entry.index, err),
                },
                Err(_) => panic!("unexpected entry kind {} at {}", entry.kind, &entry.index),
            }
            self.state.applied_to(entry.index);
        }
        entries
    }

    /// Ticks forward this node's internal clock by one tick.
    ///
    /// A leader sends heartbeats every [`heartbeat_interval_ticks`], and any other member starts an election after
    /// [`election_timeout_ticks`]. Does nothing on a node which is not a member of its group.
    ///
    /// [`election_timeout_ticks`]: Config::election_timeout_ticks
    /// [`heartbeat_interval_ticks`]: Config::heartbeat_interval_ticks
    pub fn tick(&mut self) {
        if !self.state.promotable() {
            return;
        }
        let (timeout_ticks, trigger) = if self.state.is_leader() {
            let trigger = Rpc::HeartbeatTimeout(HeartbeatTimeout {});
            (self.config.heartbeat_interval_ticks, trigger)
        } else {
            let trigger = Rpc::ElectionTimeout(ElectionTimeout {});
            (self.config.election_timeout_ticks, trigger)
        };
        if self.elapsed >= timeout_ticks {
            self.elapsed = 0;
            self.step(Message::local(trigger));
        } else {
            self.elapsed += 1;
        }
    }

    /// Removes and returns the messages to be delivered to peers.
    pub fn take_messages(&mut self) -> Vec<Message> {
        self.state.take_messages()
    }

    /// Returns the address of a member, as recorded when it was added to the group.
    pub fn address(&self, node_id: NodeId) -> Option<&str> {
        self.addresses.get(&node_id).map(String::as_str)
    }

    /// Returns the index of the last applied entry.
    pub fn applied(&self) -> LogIndex {
        self.state.applied_idx()
    }

    /// Returns the index of the last committed entry.
    pub fn committed(&self) -> LogIndex {
        self.state.commit_idx()
    }

    /// Returns this node's configurable parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_leader(&self) -> bool {
        self.state.leader().is_some()
    }

    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    /// Returns the ID of the leader of the latest known term, if known.
    pub fn leader(&self) -> Option<NodeId> {
        self.state.leader()
    }

    pub fn last_index(&self) -> LogIndex {
        self.state.last_index()
    }

    /// Returns the IDs of every member of the group.
    pub fn members(&self) -> &BTreeSet<NodeId> {
        self.state.members()
    }

    pub fn node_id(&self) -> NodeId {
        self.state.node_id()
    }

    /// Returns a reference to the low-level state of the Raft node.
    pub fn state(&self) -> &State<L> {
        &self.state
    }

    pub fn term(&self) -> TermId {
        self.state.term()
    }

    fn propose_entry(&mut self, kind: EntryKind, data: Bytes) -> bool {
        let entries = vec![LogEntry::proposal(kind, data)];
        self.step(Message::local(Rpc::Propose(Propose { entries })))
    }
}

fn resets_election_timer(msg: &Message) -> bool {
    matches!(
        &msg.rpc,
        Some(Rpc::AppendResponse(_)) | Some(Rpc::VoteResponse(VoteResponse { vote_granted: true }))
    )
}
