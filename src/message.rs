//! Raft message types for sending between nodes.
//!
//! This module provides data types for messages exchanged between Raft nodes and between a
//! [`Node`](crate::node::Node) and its [`State`](crate::core::State). The top-level message type is
//! [`Message`]. Every type derives [`prost::Message`], so a transport can serialize them with
//! protobuf.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};

use bytes::Bytes;

/// The identifier of a Raft node.
pub type NodeId = u64;

/// A message sent between Raft nodes, or an internal trigger fed to a node.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    /// The sending node.
    #[prost(uint64, tag = "1")]
    pub from: NodeId,

    /// The destination node.
    #[prost(uint64, tag = "2")]
    pub to: NodeId,

    /// The greatest Raft leadership term ID seen by the sender.
    #[prost(message, required, tag = "3")]
    pub term: TermId,

    /// The Remote Procedure Call or trigger contained by this message.
    ///
    /// This field is only optional in order to support protobuf serialization.
    #[prost(oneof = "Rpc", tags = "4, 5, 6, 7, 8, 9, 10")]
    pub rpc: Option<Rpc>,
}

/// The payload of a [`Message`].
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Rpc {
    /// A client proposal of new log entries.
    #[prost(message, tag = "4")]
    Propose(Propose),

    /// An internal trigger to start an election. Never sent over the wire.
    #[prost(message, tag = "5")]
    ElectionTimeout(ElectionTimeout),

    /// An internal trigger for a leader to broadcast heartbeats. Never sent over the wire.
    #[prost(message, tag = "6")]
    HeartbeatTimeout(HeartbeatTimeout),

    /// A request to obtain leadership amongst Raft nodes.
    #[prost(message, tag = "7")]
    VoteRequest(VoteRequest),

    /// A response to a [`VoteRequest`] granting or denying leadership.
    #[prost(message, tag = "8")]
    VoteResponse(VoteResponse),

    /// A request to append entries to a Raft node's log.
    #[prost(message, tag = "9")]
    AppendRequest(AppendRequest),

    /// A response to an [`AppendRequest`] allowing or denying an append to the Raft node's log.
    #[prost(message, tag = "10")]
    AppendResponse(AppendResponse),
}

/// A client proposal of entries to append to the distributed log.
///
/// The `index` and `term` of the proposed entries are ignored; the leader assigns them.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Propose {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<LogEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ElectionTimeout {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeartbeatTimeout {}

/// A request to obtain leadership amongst Raft nodes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VoteRequest {
    /// The Raft log index of the last log entry stored by the candidate.
    #[prost(message, required, tag = "1")]
    pub last_log_idx: LogIndex,

    /// The Raft leadership term of the last log entry stored by the candidate.
    #[prost(message, required, tag = "2")]
    pub last_log_term: TermId,
}

/// The response to a [`VoteRequest`] granting or denying leadership.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VoteResponse {
    /// Whether the [`VoteRequest`] was granted or not.
    #[prost(bool, tag = "1")]
    pub vote_granted: bool,
}

/// A request to append entries to a Raft node's log. With no entries it serves as a heartbeat.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AppendRequest {
    /// The Raft log index immediately before the index of the first entry in [`entries`](Self::entries).
    #[prost(message, required, tag = "1")]
    pub prev_log_idx: LogIndex,

    /// The Raft leadership term of the log entry immediately before the first entry in [`entries`](Self::entries).
    #[prost(message, required, tag = "2")]
    pub prev_log_term: TermId,

    /// The Raft log index of the last log entry known by the requester to be committed.
    #[prost(message, required, tag = "3")]
    pub leader_commit: LogIndex,

    /// A list of consecutive Raft log entries to append.
    #[prost(message, repeated, tag = "4")]
    pub entries: Vec<LogEntry>,
}

/// The response to an [`AppendRequest`] allowing or denying an append to the Raft node's log.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AppendResponse {
    /// Whether the [`AppendRequest`] was accepted or not.
    #[prost(bool, tag = "1")]
    pub success: bool,

    /// The Raft log index of the last log entry up to which the responder's log is known to match the requester's log.
    #[prost(message, required, tag = "2")]
    pub match_idx: LogIndex,

    /// The Raft log index of the last log entry in the responder's log.
    #[prost(message, required, tag = "3")]
    pub last_log_idx: LogIndex,
}

/// The kind of a [`LogEntry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EntryKind {
    /// Arbitrary application data, applied by the caller.
    Normal = 0,
    /// A [`MemberConfig`] adding a node to the cluster.
    AddMember = 1,
    /// A [`MemberConfig`] removing a node from the cluster.
    RemoveMember = 2,
}

/// An entry in a [Raft log][crate::log::Log].
#[derive(Clone, PartialEq, prost::Message)]
pub struct LogEntry {
    /// The position of this entry in the log, starting at 1.
    #[prost(message, required, tag = "1")]
    pub index: LogIndex,

    /// The term of leadership of the node which appended this log entry.
    #[prost(message, required, tag = "2")]
    pub term: TermId,

    /// The [`EntryKind`] of this entry. Stored as a raw value so that entries of an unknown kind survive
    /// decoding and are caught when applied.
    #[prost(enumeration = "EntryKind", tag = "3")]
    pub kind: i32,

    /// Arbitrary data associated with the log entry.
    #[prost(bytes = "bytes", tag = "4")]
    pub data: Bytes,
}

/// The payload of an [`EntryKind::AddMember`] or [`EntryKind::RemoveMember`] entry.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MemberConfig {
    #[prost(uint64, tag = "1")]
    pub node_id: NodeId,

    /// The address at which the node can be reached. Empty for removals.
    #[prost(string, tag = "2")]
    pub address: String,
}

/// The unique, monotonically-increasing ID for a term of Raft group leadership.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Message)]
pub struct TermId {
    /// The non-negative integer assigned to this term.
    #[prost(uint64, tag = "1")]
    pub id: u64,
}

/// A 1-based index into a [Raft log][crate::log::Log]. Index 0 precedes the first entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Message)]
pub struct LogIndex {
    /// The integer representing this log index.
    #[prost(uint64, tag = "1")]
    pub id: u64,
}

//
// Message impls
//

impl Message {
    /// Constructs a message for node `to` from node `from` at `term`.
    pub fn new(from: NodeId, to: NodeId, term: TermId, rpc: Rpc) -> Self {
        Self {
            from,
            to,
            term,
            rpc: Some(rpc),
        }
    }

    /// Constructs an internal trigger, which carries no term and no addressing.
    pub fn local(rpc: Rpc) -> Self {
        Self::new(0, 0, TermId::default(), rpc)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { from, to, term, rpc } = self;
        let mut debug = fmt.debug_tuple("");
        debug.field(&format_args!("{} -> {}", from, to));
        debug.field(&format_args!("{}", term));
        if let Some(rpc) = rpc {
            debug.field(&format_args!("{}", rpc));
        } else {
            debug.field(&"None");
        }
        debug.finish()
    }
}

//
// Rpc impls
//

impl Rpc {
    /// Whether this is a trigger generated locally rather than a message from a peer. Local triggers are not
    /// subject to term checks, and timer triggers are only accepted as built by [`Message::local`].
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Rpc::Propose(_) | Rpc::ElectionTimeout(_) | Rpc::HeartbeatTimeout(_)
        )
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Rpc::Propose(msg) => fmt
                .debug_struct("Propose")
                .field("entries", &msg.entries.len())
                .finish(),
            Rpc::ElectionTimeout(_) => fmt.write_str("ElectionTimeout"),
            Rpc::HeartbeatTimeout(_) => fmt.write_str("HeartbeatTimeout"),
            Rpc::VoteRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::VoteResponse(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendResponse(msg) => fmt::Display::fmt(msg, fmt),
        }
    }
}

//
// VoteRequest impls
//

impl fmt::Display for VoteRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            last_log_idx,
            last_log_term,
        } = self;
        fmt.debug_struct("VoteRequest")
            .field("last_log_idx", &format_args!("{}", last_log_idx))
            .field("last_log_term", &format_args!("{}", last_log_term))
            .finish()
    }
}

//
// VoteResponse impls
//

impl fmt::Display for VoteResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { vote_granted } = self;
        fmt.debug_struct("VoteResponse")
            .field("vote_granted", vote_granted)
            .finish()
    }
}

//
// AppendRequest impls
//

impl fmt::Display for AppendRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            prev_log_idx,
            prev_log_term,
            leader_commit,
            entries,
        } = self;
        fmt.debug_struct("AppendRequest")
            .field("prev_log_idx", &format_args!("{}", prev_log_idx))
            .field("prev_log_term", &format_args!("{}", prev_log_term))
            .field("leader_commit", &format_args!("{}", leader_commit))
            .field("entries", &entries.len())
            .finish()
    }
}

//
// AppendResponse impls
//

impl fmt::Display for AppendResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            success,
            match_idx,
            last_log_idx,
        } = self;
        fmt.debug_struct("AppendResponse")
            .field("success", &success)
            .field("match_idx", &format_args!("{}", match_idx))
            .field("last_log_idx", &format_args!("{}", last_log_idx))
            .finish()
    }
}

//
// LogEntry impls
//

impl LogEntry {
    /// Constructs an entry of `kind` with `data`, to be assigned an index and term when appended by a leader.
    pub fn proposal(kind: EntryKind, data: Bytes) -> Self {
        Self {
            index: LogIndex::default(),
            term: TermId::default(),
            kind: kind as i32,
            data,
        }
    }

    /// Returns whether this entry changes cluster membership. Unknown kinds are not config changes.
    pub fn is_config(&self) -> bool {
        matches!(
            EntryKind::try_from(self.kind),
            Ok(EntryKind::AddMember) | Ok(EntryKind::RemoveMember)
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            index,
            term,
            kind,
            data,
        } = self;
        let mut debug = fmt.debug_struct("LogEntry");
        debug
            .field("index", &format_args!("{}", index))
            .field("term", &format_args!("{}", term));
        match EntryKind::try_from(*kind) {
            Ok(kind) => debug.field("kind", &kind),
            Err(_) => debug.field("kind", kind),
        };
        debug.field("data", &data.len()).finish()
    }
}

//
// TermId impls
//

impl fmt::Display for TermId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("TermId").field(id).finish()
    }
}

impl AddAssign<u64> for TermId {
    fn add_assign(&mut self, rhs: u64) {
        self.id = self
            .id
            .checked_add(rhs)
            .unwrap_or_else(|| panic!("overflow"));
    }
}

//
// LogIndex impls
//

impl LogIndex {
    /// Subtraction with a non-negative integer, checking for overflow. Returns `self - dec`, or `None` if an overflow
    /// occurred.
    pub fn checked_sub(self, dec: u64) -> Option<Self> {
        self.id.checked_sub(dec).map(|id| Self { id })
    }

    /// Addition with a non-negative integer, saturating at the largest index instead of overflowing.
    pub fn saturating_add(self, inc: u64) -> Self {
        Self {
            id: self.id.saturating_add(inc),
        }
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("LogIdx").field(id).finish()
    }
}

impl Add<u64> for LogIndex {
    type Output = Self;
    fn add(self, inc: u64) -> Self {
        Self {
            id: self
                .id
                .checked_add(inc)
                .unwrap_or_else(|| panic!("overflow")),
        }
    }
}

impl Sub<u64> for LogIndex {
    type Output = Self;
    fn sub(self, dec: u64) -> Self {
        Self {
            id: self.id.saturating_sub(dec),
        }
    }
}
