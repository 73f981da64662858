//! A tick-driven core of the Raft Distributed Consensus Protocol.
//! [Raft](http://raftconsensus.github.io/) is described as:
//!
//! > Raft is a consensus algorithm that is designed to be easy to understand. It's equivalent to
//! > Paxos in fault-tolerance and performance. The difference is that it's decomposed into
//! > relatively independent subproblems, and it cleanly addresses all major pieces needed for
//! > practical systems.
//!
//! The crate is split in two layers:
//!
//! * [`core::State`] is the consensus state machine. It owns the term, vote, role, membership and
//!   [`log`], processes one [`Message`](message::Message) at a time and queues outbound messages.
//! * [`node::Node`] drives a [`core::State`] with timer ticks, exposes the client API (propose,
//!   campaign, membership changes) and applies committed membership changes.
//!
//! Neither layer performs any I/O: the caller moves messages between nodes, ticks the timer and
//! applies committed entries to its own application state.
//!
//! ```
//! use raftcore::message::EntryKind;
//! use raftcore::node::{Config, Node};
//!
//! let mut node = Node::new(1, Config {
//!     election_timeout_ticks: 10,
//!     heartbeat_interval_ticks: 1,
//! });
//! node.propose("Hello world!");
//! while !node.is_leader() {
//!     node.tick();
//! }
//! let committed = node.take_committed();
//! assert_eq!(committed.len(), 1);
//! assert_eq!(committed[0].kind, EntryKind::Normal as i32);
//! assert_eq!(committed[0].data, "Hello world!");
//! ```

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod log;
pub mod message;
pub mod node;
