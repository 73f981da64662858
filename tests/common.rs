#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use raftcore::core::State;
use raftcore::log::{InMemoryLog, Log};
use raftcore::message::{EntryKind, LogEntry, LogIndex, Message, NodeId, Rpc, TermId};
use raftcore::node::{Config, Node};

pub const CONFIG: Config = Config {
    election_timeout_ticks: 20,
    heartbeat_interval_ticks: 3,
};
const RANDOM_SEED: u64 = 0;
const MAX_TICKS: u32 = 100_000;
const MAX_DELIVERY_ROUNDS: u32 = 10_000;
const TICK_SKIP_PROBABILITY: f64 = 0.125;

pub type TestRaft = State<InMemoryLog>;
pub type TestNode = Node<InMemoryLog>;

pub struct TestRaftGroup {
    pub nodes: Vec<TestNode>,
    pub applied: Vec<Vec<LogEntry>>,
    pub tick: u32,
    pub config: TestRaftGroupConfig,
    pub random: ChaChaRng,
}

#[derive(Clone, Default)]
pub struct TestRaftGroupConfig {
    pub drops: BTreeSet<(Option<NodeId>, Option<NodeId>)>,
    pub down: BTreeSet<NodeId>,
}

pub struct TestLogger;

pub struct TestLoggerContext {
    node_id: Option<NodeId>,
    tick: Option<u32>,
}

pub fn rpc_types() -> [Rpc; 4] {
    [
        Rpc::VoteRequest(Default::default()),
        Rpc::VoteResponse(Default::default()),
        Rpc::AppendRequest(Default::default()),
        Rpc::AppendResponse(Default::default()),
    ]
}

pub fn init_random() -> ChaChaRng {
    ChaChaRng::seed_from_u64(RANDOM_SEED)
}

pub fn raft(node_id: NodeId, peers: Vec<NodeId>, log: Option<InMemoryLog>) -> TestRaft {
    TestLogger::init();
    State::new(
        node_id,
        peers.into_iter().collect(),
        log.unwrap_or_else(InMemoryLog::new),
    )
}

pub fn node(node_id: NodeId, peers: Vec<NodeId>) -> TestNode {
    Node::with_state(raft(node_id, peers, None), CONFIG)
}

pub fn config() -> TestRaftGroupConfig {
    TestRaftGroupConfig::default()
}

/// Delivers a message from `from` at `term` to `raft`, returning whether it was accepted.
pub fn send(raft: &mut TestRaft, from: NodeId, term: TermId, rpc: Rpc) -> bool {
    let to = raft.node_id();
    raft.step(Message::new(from, to, term, rpc))
}

pub fn timeout(raft: &mut TestRaft) -> bool {
    raft.step(Message::local(Rpc::ElectionTimeout(Default::default())))
}

pub fn heartbeat(raft: &mut TestRaft) -> bool {
    raft.step(Message::local(Rpc::HeartbeatTimeout(Default::default())))
}

pub fn log_entries(log: &impl Log) -> Vec<LogEntry> {
    log.entries(LogIndex { id: 1 }, log.last_index())
}

//
// RaftGroup impls
//

impl TestRaftGroup {
    pub fn new(size: u64, config: TestRaftGroupConfig) -> Self {
        let node_ids: Vec<NodeId> = (0..size).collect();
        Self {
            nodes: (node_ids.iter())
                .map(|node_id| node(*node_id, node_ids.clone()))
                .collect(),
            applied: node_ids.iter().map(|_| Vec::new()).collect(),
            tick: 0,
            config,
            random: init_random(),
        }
    }

    /// Adds a node which knows of every other node but has yet to be added to their group.
    pub fn spawn(&mut self) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        self.nodes.push(node(node_id, (0..=node_id).collect()));
        self.applied.push(Vec::new());
        node_id
    }

    pub fn run_until(&mut self, mut until_fun: impl FnMut(&mut Self) -> bool) -> &mut Self {
        let mut ticks_remaining = MAX_TICKS;
        while !until_fun(self) {
            ticks_remaining = ticks_remaining
                .checked_sub(1)
                .expect("condition failed after maximum simulation length");
            self.step_tick();
        }
        self
    }

    /// Runs until `until_fun` returns `true` for a normal entry newly applied on any node.
    pub fn run_until_commit(&mut self, mut until_fun: impl FnMut(&LogEntry) -> bool) -> &mut Self {
        let mut ticks_remaining = MAX_TICKS;
        loop {
            ticks_remaining = ticks_remaining
                .checked_sub(1)
                .expect("commit failed after maximum simulation length");
            let newly_applied = self.step_tick();
            if (newly_applied.iter())
                .filter(|entry| entry.kind == EntryKind::Normal as i32)
                .any(|entry| until_fun(entry))
            {
                return self;
            }
        }
    }

    pub fn run_for(&mut self, ticks: u32) -> &mut Self {
        self.run_for_inspect(ticks, |_| ())
    }

    pub fn run_for_inspect(&mut self, ticks: u32, mut fun: impl FnMut(&mut Self)) -> &mut Self {
        for _ in 0..ticks {
            self.step_tick();
            fun(self);
        }
        self
    }

    pub fn run_on_all(&mut self, mut fun: impl FnMut(&mut TestNode)) -> &mut Self {
        for node in &mut self.nodes {
            TestLogger::set_node_id(Some(node.node_id()));
            fun(node);
        }
        self.deliver();
        self
    }

    pub fn run_on_node(&mut self, node_idx: usize, fun: impl FnOnce(&mut TestNode)) -> &mut Self {
        TestLogger::set_node_id(Some(self.nodes[node_idx].node_id()));
        fun(&mut self.nodes[node_idx]);
        self.deliver();
        self
    }

    pub fn inspect(&mut self, fun: impl FnOnce(&Self)) -> &mut Self {
        fun(self);
        self
    }

    pub fn modify(&mut self, fun: impl FnOnce(&mut Self)) -> &mut Self {
        fun(self);
        self
    }

    pub fn has_leader(&self) -> bool {
        self.nodes.iter().any(|node| node.is_leader())
    }

    /// Returns the leader of the latest term, if any node is leader.
    pub fn leader(&self) -> Option<NodeId> {
        (self.nodes.iter())
            .filter(|node| node.is_leader())
            .max_by_key(|node| node.term())
            .map(|node| node.node_id())
    }

    /// Returns the data of the normal entries applied on a node.
    pub fn applied_data(&self, node_idx: usize) -> Vec<&[u8]> {
        (self.applied[node_idx].iter())
            .filter(|entry| entry.kind == EntryKind::Normal as i32)
            .map(|entry| &entry.data[..])
            .collect()
    }

    /// Advances time by one tick on every node which is up, then delivers every resulting message. Returns the entries
    /// applied meanwhile on every node.
    pub fn step_tick(&mut self) -> Vec<LogEntry> {
        self.tick += 1;
        TestLogger::set_tick(Some(self.tick));
        for node in &mut self.nodes {
            let node_id = node.node_id();
            if self.config.is_node_down(node_id) || self.random.gen_bool(TICK_SKIP_PROBABILITY) {
                continue;
            }
            TestLogger::set_node_id(Some(node_id));
            node.tick();
        }
        let newly_applied = self.deliver();
        TestLogger::set_tick(None);
        newly_applied
    }

    /// Delivers messages until none are left, applying committed entries on every node along the way.
    pub fn deliver(&mut self) -> Vec<LogEntry> {
        let mut newly_applied = Vec::new();
        for _ in 0..MAX_DELIVERY_ROUNDS {
            for (node, applied) in self.nodes.iter_mut().zip(&mut self.applied) {
                TestLogger::set_node_id(Some(node.node_id()));
                let committed = node.take_committed();
                newly_applied.extend(committed.iter().cloned());
                applied.extend(committed);
            }

            let mut messages: VecDeque<Message> = (self.nodes.iter_mut())
                .flat_map(|node| node.take_messages())
                .collect();
            if messages.is_empty() {
                TestLogger::set_node_id(None);
                return newly_applied;
            }
            while let Some(message) = messages.pop_front() {
                let (from, to) = (message.from, message.to);
                let to_node = match self.nodes.iter_mut().find(|node| node.node_id() == to) {
                    Some(to_node) => to_node,
                    None => continue,
                };
                TestLogger::set_node_id(Some(to));
                if self.config.should_drop(from, to) {
                    log::info!("<- {} DROPPED {}", from, message);
                    continue;
                }
                log::info!("<- {} {}", from, message);
                to_node.step(message);
                messages.extend(to_node.take_messages());
            }
        }
        panic!("messages still in flight after maximum delivery rounds");
    }
}

//
// TestRaftGroupConfig impls
//

impl TestRaftGroupConfig {
    pub fn node_down(mut self, node_id: NodeId) -> Self {
        self.down.insert(node_id);
        self
    }

    pub fn isolate(mut self, node_id: NodeId) -> Self {
        self.drops.insert((Some(node_id), None));
        self.drops.insert((None, Some(node_id)));
        self
    }

    pub fn drop_between(mut self, from: NodeId, to: NodeId) -> Self {
        self.drops.insert((Some(from), Some(to)));
        self.drops.insert((Some(to), Some(from)));
        self
    }

    pub fn drop_to(mut self, node_id: NodeId) -> Self {
        self.drops.insert((None, Some(node_id)));
        self
    }

    pub fn is_node_down(&self, node_id: NodeId) -> bool {
        self.down.contains(&node_id)
    }

    pub fn should_drop(&self, from: NodeId, to: NodeId) -> bool {
        self.drops.contains(&(Some(from), Some(to)))
            || self.drops.contains(&(Some(from), None))
            || self.drops.contains(&(None, Some(to)))
            || self.down.contains(&from)
            || self.down.contains(&to)
    }
}

//
// TestLogger impls
//

thread_local! {
    static LOGGER_CONTEXT: RefCell<TestLoggerContext> = RefCell::new(TestLoggerContext::new());
}

impl TestLogger {
    pub fn init() {
        let _ignore = log::set_logger(&Self);
        log::set_max_level(log::LevelFilter::Debug);
    }
    pub fn set_node_id(node_id: Option<NodeId>) {
        LOGGER_CONTEXT.with(|context| {
            context.borrow_mut().node_id = node_id;
        });
    }
    pub fn set_tick(tick: Option<u32>) {
        LOGGER_CONTEXT.with(|context| {
            context.borrow_mut().tick = tick;
        });
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOGGER_CONTEXT.with(|context| {
            let context = context.borrow();
            if let Some(node_id) = context.node_id {
                if let Some(tick) = context.tick {
                    eprintln!("tick {:03} node {} {}", tick, node_id, record.args());
                } else {
                    eprintln!("tick ??? node {} {}", node_id, record.args());
                }
            } else {
                eprintln!("{}", record.args());
            }
        })
    }

    fn flush(&self) {}
}

//
// TestLoggerContext impls
//

impl TestLoggerContext {
    const fn new() -> Self {
        Self {
            node_id: None,
            tick: None,
        }
    }
}
