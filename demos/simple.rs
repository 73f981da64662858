//! A simple example of five nodes exchanging messages instantaneously in a single thread

use std::collections::VecDeque;
use std::str;

use raftcore::core::State;
use raftcore::log::InMemoryLog;
use raftcore::message::{Message, NodeId};
use raftcore::node::{Config, Node};

const PEER_COUNT: NodeId = 5;

fn main() {
    let _ignore = env_logger::builder().is_test(true).try_init();

    // Construct 5 Raft peers
    let mut peers = (0..PEER_COUNT)
        .map(|id| {
            let state = State::new(id, (0..PEER_COUNT).collect(), InMemoryLog::new());
            Node::with_state(
                state,
                Config {
                    election_timeout_ticks: 10,
                    heartbeat_interval_ticks: 1,
                },
            )
        })
        .collect::<Vec<_>>();

    // Simulate reliably sending messages instantaneously between peers
    let mut inboxes = vec![VecDeque::new(); peers.len()];
    let send_messages = |messages: Vec<Message>, inboxes: &mut Vec<VecDeque<Message>>| {
        for message in messages {
            println!("peer {} -> peer {}: {}", message.from, message.to, &message);
            inboxes[message.to as usize].push_back(message);
        }
    };

    // Start the first election right away rather than waiting for a timeout
    peers[0].campaign();
    send_messages(peers[0].take_messages(), &mut inboxes);

    // Loop until a log entry is committed on all peers
    let mut appended = false;
    let mut peers_committed = vec![false; peers.len()];
    while !peers_committed.iter().all(|seen| *seen) {
        for (peer_id, peer) in peers.iter_mut().enumerate() {
            // Tick the timer
            peer.tick();

            // Append a log entry on the leader
            if !appended && peer.is_leader() && peer.propose("Hello world!") {
                println!("peer {} appending to the log", peer_id);
                appended = true;
            }

            // Process message inbox
            while let Some(message) = inboxes[peer_id].pop_front() {
                peer.step(message);
            }
            send_messages(peer.take_messages(), &mut inboxes);

            // Check for committed log entries
            for log_entry in peer.take_committed() {
                if !log_entry.data.is_empty() {
                    println!(
                        "peer {} saw commit {}",
                        peer_id,
                        str::from_utf8(&log_entry.data).unwrap()
                    );
                    assert!(!peers_committed[peer_id]);
                    peers_committed[peer_id] = true;
                }
            }
        }
    }
}
