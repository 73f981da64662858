//! A simple example with a thread per Raft node

use std::str;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use raftcore::core::State;
use raftcore::log::InMemoryLog;
use raftcore::message::{Message, NodeId};
use raftcore::node::{Config, Node};

const PEER_COUNT: NodeId = 5;
const TICK_DURATION: Duration = Duration::from_millis(10);
const RAFT_CONFIG: Config = Config {
    election_timeout_ticks: 10,
    heartbeat_interval_ticks: 1,
};

#[derive(Clone)]
struct Network {
    peers_tx: Vec<mpsc::Sender<Message>>,
}

fn main() {
    let _ignore = env_logger::builder().is_test(true).try_init();

    // Construct 5 Raft peers
    let (peers_tx, peers_rx): (Vec<_>, Vec<_>) = (0..PEER_COUNT).map(|_| mpsc::channel()).unzip();
    let network = Network { peers_tx };
    let peers = peers_rx.into_iter().zip(0..PEER_COUNT).map(|(rx, peer_id)| {
        let state = State::new(peer_id, (0..PEER_COUNT).collect(), InMemoryLog::new());
        (Node::with_state(state, RAFT_CONFIG), rx)
    });

    let appended = Arc::new(Mutex::new(false));
    let mut peers_committed = vec![false; PEER_COUNT as usize];
    let (peer_committed_tx, peer_committed_rx) = mpsc::channel();

    for (mut peer, rx) in peers {
        let peer_id = peer.node_id();
        let appended = Arc::clone(&appended);
        let network = network.clone();
        let peer_committed_tx = peer_committed_tx.clone();
        thread::spawn(move || {
            // Start the first election right away rather than waiting for a timeout
            if peer_id == 0 {
                peer.campaign();
            }

            // Loop until a log entry is committed
            let mut next_tick = Instant::now() + TICK_DURATION;
            loop {
                match rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
                    Ok(message) => {
                        // Process incoming message
                        peer.step(message);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        // Tick the timer
                        peer.tick();
                        next_tick = Instant::now() + TICK_DURATION;
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        panic!("peer {} disconnected", peer_id)
                    }
                }

                // Append a log entry on the leader
                let mut appended = appended.lock().unwrap();
                if !*appended && peer.is_leader() && peer.propose("Hello world!") {
                    println!("peer {} appending to the log", peer_id);
                    *appended = true;
                }
                drop(appended);

                network.send(peer.take_messages());

                // Check for committed log entries
                for log_entry in peer.take_committed() {
                    if !log_entry.data.is_empty() {
                        println!(
                            "peer {} saw commit {}",
                            peer_id,
                            str::from_utf8(&log_entry.data).unwrap()
                        );
                        peer_committed_tx.send(peer_id).unwrap();
                    }
                }
            }
        });
    }
    drop((network, peer_committed_tx));

    // Loop until a log entry is committed on all peers
    while !peers_committed.iter().all(|seen| *seen) {
        let peer_id = peer_committed_rx.recv().unwrap() as usize;
        assert!(!peers_committed[peer_id]);
        peers_committed[peer_id] = true;
    }
}

impl Network {
    fn send(&self, messages: Vec<Message>) {
        for message in messages {
            println!("peer {} -> peer {}: {}", message.from, message.to, &message);
            if let Some(peer_tx) = self.peers_tx.get(message.to as usize) {
                let _ = peer_tx.send(message);
            }
        }
    }
}
