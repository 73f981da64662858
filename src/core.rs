//! Unstable, low-level API for the complete state of a Raft node.
//!
//! [`State`] processes one [`Message`] at a time via [`State::step`] and queues the messages it wants delivered to
//! peers, which the caller drains with [`State::take_messages`]. It never performs any I/O or keeps time itself:
//! elections and heartbeats are started by [`ElectionTimeout`] and [`HeartbeatTimeout`] triggers, normally injected
//! by [`Node`](crate::node::Node).

use std::collections::{BTreeMap, BTreeSet};
use std::iter;
use std::mem;

use log::{debug, error, info, warn};

use crate::log::{Log, LogState};
use crate::message::*;

use self::LeadershipState::*;

/// The most proposals a node holds on to while it knows of no leader. Further proposals are refused.
pub const MAX_QUEUED_PROPOSALS: usize = 1024;

/// The state of Raft log replication from a Raft leader to one of its followers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplicationState {
    // \* The next entry to send to each follower.
    // VARIABLE nextIndex
    /// The index of the next log entry to be sent to this peer.
    pub next_idx: LogIndex,

    // \* The latest entry that each follower has acknowledged is the same as the
    // \* leader's. This is used to calculate commitIndex on the leader.
    // VARIABLE matchIndex
    /// The index of the last log entry on this peer up to which the peer's log is known to match this node's log.
    pub match_idx: LogIndex,
}

/// The role a Raft node currently plays.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

// \* Server states.
// CONSTANTS Follower, Candidate, Leader
enum LeadershipState {
    Follower(FollowerState),
    Candidate(CandidateState),
    Leader(LeaderState),
}

struct FollowerState {
    leader: Option<NodeId>,
}

struct CandidateState {
    // VARIABLE votesGranted
    votes_granted: BTreeSet<NodeId>,
    votes_rejected: BTreeSet<NodeId>,
}

struct LeaderState {
    followers: BTreeMap<NodeId, ReplicationState>,
}

/// The complete state of a Raft node.
pub struct State<L> {
    node_id: NodeId,
    members: BTreeSet<NodeId>,

    // \* The server's term number.
    // VARIABLE currentTerm
    current_term: TermId,

    // \* The candidate the server voted for in its current term, or
    // \* Nil if it hasn't voted for any.
    // VARIABLE votedFor
    voted_for: Option<NodeId>,

    // \* The server's state (Follower, Candidate, or Leader).
    // VARIABLE state
    leadership: LeadershipState,

    // VARIABLE log
    // VARIABLE commitIndex
    log: LogState<L>,

    /// Proposals received while no leader was known.
    proposals: Vec<LogEntry>,

    /// Messages waiting to be delivered to peers.
    msgs: Vec<Message>,
}

impl<L: Log> State<L> {
    /// Constructs the state of a Raft node which is a member of a group together with `peers`.
    ///
    /// The node starts as a follower without a known leader at the initial term. `peers` may contain `node_id` or
    /// omit it to the same effect.
    pub fn new(node_id: NodeId, mut peers: BTreeSet<NodeId>, log: L) -> Self {
        peers.insert(node_id);
        Self {
            node_id,
            members: peers,
            current_term: TermId::default(),
            voted_for: None,
            leadership: Follower(FollowerState { leader: None }),
            log: LogState::new(log),
            proposals: Vec::new(),
            msgs: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn term(&self) -> TermId {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    pub fn role(&self) -> Role {
        match &self.leadership {
            Follower(_) => Role::Follower,
            Candidate(_) => Role::Candidate,
            Leader(_) => Role::Leader,
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(&self.leadership, Leader(_))
    }

    /// Returns the leader of the current term, if known.
    pub fn leader(&self) -> Option<NodeId> {
        match &self.leadership {
            Follower(follower_state) => follower_state.leader,
            Candidate(_) => None,
            Leader(_) => Some(self.node_id),
        }
    }

    /// Returns the IDs of every member of the group, including this node if it is a member.
    pub fn members(&self) -> &BTreeSet<NodeId> {
        &self.members
    }

    /// Returns whether this node may start elections and send heartbeats, i.e. whether it is a member of its group.
    pub fn promotable(&self) -> bool {
        self.members.contains(&self.node_id)
    }

    pub fn commit_idx(&self) -> LogIndex {
        self.log.commit_idx
    }

    pub fn applied_idx(&self) -> LogIndex {
        self.log.applied_idx
    }

    pub fn last_index(&self) -> LogIndex {
        self.log.last_index()
    }

    pub fn last_term(&self) -> TermId {
        self.log.last_term()
    }

    pub fn log(&self) -> &L {
        self.log.log()
    }

    pub fn replication_state(&self, peer_node_id: NodeId) -> Option<&ReplicationState> {
        if let Leader(leader_state) = &self.leadership {
            leader_state.followers.get(&peer_node_id)
        } else {
            None
        }
    }

    /// Returns whether the log holds a membership change which has not been applied yet.
    pub fn pending_config(&self) -> bool {
        (self.log.entries_from(self.log.applied_idx + 1).iter()).any(LogEntry::is_config)
    }

    /// Returns the messages queued for delivery since the last call to [`take_messages`](Self::take_messages).
    pub fn msgs(&self) -> &[Message] {
        &self.msgs
    }

    /// Removes and returns the messages queued for delivery.
    pub fn take_messages(&mut self) -> Vec<Message> {
        mem::take(&mut self.msgs)
    }

    /// Returns the committed entries which have not been applied yet, in log order.
    ///
    /// This does not mark the entries applied, so calling it again returns the same entries until
    /// [`applied_to`](Self::applied_to) is called.
    pub fn next_entries(&self) -> Vec<LogEntry> {
        self.log.next_entries()
    }

    /// Marks every entry up to and including `index` as applied.
    ///
    /// # Panics
    ///
    /// If `index` is beyond the commit index or before the current applied index.
    pub fn applied_to(&mut self, index: LogIndex) {
        self.log.applied_to(index)
    }

    /// Adds `node_id` to the group. Called when an [`EntryKind::AddMember`] entry is applied.
    pub fn add_member(&mut self, node_id: NodeId) {
        if self.members.insert(node_id) {
            info!("added member {} at {}", node_id, &self.current_term);
        }
        let next_idx = self.log.last_index() + 1;
        if let Leader(leader_state) = &mut self.leadership {
            if node_id != self.node_id && !leader_state.followers.contains_key(&node_id) {
                leader_state.followers.insert(
                    node_id,
                    ReplicationState {
                        next_idx,
                        match_idx: LogIndex::default(),
                    },
                );
                self.send_append(node_id);
            }
        }
        self.advance_commit_idx();
    }

    /// Removes `node_id` from the group. Called when an [`EntryKind::RemoveMember`] entry is applied.
    ///
    /// A leader sends the removed node a last append request so it learns that its removal is committed. A leader which
    /// removes itself steps down.
    pub fn remove_member(&mut self, node_id: NodeId) {
        if self.members.remove(&node_id) {
            info!("removed member {} at {}", node_id, &self.current_term);
        }
        self.send_append(node_id);
        if let Leader(leader_state) = &mut self.leadership {
            leader_state.followers.remove(&node_id);
        }
        if node_id == self.node_id {
            if !self.proposals.is_empty() {
                warn!("dropped {} queued proposals as no longer a member", self.proposals.len());
                self.proposals.clear();
            }
            if self.is_leader() {
                info!("stepped down at {} as no longer a member", &self.current_term);
                self.leadership = Follower(FollowerState { leader: None });
            }
        }
        self.advance_commit_idx();
    }

    /// Processes one message, which is either a trigger generated locally or a message from a peer.
    ///
    /// Returns `false` if the message was rejected without effect, e.g. because it carries a stale term.
    pub fn step(&mut self, msg: Message) -> bool {
        let Message {
            from,
            to,
            term,
            rpc,
        } = msg;
        let rpc = match rpc {
            Some(rpc) => rpc,
            None => {
                warn!("ignored message without payload from {}", from);
                return false;
            }
        };

        if let Rpc::ElectionTimeout(_) | Rpc::HeartbeatTimeout(_) = &rpc {
            if from != 0 || to != 0 || term != TermId::default() {
                warn!("ignored {} sent by {} to {}", &rpc, from, to);
                return false;
            }
        }

        if !rpc.is_local() {
            if to != self.node_id {
                warn!("ignored message for {} from {}: {}", to, from, &rpc);
                return false;
            }
            // \* Any RPC with a newer term causes the recipient to advance its term first.
            if term > self.current_term {
                self.update_term(from, term, &rpc);
            } else if term < self.current_term {
                return self.reject_stale(from, term, rpc);
            }
        }

        match rpc {
            Rpc::Propose(Propose { entries }) => self.propose(entries),
            Rpc::ElectionTimeout(_) => self.timeout(),
            Rpc::HeartbeatTimeout(_) => self.heartbeat(),
            Rpc::VoteRequest(request) => self.handle_vote_request(from, request),
            Rpc::VoteResponse(response) => self.handle_vote_response(from, response),
            Rpc::AppendRequest(request) => self.handle_append_request(from, request),
            Rpc::AppendResponse(response) => self.handle_append_response(from, response),
        }
    }

    //
    // \* Define state transitions
    //

    // \* Server i times out and starts a new election.
    fn timeout(&mut self) -> bool {
        // Timeout(i) ==
        if !self.promotable() {
            warn!("ignored election timeout as not a member");
            return false;
        }
        match &self.leadership {
            Follower(_) | Candidate(_) => {
                // /\ state[i] \in {Follower, Candidate}
                self.current_term += 1;
                self.voted_for = Some(self.node_id);
                self.leadership = Candidate(CandidateState {
                    votes_granted: iter::once(self.node_id).collect(),
                    votes_rejected: BTreeSet::new(),
                });
                info!("became candidate at {}", &self.current_term);

                if !self.become_leader() {
                    self.request_votes();
                }
                true
            }
            Leader(_) => {
                debug!("ignored election timeout as leader");
                false
            }
        }
    }

    // \* Candidate i sends j a RequestVote request.
    fn request_votes(&mut self) {
        let request = VoteRequest {
            last_log_idx: self.log.last_index(),
            last_log_term: self.log.last_term(),
        };
        for peer in self.peers() {
            self.send(peer, Rpc::VoteRequest(request.clone()));
        }
    }

    // \* Candidate i transitions to leader.
    fn become_leader(&mut self) -> bool {
        // BecomeLeader(i) ==
        let won = match &self.leadership {
            // /\ votesGranted[i] \in Quorum
            Candidate(candidate_state) => {
                candidate_state.votes_granted.intersection(&self.members).count() >= self.quorum_size()
            }
            Follower(_) | Leader(_) => false,
        };
        if !won {
            return false;
        }

        info!("became leader at {}", &self.current_term);
        let next_idx = self.log.last_index() + 1;
        let followers = self
            .peers()
            .into_iter()
            .map(|peer| {
                let replication = ReplicationState {
                    next_idx,
                    match_idx: LogIndex::default(),
                };
                (peer, replication)
            })
            .collect();
        self.leadership = Leader(LeaderState { followers });

        // assert authority before anything else
        self.broadcast_append();

        for proposal in mem::take(&mut self.proposals) {
            self.propose(vec![proposal]);
        }
        true
    }

    // \* Leader i receives a client request to add v to the log.
    fn propose(&mut self, entries: Vec<LogEntry>) -> bool {
        if entries.is_empty() {
            return false;
        }
        match &self.leadership {
            Leader(_) => {
                let configs = entries.iter().filter(|entry| entry.is_config()).count();
                if configs > 1 || (configs > 0 && self.pending_config()) {
                    warn!(
                        "rejected membership change at {} as one is already pending",
                        &self.current_term
                    );
                    return false;
                }
                let appended = self.append_proposals(entries);
                self.advance_commit_idx();
                self.broadcast_append();
                appended
            }
            Follower(FollowerState {
                leader: Some(leader),
            }) => {
                let leader = *leader;
                debug!("forwarding proposal to leader {}", leader);
                self.send(leader, Rpc::Propose(Propose { entries }));
                true
            }
            Follower(_) | Candidate(_) => {
                if self.proposals.len() + entries.len() > MAX_QUEUED_PROPOSALS {
                    warn!(
                        "refused proposal as {} are already queued until a leader is known",
                        self.proposals.len()
                    );
                    return false;
                }
                debug!("queued proposal until a leader is known");
                self.proposals.extend(entries);
                true
            }
        }
    }

    fn append_proposals(&mut self, entries: Vec<LogEntry>) -> bool {
        for entry in entries {
            let entry = LogEntry {
                // /\ LET entry == [term  |-> currentTerm[i],
                index: self.log.last_index() + 1,
                term: self.current_term,
                ..entry
            };
            if let Err(err) = self.log.append(entry) {
                error!("error appending to raft log: {}", err);
                return false;
            }
        }
        true
    }

    fn heartbeat(&mut self) -> bool {
        if self.is_leader() {
            verbose!("sending heartbeat at {}", &self.current_term);
            self.broadcast_append();
            true
        } else {
            false
        }
    }

    fn broadcast_append(&mut self) {
        let followers: Vec<NodeId> = match &self.leadership {
            Leader(leader_state) => leader_state.followers.keys().copied().collect(),
            Follower(_) | Candidate(_) => return,
        };
        for follower in followers {
            self.send_append(follower);
        }
    }

    // \* Leader i sends j an AppendEntries request containing every entry j is missing.
    fn send_append(&mut self, to_node_id: NodeId) {
        // AppendEntries(i, j) ==
        let next_idx = match &self.leadership {
            Leader(leader_state) => match leader_state.followers.get(&to_node_id) {
                Some(replication) => replication.next_idx,
                None => return,
            },
            Follower(_) | Candidate(_) => return,
        };
        let prev_log_idx = next_idx - 1; // /\ LET prevLogIndex == nextIndex[i][j] - 1
        let prev_log_term = match self.log.get_term(prev_log_idx) {
            Some(prev_log_term) => prev_log_term,
            None => {
                error!("missing log {} to send to {}!", &prev_log_idx, to_node_id);
                return;
            }
        };
        let entries = self.log.entries_from(next_idx);
        let last_entry = prev_log_idx + entries.len() as u64;
        let request = AppendRequest {
            prev_log_idx,
            prev_log_term,
            leader_commit: self.log.commit_idx.min(last_entry), // mcommitIndex |-> Min({commitIndex[i], lastEntry})
            entries,
        };
        self.send(to_node_id, Rpc::AppendRequest(request));
    }

    // \* Leader i advances its commitIndex.
    fn advance_commit_idx(&mut self) {
        // AdvanceCommitIndex(i) ==
        let agree_idx = match &self.leadership {
            Leader(leader_state) => {
                // \* The set of servers that agree up through index.
                let last_log_idx = self.log.last_index();
                let mut match_idxs: Vec<LogIndex> = (self.members.iter())
                    .map(|member| {
                        if *member == self.node_id {
                            last_log_idx
                        } else {
                            (leader_state.followers.get(member))
                                .map(|replication| replication.match_idx)
                                .unwrap_or_default()
                        }
                    })
                    .collect();
                match_idxs.sort_unstable_by(|a, b| b.cmp(a));
                // \* The maximum index for which a quorum agrees
                match match_idxs.get(self.quorum_size() - 1) {
                    Some(agree_idx) => *agree_idx,
                    None => return,
                }
            }
            Follower(_) | Candidate(_) => return,
        };
        // /\ log[i][Max(agreeIndexes)].term = currentTerm[i]
        if agree_idx > self.log.commit_idx && self.log.get_term(agree_idx) == Some(self.current_term) {
            self.log.commit_to(agree_idx);
        }
    }

    //
    // \* Message handlers
    // \* i = recipient, j = sender, m = message
    //

    // \* Server i receives a RequestVote request from server j with
    // \* m.mterm = currentTerm[i].
    fn handle_vote_request(&mut self, from: NodeId, msg: VoteRequest) -> bool {
        // HandleRequestVoteRequest(i, j, m) ==
        let last_log_idx = self.log.last_index();
        let last_log_term = self.log.last_term();
        let log_ok = (msg.last_log_term > last_log_term)
            || (msg.last_log_term == last_log_term && msg.last_log_idx >= last_log_idx);
        let vote_ok = self.voted_for.map(|vote| vote == from).unwrap_or(true); // votedFor[i] \in {Nil, j}
        let grant = log_ok && vote_ok;

        if grant {
            self.voted_for = Some(from);
            info!(
                "granted vote at {} with {} at {} for node {} with {} at {}",
                &self.current_term,
                &last_log_idx,
                &last_log_term,
                from,
                &msg.last_log_idx,
                &msg.last_log_term
            );
        } else if let Some(vote) = self.voted_for.filter(|_| !vote_ok) {
            info!(
                "rejected vote at {} for node {} as already voted for {}",
                &self.current_term, from, vote
            );
        } else {
            info!(
                "rejected vote at {} with {} at {} for node {} with {} at {}",
                &self.current_term,
                &last_log_idx,
                &last_log_term,
                from,
                &msg.last_log_idx,
                &msg.last_log_term
            );
        }

        self.send(
            from,
            Rpc::VoteResponse(VoteResponse {
                vote_granted: grant,
            }),
        );
        true
    }

    // \* Server i receives a RequestVote response from server j with
    // \* m.mterm = currentTerm[i].
    fn handle_vote_response(&mut self, from: NodeId, msg: VoteResponse) -> bool {
        // HandleRequestVoteResponse(i, j, m) ==
        let quorum_size = self.quorum_size();
        let lost = match &mut self.leadership {
            Candidate(candidate_state) => {
                if !self.members.contains(&from) {
                    warn!("ignored vote from {} as not a member", from);
                    return false;
                }
                if msg.vote_granted {
                    info!("received vote granted from {} at {}", from, &self.current_term);
                    candidate_state.votes_granted.insert(from);
                } else {
                    info!("received vote rejected from {} at {}", from, &self.current_term);
                    candidate_state.votes_rejected.insert(from);
                }
                candidate_state.votes_rejected.intersection(&self.members).count() >= quorum_size
            }
            Follower(_) | Leader(_) => {
                debug!("ignored vote response from {} as not a candidate", from);
                return true;
            }
        };
        if !self.become_leader() && lost {
            info!("lost election at {}", &self.current_term);
            self.leadership = Follower(FollowerState { leader: None });
        }
        true
    }

    // \* Server i receives an AppendEntries request from server j with
    // \* m.mterm = currentTerm[i].
    fn handle_append_request(&mut self, from: NodeId, msg: AppendRequest) -> bool {
        // HandleAppendEntriesRequest(i, j, m) ==
        match &mut self.leadership {
            Candidate(_) => {
                // \* return to follower state
                self.leadership = Follower(FollowerState { leader: Some(from) });
                info!("became follower at {} of {}", &self.current_term, from);
            }
            Follower(follower_state) => {
                if follower_state.leader != Some(from) {
                    info!("became follower at {} of {}", &self.current_term, from);
                    follower_state.leader = Some(from);
                }
            }
            Leader(_) => {
                error!(
                    "received append request as leader at {} from {}",
                    &self.current_term, from
                );
                return false;
            }
        }
        for proposal in mem::take(&mut self.proposals) {
            debug!("forwarding queued proposal to leader {}", from);
            self.send(from, Rpc::Propose(Propose { entries: vec![proposal] }));
        }

        let prev_log_idx = msg.prev_log_idx;
        let our_prev_log_term = self.log.get_term(prev_log_idx);
        // LET logOk == \/ m.mprevLogIndex = 0
        //              \/ /\ m.mprevLogIndex > 0 /\ m.mprevLogIndex <= Len(log[i]) /\ m.mprevLogTerm = log[i][m.mprevLogIndex].term
        if our_prev_log_term != Some(msg.prev_log_term) {
            // \* reject request
            if let Some(our_prev_log_term) = our_prev_log_term {
                warn!(
                    "rejected append from {} with {} at {}, we have {}",
                    from, &prev_log_idx, &msg.prev_log_term, &our_prev_log_term
                );
            } else {
                info!(
                    "rejected append from {} with {}, we are behind at {}",
                    from,
                    &prev_log_idx,
                    self.log.last_index()
                );
            }
            let response = AppendResponse {
                success: false,
                match_idx: LogIndex::default(),
                last_log_idx: self.log.last_index(),
            };
            self.send(from, Rpc::AppendResponse(response));
            return true;
        }

        // \* accept request, find point of log conflict
        let mut last_processed_idx = prev_log_idx;
        for msg_entry in msg.entries {
            let msg_entry_log_idx = last_processed_idx + 1;
            if msg_entry.index != msg_entry_log_idx {
                error!(
                    "received entry at {} in place of {} from {}",
                    &msg_entry.index, &msg_entry_log_idx, from
                );
                break;
            }
            match self.log.get_term(msg_entry_log_idx) {
                Some(our_entry_log_term) if our_entry_log_term == msg_entry.term => (),
                Some(_) => {
                    if msg_entry_log_idx <= self.log.commit_idx {
                        error!(
                            "refused to cancel committed entry {} for append from {}",
                            &msg_entry_log_idx, from
                        );
                        break;
                    }
                    match self.log.cancel_from(msg_entry_log_idx) {
                        Ok(cancelled_len) => info!(
                            "cancelled {} entries from {}",
                            cancelled_len, &msg_entry_log_idx
                        ),
                        Err(err) => {
                            error!("error cancelling raft log from {}: {}", &msg_entry_log_idx, err);
                            break;
                        }
                    }
                    if let Err(err) = self.log.append(msg_entry) {
                        error!("error appending to raft log: {}", err);
                        break;
                    }
                }
                None => {
                    if let Err(err) = self.log.append(msg_entry) {
                        error!("error appending to raft log: {}", err);
                        break;
                    }
                }
            }
            last_processed_idx = msg_entry_log_idx;
        }

        // update commit index from leader
        self.log.commit_to(msg.leader_commit.min(last_processed_idx)); // commitIndex' = m.mcommitIndex

        let response = AppendResponse {
            success: true,
            match_idx: last_processed_idx, // mmatchIndex |-> m.mprevLogIndex + Len(m.mentries)
            last_log_idx: self.log.last_index(),
        };
        self.send(from, Rpc::AppendResponse(response));
        true
    }

    // \* Server i receives an AppendEntries response from server j with
    // \* m.mterm = currentTerm[i].
    fn handle_append_response(&mut self, from: NodeId, msg: AppendResponse) -> bool {
        // HandleAppendEntriesResponse(i, j, m) ==
        let last_log_idx = self.log.last_index();
        let resend = match &mut self.leadership {
            Leader(leader_state) => match leader_state.followers.get_mut(&from) {
                Some(replication) => {
                    // progress reported by a peer is bounded by our own log
                    let match_idx = msg.match_idx.min(last_log_idx);
                    let follower_last_idx = msg.last_log_idx.min(last_log_idx);
                    if msg.success {
                        // /\ \/ /\ m.msuccess \* successful
                        if match_idx > replication.match_idx {
                            replication.match_idx = match_idx; // matchIndex' = m.mmatchIndex
                        }
                        let next_idx = replication.match_idx.saturating_add(1);
                        if next_idx > replication.next_idx {
                            replication.next_idx = next_idx; // nextIndex' = m.mmatchIndex + 1
                        }
                        match_idx == replication.match_idx && replication.match_idx < last_log_idx
                    } else {
                        //    \/ /\ \lnot m.msuccess \* not successful
                        info!(
                            "received append rejection at {} from {} having {}",
                            &replication.next_idx, from, &msg.last_log_idx
                        );
                        replication.next_idx = (replication.next_idx - 1) // nextIndex' = Max({nextIndex[i][j] - 1, 1})
                            .min(follower_last_idx.saturating_add(1))
                            .max(replication.match_idx.saturating_add(1));
                        true
                    }
                }
                None => {
                    warn!("ignored append response from {} as not a follower", from);
                    return false;
                }
            },
            Follower(_) | Candidate(_) => {
                debug!("ignored append response from {} as not the leader", from);
                return true;
            }
        };
        if msg.success {
            self.advance_commit_idx();
        }
        if resend {
            self.send_append(from);
        }
        true
    }

    // \* Any RPC with a newer term causes the recipient to advance its term first.
    fn update_term(&mut self, from: NodeId, term: TermId, rpc: &Rpc) {
        // UpdateTerm(i, j, m) ==
        info!(
            "became follower at {} (from {}) due to message from {}: {}",
            &term, &self.current_term, from, rpc
        );
        self.current_term = term; // /\ currentTerm'    = [currentTerm EXCEPT ![i] = m.mterm]
        self.leadership = Follower(FollowerState { leader: None }); // /\ state' = Follower
        self.voted_for = None; // /\ votedFor'       = [votedFor    EXCEPT ![i] = Nil]
    }

    // \* Messages with stale terms are rejected; requests are answered so their sender learns the term.
    fn reject_stale(&mut self, from: NodeId, term: TermId, rpc: Rpc) -> bool {
        info!(
            "ignored message with {} < current {}: {}",
            &term, &self.current_term, &rpc
        );
        match rpc {
            Rpc::VoteRequest(_) => {
                let response = VoteResponse {
                    vote_granted: false,
                };
                self.send(from, Rpc::VoteResponse(response));
            }
            Rpc::AppendRequest(_) => {
                let response = AppendResponse {
                    success: false,
                    match_idx: LogIndex::default(),
                    last_log_idx: self.log.last_index(),
                };
                self.send(from, Rpc::AppendResponse(response));
            }
            Rpc::VoteResponse(_) | Rpc::AppendResponse(_) => (),
            Rpc::Propose(_) | Rpc::ElectionTimeout(_) | Rpc::HeartbeatTimeout(_) => {
                unreachable!("local triggers carry no term")
            }
        }
        false
    }

    //
    // helpers
    //

    fn send(&mut self, to: NodeId, rpc: Rpc) {
        self.msgs
            .push(Message::new(self.node_id, to, self.current_term, rpc));
    }

    fn peers(&self) -> Vec<NodeId> {
        (self.members.iter().copied())
            .filter(|member| *member != self.node_id)
            .collect()
    }

    fn quorum_size(&self) -> usize {
        quorum_size(self.members.len())
    }
}

/// Computes the minimum size of a quorum of nodes in a Raft group.
///
/// Returns the minimum number of nodes out of a Raft group with total `member_count` nodes necessary to constitute
/// a quorum. A quorum of reachable nodes is needed to elect a leader and append to the distributed log.
pub fn quorum_size(member_count: usize) -> usize {
    member_count / 2 + 1
}
