use crate::utils::*;
use atomic_float::AtomicF64;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;

/// Stable handle of a History inside the GameTree arena
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HistoryId(pub usize);

/// Stable handle of an Info inside the GameTree arena
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct InfoId(pub usize);

/// Lifecycle of a node. Only ever moves forward: New -> Visited -> Expanded
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Status {
    New = 0,
    Visited = 1,
    Expanded = 2,
    Terminal = 3,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::New,
            1 => Status::Visited,
            2 => Status::Expanded,
            3 => Status::Terminal,
            _ => unreachable!("corrupt status {}", v),
        }
    }
}

// ---------- History ----------
/// One exact path through the game. Owned by the arena, children are referenced by handle
pub struct History<G: Game> {
    parent: OnceLock<HistoryId>,
    pub player: Player,
    state: G::State,
    traces: [Vec<G::Observation>; 2],
    status: AtomicU8,
    claimed: AtomicBool,
    children: OnceLock<Vec<(G::Action, HistoryId)>>,
    info: OnceLock<InfoId>,
    reach: Mutex<Reach>,
    payoff: Reward,
    value: AtomicF64,
}

impl<G: Game> History<G> {
    /// Constructor from the game state, what each player has seen up to its parent, and reach probabilities
    pub fn new(game: &G, parent: Option<HistoryId>, prefix: [&[G::Observation]; 2], reach: Reach, payoff: Reward) -> Self {
        let traces = [
            Self::extend(prefix[0], game.observation(Player::P1)),
            Self::extend(prefix[1], game.observation(Player::P2)),
        ];
        let (status, player) = if game.is_over() {
            (Status::Terminal, Player::Terminal)
        } else if parent.is_none() {
            (Status::Visited, game.active_player())
        } else {
            (Status::New, game.active_player())
        };
        let payoff = if game.is_over() { game.evaluate() } else { payoff };
        History {
            parent: parent.map(OnceLock::from).unwrap_or_default(),
            player,
            state: game.encode(),
            traces,
            status: AtomicU8::new(status as u8),
            claimed: AtomicBool::new(false),
            children: OnceLock::new(),
            info: OnceLock::new(),
            reach: Mutex::new(reach),
            payoff,
            value: AtomicF64::new(payoff),
        }
    }

    fn extend(prefix: &[G::Observation], obs: G::Observation) -> Vec<G::Observation> {
        let mut trace = Vec::with_capacity(prefix.len() + 1);
        trace.extend_from_slice(prefix);
        trace.push(obs);
        trace
    }

    // ---------- Lifecycle --------- //
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }
    pub fn is_terminal(&self) -> bool { self.status() == Status::Terminal }
    pub fn is_expanded(&self) -> bool { self.status() == Status::Expanded }
    /// First traversal by the regret pass. Returns whether this call made the transition
    pub fn mark_visited(&self) -> bool {
        self.status
            .compare_exchange(Status::New as u8, Status::Visited as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
    /// Reserve the right to expand. Exactly one caller ever wins, and only on a visited node
    pub(crate) fn claim(&self) -> bool {
        self.status() == Status::Visited
            && self.claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
    /// Publish children and infoset, then flip to Expanded (the claim holder is the only caller)
    pub(crate) fn finish_expansion(&self, children: Vec<(G::Action, HistoryId)>, info: Option<InfoId>) {
        debug_assert!(self.claimed.load(Ordering::Acquire));
        if self.children.set(children).is_err() {
            panic!("history expanded twice");
        }
        if let Some(info) = info {
            if self.info.set(info).is_err() {
                panic!("history joined two infosets");
            }
        }
        self.status.store(Status::Expanded as u8, Ordering::Release);
    }

    /// Hang a detached (grafted) root under the node that just reached it. Only succeeds once
    pub(crate) fn adopt(&self, parent: HistoryId) -> bool {
        self.parent.set(parent).is_ok()
    }

    // ---------- Getters --------- //
    pub fn parent(&self) -> Option<HistoryId> { self.parent.get().copied() }
    pub fn game(&self) -> G { G::decode(&self.state) }
    pub fn state(&self) -> &G::State { &self.state }
    /// Children (empty unless expanded)
    pub fn children(&self) -> &[(G::Action, HistoryId)] {
        if !self.is_expanded() { return &[]; }
        self.children.get().map(|c| c.as_slice()).unwrap_or(&[])
    }
    pub fn child(&self, action: &G::Action) -> Option<HistoryId> {
        self.children().iter().find(|(a, _)| a == action).map(|(_, h)| *h)
    }
    /// The infoset of the acting player (only once expanded)
    pub fn info(&self) -> Option<InfoId> {
        if !self.is_expanded() { return None; }
        self.info.get().copied()
    }
    /// s_i(h): everything `player` has observed up to and including this node
    pub fn trace(&self, player: Player) -> &[G::Observation] {
        match player {
            Player::P1 => &self.traces[0],
            Player::P2 => &self.traces[1],
            // chance sees what P1 sees: it only needs a stable key
            Player::Chance => &self.traces[0],
            Player::Terminal => panic!("terminal has no trace"),
        }
    }
    /// o_i(h): what `player` sees at this node
    pub fn observation(&self, player: Player) -> &G::Observation {
        match self.trace(player).last() {
            Some(obs) => obs,
            None => unreachable!("every trace holds this node's observation"),
        }
    }
    /// How far from the start of the game this node is
    pub fn depth(&self) -> usize { self.traces[0].len() - 1 }
    pub fn reach(&self) -> Reach { *self.reach.lock() }
    pub fn reach_prob(&self, player: Player) -> Probability { self.reach.lock().get(player) }
    pub(crate) fn set_reach(&self, reach: Reach) { *self.reach.lock() = reach; }
    /// Static payoff: exact at terminal, the evaluator's guess elsewhere
    pub fn payoff(&self) -> Reward { self.payoff }
    /// Most recent backed-up value (P1 positive)
    pub fn value(&self) -> Reward { self.value.load(Ordering::Relaxed) }
    pub(crate) fn set_value(&self, v: Reward) { self.value.store(v, Ordering::Relaxed); }
}

impl<G: Game> Debug for History<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status() {
            Status::Terminal => write!(f, "Terminal({:?})", self.payoff),
            Status::New => write!(f, "New({:?})", self.traces),
            Status::Visited => write!(f, "Visited({:?}, {:.2})", self.traces, self.value()),
            Status::Expanded => {
                let actions = self.children().iter().map(|(a, _)| a).collect::<Vec<_>>();
                write!(f, "Expanded({:?}, {:?}, {:?})", self.trace(self.player), self.player, actions)
            }
        }
    }
}
