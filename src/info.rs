use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::{Mutex, RwLock};
use crate::history::{HistoryId, InfoId};
use crate::policy::Policy;
use crate::utils::*;

// ---------- Info (an infoset) ----------
/// Structure representing what is known given a set of indistinguishable histories (for acting player)
pub struct Info<A: ActionI, O> {
    pub player: Player,
    pub observations: Vec<O>,
    pub policy: RwLock<Policy<A>>,
    /// Only set on closure sets: the infoset they were derived from (never ownership)
    pub closure_parent: Option<InfoId>,
    members: Mutex<Members>,
    visited: AtomicBool,
}

struct Members {
    histories: Vec<HistoryId>,
    reach: Reach,
}

impl<A: ActionI, O> Info<A, O> {
    /// Initialize an info around its first history
    pub fn from_policy(policy: Policy<A>, observations: Vec<O>, player: Player) -> Self {
        Info {
            player,
            observations,
            policy: RwLock::new(policy),
            closure_parent: None,
            members: Mutex::new(Members { histories: vec![], reach: Reach::zero() }),
            visited: AtomicBool::new(false),
        }
    }

    pub fn with_closure_parent(mut self, parent: InfoId) -> Self {
        self.closure_parent = Some(parent);
        self
    }

    /// Add another history into our set
    pub fn add_history(&self, h: HistoryId, reach: Reach) {
        let mut members = self.members.lock();
        debug_assert!(!members.histories.contains(&h));
        members.histories.push(h);
        members.reach.add(&reach);
    }

    pub fn members(&self) -> Vec<HistoryId> {
        self.members.lock().histories.clone()
    }
    pub fn len(&self) -> usize {
        self.members.lock().histories.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Sum of the member histories' reach probabilities
    pub fn reach(&self) -> Reach {
        self.members.lock().reach
    }
    pub fn reach_prob(&self, player: Player) -> Probability {
        self.reach().get(player)
    }
    /// Recompute the aggregate from each member's current reach
    pub fn refresh_reach(&self, reach_of: impl Fn(HistoryId) -> Reach) {
        let mut members = self.members.lock();
        let mut total = Reach::zero();
        for h in members.histories.iter() {
            total.add(&reach_of(*h));
        }
        members.reach = total;
    }

    /// Flag for the regret pass. Returns true the first time in a pass
    pub fn mark_visited(&self) -> bool {
        !self.visited.swap(true, Ordering::AcqRel)
    }
    pub fn take_visited(&self) -> bool {
        self.visited.swap(false, Ordering::AcqRel)
    }

    pub fn expectation(&self) -> Reward {
        self.policy.read().expectation()
    }
    pub fn exploit_policy(&self) -> Strategy {
        self.policy.read().exploit_policy()
    }
}

impl<A: ActionI, O: std::fmt::Debug> std::fmt::Debug for Info<A, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Info({:?}, {:?}, {} histories, {:?})", self.player, self.observations, self.len(), self.policy.read())
    }
}
