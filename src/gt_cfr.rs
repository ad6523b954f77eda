use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use crate::history::{HistoryId, InfoId, Status};
use crate::subgame::Subgame;
use crate::tree::GameTree;
use crate::utils::*;

/// What one solve got done before the deadline
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SolveStats {
    pub rounds: usize,
    pub expansions: usize,
}

// ---------- Growing-Tree CFR ----------
/// One solve over a subgame: a regret worker and `expanders` growth workers sharing the tree until the deadline
pub struct GtCfr<'a, G: Game, E: Evaluator<G>> {
    tree: &'a GameTree<G>,
    subgame: &'a Subgame<G>,
    prior: &'a E,
    config: &'a SolverConfig,
}

impl<'a, G: Game, E: Evaluator<G>> GtCfr<'a, G, E> {
    pub fn new(tree: &'a GameTree<G>, subgame: &'a Subgame<G>, prior: &'a E, config: &'a SolverConfig) -> Self {
        GtCfr { tree, subgame, prior, config }
    }

    /// Run both passes until `deadline`, joining every worker before returning
    pub fn run(&self, deadline: Instant) -> SolveStats {
        let expansions = AtomicUsize::new(0);
        let rounds = thread::scope(|s| {
            for _ in 0..self.config.expanders {
                s.spawn(|| self.grow(deadline, &expansions));
            }
            let mut rounds = 0;
            while Instant::now() < deadline {
                self.solve_step();
                rounds += 1;
            }
            rounds
        });
        self.tree.refresh_reach();
        SolveStats { rounds, expansions: expansions.into_inner() }
    }

    fn grow(&self, deadline: Instant, expansions: &AtomicUsize) {
        while Instant::now() < deadline {
            let mut grew = false;
            for role in [Player::P1, Player::P2] {
                if self.expansion_step(role) {
                    expansions.fetch_add(1, Ordering::Relaxed);
                    grew = true;
                }
            }
            if !grew { thread::yield_now(); }
        }
    }

    // ---------- Regret pass --------- //
    /// One round: a regret pass per player, then the gadget catches up
    pub fn solve_step(&self) {
        self.cfr_iteration(Player::P1);
        self.cfr_iteration(Player::P2);
        for boundary in self.subgame.boundary.iter() {
            boundary.resolve();
        }
        let p_max = self.subgame.reweight();
        log::trace!("p_max={:.3}", p_max);
    }

    fn cfr_iteration(&self, optimizing: Player) {
        let opponent = self.subgame.player.opponent();
        let mut visited = vec![];
        for (boundary, r) in self.subgame.boundary.iter().zip(self.subgame.root_policy()) {
            let (members, beliefs) = {
                let policy = boundary.info.policy.read();
                (policy.actions().to_vec(), policy.exploit_policy())
            };
            let mut live = 0.0;
            for (h, c) in members.iter().zip(beliefs) {
                let mut reach = Reach::default();
                reach.set(opponent, r);
                reach.set(Player::Chance, c);
                live += c * self.make_utilities(*h, optimizing, reach, &mut visited);
            }
            boundary.set_live(live);
            boundary.info.refresh_reach(|h| self.tree.history(h).reach());
        }

        // post-order by last visit: children before parents
        let mut order: Vec<InfoId> = visited.into_iter().rev().filter(|i| self.tree.info(*i).take_visited()).collect();
        order.reverse();
        for id in order {
            let info = self.tree.info(id);
            let mut policy = info.policy.write();
            if info.player == optimizing {
                policy.update();
            } else {
                policy.discard();
            }
            drop(policy);
            info.refresh_reach(|h| self.tree.history(h).reach());
        }
    }

    /// Back up values below `id`, accumulating counterfactuals for every infoset on the way
    fn make_utilities(&self, id: HistoryId, optimizing: Player, reach: Reach, visited: &mut Vec<InfoId>) -> Reward {
        let node = self.tree.history(id);
        node.mark_visited();
        node.set_reach(reach);
        if !node.is_expanded() {
            return node.payoff();
        }
        let info_id = match node.info() {
            Some(info) => info,
            None => unreachable!("expanded history without an infoset: {:?}", node),
        };
        let info = self.tree.info(info_id);
        info.mark_visited();
        let player = node.player;
        let (indices, strategy) = {
            let policy = info.policy.read();
            let indices: Vec<usize> = node.children().iter()
                .map(|(a, _)| match policy.index_of(a) {
                    Some(i) => i,
                    None => panic!("{:?} missing from {:?}", a, policy),
                })
                .collect();
            (indices, policy.exploit_policy())
        };

        let mut outcomes = Vec::with_capacity(indices.len());
        let mut ev = 0.0;
        for ((_, child), idx) in node.children().iter().zip(indices) {
            let p = strategy[idx];
            if p <= 0.0 && player != optimizing { continue; }
            let v = self.make_utilities(*child, optimizing, reach.with(player, p), visited);
            outcomes.push((idx, v));
            ev += p * v;
        }
        if player.is_decision() {
            info.policy.write().accumulate(&outcomes, reach.counterfactual(player));
        }
        node.set_value(ev);
        visited.push(info_id);
        ev
    }

    // ---------- Growth pass --------- //
    /// Walk from a sampled boundary history to the frontier and grow it. True if a node was expanded
    pub fn expansion_step(&self, role: Player) -> bool {
        let boundary = &self.subgame.boundary[self.subgame.sample_boundary()];
        let mut here = boundary.sample_member();
        loop {
            let node = self.tree.history(here);
            match node.status() {
                Status::Expanded => {
                    let info = match node.info() {
                        Some(info) => self.tree.info(info),
                        None => unreachable!("expanded history without an infoset: {:?}", node),
                    };
                    let action = {
                        let policy = info.policy.read();
                        let action = if node.player == role { policy.explore() } else { policy.exploit() };
                        policy.add_expansion(&action);
                        action
                    };
                    here = match node.child(&action) {
                        Some(child) => child,
                        None => unreachable!("{:?} has no child for {:?}", node, action),
                    };
                }
                Status::Visited => return self.tree.expand(here, self.prior),
                Status::New | Status::Terminal => return false,
            }
        }
    }
}
