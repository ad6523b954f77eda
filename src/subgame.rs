use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::Ordering;
use atomic_float::AtomicF64;
use parking_lot::RwLock;
use crate::history::{HistoryId, InfoId};
use crate::info::Info;
use crate::policy::Policy;
use crate::tree::GameTree;
use crate::utils::*;

/// The opponent's choice at a boundary set: play into the subgame or take the alternative value
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResolveAction { Skip, Enter }

/// Pseudo-chance set over histories the opponent cannot tell apart
pub type BeliefInfo<G> = Info<HistoryId, <G as Game>::Observation>;

// ---------- Boundary ----------
/// One J in J0 with its ENTER/SKIP resolver
pub struct Boundary<G: Game> {
    pub info: BeliefInfo<G>,
    pub resolver: RwLock<Policy<ResolveAction>>,
    /// Value the opponent is offered for skipping
    pub alt: Reward,
    pub prior: Probability,
    /// Built from a held-out candidate position rather than the closure
    pub synthetic: bool,
    live: AtomicF64,
}

impl<G: Game> Boundary<G> {
    fn new(info: BeliefInfo<G>, opponent: Player, alt: Reward, prior: Probability, synthetic: bool) -> Self {
        let live = info.expectation();
        let resolver = Policy::from_rewards(vec![(ResolveAction::Skip, alt), (ResolveAction::Enter, 0.0)], opponent);
        Boundary { info, resolver: RwLock::new(resolver), alt, prior, synthetic, live: AtomicF64::new(live) }
    }

    pub fn members(&self) -> Vec<HistoryId> { self.info.members() }
    /// Belief over the members (proportional to how likely the rest of the world was to reach them)
    pub fn beliefs(&self) -> Strategy { self.info.exploit_policy() }
    pub fn sample_member(&self) -> HistoryId { self.info.policy.read().exploit() }
    pub fn p_enter(&self) -> Probability {
        self.resolver.read().p_exploit(&ResolveAction::Enter)
    }
    /// Value of entering under the strategies of the most recent regret pass
    pub fn live(&self) -> Reward { self.live.load(Ordering::Relaxed) }
    pub(crate) fn set_live(&self, v: Reward) { self.live.store(v, Ordering::Relaxed); }

    /// Let the opponent compare the live value against its alternative
    pub(crate) fn resolve(&self) {
        let mut resolver = self.resolver.write();
        resolver.add_counterfactual(&ResolveAction::Enter, self.live(), 1.0);
        resolver.add_counterfactual(&ResolveAction::Skip, self.alt, 1.0);
        resolver.update();
    }
}

impl<G: Game> Debug for Boundary<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "J({:?}, prior={:.3}, alt={:.3}, live={:.3}, enter={:.3}{})",
               self.info.observations, self.prior, self.alt, self.live(), self.p_enter(),
               if self.synthetic { ", synthetic" } else { "" })
    }
}

// ---------- Subgame ----------
/// Resolving gadget for one infoset: a root choosing among the boundary sets J0
pub struct Subgame<G: Game> {
    pub player: Player,
    pub current: InfoId,
    pub boundary: Vec<Boundary<G>>,
    root: RwLock<Policy<usize>>,
}

impl<G: Game> Subgame<G> {
    /// Build J0 around `current`: the information closure of its members, topped up with
    /// held-out candidate positions until it is at least `min(min_info_size, |candidates|)` histories
    pub fn construct<E: Evaluator<G>>(tree: &GameTree<G>, current: InfoId, candidates: &[Vec<G::Action>], expectation: Reward, config: &SolverConfig, prior: &E) -> Self {
        let player = tree.info(current).player;
        debug_assert!(player.is_decision());
        let opponent = player.opponent();

        let closure = Self::closure(tree, &tree.info(current).members(), player, config.closure_depth);
        let mut sets = vec![];
        for (trace, members) in Self::group(tree, closure, opponent) {
            let set = Self::belief_set(tree, members, trace, player, current);
            let expectation = set.expectation();
            let alt = if config.gifts {
                expectation - player.multiplier() * tree.gift(&set.members(), expectation, player)
            } else {
                expectation
            };
            sets.push((set, alt, false));
        }

        // Synthesize singleton sets from candidate positions the tree has not reached
        let mut size: usize = sets.iter().map(|(s, _, _)| s.len()).sum();
        let target = config.min_info_size.min(candidates.len());
        let mut known: HashSet<HistoryId> = sets.iter().flat_map(|(s, _, _)| s.members()).collect();
        for path in candidates {
            if size >= target { break; }
            let h = tree.graft(path, prior);
            if !known.insert(h) { continue; }
            let node = tree.history(h);
            let eval = GameTree::estimate(&node.game(), prior);
            let alt = match player {
                Player::P1 => expectation.min(eval),
                _ => expectation.max(eval),
            };
            let set = Self::belief_set(tree, vec![h], node.trace(opponent).to_vec(), player, current);
            sets.push((set, alt, true));
            size += 1;
        }

        let reaches: Vec<Probability> = sets.iter().map(|(s, _, _)| s.reach_prob(opponent)).collect();
        let priors = Self::priors(&reaches);
        let boundary: Vec<Boundary<G>> = sets.into_iter()
            .zip(priors.iter())
            .map(|((set, alt, synthetic), p)| Boundary::new(set, opponent, alt, *p, synthetic))
            .collect();
        let root = Policy::from_actions((0..boundary.len()).collect(), player).with_prior(&priors);

        log::debug!("subgame for {:?}: {} boundary sets ({} synthesized), {} histories",
                    player, boundary.len(), boundary.iter().filter(|b| b.synthetic).count(), size);
        Subgame { player, current, boundary, root: RwLock::new(root) }
    }

    /// Histories the opponent may believe possible, `depth` plies of knowledge deep
    fn closure(tree: &GameTree<G>, members: &[HistoryId], player: Player, depth: usize) -> Vec<HistoryId> {
        let mut frontier = members.to_vec();
        let mut looking = player.opponent();
        for _ in 1..depth {
            let traces: HashSet<Vec<G::Observation>> = frontier.iter()
                .map(|h| tree.history(*h).trace(looking).to_vec())
                .collect();
            frontier = tree.histories_matching(looking, &traces);
            looking = looking.opponent();
        }
        frontier
    }

    /// Split histories by what `looking` has observed, keeping first-seen order
    fn group(tree: &GameTree<G>, histories: Vec<HistoryId>, looking: Player) -> Vec<(Vec<G::Observation>, Vec<HistoryId>)> {
        let mut slots: HashMap<Vec<G::Observation>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<G::Observation>, Vec<HistoryId>)> = vec![];
        for h in histories {
            let trace = tree.history(h).trace(looking).to_vec();
            match slots.get(&trace) {
                Some(&i) => groups[i].1.push(h),
                None => {
                    slots.insert(trace.clone(), groups.len());
                    groups.push((trace, vec![h]));
                }
            }
        }
        groups
    }

    fn belief_set(tree: &GameTree<G>, members: Vec<HistoryId>, trace: Vec<G::Observation>, player: Player, current: InfoId) -> BeliefInfo<G> {
        let nodes: Vec<_> = members.iter().map(|h| tree.history(*h)).collect();
        let weights: Strategy = nodes.iter().map(|n| n.reach().counterfactual(player)).collect();
        let values = members.iter().zip(nodes.iter()).map(|(h, n)| (*h, n.value())).collect();
        let belief = Policy::from_rewards(values, Player::Chance).with_prior(&weights);
        let set = Info::from_policy(belief, trace, Player::Chance).with_closure_parent(current);
        for (h, n) in members.iter().zip(nodes.iter()) {
            set.add_history(*h, n.reach());
        }
        set
    }

    /// 50/50 blend of the reach-weighted and the uniform prior, so no set starts at zero
    fn priors(reaches: &[Probability]) -> Vec<Probability> {
        let m = reaches.len() as Probability;
        let net: Probability = reaches.iter().sum();
        reaches.iter()
            .map(|r| {
                let weighted = if net > 0.0 { r / net } else { 1.0 / m };
                0.5 * (weighted + 1.0 / m)
            })
            .collect()
    }

    pub fn len(&self) -> usize { self.boundary.len() }
    pub fn is_empty(&self) -> bool { self.boundary.is_empty() }
    pub fn priors_of(&self) -> Vec<Probability> {
        self.boundary.iter().map(|b| b.prior).collect()
    }
    /// Current distribution of the gadget root over J0
    pub fn root_policy(&self) -> Strategy { self.root.read().exploit_policy() }
    pub fn sample_boundary(&self) -> usize { self.root.read().exploit() }
    /// Largest ENTER probability over all resolvers (zero: no one would ever play into the subgame)
    pub fn p_max(&self) -> Probability {
        self.boundary.iter().map(|b| b.p_enter()).fold(0.0, Probability::max)
    }

    /// Re-weight the gadget root: p_max·prior·p_enter + (1 − p_max)·p_maxmargin
    pub(crate) fn reweight(&self) -> Probability {
        let p_max = self.p_max();
        let mut root = self.root.write();
        let current = root.exploit_policy();
        let regrets: Vec<Counterfactual> = self.boundary.iter()
            .zip(current.iter())
            .map(|(b, p_mm)| p_max * b.prior * b.p_enter() + (1.0 - p_max) * p_mm)
            .collect();
        root.set_regrets(&regrets);
        p_max
    }

    /// Members and prior of every boundary set, in order
    pub fn signature(&self) -> Vec<(Vec<HistoryId>, Probability)> {
        self.boundary.iter().map(|b| (b.members(), b.prior)).collect()
    }
}

impl<G: Game> Debug for Subgame<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subgame({:?}, {:?}, {:?})", self.player, self.root.read(), self.boundary)
    }
}
