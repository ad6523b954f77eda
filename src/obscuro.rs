use std::time::Instant;
use crate::error::SolveError;
use crate::gt_cfr::{GtCfr, SolveStats};
use crate::policy::Policy;
use crate::subgame::Subgame;
use crate::tree::GameTree;
use crate::utils::*;

/// The solving engine of the project. Combines CFR, AlphaZero tree growth, & safe resolving
pub struct Obscuro<G: Game, E: Evaluator<G> = Heuristic> {
    config: SolverConfig,
    /// v*: value of the last solve, seeds the alternatives of synthesized boundary sets
    pub expectation: Reward,
    tree: GameTree<G>,
    positions: Vec<Vec<G::Action>>,
    subgame: Option<Subgame<G>>,
    /// Whose observations the tree was last grown for
    resolving: Option<(Player, Vec<G::Observation>)>,
    evaluator: E,
}

impl<G: Game> Obscuro<G> {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_evaluator(config, Heuristic)
    }
}

impl<G: Game> Default for Obscuro<G> {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl<G: Game, E: Evaluator<G>> Obscuro<G, E> {
    pub fn with_evaluator(config: SolverConfig, evaluator: E) -> Self {
        let tree = GameTree::new(&evaluator, config.exploration);
        Obscuro { config, expectation: 0.0, tree, positions: vec![], subgame: None, resolving: None, evaluator }
    }

    /// Develop a strategy and then return the action you have decided
    pub fn make_move(&mut self, observations: &[G::Observation], player: Player) -> Result<G::Action, SolveError> {
        self.study_position(observations, player)?;
        let subgame = match self.subgame.as_ref() {
            Some(subgame) => subgame,
            None => unreachable!("studied without building a subgame"),
        };
        let p_max = subgame.p_max();
        let info = self.tree.info(subgame.current);
        let mut policy = info.policy.write();
        let action = if p_max > 0.0 {
            policy.purify(self.config.max_support)  // max-margin
        } else {
            policy.exploit()  // plain resolve
        };
        log::debug!("{:?} plays {:?} (p_max={:.3}) from {:?}", player, action, p_max, *policy);
        Ok(action)
    }

    /// Given what `player` has observed, update your understanding of the game state & strategy
    pub fn study_position(&mut self, observations: &[G::Observation], player: Player) -> Result<SolveStats, SolveError> {
        let start = Instant::now();
        let subgame = self.construct_subgame(observations, player)?;
        let stats = GtCfr::new(&self.tree, &subgame, &self.evaluator, &self.config)
            .run(start + self.config.solve_time);
        self.expectation = self.tree.info(subgame.current).expectation();

        if stats.rounds == 0 {
            log::warn!("solve for {:?} finished without a regret round, playing the prior", player);
        }
        log::info!("solved {:?} at depth {}: {} histories, {} infosets, {} rounds, {} expansions, v*={:.3}",
                   player, observations.len(), self.tree.len(), self.tree.info_count(),
                   stats.rounds, stats.expansions, self.expectation);
        self.subgame = Some(subgame);
        Ok(stats)
    }

    /// Find (or grow) the infoset for the observations and wrap it in a resolving gadget.
    /// A new public state starts from a fresh tree; studying the same one again keeps growing it
    pub fn construct_subgame(&mut self, observations: &[G::Observation], player: Player) -> Result<Subgame<G>, SolveError> {
        if !player.is_decision() {
            return Err(SolveError::NotAPlayer(player));
        }
        let key = (player, observations.to_vec());
        if self.resolving.as_ref() != Some(&key) {
            if self.resolving.is_some() {
                log::debug!("rebuilding the tree for {:?} at depth {}", player, observations.len());
                self.tree = GameTree::new(&self.evaluator, self.config.exploration);
                self.subgame = None;
            }
            self.resolving = Some(key);
        }
        let current = match self.tree.find_info(player, observations) {
            Some(info) => info,
            None => self.tree.grow_towards(player, observations, &self.evaluator)
                .ok_or(SolveError::NoConsistentInfoSet { player, depth: observations.len() })?,
        };
        self.filter_positions(observations, player);
        Ok(Subgame::construct(&self.tree, current, &self.positions, self.expectation, &self.config, &self.evaluator))
    }

    /// Keep the candidate positions that agree with the observations, re-enumerating once none do
    fn filter_positions(&mut self, observations: &[G::Observation], player: Player) {
        self.positions.retain(|path| Self::consistent(path, observations, player));
        if self.positions.is_empty() {
            self.positions = G::possible_positions(player, observations)
                .into_iter()
                .filter(|path| Self::consistent(path, observations, player))
                .collect();
        }
    }

    fn consistent(path: &[G::Action], observations: &[G::Observation], player: Player) -> bool {
        if path.len() + 1 != observations.len() { return false; }
        let mut game = G::new();
        for (a, obs) in path.iter().zip(observations) {
            if game.is_over() || game.observation(player) != *obs { return false; }
            game = game.play(a);
        }
        game.active_player() == player && game.observation(player) == observations[path.len()]
    }

    // ---------- Inspection --------- //
    pub fn inst_policy(&self, observations: &[G::Observation], player: Player) -> Option<Policy<G::Action>> {
        let info = self.tree.find_info(player, observations)?;
        let policy = self.tree.info(info).policy.read().clone();
        Some(policy)
    }
    pub fn exploit_policy(&self, observations: &[G::Observation], player: Player) -> Option<Strategy> {
        let info = self.tree.find_info(player, observations)?;
        Some(self.tree.info(info).exploit_policy())
    }
    pub fn tree(&self) -> &GameTree<G> { &self.tree }
    pub fn subgame(&self) -> Option<&Subgame<G>> { self.subgame.as_ref() }
    pub fn config(&self) -> &SolverConfig { &self.config }

    /// Forget everything learned (start of a new game)
    pub fn reset(&mut self) {
        self.tree = GameTree::new(&self.evaluator, self.config.exploration);
        self.positions.clear();
        self.subgame = None;
        self.resolving = None;
        self.expectation = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::deal::Deal;
    use crate::games::rps::{RepeatedRps, Rps, RpsAction, RpsObservation};
    use std::time::Duration;

    fn none() -> RpsObservation { RpsObservation::default() }

    fn quick() -> SolverConfig {
        SolverConfig::default().with_solve_time(Duration::from_millis(100))
    }

    #[test]
    fn first_move_is_legal() {
        let mut solver: Obscuro<Rps> = Obscuro::new(quick());
        let action = solver.make_move(&[none()], Player::P1).unwrap();
        assert!(RpsAction::ALL.contains(&action));
        assert!(solver.subgame().is_some());
    }

    #[test]
    fn solving_rps_is_uniform() {
        let mut solver: Obscuro<Rps> = Obscuro::new(quick());
        solver.study_position(&[none()], Player::P1).unwrap();
        let root = solver.tree().find_info(Player::P1, &[none()]).unwrap();
        solver.tree().info(root).policy.write().set_regrets(&[0.1, 0.7, 0.2]);

        let mut solver = Obscuro { config: solver.config.clone().with_solve_time(Duration::from_secs(1)), ..solver };
        let stats = solver.study_position(&[none()], Player::P1).unwrap();
        assert!(stats.rounds > 0);
        let policy = solver.exploit_policy(&[none()], Player::P1).unwrap();
        for p in policy {
            assert!((p - 1.0 / 3.0).abs() < 0.05, "{:?}", solver.inst_policy(&[none()], Player::P1));
        }
    }

    #[test]
    fn p2_moves_after_hidden_p1_move() {
        let mut solver: Obscuro<Rps> = Obscuro::new(quick());
        let action = solver.make_move(&[none(), none()], Player::P2).unwrap();
        assert!(RpsAction::ALL.contains(&action));
        let subgame = solver.subgame().unwrap();
        assert_eq!(subgame.player, Player::P2);
        assert_eq!(subgame.len(), 3);
    }

    #[test]
    fn inconsistent_observations_fail() {
        let mut solver: Obscuro<Rps> = Obscuro::new(quick());
        let seen_rock = RpsObservation(vec![RpsAction::Rock]);
        assert_eq!(
            solver.make_move(&[none(), seen_rock], Player::P2),
            Err(SolveError::NoConsistentInfoSet { player: Player::P2, depth: 2 })
        );
        assert_eq!(
            solver.make_move(&[none(), none(), none()], Player::P1),
            Err(SolveError::NoConsistentInfoSet { player: Player::P1, depth: 3 })
        );
        assert_eq!(solver.make_move(&[none()], Player::Chance), Err(SolveError::NotAPlayer(Player::Chance)));
    }

    #[test]
    fn construct_subgame_is_idempotent() {
        let mut solver: Obscuro<Rps> = Obscuro::new(quick());
        let a = solver.construct_subgame(&[none(), none()], Player::P2).unwrap();
        let b = solver.construct_subgame(&[none(), none()], Player::P2).unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.current, b.current);
    }

    #[test]
    fn tree_is_rebuilt_for_a_new_public_state() {
        let mut solver: Obscuro<RepeatedRps> = Obscuro::new(quick());
        solver.make_move(&[none()], Player::P1).unwrap();
        let first = solver.inst_policy(&[none()], Player::P1).unwrap().num_updates();
        assert!(first > 1);
        solver.study_position(&[none()], Player::P1).unwrap();
        assert!(solver.inst_policy(&[none()], Player::P1).unwrap().num_updates() > first);

        let later = [none(), RpsObservation(vec![RpsAction::Rock]), RpsObservation(vec![RpsAction::Rock, RpsAction::Paper])];
        solver.make_move(&later, Player::P1).unwrap();
        // the opening was regrown from scratch and sits above the new subgame
        assert_eq!(solver.inst_policy(&[none()], Player::P1).unwrap().num_updates(), 1);
        let tree = solver.tree();
        let current = solver.subgame().unwrap().current;
        for id in tree.info(current).members() {
            assert!(tree.is_ancestor_of(tree.root(), id));
        }

        solver.reset();
        assert_eq!(solver.tree().len(), 1);
        assert!(solver.subgame().is_none());
    }

    #[test]
    fn chance_deals_are_solved_through() {
        let mut solver: Obscuro<Deal> = Obscuro::new(quick());
        let stake = solver.make_move(&[(None, None)], Player::P1).unwrap();
        assert!(stake <= 1);
        let seen = [(None, None), (Some(stake), None), (Some(stake), None), (Some(stake), Some(2))];
        let call = solver.make_move(&seen, Player::P1).unwrap();
        assert!(call <= 1);
        assert_eq!(solver.tree().info(solver.subgame().unwrap().current).len(), 2);
    }
}
