//! # Rock-Paper-Scissors
//!
//! Reference game. Players alternate moves but P2 does not see P1's choice until the round
//! is over, which makes the sequential game equivalent to the simultaneous one.
//! `Rps<ROUNDS>` repeats it with every finished round revealed to both players.

use crate::utils::*;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RpsAction { Rock, Paper, Scissors }

impl RpsAction {
    pub const ALL: [RpsAction; 3] = [RpsAction::Rock, RpsAction::Paper, RpsAction::Scissors];

    /// +1 if self wins, -1 if it loses, 0 on a tie
    pub fn against(self, other: RpsAction) -> Reward {
        use RpsAction::*;
        match (self, other) {
            (Rock, Scissors) | (Scissors, Paper) | (Paper, Rock) => 1.0,
            (a, b) if a == b => 0.0,
            _ => -1.0,
        }
    }
}

/// What one player has just learned: nothing, their own move, or the finished round (p1, p2)
#[derive(Clone, Eq, PartialEq, Hash, Default, Debug)]
pub struct RpsObservation(pub Vec<RpsAction>);

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Rps<const ROUNDS: usize = 1> {
    moves: Vec<RpsAction>,
}

/// Best of two rounds
pub type RepeatedRps = Rps<2>;

impl<const ROUNDS: usize> Rps<ROUNDS> {
    pub fn moves(&self) -> &[RpsAction] { &self.moves }
    fn last_round(&self) -> Option<&[RpsAction]> {
        let n = self.moves.len();
        if n == 0 || n % 2 == 1 { return None; }
        Some(&self.moves[n - 2..])
    }
}

impl<const ROUNDS: usize> Game for Rps<ROUNDS> {
    type State = Self;
    type Action = RpsAction;
    type Observation = RpsObservation;

    fn new() -> Self { Rps { moves: Vec::with_capacity(2 * ROUNDS) } }
    fn encode(&self) -> Self::State { self.clone() }
    fn decode(state: &Self::State) -> Self { state.clone() }

    fn active_player(&self) -> Player {
        if self.is_over() { return Player::Terminal; }
        if self.moves.len() % 2 == 0 { Player::P1 } else { Player::P2 }
    }

    fn available_actions(&self) -> Vec<Self::Action> {
        if self.is_over() { return vec![]; }
        RpsAction::ALL.to_vec()
    }

    fn observation(&self, player: Player) -> Self::Observation {
        if let Some(round) = self.last_round() {
            return RpsObservation(round.to_vec());
        }
        match (player, self.moves.last()) {
            (Player::P1, Some(mine)) => RpsObservation(vec![*mine]),
            _ => RpsObservation::default(),
        }
    }

    fn play(&self, action: &Self::Action) -> Self {
        assert!(!self.is_over(), "playing {:?} after the game ended", action);
        let mut next = self.clone();
        next.moves.push(*action);
        next
    }

    fn is_over(&self) -> bool { self.moves.len() >= 2 * ROUNDS }

    /// Rounds won minus rounds lost by P1 (so far, before the end)
    fn evaluate(&self) -> Reward {
        self.moves.chunks_exact(2).map(|r| r[0].against(r[1])).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RpsAction::*;

    fn terminals<G: Game>() -> Vec<G> {
        let mut out = vec![];
        let mut stack = vec![G::new()];
        while let Some(g) = stack.pop() {
            if g.is_over() { out.push(g); continue; }
            for a in g.available_actions() { stack.push(g.play(&a)); }
        }
        out
    }

    #[test]
    fn payoffs_are_zero_sum() {
        let leaves = terminals::<Rps<1>>();
        assert_eq!(leaves.len(), 9);
        for g in leaves.iter() {
            assert_eq!(g.payoff(Player::P1), -g.payoff(Player::P2));
        }
        assert_eq!(leaves.iter().map(|g| g.evaluate()).sum::<Reward>(), 0.0);
        assert_eq!(terminals::<RepeatedRps>().len(), 81);
    }

    #[test]
    fn winners() {
        let g = Rps::<1>::new();
        assert_eq!(g.play(&Rock).play(&Scissors).evaluate(), 1.0);
        assert_eq!(g.play(&Rock).play(&Paper).evaluate(), -1.0);
        assert_eq!(g.play(&Paper).play(&Paper).evaluate(), 0.0);
        assert_eq!(g.play(&Rock).play(&Paper).active_player(), Player::Terminal);
    }

    #[test]
    fn p2_does_not_see_p1_move() {
        let g = RepeatedRps::new().play(&Rock);
        assert_eq!(g.observation(Player::P2), RpsObservation::default());
        assert_eq!(g.observation(Player::P1), RpsObservation(vec![Rock]));
        let g = g.play(&Paper);
        assert_eq!(g.observation(Player::P2), RpsObservation(vec![Rock, Paper]));
        assert_eq!(g.observation(Player::P1), g.observation(Player::P2));
        assert_eq!(g.active_player(), Player::P1);
        assert!(!g.is_over());
    }

    #[test]
    fn possible_positions_follow_observations() {
        let none = RpsObservation::default();
        let first = Rps::<1>::possible_positions(Player::P2, &[none.clone(), none.clone()]);
        assert_eq!(first, vec![vec![Rock], vec![Paper], vec![Scissors]]);

        let seen = RpsObservation(vec![Rock, Paper]);
        let second = RepeatedRps::possible_positions(Player::P2, &[none.clone(), none.clone(), seen, none.clone()]);
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|p| p[..2] == [Rock, Paper]));

        assert!(Rps::<1>::possible_positions(Player::P2, &[none.clone(), RpsObservation(vec![Rock])]).is_empty());
    }
}
