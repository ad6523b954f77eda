//! Two-stage deal used by the solver tests. P1 picks a stake, chance deals P2 one of three cards,
//! chance deals P1 one of the two left, then P1 decides to show down or fold.
//! Only the second deal depends on the first, so P1 sees identical chance nodes offering different cards.

use crate::utils::*;

/// (stake, own card) as far as they are known to the viewer
pub type DealObservation = (Option<u8>, Option<u8>);

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Deal {
    moves: Vec<u8>,
}

impl Deal {
    const CARDS: [u8; 3] = [0, 1, 2];
}

impl Game for Deal {
    type State = Self;
    type Action = u8;
    type Observation = DealObservation;

    fn new() -> Self { Deal { moves: vec![] } }
    fn encode(&self) -> Self::State { self.clone() }
    fn decode(state: &Self::State) -> Self { state.clone() }

    fn active_player(&self) -> Player {
        match self.moves.len() {
            0 | 3 => Player::P1,
            1 | 2 => Player::Chance,
            _ => Player::Terminal,
        }
    }

    fn available_actions(&self) -> Vec<u8> {
        match self.moves.len() {
            0 | 3 => vec![0, 1],
            1 => Self::CARDS.to_vec(),
            2 => Self::CARDS.iter().copied().filter(|c| *c != self.moves[1]).collect(),
            _ => vec![],
        }
    }

    fn observation(&self, player: Player) -> DealObservation {
        let stake = self.moves.first().copied();
        match player {
            Player::P1 => (stake, self.moves.get(2).copied()),
            _ => (stake, self.moves.get(1).copied()),
        }
    }

    fn play(&self, action: &u8) -> Self {
        let mut next = self.clone();
        next.moves.push(*action);
        next
    }

    fn is_over(&self) -> bool { self.moves.len() >= 4 }

    /// Showdown for (stake + 1), folding loses 1
    fn evaluate(&self) -> Reward {
        if !self.is_over() { return 0.0; }
        if self.moves[3] == 1 { return -1.0; }
        let stake = self.moves[0] as Reward + 1.0;
        if self.moves[2] > self.moves[1] { stake } else { -stake }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_deal_skips_the_first_card() {
        let g = Deal::new().play(&1).play(&2);
        assert_eq!(g.available_actions(), vec![0, 1]);
        assert_eq!(g.observation(Player::P1), (Some(1), None));
        assert_eq!(g.observation(Player::P2), (Some(1), Some(2)));
        let g = g.play(&0).play(&0);
        assert!(g.is_over());
        assert_eq!(g.evaluate(), -2.0);
        assert_eq!(g.payoff(Player::P2), 2.0);
    }
}
