use rand::prelude::IndexedRandom;
use crate::error::SolveError;
use crate::obscuro::Obscuro;
use crate::utils::{Game, Player, Reward, SolverConfig};

/// Play one game between two fresh solvers (chance is uniform). Returns the P1 payoff
pub fn self_play<G: Game>(config: SolverConfig) -> Result<Reward, SolveError> {
    let mut game = G::new();
    let mut solvers: [Obscuro<G>; 2] = [Obscuro::new(config.clone()), Obscuro::new(config)];
    let mut traces: [Vec<G::Observation>; 2] = [vec![], vec![]];

    while !game.is_over() {
        traces[0].push(game.observation(Player::P1));
        traces[1].push(game.observation(Player::P2));
        let player = game.active_player();
        let action = match player {
            Player::P1 => solvers[0].make_move(&traces[0], player)?,
            Player::P2 => solvers[1].make_move(&traces[1], player)?,
            _ => random_action(&game),
        };
        log::info!("{:?} plays {:?}", player, action);
        game = game.play(&action);
    }
    log::info!("Evaluation: {}", game.evaluate());
    Ok(game.evaluate())
}

/// Pit a solver playing `seat` against an opponent choosing uniformly at random. Returns the solver's payoff
pub fn versus_random<G: Game>(config: SolverConfig, seat: Player) -> Result<Reward, SolveError> {
    if !seat.is_decision() {
        return Err(SolveError::NotAPlayer(seat));
    }
    let mut game = G::new();
    let mut solver: Obscuro<G> = Obscuro::new(config);
    let mut trace: Vec<G::Observation> = vec![];

    while !game.is_over() {
        trace.push(game.observation(seat));
        let player = game.active_player();
        let action = if player == seat {
            solver.make_move(&trace, player)?
        } else {
            random_action(&game)
        };
        log::debug!("{:?} plays {:?}", player, action);
        game = game.play(&action);
    }
    Ok(game.payoff(seat))
}

fn random_action<G: Game>(game: &G) -> G::Action {
    let actions = game.available_actions();
    match actions.choose(&mut rand::rng()) {
        Some(action) => action.clone(),  // TODO: support non-uniform chance actions
        None => unreachable!("live position without actions: {:?}", game),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::rps::{RepeatedRps, Rps};
    use std::time::Duration;

    fn quick() -> SolverConfig {
        SolverConfig::default().with_solve_time(Duration::from_millis(50))
    }

    #[test]
    fn self_play_finishes() {
        let payoff = self_play::<Rps>(quick()).unwrap();
        assert!([-1.0, 0.0, 1.0].contains(&payoff));
    }

    #[test]
    fn repeated_game_finishes() {
        let payoff = self_play::<RepeatedRps>(quick()).unwrap();
        assert!((-2.0..=2.0).contains(&payoff));
    }

    #[test]
    fn versus_random_from_either_seat() {
        for seat in [Player::P1, Player::P2] {
            let payoff = versus_random::<RepeatedRps>(quick(), seat).unwrap();
            assert!((-2.0..=2.0).contains(&payoff));
        }
        assert_eq!(versus_random::<Rps>(quick(), Player::Chance), Err(SolveError::NotAPlayer(Player::Chance)));
    }
}
