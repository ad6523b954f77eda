use std::time::Duration;
use rand::seq::IndexedRandom;
use obscuro::error::SolveError;
use obscuro::games::rps::RepeatedRps;
use obscuro::obscuro::Obscuro;
use obscuro::self_play::versus_random;
use obscuro::utils::{Game, Player, Reward, SolverConfig};

/// Human (on stdin) against the bot
fn game_loop<G: Game>(human: Player, config: SolverConfig) -> Result<Reward, SolveError> {
    let computer = human.opponent();
    let mut game = G::new();
    let mut solver: Obscuro<G> = Obscuro::new(config);
    let mut trace = vec![];
    while !game.is_over() {
        trace.push(game.observation(computer));
        let actions = game.available_actions();
        match game.active_player() {
            Player::Chance => {
                if let Some(action) = actions.choose(&mut rand::rng()) {
                    game = game.play(action);
                }
            }
            p if p == human => {
                println!("You see: {:?}, Available actions: {:?}", game.observation(p), actions);
                let mut input = String::new();
                if std::io::stdin().read_line(&mut input).is_err() { break; }
                if let Some(action) = input.trim().parse::<usize>().ok().and_then(|i| actions.get(i)) {
                    println!("Human plays: {:?}", action);
                    game = game.play(action);
                } else {
                    trace.pop();  // same position again
                }
            }
            _ => {
                let action = solver.make_move(&trace, computer)?;
                println!("Computer plays: {:?}", action);
                game = game.play(&action);
            }
        }
    }
    println!("Evaluation: {}", game.evaluate());
    Ok(game.evaluate())
}

fn main() -> Result<(), SolveError> {
    env_logger::init();
    let config = SolverConfig::default().with_solve_time(Duration::from_millis(500));
    type T = RepeatedRps;

    if std::env::args().any(|a| a == "play") {
        game_loop::<T>(Player::P2, config)?;
        return Ok(());
    }

    let iters = 10;
    let mut reward = 0.0;
    for i in 0..iters {
        let seat = if i % 2 == 0 { Player::P1 } else { Player::P2 };
        reward += versus_random::<T>(config.clone(), seat)?;
    }
    println!("Average reward against random: {}", reward / iters as Reward);
    Ok(())
}
