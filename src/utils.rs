use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

// ---------- Tune-ables ---------- //
pub const SOLVE_TIME_SECS: f64 = 5.0;  // How long the bot is allowed to spend developing strat
pub const MIN_INFO_SIZE: usize = 200;  // How many root histories the resolver should be robust against
pub const MAX_SUPPORT: usize = 3;  // Number of top actions a purified strategy may mix between
pub const EXPANDERS: usize = 1;  // Tree growing workers running next to the regret worker
pub const EXPLORATION: Reward = 1.0;  // PUCT constant
pub const CLOSURE_DEPTH: usize = 1;  // Plies of opponent knowledge in the information closure

// ---------- Basic types (renamed for pretty) ---------- //
pub type Reward = f64;
pub type Counterfactual = Reward;  // Syntactically different but Semantically same as Reward
pub type Probability = f64;
pub type Strategy = Vec<Probability>;  // Indexed by available actions

/// We only look at two player games (for provable convergence)
/// at all points a player is active, the game will do something random, or it is over
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Player { P1, P2, Chance, Terminal }

impl Player {
    /// The other real player. Chance and Terminal have no opponent and map to themselves
    #[inline] pub fn opponent(self) -> Player {
        match self { Player::P1 => Player::P2, Player::P2 => Player::P1, _ => self }
    }
    /// Sign of the player's objective (+ maximizes P1 payoff, - minimizes it)
    #[inline] pub fn multiplier(self) -> Reward {
        match self { Player::P1 => 1.0, Player::P2 => -1.0, _ => 0.0 }
    }
    pub fn is_decision(self) -> bool {
        matches!(self, Player::P1 | Player::P2)
    }
    fn slot(self) -> usize {
        match self {
            Player::P1 => 0,
            Player::P2 => 1,
            Player::Chance => 2,
            Player::Terminal => panic!("Terminal has no reach probability"),
        }
    }
}

// ---------- Reach probabilities ---------- //
/// π: the contribution of each player (and chance) to arriving somewhere
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reach([Probability; 3]);

impl Default for Reach {
    fn default() -> Self { Reach([1.0; 3]) }
}

impl Reach {
    pub fn zero() -> Self { Reach([0.0; 3]) }
    pub fn get(&self, player: Player) -> Probability { self.0[player.slot()] }
    pub fn set(&mut self, player: Player, p: Probability) { self.0[player.slot()] = p; }
    /// Reach after `player` takes an action it plays with probability `p`
    pub fn with(mut self, player: Player, p: Probability) -> Self {
        self.0[player.slot()] *= p;
        self
    }
    /// Probability of arriving here if `player` always steered towards it
    pub fn counterfactual(&self, player: Player) -> Probability {
        let me = player.slot();
        self.0.iter().enumerate().filter(|(i, _)| *i != me).map(|(_, p)| p).product()
    }
    /// How likely is the game to end in this position (product of all players choices)
    pub fn net(&self) -> Probability { self.0.iter().product() }
    pub fn add(&mut self, other: &Reach) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
    pub fn approx_eq(&self, other: &Reach, tolerance: Probability) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

// ---------- Configuration ---------- //
/// Knobs fixed when a solver is built (defaults come from the tune-ables above)
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub solve_time: Duration,
    pub min_info_size: usize,
    pub max_support: usize,
    pub expanders: usize,
    pub exploration: Reward,
    pub closure_depth: usize,
    pub gifts: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solve_time: Duration::from_secs_f64(SOLVE_TIME_SECS),
            min_info_size: MIN_INFO_SIZE,
            max_support: MAX_SUPPORT,
            expanders: EXPANDERS,
            exploration: EXPLORATION,
            closure_depth: CLOSURE_DEPTH,
            gifts: true,
        }
    }
}

impl SolverConfig {
    pub fn with_solve_time(mut self, solve_time: Duration) -> Self { self.solve_time = solve_time; self }
    pub fn with_min_info_size(mut self, n: usize) -> Self { self.min_info_size = n; self }
    pub fn with_max_support(mut self, n: usize) -> Self { self.max_support = n.max(1); self }
    pub fn with_expanders(mut self, n: usize) -> Self { self.expanders = n; self }
    pub fn with_exploration(mut self, c: Reward) -> Self { self.exploration = c; self }
    pub fn with_closure_depth(mut self, k: usize) -> Self { self.closure_depth = k.max(1); self }
    pub fn with_gifts(mut self, gifts: bool) -> Self { self.gifts = gifts; self }
}

// ---------- Sampling ---------- //
/// Draw an index proportional to `probs`. A distribution with no positive mass is sampled uniformly
pub fn sample_index<R: Rng + ?Sized>(probs: &[Probability], rng: &mut R) -> usize {
    assert!(!probs.is_empty(), "cannot sample from an empty action set");
    let weights: Vec<Probability> = probs.iter()
        .map(|p| if p.is_finite() && *p > 0.0 { *p } else { 0.0 })
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.random_range(0..probs.len()),
    }
}

// ---------- Traits the game must provide ----------
/// Properties we want all game actions to have
pub trait ActionI: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T: Clone + Eq + Hash + Debug + Send + Sync> ActionI for T {}
/// Properties we want all observations to have (two states look the same iff observations are equal)
pub trait ObservationI: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T: Clone + Eq + Hash + Debug + Send + Sync> ObservationI for T {}

/// Optional prior over positions (a value network or any cheap estimator)
pub trait Evaluator<G: Game>: Send + Sync {
    fn score_position(&self, game: &G, player: Player) -> Reward;
    /// Empty means no opinion
    fn guess_strategy(&self, game: &G, player: Player) -> Strategy;
    fn eval(&self, game: &G, player: Player) -> (Reward, Strategy) {
        (self.score_position(game, player), self.guess_strategy(game, player))
    }
}

/// Default evaluator for games without a trained model: the game's own static eval
#[derive(Debug, Default, Clone, Copy)]
pub struct Heuristic;

impl<G: Game> Evaluator<G> for Heuristic {
    fn score_position(&self, game: &G, _player: Player) -> Reward {
        game.evaluate()
    }

    fn guess_strategy(&self, _game: &G, _player: Player) -> Strategy {
        vec![]  // rely on CFR
    }
}

pub trait Game: Sized + Clone + Debug + Send + Sync {
    /// Optional compressed representation of game state for recovery
    type State: Clone + Debug + Send + Sync;
    /// The actions that could possibly be taken
    type Action: ActionI;
    /// What a single player gets to see of one state
    type Observation: ObservationI;

    /// Requires a constructor
    fn new() -> Self;

    // Encode/decode world state
    /// Convert between full game and compressed state
    fn encode(&self) -> Self::State;
    /// Convert between compressed state and full game
    fn decode(state: &Self::State) -> Self;

    /// The player whose turn it is (Chance for random events, Terminal once over)
    fn active_player(&self) -> Player;
    /// What actions the active_player can take
    fn available_actions(&self) -> Vec<Self::Action>;
    /// What `player` sees in this position
    fn observation(&self, player: Player) -> Self::Observation;
    /// Create a new copy of the game after this specified action is taken
    fn play(&self, action: &Self::Action) -> Self;
    /// Check if the game is over
    fn is_over(&self) -> bool;
    /// Heuristic Evaluation of the current position (+ good for P1, - for P2). Must be exact at terminal
    fn evaluate(&self) -> Reward;

    /// Zero-sum payoff from the point of view of `player`
    fn payoff(&self, player: Player) -> Reward {
        self.evaluate() * player.multiplier()
    }

    /// Given what a player has seen, which action paths (from `new`) could have produced it.
    /// Enumerates the whole game; override with a sampler for anything big
    fn possible_positions(player: Player, observations: &[Self::Observation]) -> Vec<Vec<Self::Action>> {
        let mut found = vec![];
        if observations.is_empty() { return found; }
        let mut stack = vec![(Self::new(), Vec::new())];
        while let Some((game, path)) = stack.pop() {
            let depth = path.len();
            if game.observation(player) != observations[depth] { continue; }
            if depth + 1 == observations.len() {
                found.push(path);
                continue;
            }
            if game.is_over() { continue; }
            for a in game.available_actions().into_iter().rev() {
                let mut next_path = path.clone();
                next_path.push(a.clone());
                stack.push((game.play(&a), next_path));
            }
        }
        found
    }
}
