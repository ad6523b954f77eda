use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use crate::history::*;
use crate::info::Info;
use crate::policy::Policy;
use crate::utils::*;

/// Infoset over real game actions
pub type GameInfo<G> = Info<<G as Game>::Action, <G as Game>::Observation>;
type InfoKey<G> = (Player, Vec<<G as Game>::Observation>);

// ---------- Game Tree ----------
/// Arena owning every History and Info. Parent links, members, and children are all handles into it,
/// so workers share the tree through `&GameTree` and only lock what they touch
pub struct GameTree<G: Game> {
    histories: RwLock<Vec<Arc<History<G>>>>,
    infos: RwLock<Vec<Arc<GameInfo<G>>>>,
    index: Mutex<HashMap<InfoKey<G>, InfoId>>,
    grafts: Mutex<HashMap<Vec<G::Action>, HistoryId>>,
    exploration: Reward,
}

impl<G: Game> GameTree<G> {
    pub fn new<E: Evaluator<G>>(prior: &E, exploration: Reward) -> Self {
        let game = G::new();
        let payoff = Self::estimate(&game, prior);
        let root = History::new(&game, None, [&[], &[]], Reach::default(), payoff);
        GameTree {
            histories: RwLock::new(vec![Arc::new(root)]),
            infos: RwLock::new(vec![]),
            index: Mutex::new(HashMap::new()),
            grafts: Mutex::new(HashMap::new()),
            exploration,
        }
    }

    pub fn root(&self) -> HistoryId { HistoryId(0) }
    pub fn history(&self, id: HistoryId) -> Arc<History<G>> {
        self.histories.read()[id.0].clone()
    }
    pub fn info(&self, id: InfoId) -> Arc<GameInfo<G>> {
        self.infos.read()[id.0].clone()
    }
    /// Number of histories ever created
    pub fn len(&self) -> usize { self.histories.read().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn info_count(&self) -> usize { self.infos.read().len() }
    /// Snapshot of every infoset
    pub fn infos(&self) -> Vec<(InfoId, Arc<GameInfo<G>>)> {
        self.infos.read().iter().enumerate().map(|(i, info)| (InfoId(i), info.clone())).collect()
    }
    pub fn find_info(&self, player: Player, observations: &[G::Observation]) -> Option<InfoId> {
        self.index.lock().get(&(player, observations.to_vec())).copied()
    }

    /// Leaf value: exact when the game is over, the evaluator's opinion otherwise
    pub fn estimate<E: Evaluator<G>>(game: &G, prior: &E) -> Reward {
        if game.is_over() {
            game.evaluate()
        } else {
            prior.score_position(game, game.active_player())
        }
    }

    fn push_history(&self, h: History<G>) -> HistoryId {
        let mut histories = self.histories.write();
        histories.push(Arc::new(h));
        HistoryId(histories.len() - 1)
    }

    // ---------- Tree Growth --------- //
    /// Growing Tree: take a visited leaf and grow its children into new nodes.
    /// Children already grafted as candidate positions are adopted instead of duplicated.
    /// Returns false if the node is not visited or another worker already claimed it
    pub fn expand<E: Evaluator<G>>(&self, id: HistoryId, prior: &E) -> bool {
        let node = self.history(id);
        if !node.claim() { return false; }
        let game = node.game();
        let player = node.player;
        let actions = game.available_actions();
        assert!(!actions.is_empty(), "live position without actions: {:?}", game);
        let mut adopted = self.take_grafts(id, &actions);

        let reach = node.reach();
        let share = 1.0 / actions.len() as Probability;
        let mut kids = Vec::with_capacity(actions.len());
        let mut rewards = Vec::with_capacity(actions.len());
        for a in actions {
            let child = match adopted.remove(&a) {
                Some(h) => {
                    let grafted = self.history(h);
                    grafted.adopt(id);
                    grafted.set_reach(reach.with(player, share));
                    h
                }
                None => {
                    let next = game.play(&a);
                    let payoff = Self::estimate(&next, prior);
                    self.push_history(History::new(&next, Some(id), [node.trace(Player::P1), node.trace(Player::P2)], reach.with(player, share), payoff))
                }
            };
            rewards.push((a.clone(), self.history(child).payoff()));
            kids.push((a, child));
        }
        let info = self.join_info(id, &node, &game, rewards, prior);
        node.finish_expansion(kids, Some(info));
        true
    }

    /// Remove and return the grafted nodes that sit one action below `id`
    fn take_grafts(&self, id: HistoryId, actions: &[G::Action]) -> HashMap<G::Action, HistoryId> {
        let mut grafts = self.grafts.lock();
        let mut found = HashMap::new();
        if grafts.is_empty() { return found; }
        let Some(prefix) = self.path_to(id, &grafts) else { return found; };
        for a in actions {
            let mut path = prefix.clone();
            path.push(a.clone());
            if let Some(h) = grafts.remove(&path) {
                found.insert(a.clone(), h);
            }
        }
        found
    }

    /// Action path from the start of the game, through a graft root if the node hangs below one
    fn path_to(&self, id: HistoryId, grafts: &HashMap<Vec<G::Action>, HistoryId>) -> Option<Vec<G::Action>> {
        let mut reversed = vec![];
        let mut here = id;
        let mut prefix = vec![];
        loop {
            match self.history(here).parent() {
                Some(p) => {
                    let (a, _) = self.history(p).children().iter().find(|(_, c)| *c == here)?.clone();
                    reversed.push(a);
                    here = p;
                }
                None if here == self.root() => break,
                None => {
                    prefix = grafts.iter().find(|(_, h)| **h == here)?.0.clone();
                    break;
                }
            }
        }
        prefix.extend(reversed.into_iter().rev());
        Some(prefix)
    }

    /// Merge the history into the infoset sharing its acting player's observations (or start one).
    /// Every chance history gets its own set: indistinguishable deals may offer different outcomes
    fn join_info<E: Evaluator<G>>(&self, id: HistoryId, node: &History<G>, game: &G, rewards: Vec<(G::Action, Reward)>, prior: &E) -> InfoId {
        let player = node.player;
        let key = (player, node.trace(player).to_vec());
        let reach = node.reach();
        let mut index = self.index.lock();
        if player.is_decision() {
            if let Some(&info) = index.get(&key) {
                self.info(info).add_history(id, reach);
                return info;
            }
        }
        let strategy = if player.is_decision() { prior.guess_strategy(game, player) } else { vec![] };
        let policy = Policy::from_rewards(rewards, player)
            .with_exploration(self.exploration)
            .with_prior(&strategy);
        let info = Info::from_policy(policy, key.1.clone(), player);
        info.add_history(id, reach);
        let mut infos = self.infos.write();
        infos.push(Arc::new(info));
        let info_id = InfoId(infos.len() - 1);
        if player.is_decision() {
            index.insert(key, info_id);
        }
        info_id
    }

    /// Expand every history whose `player` observations are a prefix of `target` until the
    /// infoset for `target` exists. Only call while no solve is running
    pub fn grow_towards<E: Evaluator<G>>(&self, player: Player, target: &[G::Observation], prior: &E) -> Option<InfoId> {
        let mut frontier = vec![self.root()];
        while let Some(id) = frontier.pop() {
            let node = self.history(id);
            if node.is_terminal() { continue; }
            let trace = node.trace(player);
            if !target.starts_with(trace) { continue; }
            let at_target = trace.len() == target.len();
            if at_target && node.player != player { continue; }
            node.mark_visited();
            self.expand(id, prior);
            if !at_target {
                frontier.extend(node.children().iter().map(|(_, c)| *c));
            }
        }
        self.find_info(player, target)
    }

    /// Follow an action path from the root through expanded nodes
    pub fn locate(&self, path: &[G::Action]) -> Option<HistoryId> {
        let mut here = self.root();
        for a in path {
            here = self.history(here).child(a)?;
        }
        Some(here)
    }

    /// Bring a candidate position into the arena: the existing node if the tree already holds it,
    /// otherwise a detached root carrying the full observation history of the path.
    /// Only call while no solve is running
    pub fn graft<E: Evaluator<G>>(&self, path: &[G::Action], prior: &E) -> HistoryId {
        if let Some(id) = self.locate(path) { return id; }
        let mut grafts = self.grafts.lock();
        if let Some(id) = grafts.get(path) { return *id; }
        let mut game = G::new();
        let mut prefix: [Vec<G::Observation>; 2] = [vec![], vec![]];
        for a in path {
            prefix[0].push(game.observation(Player::P1));
            prefix[1].push(game.observation(Player::P2));
            game = game.play(a);
        }
        let payoff = Self::estimate(&game, prior);
        let id = self.push_history(History::new(&game, None, [&prefix[0], &prefix[1]], Reach::default(), payoff));
        grafts.insert(path.to_vec(), id);
        id
    }

    // ---------- Queries --------- //
    /// Strict ancestry by walking parent handles
    pub fn is_ancestor_of(&self, ancestor: HistoryId, descendant: HistoryId) -> bool {
        let mut current = self.history(descendant).parent();
        while let Some(c) = current {
            if c == ancestor { return true; }
            current = self.history(c).parent();
        }
        false
    }

    /// Infosets reached by one action from any of the histories (in first-seen order)
    pub fn info_children(&self, members: &[HistoryId]) -> Vec<InfoId> {
        let mut seen = HashSet::new();
        let mut out = vec![];
        for h in members {
            for (_, c) in self.history(*h).children() {
                if let Some(info) = self.history(*c).info() {
                    if seen.insert(info) { out.push(info); }
                }
            }
        }
        out
    }

    /// ĝ(J): summed positive margins (for `player`) of every infoset below the members over its parent
    pub fn gift(&self, members: &[HistoryId], base: Reward, player: Player) -> Reward {
        let mut memo = HashMap::new();
        self.gift_inner(members, base, player.multiplier(), &mut memo)
    }

    fn gift_inner(&self, members: &[HistoryId], base: Reward, sign: Reward, memo: &mut HashMap<InfoId, Reward>) -> Reward {
        let mut agg = 0.0;
        for child in self.info_children(members) {
            let info = self.info(child);
            let expectation = info.expectation();
            let below = match memo.get(&child) {
                Some(v) => *v,
                None => {
                    let v = self.gift_inner(&info.members(), expectation, sign, memo);
                    memo.insert(child, v);
                    v
                }
            };
            agg += below + (sign * (expectation - base)).max(0.0);
        }
        agg
    }

    /// Live histories whose observation sequence for `player` is one of `traces`
    pub fn histories_matching(&self, player: Player, traces: &HashSet<Vec<G::Observation>>) -> Vec<HistoryId> {
        let histories = self.histories.read().clone();
        histories.iter().enumerate()
            .filter(|(_, h)| !h.is_terminal() && traces.contains(h.trace(player)))
            .map(|(i, _)| HistoryId(i))
            .collect()
    }

    /// Recursively find the size of the tree below a node
    pub fn size(&self, id: HistoryId) -> usize {
        1 + self.history(id).children().iter().map(|(_, c)| self.size(*c)).sum::<usize>()
    }

    /// Recompute every infoset's aggregate reach from its members
    pub fn refresh_reach(&self) {
        for (_, info) in self.infos() {
            info.refresh_reach(|h| self.history(h).reach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::deal::Deal;
    use crate::games::rps::{Rps, RpsAction, RpsObservation};

    type T = Rps<1>;

    fn tree() -> GameTree<T> {
        GameTree::new(&Heuristic, EXPLORATION)
    }

    fn none() -> RpsObservation { RpsObservation::default() }

    #[test]
    fn expand_root_makes_children_and_info() {
        let tree = tree();
        assert!(tree.expand(tree.root(), &Heuristic));
        let root = tree.history(tree.root());
        assert_eq!(root.status(), Status::Expanded);
        assert_eq!(root.children().len(), 3);
        for (_, c) in root.children() {
            assert_eq!(tree.history(*c).status(), Status::New);
            assert_eq!(tree.history(*c).parent(), Some(tree.root()));
        }
        let info = tree.find_info(Player::P1, &[none()]).unwrap();
        assert_eq!(root.info(), Some(info));
        assert_eq!(tree.info(info).members(), vec![tree.root()]);
        assert!(!tree.expand(tree.root(), &Heuristic));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn new_nodes_are_not_expanded() {
        let tree = tree();
        tree.expand(tree.root(), &Heuristic);
        let rock = tree.locate(&[RpsAction::Rock]).unwrap();
        assert!(!tree.expand(rock, &Heuristic));
        assert!(tree.history(rock).mark_visited());
        assert!(tree.expand(rock, &Heuristic));
        assert!(tree.history(rock).children().iter().all(|(_, c)| tree.history(*c).is_terminal()));
    }

    #[test]
    fn concurrent_expansion_is_exclusive() {
        let tree = tree();
        let wins: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| tree.expand(tree.root(), &Heuristic) as usize)).collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(wins, 1);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.info_count(), 1);
    }

    #[test]
    fn indistinguishable_histories_share_info() {
        let tree = tree();
        tree.expand(tree.root(), &Heuristic);
        for (_, c) in tree.history(tree.root()).children() {
            tree.history(*c).mark_visited();
            tree.expand(*c, &Heuristic);
        }
        let info = tree.find_info(Player::P2, &[none(), none()]).unwrap();
        let info = tree.info(info);
        assert_eq!(info.len(), 3);
        assert_eq!(info.player, Player::P2);
        assert!((info.reach_prob(Player::P1) - 1.0).abs() < 1e-12);
        assert_eq!(tree.info_count(), 2);
    }

    #[test]
    fn grow_towards_finds_or_fails() {
        let tree = tree();
        let p2 = tree.grow_towards(Player::P2, &[none(), none()], &Heuristic);
        assert!(p2.is_some());
        assert_eq!(tree.info(p2.unwrap()).len(), 3);
        let rock = RpsObservation(vec![RpsAction::Rock]);
        assert!(tree.grow_towards(Player::P2, &[none(), rock], &Heuristic).is_none());
        assert!(tree.grow_towards(Player::P1, &[none(), none()], &Heuristic).is_none());
    }

    #[test]
    fn ancestry_walks_parents() {
        let tree = tree();
        tree.grow_towards(Player::P2, &[none(), none()], &Heuristic);
        let rock = tree.locate(&[RpsAction::Rock]).unwrap();
        let leaf = tree.locate(&[RpsAction::Rock, RpsAction::Paper]).unwrap();
        let paper = tree.locate(&[RpsAction::Paper]).unwrap();
        assert!(tree.is_ancestor_of(tree.root(), leaf));
        assert!(tree.is_ancestor_of(rock, leaf));
        assert!(!tree.is_ancestor_of(paper, leaf));
        assert!(!tree.is_ancestor_of(leaf, rock));
        assert!(!tree.is_ancestor_of(leaf, leaf));
    }

    #[test]
    fn graft_reuses_nodes() {
        let tree = tree();
        tree.expand(tree.root(), &Heuristic);
        let rock = tree.locate(&[RpsAction::Rock]).unwrap();
        assert_eq!(tree.graft(&[RpsAction::Rock], &Heuristic), rock);

        let deep = [RpsAction::Rock, RpsAction::Rock];
        let first = tree.graft(&deep, &Heuristic);
        assert_eq!(tree.graft(&deep, &Heuristic), first);
        let node = tree.history(first);
        assert!(node.parent().is_none());
        assert!(node.is_terminal());
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn grafted_positions_are_adopted_when_grown_to() {
        let tree = tree();
        tree.expand(tree.root(), &Heuristic);
        let rock = tree.locate(&[RpsAction::Rock]).unwrap();
        let path = [RpsAction::Rock, RpsAction::Paper];
        let grafted = tree.graft(&path, &Heuristic);
        assert_eq!(tree.len(), 5);
        assert!(tree.locate(&path).is_none());

        tree.history(rock).mark_visited();
        assert!(tree.expand(rock, &Heuristic));
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.locate(&path), Some(grafted));
        assert_eq!(tree.history(grafted).parent(), Some(rock));
        assert!(tree.is_ancestor_of(tree.root(), grafted));
        assert!((tree.history(grafted).reach().get(Player::P2) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(tree.graft(&path, &Heuristic), grafted);
        assert_eq!(tree.size(rock), 4);
    }

    #[test]
    fn deeper_grafts_hang_below_their_graft_root() {
        let tree = GameTree::<Deal>::new(&Heuristic, EXPLORATION);
        let top = tree.graft(&[1, 2], &Heuristic);
        assert_eq!(tree.history(top).status(), Status::Visited);
        let below = tree.graft(&[1, 2, 0], &Heuristic);
        assert!(tree.expand(top, &Heuristic));
        assert_eq!(tree.history(below).parent(), Some(top));
        assert_eq!(tree.history(top).children().len(), 2);
    }

    /// Expand everything reachable
    fn grow_all<G: Game>(tree: &GameTree<G>) {
        let mut done = 0;
        while done < tree.len() {
            let end = tree.len();
            for i in done..end {
                tree.history(HistoryId(i)).mark_visited();
                tree.expand(HistoryId(i), &Heuristic);
            }
            done = end;
        }
    }

    #[test]
    fn chance_nodes_keep_their_own_outcomes() {
        let tree = GameTree::<Deal>::new(&Heuristic, EXPLORATION);
        grow_all(&tree);
        let mut chance_infos = HashSet::new();
        for i in 0..tree.len() {
            let node = tree.history(HistoryId(i));
            if node.player != Player::Chance { continue; }
            let info = node.info().unwrap();
            assert!(chance_infos.insert(info), "{:?} shares {:?}", node, info);
            let info = tree.info(info);
            let kids: Vec<u8> = node.children().iter().map(|(a, _)| *a).collect();
            assert_eq!(info.policy.read().actions(), &kids[..]);
            assert_eq!(info.members(), vec![HistoryId(i)]);
        }
        // 2 first deals, 6 second deals
        assert_eq!(chance_infos.len(), 8);
        let last = tree.find_info(Player::P1, &[(None, None), (Some(0), None), (Some(0), None), (Some(0), Some(2))]).unwrap();
        assert_eq!(tree.info(last).len(), 2);
    }

    struct Leaning;

    impl Evaluator<T> for Leaning {
        fn score_position(&self, _game: &T, _player: Player) -> Reward { 0.0 }
        fn guess_strategy(&self, _game: &T, _player: Player) -> Strategy { vec![0.5, 0.25, 0.25] }
    }

    #[test]
    fn evaluator_guess_seeds_new_infosets() {
        let tree = GameTree::<T>::new(&Leaning, EXPLORATION);
        tree.expand(tree.root(), &Leaning);
        let info = tree.find_info(Player::P1, &[none()]).unwrap();
        let policy = tree.info(info).exploit_policy();
        for (p, guess) in policy.iter().zip([0.5, 0.25, 0.25]) {
            assert!((p - guess).abs() < 1e-12, "{:?}", policy);
        }
        let plain = self::tree();
        plain.expand(plain.root(), &Heuristic);
        assert_eq!(plain.info(InfoId(0)).exploit_policy(), vec![1.0 / 3.0; 3]);
    }

    #[test]
    fn gift_is_non_negative() {
        let tree = tree();
        tree.grow_towards(Player::P2, &[none(), none()], &Heuristic);
        for player in [Player::P1, Player::P2] {
            let g = tree.gift(&[tree.root()], 0.0, player);
            assert!(g >= 0.0);
        }
    }
}
