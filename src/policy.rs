use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use rand::rng;
use crate::utils::*;

const PRIOR_VISITS: Reward = 2.0;  // start with prior samples of -1 & +1
const PRIOR_VARIANCE: Reward = 2.0;

// ---------- Policy ----------
/// Action Policy (one per infoset)
/// Implements the discounted CFR+ accumulation and the action distributions derived from it.
///
/// Statistics are split by writer: the regret worker owns values, counterfactuals and regrets
/// (it holds the write lock), growth workers only bump `expansions` through a read lock.
pub struct Policy<A: ActionI> {
    player: Player,
    actions: Vec<A>,
    exploration: Reward,
    values: Vec<Reward>,
    counterfactuals: Vec<Counterfactual>,
    weights: Vec<Probability>,
    acc_regrets: Vec<Counterfactual>,
    net_regret: Counterfactual,
    visits: Vec<Reward>,
    variances: Vec<Reward>,
    num_updates: usize,
    expansions: Vec<AtomicU32>,
}

impl<A: ActionI> Policy<A> {
    pub fn from_actions(actions: Vec<A>, player: Player) -> Self {
        Self::from_rewards(actions.into_iter().map(|a| (a, 0.0)).collect(), player)
    }

    /// Seed every action with an expected value (usually the child's payoff or heuristic)
    pub fn from_rewards(items: Vec<(A, Reward)>, player: Player) -> Self {
        let (actions, values): (Vec<A>, Vec<Reward>) = items.into_iter().unzip();
        let n = actions.len();
        Policy {
            player,
            actions,
            exploration: EXPLORATION,
            values,
            counterfactuals: vec![0.0; n],
            weights: vec![0.0; n],
            acc_regrets: vec![0.0; n],
            net_regret: 0.0,
            visits: vec![PRIOR_VISITS; n],
            variances: vec![PRIOR_VARIANCE; n],
            num_updates: 1,
            expansions: (0..n).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Start regret matching from a given strategy instead of uniform (ignored if the length is off)
    pub fn with_prior(mut self, strategy: &[Probability]) -> Self {
        if strategy.len() == self.actions.len() {
            self.set_regrets(strategy);
        }
        self
    }

    pub fn with_exploration(mut self, c: Reward) -> Self {
        self.exploration = c;
        self
    }

    #[inline]
    pub fn multiplier(&self) -> Reward {
        self.player.multiplier()
    }
    pub fn player(&self) -> Player { self.player }
    pub fn actions(&self) -> &[A] { &self.actions }
    pub fn len(&self) -> usize { self.actions.len() }
    pub fn is_empty(&self) -> bool { self.actions.is_empty() }
    pub fn index_of(&self, a: &A) -> Option<usize> {
        self.actions.iter().position(|x| x == a)
    }
    pub fn num_updates(&self) -> usize { self.num_updates }
    pub fn net_regret(&self) -> Counterfactual { self.net_regret }
    pub fn regrets(&self) -> &[Counterfactual] { &self.acc_regrets }
    pub fn values(&self) -> &[Reward] { &self.values }

    // ---------- Distributions --------- //
    /// Regret matching: play in proportion to accumulated positive regret (uniform when there is none)
    pub fn exploit_policy(&self) -> Strategy {
        let n = self.actions.len();
        if self.net_regret <= 0.0 || !self.net_regret.is_finite() {
            return vec![1.0 / n as Probability; n];
        }
        self.acc_regrets.iter().map(|r| r / self.net_regret).collect()
    }
    /// Get the probability you would choose a given action
    pub fn p_exploit(&self, a: &A) -> Probability {
        let idx = self.index(a);
        if self.net_regret <= 0.0 || !self.net_regret.is_finite() {
            return 1.0 / self.actions.len() as Probability;
        }
        self.acc_regrets[idx] / self.net_regret
    }

    fn avg_variance(&self, idx: usize) -> Reward {
        self.variances[idx] / self.visits[idx]
    }

    /// Q(I, a) := u(I, a) + C σ(I, a) sqrt(N(I)) / (1 + N(I, a))
    fn quality(&self, idx: usize) -> Reward {
        let total = self.total_expansions() as Reward;
        let mine = self.expansions[idx].load(AtomicOrdering::Relaxed) as Reward;
        self.multiplier() * self.values[idx] + self.exploration * self.avg_variance(idx) * total.sqrt() / (1.0 + mine)
    }

    /// One-hot on the action with the best upper confidence score
    pub fn puct(&self) -> Strategy {
        let mut best = 0usize;
        let mut best_q = Reward::NEG_INFINITY;
        for i in 0..self.actions.len() {
            let q = self.quality(i);
            if q > best_q {
                best = i;
                best_q = q;
            }
        }
        let mut out = vec![0.0; self.actions.len()];
        if !out.is_empty() { out[best] = 1.0; }
        out
    }

    /// Uniform over every action regret matching would play
    pub fn support_policy(&self) -> Strategy {
        let exploit = self.exploit_policy();
        let support = exploit.iter().filter(|p| **p > 0.0).count().max(1) as Probability;
        exploit.iter().map(|p| if *p > 0.0 { 1.0 / support } else { 0.0 }).collect()
    }

    /// 50/50 between the PUCT arm and the uniform-over-support mix
    pub fn exploration_policy(&self) -> Strategy {
        self.puct().iter()
            .zip(self.support_policy().iter())
            .map(|(a, b)| 0.5 * a + 0.5 * b)
            .collect()
    }

    /// Restrict to the best action plus the most likely stable actions and renormalize the regrets on them
    pub fn purified_policy(&self, max_support: usize) -> Strategy {
        let n = self.actions.len();
        let probs = self.exploit_policy();
        let best = self.best_index();
        // TODO: stable should mean positive since t/2, the current support stands in for it
        let mut support: Vec<usize> = (0..n).filter(|&i| probs[i] > 0.0 || i == best).collect();
        support.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(Ordering::Equal).then(a.cmp(&b)));
        support.truncate(max_support.max(1));

        let mass: Counterfactual = support.iter().map(|&i| self.acc_regrets[i]).sum();
        let mut out = vec![0.0; n];
        for &i in support.iter() {
            out[i] = if mass > 0.0 { self.acc_regrets[i] / mass } else { 1.0 / support.len() as Probability };
        }
        out
    }

    // ---------- Sampling --------- //
    pub fn sample_from(&self, probs: &[Probability]) -> A {
        debug_assert_eq!(probs.len(), self.actions.len());
        self.actions[sample_index(probs, &mut rng())].clone()
    }
    /// Sample your action policy for exploring more of the space
    pub fn explore(&self) -> A {
        self.sample_from(&self.exploration_policy())
    }
    /// Sample your action policy to greedily get what you believe to be best
    pub fn exploit(&self) -> A {
        self.sample_from(&self.exploit_policy())
    }
    /// Optimization from the Obscuro paper: avoid leaking information through a diffuse strategy
    pub fn purified(&self, max_support: usize) -> A {
        self.sample_from(&self.purified_policy(max_support))
    }
    /// Commit to the purified strategy: regret outside the capped support is dropped for good
    pub fn purify(&mut self, max_support: usize) -> A {
        let restricted = self.purified_policy(max_support);
        let mut regrets: Vec<Counterfactual> = self.acc_regrets.iter()
            .zip(restricted.iter())
            .map(|(r, p)| if *p > 0.0 { *r } else { 0.0 })
            .collect();
        if regrets.iter().sum::<Counterfactual>() <= 0.0 {
            regrets = restricted;
        }
        self.set_regrets(&regrets);
        self.exploit()
    }
    pub fn best_action(&self) -> A {
        self.actions[self.best_index()].clone()
    }
    fn best_index(&self) -> usize {
        let mut best = 0;
        for i in 1..self.acc_regrets.len() {
            if self.acc_regrets[i] > self.acc_regrets[best] { best = i; }
        }
        best
    }

    // ---------- Statistics --------- //
    /// Update the state of the policy to inform further actions
    /// a: the action we want to update
    /// r: the value of playing it, p: the counterfactual odds of being in position to play it
    pub fn add_counterfactual(&mut self, a: &A, r: Reward, p: Probability) {
        let idx = self.index(a);
        self.accumulate(&[(idx, r)], p);
    }
    /// Add the values of several actions reached with the same counterfactual probability
    pub fn accumulate(&mut self, outcomes: &[(usize, Reward)], p: Probability) {
        for &(idx, r) in outcomes {
            self.counterfactuals[idx] += r * p;
            self.weights[idx] += p;
        }
    }
    /// Update the degree of exploration to inform further search (safe through a shared borrow)
    pub fn add_expansion(&self, a: &A) {
        let idx = self.index(a);
        self.expansions[idx].fetch_add(1, AtomicOrdering::Relaxed);
    }
    pub fn expansions(&self, a: &A) -> u32 {
        self.expansions[self.index(a)].load(AtomicOrdering::Relaxed)
    }
    pub fn total_expansions(&self) -> u32 {
        self.expansions.iter().map(|e| e.load(AtomicOrdering::Relaxed)).sum()
    }
    /// The expected value (P1 positive) of the exploit distribution
    pub fn expectation(&self) -> Reward {
        if self.values.is_empty() { return 0.0; }
        let policy = self.exploit_policy();
        self.values.iter().zip(policy.iter()).map(|(v, p)| v * p).sum()
    }
    /// Use the counterfactuals gathered this pass to calculate a new action distribution
    pub fn update(&mut self) {
        if self.actions.is_empty() { return; }
        let momentum_coeff = self.num_updates as Reward / (self.num_updates as Reward + 1.0);  // discounted CFR+
        self.num_updates += 1;
        let policy = self.exploit_policy();
        let baseline: Counterfactual = self.counterfactuals.iter().zip(policy.iter()).map(|(c, p)| c * p).sum();
        let mult = self.multiplier();
        for (i, cfv) in self.counterfactuals.iter().enumerate() {
            let inst_regret = mult * (cfv - baseline);
            self.acc_regrets[i] = (momentum_coeff * self.acc_regrets[i] + inst_regret).max(0.0);
        }
        self.net_regret = self.acc_regrets.iter().sum();
        self.absorb();
    }
    /// Keep what was learned about action values this pass but leave the regrets alone
    pub fn discard(&mut self) {
        self.absorb();
    }
    /// Overwrite the regrets directly (used by the resolving gadget root)
    pub fn set_regrets(&mut self, regrets: &[Counterfactual]) {
        debug_assert_eq!(regrets.len(), self.acc_regrets.len());
        for (r, new) in self.acc_regrets.iter_mut().zip(regrets.iter()) {
            *r = if new.is_finite() { new.max(0.0) } else { 0.0 };
        }
        self.net_regret = self.acc_regrets.iter().sum();
    }
    /// Fold this pass's counterfactuals into the value estimates and reset the accumulators
    fn absorb(&mut self) {
        for i in 0..self.actions.len() {
            if self.weights[i] > 0.0 {
                let v = self.counterfactuals[i] / self.weights[i];
                let delta = v - self.values[i];
                self.variances[i] += delta * delta;
                self.visits[i] += 1.0;
                self.values[i] = v;
            }
            self.counterfactuals[i] = 0.0;
            self.weights[i] = 0.0;
        }
    }

    fn index(&self, a: &A) -> usize {
        match self.index_of(a) {
            Some(idx) => idx,
            None => panic!("{:?} is not an action of this policy", a),
        }
    }
}

impl<A: ActionI> Clone for Policy<A> {
    fn clone(&self) -> Self {
        Policy {
            player: self.player,
            actions: self.actions.clone(),
            exploration: self.exploration,
            values: self.values.clone(),
            counterfactuals: self.counterfactuals.clone(),
            weights: self.weights.clone(),
            acc_regrets: self.acc_regrets.clone(),
            net_regret: self.net_regret,
            visits: self.visits.clone(),
            variances: self.variances.clone(),
            num_updates: self.num_updates,
            expansions: self.expansions.iter().map(|e| AtomicU32::new(e.load(AtomicOrdering::Relaxed))).collect(),
        }
    }
}

impl<A: ActionI> Debug for Policy<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let distribution = self.exploit_policy();
        write!(f, "Policy({}, {:.3}, {})", self.multiplier(), self.expectation(),
               self.actions.iter()
                   .zip(distribution.iter())
                   .zip(self.acc_regrets.iter())
                   .zip(self.values.iter())
                   .map(|(((action, prob), regret), value)| {
                       format!("[{:?}: p={:.3}, e={:.2}, r={:.3}]", action, prob, value, regret)
                   })
                   .collect::<Vec<_>>()
                   .join(", ")
        )
    }
}
