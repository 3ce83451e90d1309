//! Strategic layer: tabular Q-learning of the energy price λ.
//!
//! The state is the battery's SoC bin, the actions are a fixed list of λ
//! values handed to the execution layer. Low charge should make energy
//! expensive, so a trained greedy policy picks larger λ in lower bins.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// How the cost of energy scales as the battery empties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ScarcityPenalty {
    /// `scale / (soc + epsilon)`
    Inverse { scale: f64, epsilon: f64 },
    /// `intercept - slope * soc`
    Linear { intercept: f64, slope: f64 },
}

impl ScarcityPenalty {
    /// Penalty factor at `soc` (clamped to `[0, 1]`).
    pub fn factor(&self, soc: f64) -> f64 {
        let soc = soc.clamp(0.0, 1.0);
        match *self {
            Self::Inverse { scale, epsilon } => scale / (soc + epsilon),
            Self::Linear { intercept, slope } => intercept - slope * soc,
        }
    }

    /// Returns a description of what is wrong with the parameters, if anything.
    pub fn check(&self) -> Option<String> {
        match *self {
            Self::Inverse { scale, epsilon } => {
                if scale <= 0.0 {
                    Some("inverse scale must be > 0".to_string())
                } else if epsilon <= 0.0 {
                    Some("inverse epsilon must be > 0".to_string())
                } else {
                    None
                }
            }
            Self::Linear { intercept, slope } => {
                if slope <= 0.0 {
                    Some("linear slope must be > 0".to_string())
                } else if intercept - slope < 0.0 {
                    Some("linear penalty must stay >= 0 at full charge".to_string())
                } else {
                    None
                }
            }
        }
    }
}

impl Default for ScarcityPenalty {
    fn default() -> Self {
        Self::Inverse {
            scale: 0.3,
            epsilon: 0.05,
        }
    }
}

/// Exploration behaviour of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerMode {
    /// Epsilon-greedy with decaying epsilon; the table is updated.
    Training,
    /// Always the best known action.
    Greedy,
}

/// Hyperparameters of the Q-learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LearnerParams {
    /// Number of contiguous SoC bins covering `[0, 1]`.
    pub bins: usize,
    /// Candidate λ values, cheapest energy first.
    pub actions: Vec<f64>,
    pub learning_rate: f64,
    pub discount: f64,
    /// Initial exploration probability.
    pub epsilon: f64,
    /// Multiplicative epsilon decay applied after each training selection.
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
    pub performance_weight: f64,
    pub energy_weight: f64,
    pub penalty: ScarcityPenalty,
    /// Synthetic episodes run before deployment.
    pub pretrain_iterations: usize,
    pub mode: LearnerMode,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            bins: 5,
            actions: vec![0.1, 1.0, 5.0],
            learning_rate: 0.1,
            discount: 0.9,
            epsilon: 0.1,
            epsilon_decay: 1.0,
            epsilon_min: 0.0,
            performance_weight: 1.0,
            energy_weight: 1.0,
            penalty: ScarcityPenalty::default(),
            pretrain_iterations: 2000,
            mode: LearnerMode::Training,
        }
    }
}

impl LearnerParams {
    /// Reward for spending `energy` to achieve `performance` at charge `soc`.
    pub fn reward(&self, performance: f64, energy: f64, soc: f64) -> f64 {
        self.performance_weight * performance - self.energy_weight * self.penalty.factor(soc) * energy
    }
}

/// Action values indexed by `(soc_bin, action)`.
///
/// Serializable so a caller can carry one table across scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    actions: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl ValueTable {
    /// Creates a table with every entry set to `initial`.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero or `actions` is empty.
    pub fn new(bins: usize, actions: Vec<f64>, initial: f64) -> Self {
        assert!(bins > 0, "bins must be > 0");
        assert!(!actions.is_empty(), "actions must not be empty");
        let values = vec![vec![initial; actions.len()]; bins];
        Self { actions, values }
    }

    pub fn bins(&self) -> usize {
        self.values.len()
    }

    pub fn actions(&self) -> &[f64] {
        &self.actions
    }

    /// Bin containing `soc`; SoC is clamped so every value maps to exactly one bin.
    pub fn bin_for(&self, soc: f64) -> usize {
        let bins = self.bins();
        let idx = (soc.clamp(0.0, 1.0) * bins as f64).floor() as usize;
        idx.min(bins - 1)
    }

    pub fn value(&self, bin: usize, action: usize) -> f64 {
        self.values[bin][action]
    }

    /// Best action in `bin`; ties go to the lowest index.
    pub fn best_action(&self, bin: usize) -> usize {
        let row = &self.values[bin];
        let mut best = 0;
        for (i, &v) in row.iter().enumerate().skip(1) {
            if v > row[best] {
                best = i;
            }
        }
        best
    }

    pub fn max_value(&self, bin: usize) -> f64 {
        self.values[bin][self.best_action(bin)]
    }

    /// Whether this table can serve a learner with the given shape.
    pub fn is_compatible(&self, bins: usize, actions: &[f64]) -> bool {
        self.bins() == bins && self.actions == actions
    }

    /// Greedy λ for each bin, lowest SoC first.
    pub fn greedy_policy(&self) -> Vec<f64> {
        (0..self.bins())
            .map(|b| self.actions[self.best_action(b)])
            .collect()
    }

    fn set(&mut self, bin: usize, action: usize, value: f64) {
        self.values[bin][action] = value;
    }
}

/// One λ choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Index into the action list.
    pub action: usize,
    /// The λ value itself.
    pub aggressiveness: f64,
    /// True when chosen by exploration rather than greedily.
    pub explored: bool,
}

/// Tabular Q-learner that owns the table it was handed.
#[derive(Debug, Clone)]
pub struct Learner {
    table: ValueTable,
    params: LearnerParams,
    mode: LearnerMode,
    epsilon: f64,
    rng: StdRng,
}

impl Learner {
    /// Creates a learner over `table`.
    ///
    /// # Arguments
    ///
    /// * `params` - Hyperparameters
    /// * `table` - Value table, fresh or carried over from an earlier run
    /// * `seed` - Seed for exploration draws
    ///
    /// # Panics
    ///
    /// Panics if the table shape does not match `params`.
    pub fn new(params: LearnerParams, table: ValueTable, seed: u64) -> Self {
        assert!(
            table.is_compatible(params.bins, &params.actions),
            "value table shape does not match learner parameters"
        );
        Self {
            table,
            mode: params.mode,
            epsilon: params.epsilon,
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a learner with a zeroed table.
    pub fn fresh(params: LearnerParams, seed: u64) -> Self {
        let table = ValueTable::new(params.bins, params.actions.clone(), 0.0);
        Self::new(params, table, seed)
    }

    /// Picks λ for the given charge level.
    pub fn select_lambda(&mut self, soc: f64) -> Selection {
        let bin = self.table.bin_for(soc);
        let explore = self.mode == LearnerMode::Training
            && self.epsilon > 0.0
            && self.rng.random::<f64>() < self.epsilon;

        let action = if explore {
            self.rng.random_range(0..self.table.actions().len())
        } else {
            self.table.best_action(bin)
        };

        if self.mode == LearnerMode::Training {
            self.epsilon = (self.epsilon * self.params.epsilon_decay).max(self.params.epsilon_min);
        }

        Selection {
            action,
            aggressiveness: self.table.actions()[action],
            explored: explore,
        }
    }

    /// Standard Q update for one observed transition.
    pub fn update(&mut self, soc: f64, action: usize, reward: f64, next_soc: f64) {
        let s = self.table.bin_for(soc);
        let s_next = self.table.bin_for(next_soc);
        let old = self.table.value(s, action);
        let target = reward + self.params.discount * self.table.max_value(s_next);
        self.table
            .set(s, action, old + self.params.learning_rate * (target - old));
    }

    /// Reward under this learner's weights and scarcity penalty.
    pub fn reward(&self, performance: f64, energy: f64, soc: f64) -> f64 {
        self.params.reward(performance, energy, soc)
    }

    /// Runs single-step synthetic episodes at uniformly sampled SoC values.
    ///
    /// `episode(soc, lambda)` returns the reward for choosing `lambda` at
    /// `soc`. Every action is tried with equal probability and each episode
    /// ends after one step, so an entry converges to the sample mean of its
    /// rewards. Exploration state and mode are left untouched.
    pub fn pretrain(&mut self, iterations: usize, mut episode: impl FnMut(f64, f64) -> f64) {
        let actions = self.table.actions().len();
        let mut visits = vec![vec![0_usize; actions]; self.table.bins()];
        for _ in 0..iterations {
            let soc: f64 = self.rng.random();
            let action = self.rng.random_range(0..actions);
            let reward = episode(soc, self.table.actions()[action]);

            let bin = self.table.bin_for(soc);
            visits[bin][action] += 1;
            let old = self.table.value(bin, action);
            self.table
                .set(bin, action, old + (reward - old) / visits[bin][action] as f64);
        }
    }

    pub fn set_mode(&mut self, mode: LearnerMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> LearnerMode {
        self.mode
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    /// Hands the table back so it can be reused by a later run.
    pub fn into_table(self) -> ValueTable {
        self.table
    }

    pub fn params(&self) -> &LearnerParams {
        &self.params
    }
}
