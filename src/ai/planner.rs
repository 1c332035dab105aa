use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::battle::EnemyIntentDefinition;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerConfig {
    pub min_intents_per_turn: u32,
    pub max_intents_per_turn: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_intents_per_turn: 1,
            max_intents_per_turn: 3,
        }
    }
}

impl PlannerConfig {
    /// 将配置的范围收敛到 `[1, available]`，并保证 `max >= min`。
    pub fn batch_range(&self, available: usize) -> Option<(usize, usize)> {
        if available == 0 {
            return None;
        }
        let min = (self.min_intents_per_turn.max(1) as usize).min(available);
        let max = (self.max_intents_per_turn as usize).max(min).min(available);
        Some((min, max))
    }
}

/// 敌人意图规划：每回合从可用定义中有放回地随机挑选一批意图。
#[derive(Debug, Clone)]
pub struct IntentPlanner {
    config: PlannerConfig,
    rng: SmallRng,
}

impl IntentPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: PlannerConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn choose_batch(
        &mut self,
        available: &[Arc<EnemyIntentDefinition>],
    ) -> Vec<Arc<EnemyIntentDefinition>> {
        let Some((min, max)) = self.config.batch_range(available.len()) else {
            warn!("no intent definitions available, enemy plans nothing");
            return Vec::new();
        };

        let count = self.rng.gen_range(min..=max);
        let batch: Vec<_> = (0..count)
            .map(|_| Arc::clone(&available[self.rng.gen_range(0..available.len())]))
            .collect();
        debug!(count, "intent batch chosen");
        batch
    }
}
