use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cards::{CardField, InstanceId};
use super::events::{BattleEvent, EventBus};
use super::intents::IntentId;
use super::state::BattleContext;

/// 可以被 Token 数字改写的目标。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TokenTarget {
    Card { instance: InstanceId, field: CardField },
    PlayerCurrentHp,
    PlayerMaxHp,
    EnemyCurrentHp,
    EnemyMaxHp,
    EnemySegmentHp { index: usize },
    EnemySegmentMaxHp { index: usize },
    CurrentEnergy,
    MaxEnergy,
    PowerStacks,
    IntentAmount { intent: IntentId },
}

impl TokenTarget {
    pub fn is_available(&self, ctx: &BattleContext) -> bool {
        match *self {
            TokenTarget::Card { instance, .. } => ctx.piles.find(instance).is_some(),
            TokenTarget::EnemySegmentHp { index } | TokenTarget::EnemySegmentMaxHp { index } => {
                ctx.enemy.is_segmented() && index < ctx.enemy.segments().len()
            }
            TokenTarget::IntentAmount { intent } => {
                ctx.intents.active().iter().any(|rt| rt.id == intent)
            }
            _ => true,
        }
    }

    /// 把 `value` 写入目标。目标已不存在时返回 false。
    pub fn apply(&self, value: i32, ctx: &mut BattleContext) -> bool {
        let events = &mut ctx.events;
        match *self {
            TokenTarget::Card { instance, field } => match ctx.piles.find_mut(instance) {
                Some(card) => {
                    card.set_field(field, value);
                    debug!(instance, ?field, value, "card field rewritten");
                    true
                }
                None => false,
            },
            TokenTarget::PlayerCurrentHp => {
                ctx.player.set_current(value, events);
                true
            }
            TokenTarget::PlayerMaxHp => {
                ctx.player.set_max(value, events);
                true
            }
            TokenTarget::EnemyCurrentHp => {
                ctx.enemy.set_current(value, events);
                true
            }
            TokenTarget::EnemyMaxHp => {
                ctx.enemy.set_max(value, events);
                true
            }
            TokenTarget::EnemySegmentHp { index } => {
                ctx.enemy.set_segment_current(index, value, events)
            }
            TokenTarget::EnemySegmentMaxHp { index } => {
                ctx.enemy.set_segment_max(index, value, events)
            }
            TokenTarget::CurrentEnergy => {
                ctx.energy.set_current(value, events);
                true
            }
            TokenTarget::MaxEnergy => {
                ctx.energy.set_max(value, events);
                true
            }
            TokenTarget::PowerStacks => {
                ctx.power.set_stacks(value, events);
                true
            }
            TokenTarget::IntentAmount { intent } => ctx.intents.set_amount(intent, value, events),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TokenPhase {
    #[default]
    Idle,
    Selecting,
    /// 已抽出数值，等待掉落动画结束后再写入。
    Applying,
}

/// Token 选择模式：抽一个随机数字并写入唯一被提名的目标。
#[derive(Debug, Clone)]
pub struct TokenMediator {
    pool: Vec<i32>,
    phase: TokenPhase,
    rng: SmallRng,
}

impl TokenMediator {
    pub fn new(pool: Vec<i32>) -> Self {
        Self {
            pool,
            phase: TokenPhase::Idle,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(pool: Vec<i32>, seed: u64) -> Self {
        Self {
            pool,
            phase: TokenPhase::Idle,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn pool(&self) -> &[i32] {
        &self.pool
    }

    pub fn phase(&self) -> TokenPhase {
        self.phase
    }

    pub fn is_selecting(&self) -> bool {
        self.phase == TokenPhase::Selecting
    }

    pub fn is_busy(&self) -> bool {
        self.phase != TokenPhase::Idle
    }

    /// 开启一次选择。池为空或已有选择进行中时不做任何事。
    pub fn begin_selection(&mut self, events: &mut EventBus) -> bool {
        if self.pool.is_empty() {
            debug!("token pool empty, selection not opened");
            return false;
        }
        if self.is_busy() {
            return false;
        }
        self.phase = TokenPhase::Selecting;
        info!("token selection started");
        events.record(BattleEvent::TokenSelectionStarted);
        true
    }

    /// 从池中均匀抽取，池本身不被消耗。
    pub fn draw_random_token(&mut self) -> Option<i32> {
        if self.pool.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.pool.len());
        Some(self.pool[index])
    }

    /// 为被提名的目标抽取 Token，并停在 `Applying` 直到
    /// [`TokenMediator::end_selection`]。抽到非正数时直接结束本次选择。
    pub fn draw_for_nomination(&mut self, events: &mut EventBus) -> Option<i32> {
        let value = self.draw_for_target(events)?;
        self.phase = TokenPhase::Applying;
        Some(value)
    }

    fn draw_for_target(&mut self, events: &mut EventBus) -> Option<i32> {
        if !self.is_selecting() {
            return None;
        }
        match self.draw_random_token() {
            Some(value) if value > 0 => {
                events.record(BattleEvent::TokenDrawn { value });
                Some(value)
            }
            _ => {
                self.end_selection(events);
                None
            }
        }
    }

    pub fn end_selection(&mut self, events: &mut EventBus) {
        if self.phase == TokenPhase::Idle {
            return;
        }
        self.phase = TokenPhase::Idle;
        debug!("token selection ended");
        events.record(BattleEvent::TokenSelectionEnded);
    }
}
