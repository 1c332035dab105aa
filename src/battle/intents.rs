use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::combatant::PlayerHealth;
use super::events::{BattleEvent, EventBus};

/// 单局战斗内唯一的意图实例标识。
pub type IntentId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntentEffect {
    DamagePlayer,
    GainBlock,
    GainPower,
    GainEvasion,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IntentTiming {
    #[default]
    EnemyTurnStart,
    EnemyTurnEnd,
    PlayerTurnEnd,
    PlayerCardPlayed,
}

/// 敌人意图定义（内容数据，不可变）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnemyIntentDefinition {
    pub id: String,
    pub effect: IntentEffect,
    #[serde(default)]
    pub timing: IntentTiming,
    pub base_amount: i32,
    /// 释放前需要蓄力的敌人回合数。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_turns: Option<u32>,
    #[serde(default)]
    pub description: String,
}

impl EnemyIntentDefinition {
    pub fn new(id: impl Into<String>, effect: IntentEffect, base_amount: i32) -> Self {
        Self {
            id: id.into(),
            effect,
            timing: IntentTiming::EnemyTurnStart,
            base_amount,
            charge_turns: None,
            description: String::new(),
        }
    }

    pub fn with_timing(mut self, timing: IntentTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn charging(mut self, turns: u32) -> Self {
        self.charge_turns = Some(turns);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentRuntime {
    pub id: IntentId,
    pub definition: Arc<EnemyIntentDefinition>,
    pub amount: i32,
    pub remaining_charge_turns: u32,
    fired: bool,
}

impl IntentRuntime {
    pub fn new(id: IntentId, definition: Arc<EnemyIntentDefinition>) -> Self {
        Self {
            id,
            amount: definition.base_amount,
            remaining_charge_turns: definition.charge_turns.unwrap_or(0),
            definition,
            fired: false,
        }
    }

    pub fn is_still_charging(&self) -> bool {
        self.definition.charge_turns.is_some() && self.remaining_charge_turns > 0
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn view(&self) -> IntentView {
        IntentView {
            id: self.id,
            definition_id: self.definition.id.clone(),
            effect: self.definition.effect,
            timing: self.definition.timing,
            amount: self.amount,
            remaining_charge_turns: self.remaining_charge_turns,
            charging: self.is_still_charging(),
            description: self.definition.description.clone(),
        }
    }

    fn apply(&self, player: &mut PlayerHealth, events: &mut EventBus) {
        match self.definition.effect {
            IntentEffect::DamagePlayer => {
                player.take_damage(self.amount, events);
            }
            IntentEffect::GainBlock | IntentEffect::GainPower | IntentEffect::GainEvasion => {
                debug!(effect = ?self.definition.effect, amount = self.amount, "enemy self-buff has no effect yet");
            }
        }
        events.record(BattleEvent::IntentFired {
            intent: self.id,
            effect: self.definition.effect,
            amount: self.amount,
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntentView {
    pub id: IntentId,
    pub definition_id: String,
    pub effect: IntentEffect,
    pub timing: IntentTiming,
    pub amount: i32,
    pub remaining_charge_turns: u32,
    pub charging: bool,
    pub description: String,
}

/// 当前场上的敌人意图。蓄力中的意图跨回合保留，其余在下一次规划时清除。
#[derive(Debug, Clone, Default)]
pub struct IntentBoard {
    active: Vec<IntentRuntime>,
    next_id: IntentId,
}

impl IntentBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[IntentRuntime] {
        &self.active
    }

    pub fn views(&self) -> Vec<IntentView> {
        self.active.iter().map(IntentRuntime::view).collect()
    }

    /// 保留仍在蓄力的意图，并为每个新定义追加一个运行时实例。
    pub fn replace_batch(
        &mut self,
        batch: Vec<Arc<EnemyIntentDefinition>>,
        events: &mut EventBus,
    ) {
        self.active.retain(IntentRuntime::is_still_charging);
        for definition in batch {
            self.next_id += 1;
            self.active.push(IntentRuntime::new(self.next_id, definition));
        }
        debug!(intents = self.active.len(), "intents planned");
        self.notify(events);
    }

    /// 执行所有敌人回合开始时机的意图，先推进蓄力计数。
    pub fn execute_turn_start(&mut self, player: &mut PlayerHealth, events: &mut EventBus) {
        for runtime in &mut self.active {
            if runtime.fired || runtime.definition.timing != IntentTiming::EnemyTurnStart {
                continue;
            }

            if runtime.is_still_charging() {
                runtime.remaining_charge_turns -= 1;
                if runtime.remaining_charge_turns > 0 {
                    debug!(
                        intent = runtime.id,
                        remaining = runtime.remaining_charge_turns,
                        "intent still charging"
                    );
                    events.record(BattleEvent::IntentCharging {
                        intent: runtime.id,
                        remaining_turns: runtime.remaining_charge_turns,
                    });
                    continue;
                }
                info!(intent = runtime.id, "charge complete, releasing");
            }

            runtime.fired = true;
            runtime.apply(player, events);
        }
        self.notify(events);
    }

    /// 触发绑定在次要时机上的意图。每次时机出现都会触发，且不推进蓄力计数。
    pub fn handle_trigger(
        &mut self,
        timing: IntentTiming,
        player: &mut PlayerHealth,
        events: &mut EventBus,
    ) {
        if timing == IntentTiming::EnemyTurnStart {
            self.execute_turn_start(player, events);
            return;
        }
        for runtime in self.active.iter().filter(|rt| rt.definition.timing == timing) {
            runtime.apply(player, events);
        }
    }

    /// 取消最近加入、尚未触发的回合开始意图（后进先出）。
    pub fn cancel_one(&mut self, events: &mut EventBus) -> Option<IntentId> {
        let pos = self.active.iter().rposition(|rt| {
            !rt.fired && rt.definition.timing == IntentTiming::EnemyTurnStart
        });
        let Some(pos) = pos else {
            debug!("no cancellable intent");
            return None;
        };
        let removed = self.active.remove(pos);
        info!(intent = removed.id, amount = removed.amount, "intent canceled");
        events.record(BattleEvent::IntentCanceled { intent: removed.id });
        self.notify(events);
        Some(removed.id)
    }

    pub fn set_amount(&mut self, id: IntentId, value: i32, events: &mut EventBus) -> bool {
        let Some(runtime) = self.active.iter_mut().find(|rt| rt.id == id) else {
            return false;
        };
        runtime.amount = value;
        self.notify(events);
        true
    }

    pub fn clear(&mut self, events: &mut EventBus) {
        self.active.clear();
        self.notify(events);
    }

    fn notify(&self, events: &mut EventBus) {
        events.record(BattleEvent::IntentsChanged {
            intents: self.views(),
        });
    }
}
