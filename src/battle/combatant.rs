use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::events::{BattleEvent, EventBus, Side};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HpSegment {
    pub current: i32,
    pub max: i32,
}

impl HpSegment {
    pub fn full(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }
}

/// 玩家生命值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerHealth {
    current: i32,
    max: i32,
    #[serde(skip)]
    death_reported: bool,
}

impl PlayerHealth {
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self {
            current: max,
            max,
            death_reported: false,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    pub fn take_damage(&mut self, amount: i32, events: &mut EventBus) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.current;
        self.current = (self.current - amount).max(0);
        let dealt = before - self.current;
        debug!(amount, current = self.current, max = self.max, "player damaged");
        events.record(BattleEvent::DamageTaken {
            side: Side::Player,
            amount: dealt,
        });
        self.notify(events);
        dealt
    }

    pub fn heal(&mut self, amount: i32, events: &mut EventBus) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.current;
        self.current = (self.current + amount).min(self.max);
        let healed = self.current - before;
        events.record(BattleEvent::Healed {
            side: Side::Player,
            amount: healed,
        });
        self.notify(events);
        healed
    }

    pub fn set_current(&mut self, value: i32, events: &mut EventBus) {
        self.current = value.clamp(0, self.max);
        self.notify(events);
    }

    pub fn set_max(&mut self, value: i32, events: &mut EventBus) {
        self.max = value.max(1);
        self.current = self.current.clamp(0, self.max);
        self.notify(events);
    }

    fn notify(&mut self, events: &mut EventBus) {
        events.record(BattleEvent::HpChanged {
            side: Side::Player,
            current: self.current,
            max: self.max,
        });
        if self.is_dead() && !self.death_reported {
            self.death_reported = true;
            info!("player died");
            events.record(BattleEvent::Died { side: Side::Player });
        }
    }
}

/// 敌人生命值：单条血或多条血（按顺序从前往后扣除，治疗进入第一条）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnemyHealth {
    segments: Vec<HpSegment>,
    segmented: bool,
    #[serde(skip)]
    death_reported: bool,
}

impl EnemyHealth {
    pub fn single(max: i32) -> Self {
        Self {
            segments: vec![HpSegment::full(max.max(1))],
            segmented: false,
            death_reported: false,
        }
    }

    /// 未提供任何血条上限时退化为一条 1 HP 的血条。
    pub fn segmented(maxima: &[i32]) -> Self {
        if maxima.is_empty() {
            return Self::single(1);
        }
        Self {
            segments: maxima.iter().map(|max| HpSegment::full(*max)).collect(),
            segmented: true,
            death_reported: false,
        }
    }

    pub fn is_segmented(&self) -> bool {
        self.segmented
    }

    pub fn segments(&self) -> &[HpSegment] {
        &self.segments
    }

    pub fn current(&self) -> i32 {
        self.segments
            .iter()
            .map(|segment| segment.current.clamp(0, segment.max))
            .sum()
    }

    pub fn max(&self) -> i32 {
        self.segments.iter().map(|segment| segment.max.max(0)).sum()
    }

    pub fn is_dead(&self) -> bool {
        self.segments.iter().all(|segment| segment.current <= 0)
    }

    /// 从前往后扣除血条，返回实际造成的伤害。
    pub fn take_damage(&mut self, amount: i32, events: &mut EventBus) -> i32 {
        if amount <= 0 {
            return 0;
        }

        let mut remaining = amount;
        let mut dealt = 0;
        for segment in self.segments.iter_mut().filter(|segment| segment.current > 0) {
            if remaining <= 0 {
                break;
            }
            let after = (segment.current - remaining).max(0);
            let absorbed = segment.current - after;
            segment.current = after;
            remaining -= absorbed;
            dealt += absorbed;
        }

        debug!(amount, dealt, current = self.current(), "enemy damaged");
        if dealt > 0 {
            events.record(BattleEvent::DamageTaken {
                side: Side::Enemy,
                amount: dealt,
            });
        }
        self.notify(events);
        dealt
    }

    pub fn heal(&mut self, amount: i32, events: &mut EventBus) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let Some(first) = self.segments.first_mut() else {
            return 0;
        };
        let before = first.current;
        first.current = (first.current + amount).clamp(0, first.max.max(0));
        let healed = first.current - before;
        if healed > 0 {
            events.record(BattleEvent::Healed {
                side: Side::Enemy,
                amount: healed,
            });
        }
        self.notify(events);
        healed
    }

    /// 设置总当前生命值，从前往后填充血条。
    pub fn set_current(&mut self, value: i32, events: &mut EventBus) {
        let mut remaining = value.max(0);
        for segment in &mut self.segments {
            segment.max = segment.max.max(1);
            segment.current = remaining.clamp(0, segment.max);
            remaining -= segment.current;
        }
        self.notify(events);
    }

    /// 设置总生命上限。多条血时按比例缩放每一条。
    pub fn set_max(&mut self, value: i32, events: &mut EventBus) {
        let new_total = value.max(1);
        let old_total: i32 = self.segments.iter().map(|segment| segment.max.max(1)).sum();
        let count = self.segments.len() as f64;

        for segment in &mut self.segments {
            let ratio = if old_total > 0 {
                f64::from(segment.max.max(1)) / f64::from(old_total)
            } else {
                1.0 / count
            };
            segment.max = ((f64::from(new_total) * ratio).round_ties_even() as i32).max(1);
            segment.current = segment.current.clamp(0, segment.max);
        }
        self.notify(events);
    }

    pub fn set_segment_current(&mut self, index: usize, value: i32, events: &mut EventBus) -> bool {
        if !self.segmented {
            return false;
        }
        let Some(segment) = self.segments.get_mut(index) else {
            return false;
        };
        segment.current = value.clamp(0, segment.max.max(1));
        self.notify(events);
        true
    }

    pub fn set_segment_max(&mut self, index: usize, value: i32, events: &mut EventBus) -> bool {
        if !self.segmented {
            return false;
        }
        let Some(segment) = self.segments.get_mut(index) else {
            return false;
        };
        segment.max = value.max(1);
        segment.current = segment.current.clamp(0, segment.max);
        self.notify(events);
        true
    }

    fn notify(&mut self, events: &mut EventBus) {
        if self.segmented {
            events.record(BattleEvent::SegmentsChanged {
                segments: self.segments.clone(),
            });
        }
        events.record(BattleEvent::HpChanged {
            side: Side::Enemy,
            current: self.current(),
            max: self.max(),
        });
        if self.is_dead() && !self.death_reported {
            self.death_reported = true;
            info!("enemy died");
            events.record(BattleEvent::Died { side: Side::Enemy });
        }
    }
}

/// 力量 buff：层数 > 0 时按倍率放大伤害，玩家回合结束时衰减。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PowerBuff {
    stacks: i32,
    multiplier: f64,
}

impl PowerBuff {
    pub fn new(multiplier: f64) -> Self {
        Self {
            stacks: 0,
            multiplier,
        }
    }

    pub fn stacks(&self) -> i32 {
        self.stacks
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn is_active(&self) -> bool {
        self.stacks > 0
    }

    /// 四舍六入五取偶，与配置的伤害表一致。
    pub fn modify_damage(&self, base: i32) -> i32 {
        if base <= 0 || !self.is_active() {
            return base;
        }
        let scaled = (f64::from(base) * self.multiplier).round_ties_even() as i32;
        scaled.max(0)
    }

    pub fn add_stacks(&mut self, stacks: i32, events: &mut EventBus) {
        if stacks <= 0 {
            return;
        }
        self.stacks += stacks;
        debug!(added = stacks, stacks = self.stacks, "power stacks added");
        self.notify(events);
    }

    pub fn set_stacks(&mut self, value: i32, events: &mut EventBus) {
        self.stacks = value.max(0);
        self.notify(events);
    }

    /// 层数减半（向下取整），每次至少减少一层。
    pub fn decay(&mut self, events: &mut EventBus) {
        if self.stacks <= 0 {
            return;
        }
        let reduce = (self.stacks - self.stacks / 2).max(1);
        self.stacks = (self.stacks - reduce).max(0);
        debug!(reduce, stacks = self.stacks, "power decayed");
        self.notify(events);
    }

    fn notify(&self, events: &mut EventBus) {
        events.record(BattleEvent::PowerStacksChanged {
            stacks: self.stacks,
        });
    }
}
