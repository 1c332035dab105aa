use serde::{Deserialize, Serialize};
use tracing::debug;

use super::events::{BattleEvent, EventBus};

/// 每回合的能量池。`current` 始终位于 `[0, max]`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLedger {
    current: i32,
    max: i32,
}

impl ResourceLedger {
    pub fn new(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn start_turn(&mut self, events: &mut EventBus) {
        self.current = self.max;
        self.notify(events);
    }

    pub fn can_pay(&self, cost: i32) -> bool {
        cost <= self.current
    }

    /// 仅在足够支付时扣除 `cost`。负费用按 0 处理。
    pub fn try_pay(&mut self, cost: i32, events: &mut EventBus) -> bool {
        if !self.can_pay(cost) {
            return false;
        }
        self.current -= cost.max(0);
        self.notify(events);
        true
    }

    pub fn set_current(&mut self, value: i32, events: &mut EventBus) {
        self.current = value.clamp(0, self.max);
        debug!(current = self.current, max = self.max, "energy set");
        self.notify(events);
    }

    pub fn set_max(&mut self, value: i32, events: &mut EventBus) {
        self.max = value.max(0);
        self.current = self.current.clamp(0, self.max);
        debug!(current = self.current, max = self.max, "max energy set");
        self.notify(events);
    }

    fn notify(&self, events: &mut EventBus) {
        events.record(BattleEvent::EnergyChanged {
            current: self.current,
            max: self.max,
        });
    }
}
