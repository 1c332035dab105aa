use serde::{Deserialize, Serialize};

use super::cards::InstanceId;
use super::combatant::HpSegment;
use super::intents::{IntentEffect, IntentId, IntentView};
use super::turns::TurnState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BattleOutcome {
    Victory,
    Defeat,
}

/// 战斗事件流，表现层订阅这些事件来刷新 UI。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BattleEvent {
    HpChanged {
        side: Side,
        current: i32,
        max: i32,
    },
    SegmentsChanged {
        segments: Vec<HpSegment>,
    },
    DamageTaken {
        side: Side,
        amount: i32,
    },
    Healed {
        side: Side,
        amount: i32,
    },
    Died {
        side: Side,
    },
    EnergyChanged {
        current: i32,
        max: i32,
    },
    PowerStacksChanged {
        stacks: i32,
    },
    TurnStateChanged {
        state: TurnState,
    },
    CardDrawn {
        instance: InstanceId,
    },
    CardDiscarded {
        instance: InstanceId,
    },
    PilesRecycled {
        draw_count: usize,
    },
    CardPlayed {
        instance: InstanceId,
        template_id: String,
    },
    CardResolved {
        instance: InstanceId,
        success: bool,
    },
    DiscardSelectionStarted {
        count: u32,
    },
    DiscardSelectionFinished,
    IntentsChanged {
        intents: Vec<IntentView>,
    },
    IntentCharging {
        intent: IntentId,
        remaining_turns: u32,
    },
    IntentFired {
        intent: IntentId,
        effect: IntentEffect,
        amount: i32,
    },
    IntentCanceled {
        intent: IntentId,
    },
    TokenSelectionStarted,
    TokenDrawn {
        value: i32,
    },
    TokenSelectionEnded,
    BattleEnded {
        outcome: BattleOutcome,
    },
}

pub type EventListener = Box<dyn FnMut(&BattleEvent)>;

/// 记录每个事件，并在发生时同步转发给订阅者。
#[derive(Default)]
pub struct EventBus {
    log: Vec<BattleEvent>,
    listeners: Vec<EventListener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&BattleEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn record(&mut self, event: BattleEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.log.push(event);
    }

    pub fn log(&self) -> &[BattleEvent] {
        &self.log
    }

    /// 取出自上次 drain 以来记录的事件。
    pub fn drain(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.log)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("log", &self.log.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_see_events_in_emission_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let sink = Rc::clone(&seen);
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        bus.record(BattleEvent::TokenSelectionStarted);
        bus.record(BattleEvent::TokenDrawn { value: 3 });

        assert_eq!(
            *seen.borrow(),
            vec![
                BattleEvent::TokenSelectionStarted,
                BattleEvent::TokenDrawn { value: 3 }
            ]
        );
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.log().is_empty(), "drain should empty the log");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&BattleEvent::EnergyChanged { current: 1, max: 3 })
            .expect("event should serialize");
        assert_eq!(json, r#"{"type":"EnergyChanged","current":1,"max":3}"#);
    }
}
