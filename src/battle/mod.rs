//! 战斗核心：牌堆、资源、生命值、卡牌结算、回合状态机、敌人意图与 Token 改写。

pub mod cards;
pub mod combatant;
pub mod config;
pub mod energy;
pub mod error;
pub mod events;
pub mod intents;
pub mod piles;
pub mod resolver;
pub mod schedule;
pub mod state;
pub mod tokens;
pub mod turns;

#[cfg(test)]
pub(crate) mod testing;

pub use cards::{CardField, CardInstance, CardTemplate, CardView, InstanceId};
pub use combatant::{EnemyHealth, HpSegment, PlayerHealth, PowerBuff};
pub use config::{BattleConfig, EnemyHpConfig, PacingConfig};
pub use energy::ResourceLedger;
pub use error::{ActionError, ConfigError};
pub use events::{BattleEvent, BattleOutcome, EventBus, EventListener, Side};
pub use intents::{
    EnemyIntentDefinition, IntentBoard, IntentEffect, IntentId, IntentRuntime, IntentTiming,
    IntentView,
};
pub use piles::PileStore;
pub use resolver::{CardResolution, DiscardProgress, PendingDiscard, ResolverState};
pub use schedule::{ScheduledTask, Timeline};
pub use state::{Battle, BattleContext, BattleSnapshot, HpView};
pub use tokens::{TokenMediator, TokenPhase, TokenTarget};
pub use turns::{TurnMachine, TurnState};
