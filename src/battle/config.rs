use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::cards::CardTemplate;
use super::combatant::EnemyHealth;
use super::error::ConfigError;
use super::intents::{EnemyIntentDefinition, IntentEffect, IntentTiming};
use crate::ai::PlannerConfig;

const DEFAULT_MAX_ENERGY: i32 = 3;
const DEFAULT_CARDS_PER_TURN: u32 = 5;
const DEFAULT_PLAYER_MAX_HP: i32 = 80;
const DEFAULT_ENEMY_MAX_HP: i32 = 50;
const DEFAULT_POWER_MULTIPLIER: f64 = 1.5;

static STARTER_DECK: Lazy<Vec<CardTemplate>> = Lazy::new(|| {
    let strike = CardTemplate::new("strike", "Strike", 1)
        .with_damage(6, 1)
        .with_description("Deal 6 damage.");
    let mend = CardTemplate::new("mend", "Mend", 1)
        .with_heal(5)
        .with_description("Restore 5 HP.");
    let flurry = CardTemplate::new("flurry", "Flurry", 2)
        .with_damage(3, 3)
        .with_hit_interval(0.15)
        .with_description("Deal 3 damage three times.");
    let focus = CardTemplate::new("focus", "Focus", 1)
        .with_power(4)
        .with_description("Gain 4 Power.");
    let sift = CardTemplate::new("sift", "Sift", 0)
        .with_discard_then_draw(1, 2)
        .with_description("Discard a card, then draw 2.");
    let rewrite = CardTemplate::new("rewrite", "Rewrite", 1)
        .with_token_selection()
        .with_description("Roll a token onto any number.");
    let interrupt = CardTemplate::new("interrupt", "Interrupt", 1)
        .with_intent_cancel(4)
        .with_description("If you played more than 4 cards this turn, cancel an enemy intent.");

    let mut deck = Vec::new();
    deck.extend(std::iter::repeat(strike).take(4));
    deck.extend(std::iter::repeat(mend).take(2));
    deck.push(flurry);
    deck.push(focus);
    deck.push(sift);
    deck.push(rewrite);
    deck.push(interrupt);
    deck
});

static ENEMY_INTENTS: Lazy<Vec<EnemyIntentDefinition>> = Lazy::new(|| {
    vec![
        EnemyIntentDefinition::new("bite", IntentEffect::DamagePlayer, 5)
            .with_description("Attack"),
        EnemyIntentDefinition::new("maul", IntentEffect::DamagePlayer, 9)
            .with_description("Heavy attack"),
        EnemyIntentDefinition::new("cataclysm", IntentEffect::DamagePlayer, 24)
            .charging(2)
            .with_description("Charging a devastating blow"),
        EnemyIntentDefinition::new("harden", IntentEffect::GainBlock, 6)
            .with_description("Defend"),
        EnemyIntentDefinition::new("spite", IntentEffect::DamagePlayer, 1)
            .with_timing(IntentTiming::PlayerTurnEnd)
            .with_description("Punishes ending the turn"),
    ]
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EnemyHpConfig {
    Single { max: i32 },
    Segmented { maxima: Vec<i32> },
}

impl Default for EnemyHpConfig {
    fn default() -> Self {
        EnemyHpConfig::Single {
            max: DEFAULT_ENEMY_MAX_HP,
        }
    }
}

impl EnemyHpConfig {
    pub fn build(&self) -> EnemyHealth {
        match self {
            EnemyHpConfig::Single { max } => EnemyHealth::single(*max),
            EnemyHpConfig::Segmented { maxima } => EnemyHealth::segmented(maxima),
        }
    }
}

/// 节奏延迟，单位为战斗时钟毫秒。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    pub draw_delay_ms: u64,
    pub enemy_attack_delay_ms: u64,
    pub replan_delay_ms: u64,
    pub token_settle_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            draw_delay_ms: 200,
            enemy_attack_delay_ms: 800,
            replan_delay_ms: 600,
            token_settle_ms: 0,
        }
    }
}

impl PacingConfig {
    /// 所有等待点都在下一次时钟推进时立即完成。
    pub fn instant() -> Self {
        Self {
            draw_delay_ms: 0,
            enemy_attack_delay_ms: 0,
            replan_delay_ms: 0,
            token_settle_ms: 0,
        }
    }
}

/// 单场战斗的全部可调参数与内容。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BattleConfig {
    pub max_energy: i32,
    pub cards_per_turn: u32,
    pub player_max_hp: i32,
    pub enemy_hp: EnemyHpConfig,
    pub power_multiplier: f64,
    pub pacing: PacingConfig,
    pub token_pool: Vec<i32>,
    pub planner: PlannerConfig,
    pub starting_deck: Vec<CardTemplate>,
    pub available_intents: Vec<EnemyIntentDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_energy: DEFAULT_MAX_ENERGY,
            cards_per_turn: DEFAULT_CARDS_PER_TURN,
            player_max_hp: DEFAULT_PLAYER_MAX_HP,
            enemy_hp: EnemyHpConfig::default(),
            power_multiplier: DEFAULT_POWER_MULTIPLIER,
            pacing: PacingConfig::default(),
            token_pool: vec![1, 2, 3, 4],
            planner: PlannerConfig::default(),
            starting_deck: Vec::new(),
            available_intents: Vec::new(),
            seed: None,
        }
    }
}

impl BattleConfig {
    /// 默认参数，附带起始牌组与一小组敌人招式。
    pub fn sample() -> Self {
        Self {
            starting_deck: STARTER_DECK.clone(),
            available_intents: ENEMY_INTENTS.clone(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BattleConfig = serde_json::from_str(json)?;
        if config.starting_deck.is_empty() {
            warn!("battle config has an empty starting deck");
        }
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_deck(mut self, deck: Vec<CardTemplate>) -> Self {
        self.starting_deck = deck;
        self
    }

    pub fn with_intents(mut self, intents: Vec<EnemyIntentDefinition>) -> Self {
        self.available_intents = intents;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = BattleConfig::from_json(
            r#"{
                "max_energy": 4,
                "enemy_hp": { "type": "Segmented", "maxima": [10, 10] },
                "pacing": { "draw_delay_ms": 0 },
                "starting_deck": [{ "id": "jab", "cost": 0, "damage": 2, "hit_count": 1 }]
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.max_energy, 4);
        assert_eq!(config.cards_per_turn, DEFAULT_CARDS_PER_TURN);
        assert_eq!(config.pacing.draw_delay_ms, 0);
        assert_eq!(config.pacing.enemy_attack_delay_ms, 800);
        assert_eq!(config.token_pool, vec![1, 2, 3, 4]);
        assert_eq!(config.starting_deck[0].damage, 2);
        assert!(config.enemy_hp.build().is_segmented());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let error = BattleConfig::from_json("{ not json").expect_err("should fail");
        assert!(error.to_string().starts_with("invalid battle config"));
    }

    #[test]
    fn sample_has_content() {
        let config = BattleConfig::sample();
        assert_eq!(config.starting_deck.len(), 11);
        assert!(config
            .available_intents
            .iter()
            .any(|intent| intent.charge_turns.is_some()));
    }
}
