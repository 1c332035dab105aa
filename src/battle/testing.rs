//! 战斗单元测试共用的夹具。

use super::cards::CardTemplate;
use super::config::BattleConfig;
use super::intents::EnemyIntentDefinition;
use super::state::Battle;

/// 无效果的 0 费卡，用于只关心牌堆流转的测试。
pub fn filler_deck(count: usize) -> Vec<CardTemplate> {
    (0..count)
        .map(|i| CardTemplate::new(format!("wait-{i}"), "Wait", 0))
        .collect()
}

pub fn started(config: BattleConfig) -> Battle {
    let mut battle = Battle::new(config);
    battle.start();
    battle
}

/// 使用默认参数与固定种子的战斗，已开始并等待起手抽牌。
pub fn battle_with(deck: Vec<CardTemplate>, intents: Vec<EnemyIntentDefinition>) -> Battle {
    started(
        BattleConfig::default()
            .with_deck(deck)
            .with_intents(intents)
            .with_seed(7),
    )
}
