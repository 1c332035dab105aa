use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ActionError;
use super::events::{BattleEvent, EventBus};
use super::intents::IntentTiming;
use super::schedule::ScheduledTask;
use super::state::Battle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TurnState {
    PlayerTurn,
    EnemyTurn,
    #[default]
    Busy,
}

/// 回合状态机：玩家回合 → 敌人回合 → 玩家回合，过渡期间为 Busy。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnMachine {
    state: TurnState,
    turn_number: u32,
    cards_played: u32,
}

impl TurnMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn can_player_act(&self) -> bool {
        self.state == TurnState::PlayerTurn
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn cards_played(&self) -> u32 {
        self.cards_played
    }

    pub fn record_card_played(&mut self) -> u32 {
        self.cards_played += 1;
        self.cards_played
    }

    pub fn transition(&mut self, state: TurnState, events: &mut EventBus) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "turn state changed");
        self.state = state;
        if state == TurnState::PlayerTurn {
            self.turn_number += 1;
            self.cards_played = 0;
        }
        events.record(BattleEvent::TurnStateChanged { state });
    }
}

impl Battle {
    /// 回满能量并排队起手抽牌，抽牌完成后玩家才能行动。
    pub(crate) fn begin_player_turn(&mut self) {
        self.turns.transition(TurnState::Busy, &mut self.ctx.events);
        self.ctx.energy.start_turn(&mut self.ctx.events);
        self.timeline
            .schedule(self.config.pacing.draw_delay_ms, ScheduledTask::DealOpeningHand);
    }

    pub(crate) fn deal_opening_hand(&mut self) {
        let count = self.config.cards_per_turn;
        let ctx = &mut self.ctx;
        let drawn = ctx.piles.draw_multiple(count, &mut ctx.rng, &mut ctx.events);
        self.turns.transition(TurnState::PlayerTurn, &mut self.ctx.events);
        info!(
            turn = self.turns.turn_number(),
            drawn = drawn.len(),
            "player turn started"
        );
    }

    pub fn can_player_act(&self) -> bool {
        self.outcome.is_none() && self.turns.can_player_act()
    }

    /// 结束玩家回合：力量衰减、弃掉手牌，然后排队敌人回合。
    pub fn end_player_turn(&mut self) -> Result<(), ActionError> {
        self.ensure_player_can_act()?;
        if self.resolver.is_outstanding() {
            return Err(self.reject(ActionError::ResolutionPending));
        }
        if self.tokens.is_busy() {
            return Err(self.reject(ActionError::TokenSelectionActive));
        }

        info!(turn = self.turns.turn_number(), "player ended turn");
        self.turns.transition(TurnState::Busy, &mut self.ctx.events);
        self.ctx.power.decay(&mut self.ctx.events);
        self.ctx.piles.discard_hand(&mut self.ctx.events);
        self.ctx.intents.handle_trigger(
            IntentTiming::PlayerTurnEnd,
            &mut self.ctx.player,
            &mut self.ctx.events,
        );
        if self.settle_outcome() {
            return Ok(());
        }

        self.turns.transition(TurnState::EnemyTurn, &mut self.ctx.events);
        self.timeline.schedule(
            self.config.pacing.enemy_attack_delay_ms,
            ScheduledTask::EnemyAct,
        );
        Ok(())
    }

    pub(crate) fn run_enemy_actions(&mut self) {
        debug!("enemy acting");
        let ctx = &mut self.ctx;
        ctx.intents.execute_turn_start(&mut ctx.player, &mut ctx.events);
        ctx.intents
            .handle_trigger(IntentTiming::EnemyTurnEnd, &mut ctx.player, &mut ctx.events);
        if self.settle_outcome() {
            return;
        }
        self.timeline
            .schedule(self.config.pacing.replan_delay_ms, ScheduledTask::EnemyReplan);
    }

    pub(crate) fn replan_and_hand_back(&mut self) {
        self.turns.transition(TurnState::Busy, &mut self.ctx.events);
        if self.settle_outcome() {
            return;
        }
        self.plan_next_intents();
        self.begin_player_turn();
    }

    pub(crate) fn plan_next_intents(&mut self) {
        let batch = self.planner.choose_batch(&self.intent_pool);
        self.ctx.intents.replace_batch(batch, &mut self.ctx.events);
    }

    pub(crate) fn ensure_player_can_act(&self) -> Result<(), ActionError> {
        if self.outcome.is_some() {
            return Err(self.reject(ActionError::BattleFinished));
        }
        if !self.turns.can_player_act() {
            let state = self.turns.state();
            return Err(self.reject(ActionError::NotPlayerTurn { state }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::testing::{battle_with, filler_deck};
    use crate::battle::{BattleEvent, BattleOutcome, EnemyIntentDefinition, IntentEffect};

    #[test]
    fn battle_opens_busy_then_deals_hand() {
        let mut battle = battle_with(filler_deck(10), Vec::new());
        assert_eq!(battle.turn_state(), TurnState::Busy);
        assert!(!battle.can_player_act());
        assert_eq!(battle.energy().current(), 3);

        battle.advance(200);

        assert_eq!(battle.turn_state(), TurnState::PlayerTurn);
        assert_eq!(battle.hand().len(), 5);
        assert_eq!(battle.turn_number(), 1);
    }

    #[test]
    fn end_turn_is_rejected_outside_player_turn() {
        let mut battle = battle_with(filler_deck(10), Vec::new());
        assert_eq!(
            battle.end_player_turn(),
            Err(ActionError::NotPlayerTurn {
                state: TurnState::Busy
            })
        );
    }

    #[test]
    fn full_round_trip_discards_hand_runs_enemy_and_redeals() {
        let intents = vec![EnemyIntentDefinition::new("bite", IntentEffect::DamagePlayer, 5)];
        let mut battle = battle_with(filler_deck(12), intents);
        battle.advance(200);
        battle.ctx.power.set_stacks(5, &mut battle.ctx.events);

        battle.end_player_turn().expect("player turn should end");
        assert_eq!(battle.turn_state(), TurnState::EnemyTurn);
        assert!(battle.hand().is_empty());
        assert_eq!(battle.discard_pile().len(), 5);
        assert_eq!(battle.power_stacks(), 2);
        assert_eq!(battle.player_hp(), (80, 80), "enemy waits for its attack delay");

        battle.advance(800);
        assert_eq!(battle.player_hp(), (75, 80));
        assert_eq!(battle.turn_state(), TurnState::EnemyTurn);

        battle.advance(600);
        assert_eq!(battle.turn_state(), TurnState::Busy);
        assert_eq!(battle.intents().len(), 1, "a fresh intent is planned");

        battle.advance(200);
        assert_eq!(battle.turn_state(), TurnState::PlayerTurn);
        assert_eq!(battle.turn_number(), 2);
        assert_eq!(battle.hand().len(), 5);
        assert_eq!(battle.energy().current(), 3);
    }

    #[test]
    fn player_death_halts_the_loop_in_busy() {
        let intents = vec![EnemyIntentDefinition::new("execute", IntentEffect::DamagePlayer, 500)];
        let mut battle = battle_with(filler_deck(10), intents);
        battle.settle();

        battle.end_player_turn().expect("player turn should end");
        battle.settle();

        assert_eq!(battle.turn_state(), TurnState::Busy);
        assert_eq!(battle.outcome(), Some(BattleOutcome::Defeat));
        assert!(battle.timeline.is_empty(), "no further turns are queued");
        assert_eq!(battle.end_player_turn(), Err(ActionError::BattleFinished));
        let ended = battle
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, BattleEvent::BattleEnded { .. }))
            .count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn played_card_counter_resets_each_player_turn() {
        let mut battle = battle_with(filler_deck(10), Vec::new());
        battle.settle();
        let first = battle.hand()[0].id;
        battle.play_card(first).expect("free card should resolve");
        assert_eq!(battle.cards_played(), 1);

        battle.end_player_turn().expect("turn should end");
        battle.settle();
        assert_eq!(battle.turn_state(), TurnState::PlayerTurn);
        assert_eq!(battle.cards_played(), 0);
    }

    #[test]
    fn player_turn_end_intents_fire_when_turn_ends() {
        let spite = EnemyIntentDefinition::new("spite", IntentEffect::DamagePlayer, 2)
            .with_timing(IntentTiming::PlayerTurnEnd);
        let mut battle = battle_with(filler_deck(10), vec![spite]);
        battle.settle();

        battle.end_player_turn().expect("turn should end");
        assert_eq!(battle.player_hp(), (78, 80));
    }
}
