use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cards::{CardInstance, CardTemplate, CardView};
use super::combatant::{EnemyHealth, HpSegment, PlayerHealth, PowerBuff};
use super::config::BattleConfig;
use super::energy::ResourceLedger;
use super::error::ActionError;
use super::events::{BattleEvent, BattleOutcome, EventBus};
use super::intents::{EnemyIntentDefinition, IntentBoard, IntentRuntime, IntentView};
use super::piles::PileStore;
use super::resolver::{PendingDiscard, ResolverState};
use super::schedule::{ScheduledTask, Timeline};
use super::tokens::{TokenMediator, TokenPhase, TokenTarget};
use super::turns::{TurnMachine, TurnState};
use crate::ai::IntentPlanner;

/// 卡牌、意图与 Token 可以触及的全部可变战斗状态，显式传递而非全局单例。
#[derive(Debug)]
pub struct BattleContext {
    pub piles: PileStore,
    pub energy: ResourceLedger,
    pub player: PlayerHealth,
    pub enemy: EnemyHealth,
    pub power: PowerBuff,
    pub intents: IntentBoard,
    pub events: EventBus,
    pub rng: SmallRng,
}

impl BattleContext {
    pub fn new(config: &BattleConfig, rng: SmallRng) -> Self {
        Self {
            piles: PileStore::new(),
            energy: ResourceLedger::new(config.max_energy),
            player: PlayerHealth::new(config.player_max_hp),
            enemy: config.enemy_hp.build(),
            power: PowerBuff::new(config.power_multiplier),
            intents: IntentBoard::new(),
            events: EventBus::new(),
            rng,
        }
    }
}

/// 一场战斗：组件、回合状态机与时间轴的组合根。
///
/// 战斗由两类输入驱动：玩家命令（要么生效，要么无副作用地被拒绝），
/// 以及 [`Battle::advance`]（推进战斗时钟并执行该时间窗内到期的任务）。
#[derive(Debug)]
pub struct Battle {
    pub(crate) ctx: BattleContext,
    pub(crate) turns: TurnMachine,
    pub(crate) resolver: ResolverState,
    pub(crate) tokens: TokenMediator,
    pub(crate) planner: IntentPlanner,
    pub(crate) timeline: Timeline,
    pub(crate) config: BattleConfig,
    pub(crate) deck: Vec<Arc<CardTemplate>>,
    pub(crate) intent_pool: Vec<Arc<EnemyIntentDefinition>>,
    pub(crate) outcome: Option<BattleOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HpView {
    pub current: i32,
    pub max: i32,
}

/// 供表现层读取的战斗快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleSnapshot {
    pub now_ms: u64,
    pub turn_state: TurnState,
    pub turn_number: u32,
    pub cards_played: u32,
    pub energy: ResourceLedger,
    pub player: HpView,
    pub enemy: HpView,
    pub enemy_segments: Vec<HpSegment>,
    pub power_stacks: i32,
    pub hand: Vec<CardView>,
    pub draw_count: usize,
    /// 抽牌堆，按抽取顺序排列。
    pub draw: Vec<CardView>,
    pub discard: Vec<CardView>,
    pub intents: Vec<IntentView>,
    pub token_phase: TokenPhase,
    pub pending_discard: Option<PendingDiscard>,
    pub outcome: Option<BattleOutcome>,
}

impl Battle {
    pub fn new(config: BattleConfig) -> Self {
        let (rng, planner, tokens) = match config.seed {
            Some(seed) => (
                SmallRng::seed_from_u64(seed),
                IntentPlanner::with_seed(config.planner, seed.wrapping_add(1)),
                TokenMediator::with_seed(config.token_pool.clone(), seed.wrapping_add(2)),
            ),
            None => (
                SmallRng::from_entropy(),
                IntentPlanner::new(config.planner),
                TokenMediator::new(config.token_pool.clone()),
            ),
        };

        let deck = config
            .starting_deck
            .iter()
            .cloned()
            .map(Arc::new)
            .collect();
        let intent_pool = config
            .available_intents
            .iter()
            .cloned()
            .map(Arc::new)
            .collect();

        Self {
            ctx: BattleContext::new(&config, rng),
            turns: TurnMachine::new(),
            resolver: ResolverState::default(),
            tokens,
            planner,
            timeline: Timeline::new(),
            config,
            deck,
            intent_pool,
            outcome: None,
        }
    }

    /// 重置所有组件、重新洗牌、规划首批意图并排队发起手牌。重复调用即重开战斗。
    pub fn start(&mut self) {
        let ctx = &mut self.ctx;
        ctx.energy = ResourceLedger::new(self.config.max_energy);
        ctx.player = PlayerHealth::new(self.config.player_max_hp);
        ctx.enemy = self.config.enemy_hp.build();
        ctx.power = PowerBuff::new(self.config.power_multiplier);
        ctx.intents.clear(&mut ctx.events);
        ctx.piles.reset_deck(&self.deck, &mut ctx.rng);

        self.tokens.end_selection(&mut self.ctx.events);
        self.resolver.reset();
        self.timeline.clear();
        self.turns.transition(TurnState::Busy, &mut self.ctx.events);
        self.turns = TurnMachine::new();
        self.outcome = None;

        info!(
            deck = self.deck.len(),
            enemy_hp = self.ctx.enemy.max(),
            player_hp = self.ctx.player.max(),
            "battle started"
        );
        self.plan_next_intents();
        self.begin_player_turn();
    }

    /// 推进战斗时钟，执行期间到期的所有任务。
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.timeline.now_ms().saturating_add(elapsed_ms);
        while let Some(task) = self.timeline.pop_due(until) {
            self.run_task(task);
        }
        self.timeline.set_now(until);
    }

    /// 持续推进时钟直到队列为空，即战斗等待玩家输入或已经结束。
    pub fn settle(&mut self) {
        while let Some(due) = self.timeline.next_due_ms() {
            let elapsed = due.saturating_sub(self.timeline.now_ms());
            self.advance(elapsed);
        }
    }

    fn run_task(&mut self, task: ScheduledTask) {
        if self.outcome.is_some() {
            return;
        }
        match task {
            ScheduledTask::DealOpeningHand => self.deal_opening_hand(),
            ScheduledTask::EnemyAct => self.run_enemy_actions(),
            ScheduledTask::EnemyReplan => self.replan_and_hand_back(),
            ScheduledTask::Hit {
                damage,
                remaining,
                interval_ms,
            } => self.land_scheduled_hit(damage, remaining, interval_ms),
            ScheduledTask::ApplyToken { value, target } => self.land_token(value, target),
        }
    }

    /// 开启一次 Token 选择。池为空或已有选择进行中时返回 false。
    /// 多段攻击尚未落完时拒绝。
    pub fn begin_token_selection(&mut self) -> Result<bool, ActionError> {
        self.ensure_player_can_act()?;
        self.ensure_hits_landed()?;
        Ok(self.tokens.begin_selection(&mut self.ctx.events))
    }

    /// 为当前选择提名唯一目标。返回抽到的数值；抽到非正数时返回 `None` 且不写入。
    pub fn select_token_target(&mut self, target: TokenTarget) -> Result<Option<i32>, ActionError> {
        self.ensure_player_can_act()?;
        self.ensure_hits_landed()?;
        if !self.tokens.is_selecting() {
            return Err(self.reject(ActionError::NotSelectingToken));
        }
        if !target.is_available(&self.ctx) {
            return Err(self.reject(ActionError::UnknownTokenTarget));
        }

        let Some(value) = self.tokens.draw_for_nomination(&mut self.ctx.events) else {
            debug!(?target, "token draw was non-positive, nothing applied");
            return Ok(None);
        };

        let settle_ms = self.config.pacing.token_settle_ms;
        if settle_ms == 0 {
            self.land_token(value, target);
        } else {
            self.timeline
                .schedule(settle_ms, ScheduledTask::ApplyToken { value, target });
        }
        Ok(Some(value))
    }

    pub fn cancel_token_selection(&mut self) -> Result<(), ActionError> {
        if !self.tokens.is_selecting() {
            return Err(self.reject(ActionError::NotSelectingToken));
        }
        self.tokens.end_selection(&mut self.ctx.events);
        Ok(())
    }

    fn ensure_hits_landed(&self) -> Result<(), ActionError> {
        if self.resolver.hits_in_flight() {
            return Err(self.reject(ActionError::ResolutionPending));
        }
        Ok(())
    }

    fn land_token(&mut self, value: i32, target: TokenTarget) {
        if target.apply(value, &mut self.ctx) {
            info!(?target, value, "token applied");
        } else {
            warn!(?target, value, "token target vanished before the value landed");
        }
        self.tokens.end_selection(&mut self.ctx.events);
        self.settle_outcome();
    }

    /// 任一方死亡时记录战斗结果。战斗已结束时返回 true。
    pub(crate) fn settle_outcome(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        let outcome = if self.ctx.enemy.is_dead() {
            BattleOutcome::Victory
        } else if self.ctx.player.is_dead() {
            BattleOutcome::Defeat
        } else {
            return false;
        };

        info!(?outcome, turn = self.turns.turn_number(), "battle ended");
        self.outcome = Some(outcome);
        self.timeline.clear();
        self.resolver.reset();
        self.tokens.end_selection(&mut self.ctx.events);
        self.turns.transition(TurnState::Busy, &mut self.ctx.events);
        self.ctx.events.record(BattleEvent::BattleEnded { outcome });
        true
    }

    pub(crate) fn reject(&self, error: ActionError) -> ActionError {
        debug!(%error, state = ?self.turns.state(), "command rejected");
        error
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&BattleEvent) + 'static) {
        self.ctx.events.subscribe(listener);
    }

    pub fn drain_events(&mut self) -> Vec<BattleEvent> {
        self.ctx.events.drain()
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn context(&self) -> &BattleContext {
        &self.ctx
    }

    pub fn now_ms(&self) -> u64 {
        self.timeline.now_ms()
    }

    pub fn hand(&self) -> &[CardInstance] {
        self.ctx.piles.hand()
    }

    pub fn draw_pile(&self) -> impl Iterator<Item = &CardInstance> {
        self.ctx.piles.draw_pile()
    }

    pub fn discard_pile(&self) -> &[CardInstance] {
        self.ctx.piles.discard_pile()
    }

    pub fn energy(&self) -> &ResourceLedger {
        &self.ctx.energy
    }

    pub fn player_hp(&self) -> (i32, i32) {
        (self.ctx.player.current(), self.ctx.player.max())
    }

    pub fn enemy_hp(&self) -> (i32, i32) {
        (self.ctx.enemy.current(), self.ctx.enemy.max())
    }

    pub fn enemy_segments(&self) -> &[HpSegment] {
        self.ctx.enemy.segments()
    }

    pub fn power_stacks(&self) -> i32 {
        self.ctx.power.stacks()
    }

    pub fn intents(&self) -> &[IntentRuntime] {
        self.ctx.intents.active()
    }

    pub fn turn_state(&self) -> TurnState {
        self.turns.state()
    }

    pub fn turn_number(&self) -> u32 {
        self.turns.turn_number()
    }

    pub fn cards_played(&self) -> u32 {
        self.turns.cards_played()
    }

    pub fn token_phase(&self) -> TokenPhase {
        self.tokens.phase()
    }

    pub fn pending_discard(&self) -> Option<PendingDiscard> {
        self.resolver.pending_discard()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    pub fn snapshot(&self) -> BattleSnapshot {
        let ctx = &self.ctx;
        BattleSnapshot {
            now_ms: self.timeline.now_ms(),
            turn_state: self.turns.state(),
            turn_number: self.turns.turn_number(),
            cards_played: self.turns.cards_played(),
            energy: ctx.energy,
            player: HpView {
                current: ctx.player.current(),
                max: ctx.player.max(),
            },
            enemy: HpView {
                current: ctx.enemy.current(),
                max: ctx.enemy.max(),
            },
            enemy_segments: if ctx.enemy.is_segmented() {
                ctx.enemy.segments().to_vec()
            } else {
                Vec::new()
            },
            power_stacks: ctx.power.stacks(),
            hand: ctx.piles.hand().iter().map(CardInstance::view).collect(),
            draw_count: ctx.piles.draw_pile().count(),
            draw: ctx.piles.draw_pile().map(CardInstance::view).collect(),
            discard: ctx.piles.discard_pile().iter().map(CardInstance::view).collect(),
            intents: ctx.intents.views(),
            token_phase: self.tokens.phase(),
            pending_discard: self.resolver.pending_discard(),
            outcome: self.outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::battle::testing::{battle_with, filler_deck, started};
    use crate::battle::{CardField, CardTemplate, EnemyHpConfig, IntentEffect, PacingConfig};

    #[test]
    fn piles_conserve_cards_through_a_turn_cycle() {
        let mut battle = battle_with(filler_deck(12), Vec::new());
        for _ in 0..3 {
            battle.settle();
            let total = battle.hand().len() + battle.draw_pile().count() + battle.discard_pile().len();
            assert_eq!(total, 12);
            let id = battle.hand()[0].id;
            battle.play_card(id).expect("filler should resolve");
            battle.end_player_turn().expect("turn should end");
        }
    }

    #[test]
    fn segmented_enemy_overflows_into_the_next_bar() {
        let blast = CardTemplate::new("blast", "Blast", 0).with_damage(15, 1);
        let mut deck = vec![blast];
        deck.extend(filler_deck(4));
        let config = BattleConfig {
            enemy_hp: EnemyHpConfig::Segmented {
                maxima: vec![10, 10],
            },
            ..BattleConfig::default()
        };
        let mut battle = started(config.with_deck(deck).with_seed(2));
        battle.settle();

        let id = battle
            .hand()
            .iter()
            .find(|card| card.template.id == "blast")
            .map(|card| card.id)
            .expect("blast in hand");
        battle.play_card(id).expect("blast should resolve");

        let segments = battle.enemy_segments();
        assert_eq!(segments[0], HpSegment { current: 0, max: 10 });
        assert_eq!(segments[1], HpSegment { current: 5, max: 10 });
        assert_eq!(battle.outcome(), None);
    }

    #[test]
    fn charging_intent_fires_on_its_second_enemy_turn() {
        let slam = EnemyIntentDefinition::new("slam", IntentEffect::DamagePlayer, 20).charging(2);
        let mut battle = battle_with(filler_deck(10), vec![slam]);
        battle.settle();
        let charging_id = battle.intents()[0].id;

        battle.end_player_turn().expect("turn one ends");
        battle.settle();
        assert_eq!(battle.player_hp(), (80, 80));
        assert!(battle.intents().iter().any(|rt| rt.id == charging_id));

        battle.end_player_turn().expect("turn two ends");
        battle.settle();
        assert_eq!(battle.player_hp(), (60, 80));
        assert!(battle.intents().iter().all(|rt| rt.id != charging_id));
    }

    #[test]
    fn token_rewrites_a_card_in_hand() {
        let mut config = BattleConfig::default().with_deck(filler_deck(5)).with_seed(8);
        config.token_pool = vec![3];
        let mut battle = started(config);
        battle.settle();
        let id = battle.hand()[0].id;

        assert_eq!(battle.begin_token_selection(), Ok(true));
        let value = battle
            .select_token_target(TokenTarget::Card {
                instance: id,
                field: CardField::Damage,
            })
            .expect("selection should land");
        assert_eq!(value, Some(3));
        assert_eq!(battle.hand()[0].damage, 3);
        assert_eq!(battle.token_phase(), TokenPhase::Idle);

        assert_eq!(
            battle.select_token_target(TokenTarget::PowerStacks),
            Err(ActionError::NotSelectingToken)
        );
    }

    #[test]
    fn token_on_enemy_hp_can_end_the_battle() {
        let mut config = BattleConfig::default().with_deck(filler_deck(5)).with_seed(8);
        config.token_pool = vec![1];
        config.enemy_hp = EnemyHpConfig::Single { max: 50 };
        let mut battle = started(config);
        battle.settle();
        battle.ctx.enemy.take_damage(49, &mut battle.ctx.events);

        battle.begin_token_selection().expect("selection opens");
        battle
            .select_token_target(TokenTarget::EnemyMaxHp)
            .expect("selection should land");
        assert_eq!(battle.enemy_hp(), (1, 1));

        battle.begin_token_selection().expect("selection opens");
        battle.ctx.enemy.set_current(0, &mut battle.ctx.events);
        battle
            .select_token_target(TokenTarget::PowerStacks)
            .expect("selection should land");
        assert_eq!(battle.outcome(), Some(BattleOutcome::Victory));
    }

    #[test]
    fn missing_token_target_keeps_the_episode_open() {
        let mut battle = battle_with(filler_deck(5), Vec::new());
        battle.settle();
        battle.begin_token_selection().expect("selection opens");

        assert_eq!(
            battle.select_token_target(TokenTarget::IntentAmount { intent: 404 }),
            Err(ActionError::UnknownTokenTarget)
        );
        assert_eq!(
            battle.select_token_target(TokenTarget::EnemySegmentHp { index: 0 }),
            Err(ActionError::UnknownTokenTarget),
            "single-bar enemies have no addressable segments"
        );
        assert_eq!(battle.token_phase(), TokenPhase::Selecting);

        battle.cancel_token_selection().expect("selection cancels");
        assert_eq!(battle.token_phase(), TokenPhase::Idle);
    }

    #[test]
    fn settling_token_lands_after_its_delay() {
        let mut config = BattleConfig::default().with_deck(filler_deck(5)).with_seed(4);
        config.token_pool = vec![2];
        config.pacing = PacingConfig {
            token_settle_ms: 300,
            ..PacingConfig::default()
        };
        let mut battle = started(config);
        battle.settle();

        battle.begin_token_selection().expect("selection opens");
        battle
            .select_token_target(TokenTarget::MaxEnergy)
            .expect("value drawn");
        assert_eq!(battle.token_phase(), TokenPhase::Applying);
        assert_eq!(battle.energy().max(), 3);
        assert_eq!(
            battle.play_card(battle.hand()[0].id),
            Err(ActionError::TokenSelectionActive)
        );

        battle.advance(300);
        assert_eq!(battle.energy().max(), 2);
        assert_eq!(battle.energy().current(), 2);
        assert_eq!(battle.token_phase(), TokenPhase::Idle);
    }

    #[test]
    fn token_nomination_waits_for_paced_hits() {
        let flurry = CardTemplate::new("flurry", "Flurry", 0)
            .with_damage(3, 3)
            .with_hit_interval(0.1)
            .with_token_selection();
        let mut deck = vec![flurry];
        deck.extend(filler_deck(4));
        let mut config = BattleConfig::default().with_deck(deck).with_seed(5);
        config.token_pool = vec![4];
        config.enemy_hp = EnemyHpConfig::Single { max: 50 };
        let mut battle = started(config);
        battle.settle();

        let id = battle
            .hand()
            .iter()
            .find(|card| card.template.id == "flurry")
            .map(|card| card.id)
            .expect("flurry in hand");
        let resolution = battle.play_card(id).expect("flurry should resolve");
        assert!(resolution.token_selection_opened);
        assert_eq!(battle.enemy_hp(), (47, 50));

        assert_eq!(
            battle.select_token_target(TokenTarget::EnemyCurrentHp),
            Err(ActionError::ResolutionPending)
        );
        assert_eq!(
            battle.begin_token_selection(),
            Err(ActionError::ResolutionPending)
        );
        assert_eq!(battle.enemy_hp(), (47, 50), "rejected nomination writes nothing");
        assert_eq!(battle.token_phase(), TokenPhase::Selecting);

        battle.advance(100);
        battle.advance(100);
        assert_eq!(battle.enemy_hp(), (41, 50));

        assert_eq!(
            battle.select_token_target(TokenTarget::EnemyCurrentHp),
            Ok(Some(4))
        );
        assert_eq!(battle.enemy_hp(), (4, 50));
        assert_eq!(battle.token_phase(), TokenPhase::Idle);
        assert_eq!(battle.outcome(), None);
    }

    #[test]
    fn listeners_see_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut battle = Battle::new(BattleConfig::default().with_deck(filler_deck(5)).with_seed(1));
        let sink = Rc::clone(&seen);
        battle.subscribe(move |event| {
            if let BattleEvent::TurnStateChanged { state } = event {
                sink.borrow_mut().push(*state);
            }
        });
        battle.start();
        battle.settle();
        battle.end_player_turn().expect("turn ends");
        battle.settle();

        assert_eq!(
            *seen.borrow(),
            vec![
                TurnState::PlayerTurn,
                TurnState::Busy,
                TurnState::EnemyTurn,
                TurnState::Busy,
                TurnState::PlayerTurn,
            ]
        );
    }

    #[test]
    fn snapshot_serializes_for_the_presentation_layer() {
        let mut battle = battle_with(filler_deck(7), Vec::new());
        battle.settle();
        let snapshot = battle.snapshot();
        assert_eq!(snapshot.turn_state, TurnState::PlayerTurn);
        assert_eq!(snapshot.hand.len(), 5);
        assert_eq!(snapshot.draw_count, 2);
        let expected: Vec<_> = battle.draw_pile().map(CardInstance::view).collect();
        assert_eq!(snapshot.draw, expected);
        assert!(snapshot.enemy_segments.is_empty());

        let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(json["player"]["current"], 80);
        assert_eq!(json["turn_state"], "PlayerTurn");
    }

    #[test]
    fn restart_resets_every_component() {
        let mut battle = battle_with(filler_deck(6), Vec::new());
        battle.settle();
        battle.ctx.player.take_damage(30, &mut battle.ctx.events);
        battle.end_player_turn().expect("turn ends");

        battle.start();
        battle.settle();
        assert_eq!(battle.player_hp(), (80, 80));
        assert_eq!(battle.turn_number(), 1);
        assert_eq!(battle.hand().len(), 5);
        assert_eq!(battle.discard_pile().len(), 0);
    }
}
