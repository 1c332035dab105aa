use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cards::{CardInstance, InstanceId};
use super::error::ActionError;
use super::events::BattleEvent;
use super::intents::{IntentId, IntentTiming};
use super::schedule::ScheduledTask;
use super::state::Battle;

/// 等待玩家选择的“弃 N 张再抽 M 张”请求。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingDiscard {
    pub remaining: u32,
    pub draw_after: u32,
}

/// 卡牌结算后遗留的未完成工作。存在未完成工作时玩家不能出牌或结束回合。
#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    pending_discard: Option<PendingDiscard>,
    hits_in_flight: bool,
}

impl ResolverState {
    pub fn is_outstanding(&self) -> bool {
        self.pending_discard.is_some() || self.hits_in_flight
    }

    pub fn pending_discard(&self) -> Option<PendingDiscard> {
        self.pending_discard
    }

    pub fn hits_in_flight(&self) -> bool {
        self.hits_in_flight
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 一次成功出牌的结算结果，补充事件流之外的信息。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardResolution {
    pub instance: InstanceId,
    pub damage_per_hit: i32,
    pub hits_landed: u32,
    pub hits_scheduled: u32,
    pub healed: i32,
    pub power_added: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_intent: Option<IntentId>,
    pub token_selection_opened: bool,
    pub discard_required: u32,
    pub drawn: Vec<InstanceId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscardProgress {
    pub remaining: u32,
    pub drawn: Vec<InstanceId>,
}

impl Battle {
    /// 从手牌打出一张卡。任何拒绝都不会改变战斗状态。
    pub fn play_card(&mut self, instance: InstanceId) -> Result<CardResolution, ActionError> {
        self.ensure_player_can_act()?;
        if self.resolver.is_outstanding() {
            return Err(self.reject(ActionError::ResolutionPending));
        }
        if self.tokens.is_busy() {
            return Err(self.reject(ActionError::TokenSelectionActive));
        }
        let Some(card) = self.ctx.piles.in_hand(instance).cloned() else {
            return Err(self.reject(ActionError::CardNotInHand { instance }));
        };
        if !self.ctx.energy.try_pay(card.cost, &mut self.ctx.events) {
            let available = self.ctx.energy.current();
            self.ctx.events.record(BattleEvent::CardResolved {
                instance,
                success: false,
            });
            return Err(self.reject(ActionError::InsufficientEnergy {
                required: card.cost,
                available,
            }));
        }

        let played = self.turns.record_card_played();
        info!(instance, card = %card.template.id, cost = card.cost, played, "card played");
        self.ctx.events.record(BattleEvent::CardPlayed {
            instance,
            template_id: card.template.id.clone(),
        });

        let mut resolution = CardResolution {
            instance,
            ..CardResolution::default()
        };
        self.strike(&card, &mut resolution);

        if card.heal_amount > 0 {
            resolution.healed = self.ctx.player.heal(card.heal_amount, &mut self.ctx.events);
        }
        if card.power_stacks_to_add > 0 {
            self.ctx
                .power
                .add_stacks(card.power_stacks_to_add, &mut self.ctx.events);
            resolution.power_added = card.power_stacks_to_add;
        }
        if let Some(threshold) = card.template.cancel_intent_threshold {
            // 正在打出的这张牌也计入出牌数。
            if played > threshold {
                resolution.canceled_intent = self.ctx.intents.cancel_one(&mut self.ctx.events);
            }
        }
        if card.template.triggers_token_selection {
            resolution.token_selection_opened = self.tokens.begin_selection(&mut self.ctx.events);
        }

        self.ctx.piles.discard_from_hand(instance, &mut self.ctx.events);
        self.discard_then_draw(&card, &mut resolution);

        let ctx = &mut self.ctx;
        ctx.intents.handle_trigger(
            IntentTiming::PlayerCardPlayed,
            &mut ctx.player,
            &mut ctx.events,
        );
        ctx.events.record(BattleEvent::CardResolved {
            instance,
            success: true,
        });
        self.settle_outcome();
        Ok(resolution)
    }

    /// 为当前弃牌请求弃掉一张牌。选满后才执行后续抽牌。
    pub fn select_discard(&mut self, instance: InstanceId) -> Result<DiscardProgress, ActionError> {
        if self.outcome.is_some() {
            return Err(self.reject(ActionError::BattleFinished));
        }
        let Some(mut pending) = self.resolver.pending_discard else {
            return Err(self.reject(ActionError::NoDiscardSelection));
        };
        if !self.ctx.piles.discard_from_hand(instance, &mut self.ctx.events) {
            return Err(self.reject(ActionError::CardNotInHand { instance }));
        }

        pending.remaining = pending.remaining.saturating_sub(1);
        let mut progress = DiscardProgress {
            remaining: pending.remaining,
            drawn: Vec::new(),
        };
        if pending.remaining > 0 {
            self.resolver.pending_discard = Some(pending);
            return Ok(progress);
        }

        self.resolver.pending_discard = None;
        self.ctx.events.record(BattleEvent::DiscardSelectionFinished);
        let ctx = &mut self.ctx;
        progress.drawn = ctx
            .piles
            .draw_multiple(pending.draw_after, &mut ctx.rng, &mut ctx.events);
        debug!(drawn = progress.drawn.len(), "discard selection complete");
        Ok(progress)
    }

    fn strike(&mut self, card: &CardInstance, resolution: &mut CardResolution) {
        if card.damage <= 0 {
            return;
        }
        let per_hit = self.ctx.power.modify_damage(card.damage);
        let hits = card.hit_count.max(1) as u32;
        let interval_ms = card.template.hit_interval_ms();
        resolution.damage_per_hit = per_hit;

        if hits > 1 && interval_ms > 0 {
            self.ctx.enemy.take_damage(per_hit, &mut self.ctx.events);
            resolution.hits_landed = 1;
            if !self.ctx.enemy.is_dead() {
                self.resolver.hits_in_flight = true;
                resolution.hits_scheduled = hits - 1;
                self.timeline.schedule(
                    interval_ms,
                    ScheduledTask::Hit {
                        damage: per_hit,
                        remaining: hits - 1,
                        interval_ms,
                    },
                );
            }
            return;
        }

        for _ in 0..hits {
            if self.ctx.enemy.is_dead() {
                break;
            }
            self.ctx.enemy.take_damage(per_hit, &mut self.ctx.events);
            resolution.hits_landed += 1;
        }
    }

    pub(crate) fn land_scheduled_hit(&mut self, damage: i32, remaining: u32, interval_ms: u64) {
        if !self.ctx.enemy.is_dead() {
            self.ctx.enemy.take_damage(damage, &mut self.ctx.events);
        }
        let remaining = remaining.saturating_sub(1);
        if remaining > 0 && !self.ctx.enemy.is_dead() {
            self.timeline.schedule(
                interval_ms,
                ScheduledTask::Hit {
                    damage,
                    remaining,
                    interval_ms,
                },
            );
        } else {
            self.resolver.hits_in_flight = false;
            debug!(interrupted = remaining > 0, "multi-hit finished");
        }
        self.settle_outcome();
    }

    fn discard_then_draw(&mut self, card: &CardInstance, resolution: &mut CardResolution) {
        let discard = card.discard_count.max(0) as u32;
        let draw = card.draw_count.max(0) as u32;

        if discard > 0 {
            let required = discard.min(self.ctx.piles.hand().len() as u32);
            if required > 0 {
                self.resolver.pending_discard = Some(PendingDiscard {
                    remaining: required,
                    draw_after: draw,
                });
                resolution.discard_required = required;
                self.ctx
                    .events
                    .record(BattleEvent::DiscardSelectionStarted { count: required });
                return;
            }
            debug!("hand is empty, discard requirement waived");
        }

        if draw > 0 {
            let ctx = &mut self.ctx;
            resolution.drawn = ctx.piles.draw_multiple(draw, &mut ctx.rng, &mut ctx.events);
        }
    }
}
