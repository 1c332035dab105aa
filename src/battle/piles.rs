use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use super::cards::{CardInstance, CardTemplate, InstanceId};
use super::events::{BattleEvent, EventBus};

/// 抽牌堆、弃牌堆与手牌。每张实例在任意时刻只属于其中一处。
#[derive(Debug, Clone, Default)]
pub struct PileStore {
    draw_pile: VecDeque<CardInstance>,
    discard_pile: Vec<CardInstance>,
    hand: Vec<CardInstance>,
    next_id: InstanceId,
}

impl PileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按模板出现次数为每张卡创建新实例，重建抽牌堆。
    pub fn reset_deck<R: Rng + ?Sized>(&mut self, templates: &[Arc<CardTemplate>], rng: &mut R) {
        self.draw_pile.clear();
        self.discard_pile.clear();
        self.hand.clear();

        for template in templates {
            self.next_id += 1;
            self.draw_pile
                .push_back(CardInstance::new(self.next_id, Arc::clone(template)));
        }

        self.draw_pile.make_contiguous().shuffle(rng);
        debug!(draw = self.draw_pile.len(), "deck reset");
    }

    pub fn draw_one<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        events: &mut EventBus,
    ) -> Option<InstanceId> {
        if self.draw_pile.is_empty() {
            if self.discard_pile.is_empty() {
                debug!("both piles exhausted, nothing to draw");
                return None;
            }
            self.recycle_discard(rng, events);
        }

        let card = self.draw_pile.pop_front()?;
        let id = card.id;
        self.hand.push(card);
        events.record(BattleEvent::CardDrawn { instance: id });
        Some(id)
    }

    pub fn draw_multiple<R: Rng + ?Sized>(
        &mut self,
        count: u32,
        rng: &mut R,
        events: &mut EventBus,
    ) -> Vec<InstanceId> {
        let mut drawn = Vec::new();
        for _ in 0..count {
            match self.draw_one(rng, events) {
                Some(id) => drawn.push(id),
                None => break,
            }
        }
        drawn
    }

    fn recycle_discard<R: Rng + ?Sized>(&mut self, rng: &mut R, events: &mut EventBus) {
        let mut recycled = std::mem::take(&mut self.discard_pile);
        recycled.shuffle(rng);
        self.draw_pile.extend(recycled);
        debug!(draw = self.draw_pile.len(), "discard pile shuffled into draw pile");
        events.record(BattleEvent::PilesRecycled {
            draw_count: self.draw_pile.len(),
        });
    }

    pub fn discard_from_hand(&mut self, id: InstanceId, events: &mut EventBus) -> bool {
        let Some(pos) = self.hand_index(id) else {
            return false;
        };
        let card = self.hand.remove(pos);
        self.discard_pile.push(card);
        events.record(BattleEvent::CardDiscarded { instance: id });
        true
    }

    pub fn discard_hand(&mut self, events: &mut EventBus) -> usize {
        let count = self.hand.len();
        for card in self.hand.drain(..) {
            events.record(BattleEvent::CardDiscarded { instance: card.id });
            self.discard_pile.push(card);
        }
        debug!(
            discarded = count,
            draw = self.draw_pile.len(),
            discard = self.discard_pile.len(),
            "hand discarded"
        );
        count
    }

    /// 将实例彻底移出战斗，无论它当前位于哪个牌堆。
    pub fn remove_from_game(&mut self, id: InstanceId) -> Option<CardInstance> {
        if let Some(pos) = self.hand_index(id) {
            return Some(self.hand.remove(pos));
        }
        if let Some(pos) = self.draw_pile.iter().position(|card| card.id == id) {
            return self.draw_pile.remove(pos);
        }
        let pos = self.discard_pile.iter().position(|card| card.id == id)?;
        Some(self.discard_pile.remove(pos))
    }

    pub fn hand_index(&self, id: InstanceId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == id)
    }

    pub fn in_hand(&self, id: InstanceId) -> Option<&CardInstance> {
        self.hand.iter().find(|card| card.id == id)
    }

    pub fn find(&self, id: InstanceId) -> Option<&CardInstance> {
        self.hand
            .iter()
            .chain(self.draw_pile.iter())
            .chain(self.discard_pile.iter())
            .find(|card| card.id == id)
    }

    pub fn find_mut(&mut self, id: InstanceId) -> Option<&mut CardInstance> {
        self.hand
            .iter_mut()
            .chain(self.draw_pile.iter_mut())
            .chain(self.discard_pile.iter_mut())
            .find(|card| card.id == id)
    }

    pub fn hand(&self) -> &[CardInstance] {
        &self.hand
    }

    pub fn draw_pile(&self) -> impl Iterator<Item = &CardInstance> {
        self.draw_pile.iter()
    }

    pub fn discard_pile(&self) -> &[CardInstance] {
        &self.discard_pile
    }

    pub fn total(&self) -> usize {
        self.draw_pile.len() + self.discard_pile.len() + self.hand.len()
    }
}
