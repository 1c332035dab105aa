use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 单局战斗内唯一的卡牌实例标识。
pub type InstanceId = u32;

/// 内容制作阶段定义的卡牌模板，运行时不会被修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost: i32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub hit_count: i32,
    #[serde(default)]
    pub heal_amount: i32,
    /// 多段攻击每段之间的间隔（秒）。为 0 时所有段同步结算。
    #[serde(default)]
    pub hit_interval: f32,
    #[serde(default)]
    pub discard_count: i32,
    #[serde(default)]
    pub draw_count: i32,
    #[serde(default)]
    pub power_stacks_to_add: i32,
    #[serde(default)]
    pub triggers_token_selection: bool,
    /// 本回合出牌数超过该值时取消一个敌人意图。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_intent_threshold: Option<u32>,
    #[serde(default)]
    pub description: String,
}

impl CardTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, cost: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cost,
            damage: 0,
            hit_count: 1,
            heal_amount: 0,
            hit_interval: 0.0,
            discard_count: 0,
            draw_count: 0,
            power_stacks_to_add: 0,
            triggers_token_selection: false,
            cancel_intent_threshold: None,
            description: String::new(),
        }
    }

    pub fn with_damage(mut self, damage: i32, hit_count: i32) -> Self {
        self.damage = damage;
        self.hit_count = hit_count;
        self
    }

    pub fn with_hit_interval(mut self, seconds: f32) -> Self {
        self.hit_interval = seconds;
        self
    }

    pub fn with_heal(mut self, amount: i32) -> Self {
        self.heal_amount = amount;
        self
    }

    pub fn with_discard_then_draw(mut self, discard: i32, draw: i32) -> Self {
        self.discard_count = discard;
        self.draw_count = draw;
        self
    }

    pub fn with_power(mut self, stacks: i32) -> Self {
        self.power_stacks_to_add = stacks;
        self
    }

    pub fn with_token_selection(mut self) -> Self {
        self.triggers_token_selection = true;
        self
    }

    pub fn with_intent_cancel(mut self, threshold: u32) -> Self {
        self.cancel_intent_threshold = Some(threshold);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hit_interval_ms(&self) -> u64 {
        if self.hit_interval.is_finite() && self.hit_interval > 0.0 {
            (self.hit_interval * 1000.0).round() as u64
        } else {
            0
        }
    }
}

/// Token 可以改写的卡牌实例数值字段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardField {
    Cost,
    Damage,
    HitCount,
    HealAmount,
    DiscardCount,
    DrawCount,
    PowerStacks,
}

/// 战斗中流转的卡牌实例：数值从模板拷贝，可被 Token 修改。
#[derive(Debug, Clone, PartialEq)]
pub struct CardInstance {
    pub id: InstanceId,
    pub template: Arc<CardTemplate>,
    pub cost: i32,
    pub damage: i32,
    pub hit_count: i32,
    pub heal_amount: i32,
    pub discard_count: i32,
    pub draw_count: i32,
    pub power_stacks_to_add: i32,
}

impl CardInstance {
    pub fn new(id: InstanceId, template: Arc<CardTemplate>) -> Self {
        Self {
            id,
            cost: template.cost,
            damage: template.damage,
            hit_count: template.hit_count,
            heal_amount: template.heal_amount,
            discard_count: template.discard_count,
            draw_count: template.draw_count,
            power_stacks_to_add: template.power_stacks_to_add,
            template,
        }
    }

    pub fn field(&self, field: CardField) -> i32 {
        match field {
            CardField::Cost => self.cost,
            CardField::Damage => self.damage,
            CardField::HitCount => self.hit_count,
            CardField::HealAmount => self.heal_amount,
            CardField::DiscardCount => self.discard_count,
            CardField::DrawCount => self.draw_count,
            CardField::PowerStacks => self.power_stacks_to_add,
        }
    }

    pub fn set_field(&mut self, field: CardField, value: i32) {
        let value = value.max(0);
        match field {
            CardField::Cost => self.cost = value,
            CardField::Damage => self.damage = value,
            CardField::HitCount => self.hit_count = value,
            CardField::HealAmount => self.heal_amount = value,
            CardField::DiscardCount => self.discard_count = value,
            CardField::DrawCount => self.draw_count = value,
            CardField::PowerStacks => self.power_stacks_to_add = value,
        }
    }

    pub fn view(&self) -> CardView {
        CardView {
            instance: self.id,
            template_id: self.template.id.clone(),
            name: self.template.name.clone(),
            cost: self.cost,
            damage: self.damage,
            hit_count: self.hit_count,
            heal_amount: self.heal_amount,
            discard_count: self.discard_count,
            draw_count: self.draw_count,
            power_stacks_to_add: self.power_stacks_to_add,
            triggers_token_selection: self.template.triggers_token_selection,
            description: self.template.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardView {
    pub instance: InstanceId,
    pub template_id: String,
    pub name: String,
    pub cost: i32,
    pub damage: i32,
    pub hit_count: i32,
    pub heal_amount: i32,
    pub discard_count: i32,
    pub draw_count: i32,
    pub power_stacks_to_add: i32,
    pub triggers_token_selection: bool,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_copies_template_numbers_and_mutates_independently() {
        let template = Arc::new(CardTemplate::new("strike", "Strike", 1).with_damage(6, 1));
        let mut first = CardInstance::new(1, Arc::clone(&template));
        let second = CardInstance::new(2, Arc::clone(&template));

        first.set_field(CardField::Damage, 4);

        assert_eq!(first.damage, 4);
        assert_eq!(second.damage, 6, "sibling instance keeps template value");
        assert_eq!(template.damage, 6, "template is never touched");
    }

    #[test]
    fn field_writes_floor_at_zero() {
        let template = Arc::new(CardTemplate::new("defend", "Defend", 1));
        let mut card = CardInstance::new(7, template);
        card.set_field(CardField::Cost, -3);
        assert_eq!(card.field(CardField::Cost), 0);
    }

    #[test]
    fn hit_interval_converts_to_milliseconds() {
        let template = CardTemplate::new("flurry", "Flurry", 1)
            .with_damage(2, 3)
            .with_hit_interval(0.25);
        assert_eq!(template.hit_interval_ms(), 250);
        assert_eq!(CardTemplate::new("x", "X", 0).hit_interval_ms(), 0);
    }
}
