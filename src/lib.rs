pub mod ai;
pub mod battle;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Function, Promise};

pub use ai::{IntentPlanner, PlannerConfig};
pub use battle::{
    ActionError, Battle, BattleConfig, BattleContext, BattleEvent, BattleOutcome, BattleSnapshot,
    CardField, CardInstance, CardResolution, CardTemplate, ConfigError, DiscardProgress,
    EnemyHealth, EnemyHpConfig, EnemyIntentDefinition, EventBus, IntentEffect, IntentTiming,
    PacingConfig, PileStore, PlayerHealth, PowerBuff, ResourceLedger, TokenMediator, TokenTarget,
    TurnState,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: ActionError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

/// JS 侧的战斗句柄。表现层调用命令、推进时钟，并通过事件流刷新 UI。
#[wasm_bindgen]
pub struct BattleEngine {
    inner: Rc<RefCell<Battle>>,
}

#[wasm_bindgen]
impl BattleEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<BattleEngine, JsValue> {
        let config = match config_json {
            Some(json) => BattleConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => BattleConfig::sample(),
        };
        let mut battle = Battle::new(config);
        battle.start();
        Ok(BattleEngine {
            inner: Rc::new(RefCell::new(battle)),
        })
    }

    pub fn restart(&self) {
        self.inner.borrow_mut().start();
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        to_json(&self.inner.borrow().snapshot())
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.borrow().snapshot()).map_err(JsValue::from)
    }

    pub fn play_card(&self, instance: u32) -> Result<String, JsValue> {
        let resolution = self
            .inner
            .borrow_mut()
            .play_card(instance)
            .map_err(to_js_error)?;
        to_json(&resolution)
    }

    pub fn select_discard(&self, instance: u32) -> Result<String, JsValue> {
        let progress = self
            .inner
            .borrow_mut()
            .select_discard(instance)
            .map_err(to_js_error)?;
        to_json(&progress)
    }

    pub fn end_turn(&self) -> Result<(), JsValue> {
        self.inner.borrow_mut().end_player_turn().map_err(to_js_error)
    }

    pub fn begin_token_selection(&self) -> Result<bool, JsValue> {
        self.inner
            .borrow_mut()
            .begin_token_selection()
            .map_err(to_js_error)
    }

    /// 以 JSON 提名 Token 目标，例如 `{"type":"PowerStacks"}`。
    pub fn select_token_target_json(&self, target_json: &str) -> Result<Option<i32>, JsValue> {
        let target: TokenTarget = serde_json::from_str(target_json).map_err(serde_to_js_error)?;
        self.inner
            .borrow_mut()
            .select_token_target(target)
            .map_err(to_js_error)
    }

    pub fn cancel_token_selection(&self) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .cancel_token_selection()
            .map_err(to_js_error)
    }

    pub fn advance(&self, elapsed_ms: u32) {
        self.inner.borrow_mut().advance(u64::from(elapsed_ms));
    }

    pub fn settle(&self) {
        self.inner.borrow_mut().settle();
    }

    pub fn drain_events_json(&self) -> Result<String, JsValue> {
        to_json(&self.inner.borrow_mut().drain_events())
    }

    /// 把每个战斗事件以普通 JS 对象转发给 `callback`。
    /// 回调在命令执行期间同步触发，不能在回调里再调用引擎。
    pub fn on_event(&self, callback: Function) {
        self.inner.borrow_mut().subscribe(move |event| {
            let payload = match to_value(event) {
                Ok(payload) => payload,
                Err(error) => {
                    web_sys::console::warn_1(&error.into());
                    return;
                }
            };
            if let Err(error) = callback.call1(&JsValue::NULL, &payload) {
                web_sys::console::warn_1(&error);
            }
        });
    }

    /// 等待 `ms` 毫秒真实时间，再把战斗时钟推进同样的时长，
    /// Promise 以期间产生的事件（JSON）完成。
    pub fn pace(&self, ms: u32) -> Promise {
        let battle = Rc::clone(&self.inner);
        future_to_promise(async move {
            if ms > 0 {
                TimeoutFuture::new(ms).await;
            }
            let events = {
                let mut battle = battle.borrow_mut();
                battle.advance(u64::from(ms));
                battle.drain_events()
            };
            let json = to_json(&events)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 返回内置的示例战斗配置，方便前端调试或作为自定义配置的起点。
#[wasm_bindgen(js_name = "createSampleConfig")]
pub fn create_sample_config() -> Result<JsValue, JsValue> {
    to_value(&BattleConfig::sample()).map_err(JsValue::from)
}

/// 校验并补全一份战斗配置，缺省字段按默认值填充。
#[wasm_bindgen(js_name = "normalizeConfig")]
pub fn normalize_config(config: JsValue) -> Result<JsValue, JsValue> {
    let config: BattleConfig = from_value(config).map_err(JsValue::from)?;
    to_value(&config).map_err(JsValue::from)
}

/// 预览在指定力量层数下卡牌每段伤害。
#[wasm_bindgen(js_name = "previewDamage")]
pub fn preview_damage(base: i32, stacks: i32, multiplier: f64) -> i32 {
    let mut events = EventBus::new();
    let mut power = PowerBuff::new(multiplier);
    power.set_stacks(stacks, &mut events);
    power.modify_damage(base)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
