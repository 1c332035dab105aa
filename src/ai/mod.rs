//! 敌人决策：每回合敌人预告哪些意图。

pub mod planner;

pub use planner::{IntentPlanner, PlannerConfig};
