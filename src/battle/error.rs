use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cards::InstanceId;
use super::turns::TurnState;

/// 命令被拒绝的原因。被拒绝的命令不会改变任何战斗状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum ActionError {
    #[error("the battle is over")]
    BattleFinished,
    #[error("player cannot act while the turn state is {state:?}")]
    NotPlayerTurn { state: TurnState },
    #[error("card {instance} is not in hand")]
    CardNotInHand { instance: InstanceId },
    #[error("card costs {required} energy but only {available} is available")]
    InsufficientEnergy { required: i32, available: i32 },
    #[error("a previous card is still resolving")]
    ResolutionPending,
    #[error("no discard selection is open")]
    NoDiscardSelection,
    #[error("token selection is active")]
    TokenSelectionActive,
    #[error("token selection is not active")]
    NotSelectingToken,
    #[error("token target no longer exists")]
    UnknownTokenTarget,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid battle config: {0}")]
    Json(#[from] serde_json::Error),
}
