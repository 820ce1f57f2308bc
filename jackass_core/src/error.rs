use crate::state::PlayerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 非法操作。
/// 总是可恢复的：拒绝时不修改任何状态，只通知发起操作的玩家。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IllegalMove {
    #[error("游戏尚未开始或已经结束")]
    GameNotInProgress,
    #[error("游戏已经开始")]
    GameAlreadyStarted,
    #[error("玩家 {0} 不在这张牌桌上")]
    UnknownPlayer(PlayerId),
    #[error("还没有轮到玩家 {0}")]
    NotYourTurn(PlayerId),
    #[error("只能从 {expected} 号玩家处抽牌，而不是 {requested} 号")]
    WrongTarget { expected: usize, requested: usize },
    #[error("没有可以抽牌的玩家")]
    NoSelectableTarget,
    #[error("还可以从 {0} 号玩家处抽牌，不能跳过回合")]
    TargetAvailable(usize),
    #[error("座位 {0} 不存在")]
    NoSuchSeat(usize),
    #[error("{0} 号玩家手上没有牌")]
    EmptyHand(usize),
    #[error("牌的位置 {index} 越界 (手牌共 {len} 张)")]
    CardIndexOutOfRange { index: usize, len: usize },
    #[error("牌桌已满")]
    TableFull,
    #[error("玩家人数必须在 {min} 到 {max} 之间，当前为 {count}")]
    InvalidPlayerCount { count: usize, min: usize, max: usize },
}

/// 不变量被破坏，说明牌堆构造或配对逻辑有 bug。
/// 必须记录下来，绝不能当作正常的胜负结果接受。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum InvariantViolation {
    #[error("只剩 {0} 号玩家有牌，但小丑不在他手里")]
    LoneHandWithoutJoker(usize),
    #[error("牌数不守恒：期望 {expected} 张，实际 {found} 张")]
    CardCountMismatch { expected: usize, found: usize },
    #[error("{0} 号玩家的对子里出现了小丑")]
    JokerPaired(usize),
    #[error("所有人的手牌都空了，小丑不见了")]
    JokerMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error(transparent)]
    Illegal(#[from] IllegalMove),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl GameError {
    pub fn is_illegal_move(&self) -> bool {
        matches!(self, GameError::Illegal(_))
    }
}
