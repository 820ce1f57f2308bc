use crate::bot::Pick;
use crate::logic::PickOutcome;
use crate::state::{GameState, GameView, PlayerId, TableId};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---
// 这些是客户端可以发送给服务器的指令或动作。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    // --- 牌桌管理消息 ---
    /// 创建一张新牌桌，seats 为座位数 (3 或 4)，空位开局时由机器人补齐
    CreateTable { nickname: String, seats: Option<u8> },
    /// 加入一张已存在的牌桌
    JoinTable { table_id: TableId, nickname: String },

    // --- 游戏内消息 ---
    /// 开始新的一局 (仅房主)
    StartGame,
    /// 轮到自己时从指定玩家手中抽一张牌
    PickCard { target_idx: usize, card_idx: usize },
    /// 打乱自己手牌的顺序
    ShuffleHand,
    /// 请求一份当前状态的快照
    GetState,
}

// --- 服务器 -> 客户端 的消息 ---
// 这些是服务器在游戏状态改变后，广播给所有客户端的事件通知。

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ServerMessage {
    /// 成功加入或创建牌桌后，服务器私密地发给该玩家
    TableJoined {
        your_id: PlayerId,
        table_id: TableId,
        host_id: PlayerId,
        view: GameView, // 净化后的游戏状态
    },

    /// 完整游戏状态的快照。
    /// 每次状态转换后发送，发送前会调用 state.for_client(client_id) 隐藏别人的手牌。
    GameStateSnapshot(GameView),

    /// 一个新玩家入座
    PlayerJoined { player_id: PlayerId, nickname: String, seat: usize },

    /// 一个玩家离开了牌桌
    PlayerLeft { player_id: PlayerId },

    /// 新的一局开始
    GameStarted { first_player_id: PlayerId },

    /// 有玩家抽了一张牌。抽到的是哪张牌只通过快照告诉相关的人。
    CardPicked {
        actor_id: PlayerId,
        target_id: PlayerId,
        pairs_formed: usize,
    },

    /// 当前玩家没有可抽牌的对象，跳过回合
    TurnPassed { player_id: PlayerId },

    /// 轮到下一个玩家行动，target_idx 是他唯一可以抽牌的座位
    NextToAct { player_id: PlayerId, target_idx: Option<usize> },

    /// 游戏结束，loser 拿着小丑输了，其余所有人获胜
    GameOver { loser_id: Option<PlayerId>, winner_id: Option<PlayerId> },

    /// 服务器向特定客户端发送的提示与错误信息
    Info { message: String },
    Error { message: String },
}

impl From<Pick> for ClientMessage {
    fn from(pick: Pick) -> Self {
        ClientMessage::PickCard { target_idx: pick.target_idx, card_idx: pick.card_idx }
    }
}

/// 一次抽牌之后需要广播的事件
pub fn pick_events(state: &GameState, outcome: &PickOutcome) -> Vec<ServerMessage> {
    let mut messages = vec![ServerMessage::CardPicked {
        actor_id: state.players[outcome.actor_idx].id,
        target_id: state.players[outcome.target_idx].id,
        pairs_formed: outcome.pairs_formed,
    }];
    messages.extend(turn_events(state));
    messages
}

/// 根据当前状态生成 "轮到谁" 或 "游戏结束" 的事件
pub fn turn_events(state: &GameState) -> Vec<ServerMessage> {
    if state.is_game_over() {
        return vec![ServerMessage::GameOver {
            loser_id: state.loser_idx.map(|idx| state.players[idx].id),
            winner_id: state.winner_idx.map(|idx| state.players[idx].id),
        }];
    }
    match state.cur_player_idx {
        Some(idx) if state.is_playing() => vec![ServerMessage::NextToAct {
            player_id: state.players[idx].id,
            target_idx: state.selectable_target(idx),
        }],
        _ => vec![],
    }
}
