use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex as P_Mutex, RwLock as P_RwLock};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use jackass_core::{
    BotTurn, GameError, GameState, GameView, IllegalMove, PlayerId, PlayerKind, ServerMessage, TableId,
    ThinkingDelay, pick_events, play_turn, turn_events,
};

use crate::config::ServerConfig;

/// 空位由这些机器人补齐
const BOT_NAMES: [&str; 3] = ["CardBot 3000", "ShuffleTron", "JokerBuster X"];

// 服务器全局状态：牌桌 ID -> 牌桌。
// 第一个玩家创建牌桌时插入，最后一个连接断开时移除。
pub struct AppState {
    pub tables: DashMap<TableId, Arc<Table>>,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

// 单张牌桌的状态
// 重要‼️：严格规定使用锁的顺序，避免死锁：
// players -> host_id -> game_state
// game_state 是同步锁，持有期间绝不能 .await
pub struct Table {
    pub id: TableId,
    pub seats: usize,
    pub game_state: P_Mutex<GameState>,
    pub host_id: P_RwLock<PlayerId>,
    // 将 PlayerId 映射到具体的网络连接，机器人没有连接
    pub players: RwLock<HashMap<PlayerId, PlayerConnection>>,
}

// 玩家的网络连接信息
pub struct PlayerConnection {
    // 用于向该玩家的 WebSocket 任务发送消息的通道
    pub sender: mpsc::Sender<ServerMessage>,
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("牌桌不存在")]
    NotFound,
    #[error("你已经在一张牌桌上了")]
    AlreadySeated,
    #[error("请先加入或创建牌桌")]
    NotSeated,
    #[error("只有房主可以开始游戏")]
    NotHost,
    #[error(transparent)]
    Game(#[from] GameError),
}

impl From<IllegalMove> for TableError {
    fn from(e: IllegalMove) -> Self {
        TableError::Game(e.into())
    }
}

/// 待发送的消息及其接收范围
#[derive(Debug)]
pub enum Outbound {
    /// 只发给发起请求的玩家
    Reply(ServerMessage),
    /// 原样发给牌桌上所有人
    Broadcast(ServerMessage),
    /// 为每个人单独生成的状态快照
    Snapshot,
}

/// 先发快照，再广播事件
fn with_snapshot(events: Vec<ServerMessage>) -> Vec<Outbound> {
    std::iter::once(Outbound::Snapshot).chain(events.into_iter().map(Outbound::Broadcast)).collect()
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        AppState { tables: DashMap::new(), config }
    }

    pub fn table(&self, table_id: &TableId) -> Result<Arc<Table>, TableError> {
        self.tables.get(table_id).map(|t| t.clone()).ok_or(TableError::NotFound)
    }

    /// 创建牌桌，创建者成为房主并坐在 0 号座位
    pub fn create_table(
        &self,
        player_id: PlayerId,
        nickname: String,
        seats: Option<u8>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Arc<Table>, TableError> {
        let table_id = Uuid::new_v4();
        let mut game_state = GameState::new(table_id);
        game_state.seat_player(player_id, nickname, PlayerKind::Remote)?;

        let mut table = Table {
            id: table_id,
            seats: self.config.seats_for(seats),
            game_state: P_Mutex::new(game_state),
            host_id: P_RwLock::new(player_id),
            players: RwLock::new(HashMap::new()),
        };
        table.players.get_mut().insert(player_id, PlayerConnection { sender });

        let table = Arc::new(table);
        self.tables.insert(table_id, table.clone());
        info!("玩家 {} 创建了新牌桌 {} ({} 个座位)", player_id, table_id, table.seats);
        Ok(table)
    }

    /// 加入已存在的牌桌，返回牌桌和座位号
    pub async fn join_table(
        &self,
        table_id: TableId,
        player_id: PlayerId,
        nickname: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(Arc<Table>, usize), TableError> {
        let table = self.table(&table_id)?;
        let seat;
        {  // players write lock
            let mut r_players = table.players.write().await;
            {  // game_state lock
                let mut game_state = table.game_state.lock();
                if game_state.occupied_seats() >= table.seats {
                    return Err(IllegalMove::TableFull.into());
                }
                seat = game_state.seat_player(player_id, nickname, PlayerKind::Remote)?;
            }
            r_players.insert(player_id, PlayerConnection { sender });
        }
        info!("玩家 {} 加入了牌桌 {}", player_id, table_id);
        Ok((table, seat))
    }

    /// 玩家断开连接后的处理
    ///
    /// - 从连接映射和牌局中移除该玩家 (牌局中按离开处理，见 GameState::remove_player)；
    /// - 房主断开时转移房主；
    /// - 最后一个连接断开时销毁牌桌。
    pub async fn handle_disconnect(&self, table_id: TableId, player_id: PlayerId) {
        info!("玩家 {} 从牌桌 {} 断开连接", player_id, table_id);
        let Ok(table) = self.table(&table_id) else { return };

        let outs;
        let is_empty;
        {  // players write lock
            let mut r_players = table.players.write().await;
            r_players.remove(&player_id);
            outs = table.remove_player(player_id);
            is_empty = r_players.is_empty();
        }

        if is_empty {
            self.tables.remove(&table_id);
            info!("牌桌 {} 已空，已被移除", table_id);
            return;
        }

        table.dispatch(outs, None).await;

        {  // players read lock
            let r_players = table.players.read().await;
            let host_id = *table.host_id.read();
            if player_id == host_id {
                if let Some(new_host_id) = r_players.keys().next().cloned() {
                    *table.host_id.write() = new_host_id;
                    let info_msg = ServerMessage::Info {
                        message: format!(
                            "房主已断开，新房主是 {}",
                            table.game_state.lock().players.iter()
                                .find(|p| p.id == new_host_id)
                                .map_or("未知玩家", |p| p.nickname.as_str())
                        ),
                    };
                    broadcast(r_players.iter(), &info_msg, None).await;
                    info!("牌桌 {} 的房主已转移给 {}", table_id, new_host_id);
                }
            }
        }

        table.schedule_bot_turn(self.config.bot_delay);
    }
}

impl Table {
    pub fn snapshot_for(&self, player_id: &PlayerId) -> GameView {
        self.game_state.lock().for_client(player_id)
    }

    /// 新玩家入座后通知其他人，并刷新所有人的快照以包含新座位
    pub fn join_announcement(&self, player_id: PlayerId, nickname: String, seat: usize) -> Vec<Outbound> {
        vec![Outbound::Broadcast(ServerMessage::PlayerJoined { player_id, nickname, seat }), Outbound::Snapshot]
    }

    /// 开始新的一局：空位用机器人补齐，然后发牌
    pub fn start_game(&self, requester: PlayerId) -> Result<Vec<Outbound>, TableError> {
        if *self.host_id.read() != requester {
            return Err(TableError::NotHost);
        }

        let mut game_state = self.game_state.lock();
        if game_state.is_playing() {
            return Err(IllegalMove::GameAlreadyStarted.into());
        }
        // 上一局中途离开的玩家让出座位
        game_state.players.retain(|p| !p.departed);
        let mut bot_names = BOT_NAMES.iter().cycle();
        while game_state.players.len() < self.seats {
            let name = bot_names.next().copied().unwrap_or("Bot");
            game_state.seat_player(Uuid::new_v4(), name, PlayerKind::Bot)?;
        }

        if let Err(e) = game_state.start_session(&mut rand::rng()) {
            return self.on_game_error(e);
        }

        let mut events = Vec::new();
        if let Some(first_player_id) = game_state.current_player_id() {
            events.push(ServerMessage::GameStarted { first_player_id });
        }
        events.extend(turn_events(&game_state));
        Ok(with_snapshot(events))
    }

    /// 处理玩家的抽牌请求
    pub fn pick(&self, requester: PlayerId, target_idx: usize, card_idx: usize) -> Result<Vec<Outbound>, TableError> {
        let mut game_state = self.game_state.lock();
        match game_state.pick(requester, target_idx, card_idx) {
            Ok(outcome) => Ok(with_snapshot(pick_events(&game_state, &outcome))),
            Err(e) => self.on_game_error(e),
        }
    }

    /// 打乱请求者自己的手牌
    pub fn shuffle_hand(&self, requester: PlayerId) -> Result<Vec<Outbound>, TableError> {
        let mut game_state = self.game_state.lock();
        let idx = game_state.player_index(&requester).ok_or(IllegalMove::UnknownPlayer(requester))?;
        game_state.shuffle_hand(idx, &mut rand::rng())?;
        Ok(vec![Outbound::Snapshot])
    }

    /// 把断开的玩家从牌局中移除
    fn remove_player(&self, player_id: PlayerId) -> Vec<Outbound> {
        let mut game_state = self.game_state.lock();
        let was_playing = game_state.is_playing();
        match game_state.remove_player(player_id) {
            Ok(_) => {
                let mut outs = vec![Outbound::Broadcast(ServerMessage::PlayerLeft { player_id })];
                let events = if was_playing { turn_events(&game_state) } else { vec![] };
                outs.extend(with_snapshot(events));
                outs
            }
            Err(GameError::Invariant(v)) => {
                vec![Outbound::Broadcast(ServerMessage::Error { message: v.to_string() }), Outbound::Snapshot]
            }
            Err(e) => {
                warn!("移除玩家 {} 失败: {}", player_id, e);
                vec![Outbound::Broadcast(ServerMessage::PlayerLeft { player_id })]
            }
        }
    }

    /// 非法操作只退回给发起者；不变量被破坏时本局作废，通知所有人
    fn on_game_error(&self, e: GameError) -> Result<Vec<Outbound>, TableError> {
        match e {
            GameError::Invariant(v) => {
                error!("牌桌 {} 的牌局已作废: {}", self.id, v);
                Ok(vec![Outbound::Broadcast(ServerMessage::Error { message: format!("牌局已作废: {}", v) }), Outbound::Snapshot])
            }
            illegal => Err(illegal.into()),
        }
    }

    /// 替机器人走一步。状态在等待期间已经变化 (turn 不同) 时放弃，由触发变化的一方重新调度。
    fn play_bot_turn(&self, expected_turn: u64) -> Option<Vec<Outbound>> {
        let mut game_state = self.game_state.lock();
        if game_state.turn != expected_turn || !game_state.is_playing() {
            return None;
        }
        let actor_id = game_state.current_player_id()?;
        match play_turn(&mut game_state, &mut rand::rng()) {
            Ok(BotTurn::Picked(outcome)) => Some(with_snapshot(pick_events(&game_state, &outcome))),
            Ok(BotTurn::Passed { .. }) => {
                let mut events = vec![ServerMessage::TurnPassed { player_id: actor_id }];
                events.extend(turn_events(&game_state));
                Some(with_snapshot(events))
            }
            Err(e) => self.on_game_error(e).ok(),
        }
    }

    /// 如果当前轮到机器人，等待一段"思考"时间后替它出牌
    pub fn schedule_bot_turn(self: &Arc<Self>, delay: ThinkingDelay) {
        let (turn, wait) = {
            let game_state = self.game_state.lock();
            match game_state.current_player() {
                Some(p) if game_state.is_playing() && p.kind == PlayerKind::Bot => {
                    (game_state.turn, delay.sample(&mut rand::rng()))
                }
                _ => return,
            }
        };

        let table = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let Some(outs) = table.play_bot_turn(turn) else { return };
            table.dispatch(outs, None).await;
            table.schedule_bot_turn(delay);
        });
    }

    /// 按接收范围发送消息
    pub async fn dispatch(&self, outs: Vec<Outbound>, reply: Option<&mpsc::Sender<ServerMessage>>) {
        for out in outs {
            match out {
                Outbound::Reply(msg) => {
                    if let Some(tx) = reply {
                        let _ = tx.send(msg).await;
                    }
                }
                Outbound::Broadcast(msg) => {
                    broadcast(self.players.read().await.iter(), &msg, None).await;
                }
                Outbound::Snapshot => {
                    // 快照需要为每个玩家单独生成
                    let targets: Vec<(mpsc::Sender<ServerMessage>, GameView)> = {
                        let r_players = self.players.read().await;
                        let game_state = self.game_state.lock();
                        r_players.iter().map(|(pid, conn)| (conn.sender.clone(), game_state.for_client(pid))).collect()
                    };
                    for (sender, view) in targets {
                        let _ = sender.send(ServerMessage::GameStateSnapshot(view)).await;
                    }
                }
            }
        }
    }
}

/// 向牌桌上所有玩家广播消息
pub async fn broadcast(
    players: impl Iterator<Item = (&PlayerId, &PlayerConnection)>,
    message: &ServerMessage,
    exclude: Option<PlayerId>,
) {
    for (player_id, conn) in players {
        if Some(*player_id) == exclude {
            continue;
        }
        if conn.sender.send(message.clone()).await.is_err() {
            // 发送失败，说明该玩家也断开了，后续由其自己的 handle_socket 任务处理
            warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
        }
    }
}
