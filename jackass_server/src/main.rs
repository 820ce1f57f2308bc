mod config;
mod table;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::StreamExt, SinkExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use jackass_core::{ClientMessage, PlayerId, ServerMessage, TableId};

use crate::config::ServerConfig;
use crate::table::{AppState, Outbound, SharedState, TableError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr;
    let state = SharedState::new(AppState::new(config));

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    info!("服务器正在监听 {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;
    axum::serve(listener, app).await.context("服务器异常退出")?;
    Ok(())
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 当前连接的上下文信息，入座成功后填充
    let mut player_context: Option<(TableId, PlayerId)> = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if let Err(e) = handle_client_message(client_msg, state.clone(), &tx, &mut player_context).await {
                        warn!("拒绝了来自 {:?} 的请求: {}", player_context, e);
                        let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                    }
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                }
            }
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some((table_id, player_id)) = player_context {
        state.handle_disconnect(table_id, player_id).await;
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<(TableId, PlayerId)>,
) -> Result<(), TableError> {
    match msg {
        ClientMessage::CreateTable { nickname, seats } => {
            if context.is_some() {
                return Err(TableError::AlreadySeated);
            }

            let player_id = Uuid::new_v4();
            let table = state.create_table(player_id, nickname, seats, tx.clone())?;
            *context = Some((table.id, player_id));

            let _ = tx.send(ServerMessage::TableJoined {
                your_id: player_id,
                table_id: table.id,
                host_id: player_id,
                view: table.snapshot_for(&player_id),
            }).await;
        }
        ClientMessage::JoinTable { table_id, nickname } => {
            if context.is_some() {
                return Err(TableError::AlreadySeated);
            }

            let player_id = Uuid::new_v4();
            let (table, seat) = state.join_table(table_id, player_id, nickname.clone(), tx.clone()).await?;
            *context = Some((table_id, player_id));

            let host_id = *table.host_id.read();
            let _ = tx.send(ServerMessage::TableJoined {
                your_id: player_id,
                table_id,
                host_id,
                view: table.snapshot_for(&player_id),
            }).await;
            // 先让新玩家知道自己的身份，再通知所有人并刷新快照
            table.dispatch(table.join_announcement(player_id, nickname, seat), Some(tx)).await;
        }
        // ... 其他需要入座后才能执行的消息
        _ => {
            let (table_id, player_id) = context.ok_or(TableError::NotSeated)?;
            let table = state.table(&table_id)?;

            // 游戏逻辑处理
            let outs = match msg {
                ClientMessage::StartGame => table.start_game(player_id)?,
                ClientMessage::PickCard { target_idx, card_idx } => table.pick(player_id, target_idx, card_idx)?,
                ClientMessage::ShuffleHand => table.shuffle_hand(player_id)?,
                ClientMessage::GetState => {
                    vec![Outbound::Reply(ServerMessage::GameStateSnapshot(table.snapshot_for(&player_id)))]
                }
                ClientMessage::CreateTable { .. } | ClientMessage::JoinTable { .. } => vec![],
            };

            table.dispatch(outs, Some(tx)).await;
            // 状态变化后如果轮到机器人，让它继续
            table.schedule_bot_turn(state.config.bot_delay);
        }
    }
    Ok(())
}
