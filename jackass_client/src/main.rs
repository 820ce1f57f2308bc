mod local;
mod render;

use crossterm::tty::IsTty;
use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use jackass_core::{ClientMessage, GameView, PlayerId, ServerMessage, TableId, ThinkingDelay};

use crate::render::{describe_event, render_view};

const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:25917/ws";

/// 客户端从服务器消息中得知的自己的身份和最新快照
#[derive(Debug, Default)]
struct Session {
    me: Option<PlayerId>,
    view: Option<GameView>,
}

type SharedSession = Arc<Mutex<Session>>;

impl Session {
    fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::TableJoined { your_id, view, .. } => {
                self.me = Some(*your_id);
                self.view = Some(view.clone());
            }
            ServerMessage::GameStateSnapshot(view) => self.view = Some(view.clone()),
            _ => {}
        }
    }

    /// pick 只需要给出牌的序号，抽牌对象由当前快照决定
    fn pick_message(&self, card_idx: usize) -> Result<ClientMessage, String> {
        let (Some(me), Some(view)) = (self.me, self.view.as_ref()) else {
            return Err("请先加入或创建牌桌".to_string());
        };
        let my_idx = view.player_index(&me).ok_or("你不在这张牌桌上")?;
        if view.cur_player_idx != Some(my_idx) {
            return Err("还没轮到你".to_string());
        }
        let target_idx = view.selectable_target(my_idx).ok_or("没有可以抽牌的对象")?;
        Ok(ClientMessage::PickCard { target_idx, card_idx })
    }
}

/// 把一行输入翻译成发给服务器的消息
fn parse_online_command(parts: &[&str], session: &Session) -> Result<ClientMessage, String> {
    match parts {
        ["create", rest @ ..] => {
            let nickname = rest.first().unwrap_or(&"新玩家").to_string();
            let seats = match rest.get(1) {
                Some(s) => Some(s.parse::<u8>().map_err(|_| format!("无效的座位数: {}", s))?),
                None => None,
            };
            Ok(ClientMessage::CreateTable { nickname, seats })
        }
        ["join", table_id, nickname, ..] => {
            let table_id: TableId = table_id.parse().map_err(|_| format!("无效的牌桌ID格式: {}", table_id))?;
            Ok(ClientMessage::JoinTable { table_id, nickname: nickname.to_string() })
        }
        ["join", ..] => Err("用法: join <牌桌ID> <昵称>".to_string()),
        ["start"] => Ok(ClientMessage::StartGame),
        ["pick", idx] => {
            let card_idx = idx.parse().map_err(|_| format!("无效的序号: {}", idx))?;
            session.pick_message(card_idx)
        }
        ["pick", ..] => Err("用法: pick <序号>".to_string()),
        ["shuffle"] => Ok(ClientMessage::ShuffleHand),
        ["state"] => Ok(ClientMessage::GetState),
        _ => Err(format!("未知命令: {}", parts.join(" "))),
    }
}

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_tty()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let color = use_color();
    if std::env::args().nth(1).as_deref() == Some("local") {
        let nickname = std::env::args().nth(2).unwrap_or_else(|| "玩家".to_string());
        local::run(&nickname, ThinkingDelay::default(), color).await?;
        return Ok(());
    }

    let url = Url::parse(&std::env::var("JACKASS_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();
    let session = SharedSession::default();

    // 启动一个任务来处理从服务器接收的消息
    let reader_session = session.clone();
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let server_msg = match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server_msg) => server_msg,
                        Err(e) => {
                            warn!("解析服务器消息失败: {}", e);
                            continue;
                        }
                    };
                    debug!("<-- {:?}", server_msg);

                    let mut session = reader_session.lock().await;
                    session.apply(&server_msg);
                    let text = match &server_msg {
                        ServerMessage::GameStateSnapshot(view) => Some(render_view(view, session.me, color)),
                        other => describe_event(other, session.view.as_ref()),
                    };
                    if let Some(text) = text {
                        println!("\n{}", text);
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- JackAss 客户端 ---");
    println!("可用命令:");
    println!("  create <昵称> [座位数]    - 创建一张新牌桌 (3 或 4 个座位)");
    println!("  join <牌桌ID> <昵称>      - 加入一张牌桌");
    println!("  start                     - 开始游戏 (仅房主)，空位由机器人补齐");
    println!("  pick <序号>               - 从上家手中抽第几张牌");
    println!("  shuffle                   - 打乱自己的手牌");
    println!("  state                     - 重新获取牌桌状态");
    println!("  exit                      - 退出");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else { break };
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            ["exit"] => {
                println!("正在断开连接...");
                break;
            }
            _ => {}
        }

        let client_msg = {
            let session = session.lock().await;
            parse_online_command(&parts, &session)
        };
        match client_msg {
            Ok(msg) => {
                let payload = serde_json::to_string(&msg)?;
                write.send(Message::Text(payload.into())).await?;
            }
            Err(hint) => println!("{}", hint),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jackass_core::{Card, GamePhase, GameState, Player, PlayerKind, Rank, Suit};
    use uuid::Uuid;

    fn joined_session(current: usize) -> (Session, GameState) {
        let mut state = GameState::new(Uuid::new_v4());
        for i in 0..3 {
            state.players.push(Player::new(Uuid::new_v4(), format!("P{}", i), PlayerKind::Remote));
        }
        state.players[0].hand = vec![Card::new(Rank::Five, Suit::Club)];
        state.players[1].hand = vec![];
        state.players[2].hand = vec![Card::Joker, Card::new(Rank::Five, Suit::Heart)];
        state.phase = GamePhase::Playing;
        state.cur_player_idx = Some(current);

        let me = state.players[0].id;
        let mut session = Session::default();
        session.apply(&ServerMessage::TableJoined {
            your_id: me,
            table_id: state.table_id,
            host_id: me,
            view: state.for_client(&me),
        });
        (session, state)
    }

    #[test]
    fn test_pick_targets_next_player_with_cards() {
        let (session, _) = joined_session(0);
        assert_eq!(
            parse_online_command(&["pick", "1"], &session),
            Ok(ClientMessage::PickCard { target_idx: 2, card_idx: 1 })
        );
    }

    #[test]
    fn test_pick_requires_turn_and_table() {
        let (session, _) = joined_session(2);
        assert!(parse_online_command(&["pick", "0"], &session).is_err());
        assert!(parse_online_command(&["pick", "0"], &Session::default()).is_err());
        assert!(parse_online_command(&["pick", "x"], &session).is_err());
    }

    #[test]
    fn test_parse_table_commands() {
        let session = Session::default();
        assert_eq!(
            parse_online_command(&["create", "Alice", "3"], &session),
            Ok(ClientMessage::CreateTable { nickname: "Alice".to_string(), seats: Some(3) })
        );
        assert_eq!(
            parse_online_command(&["create"], &session),
            Ok(ClientMessage::CreateTable { nickname: "新玩家".to_string(), seats: None })
        );
        let table_id = Uuid::new_v4();
        let id = table_id.to_string();
        assert_eq!(
            parse_online_command(&["join", id.as_str(), "Bob"], &session),
            Ok(ClientMessage::JoinTable { table_id, nickname: "Bob".to_string() })
        );
        assert!(parse_online_command(&["join", "not-a-uuid", "Bob"], &session).is_err());
        assert!(parse_online_command(&["fold"], &session).is_err());
    }

    #[test]
    fn test_snapshot_replaces_view() {
        let (mut session, mut state) = joined_session(0);
        state.cur_player_idx = Some(1);
        let me = session.me.unwrap();
        session.apply(&ServerMessage::GameStateSnapshot(state.for_client(&me)));
        assert_eq!(session.view.as_ref().unwrap().cur_player_idx, Some(1));
    }
}
