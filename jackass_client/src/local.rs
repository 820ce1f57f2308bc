use std::error::Error;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};
use uuid::Uuid;

use jackass_core::{
    BotTurn, GameState, Player, PlayerId, PlayerKind, PlayerStats, ServerMessage, ThinkingDelay, pick_events,
    play_turn, start_session, turn_events,
};

use crate::render::{card_label, describe_event, render_stats, render_view};

const BOT_NAMES: [&str; 3] = ["CardBot 3000", "ShuffleTron", "JokerBuster X"];

/// 本地模式下玩家可以输入的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pick(usize),
    Shuffle,
    Show,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["pick", idx] | ["p", idx] => match idx.parse() {
            Ok(idx) => Command::Pick(idx),
            Err(_) => Command::Unknown(line.trim().to_string()),
        },
        ["shuffle"] | ["s"] => Command::Shuffle,
        ["state"] | [] => Command::Show,
        ["exit"] | ["quit"] | ["q"] => Command::Quit,
        _ => Command::Unknown(line.trim().to_string()),
    }
}

/// 结束的牌局里该玩家是否获胜；作废或未结束时为 None
pub fn outcome_for(state: &GameState, player_id: &PlayerId) -> Option<bool> {
    if !state.is_game_over() {
        return None;
    }
    let idx = state.player_index(player_id)?;
    Some(state.loser_idx != Some(idx))
}

/// 一名真人玩家加三个机器人
fn local_players(human_id: PlayerId, nickname: &str) -> Vec<Player> {
    let mut players = vec![Player::new(human_id, nickname, PlayerKind::Human)];
    players.extend(BOT_NAMES.iter().map(|name| Player::new(Uuid::new_v4(), *name, PlayerKind::Bot)));
    players
}

fn print_events(state: &GameState, viewer: &PlayerId, events: &[ServerMessage]) {
    let view = state.for_client(viewer);
    for event in events {
        if let Some(line) = describe_event(event, Some(&view)) {
            println!("{}", line);
        }
    }
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>, Box<dyn Error>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(stdin.next_line().await?)
}

/// 离线游戏主循环，可以连续玩多局，战绩只保存在内存中
pub async fn run(nickname: &str, delay: ThinkingDelay, color: bool) -> Result<PlayerStats, Box<dyn Error>> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stats = PlayerStats::default();
    let human_id = Uuid::new_v4();

    println!("--- JackAss 本地模式 ---");
    println!("可用命令:");
    println!("  pick <序号>   - 从上家手中抽第几张牌");
    println!("  shuffle       - 打乱自己的手牌");
    println!("  state         - 查看牌桌");
    println!("  exit          - 退出");

    'session: loop {
        let mut state = start_session(Uuid::new_v4(), local_players(human_id, nickname), &mut rand::rng())?;
        println!();
        print_events(&state, &human_id, &turn_events(&state));

        while state.is_playing() {
            let Some(current) = state.current_player() else { break };
            let actor_id = current.id;

            if current.kind == PlayerKind::Bot {
                let wait = delay.sample(&mut rand::rng());
                tokio::time::sleep(wait).await;
                let events = match play_turn(&mut state, &mut rand::rng()) {
                    Ok(BotTurn::Picked(outcome)) => pick_events(&state, &outcome),
                    Ok(BotTurn::Passed { .. }) => {
                        let mut events = vec![ServerMessage::TurnPassed { player_id: actor_id }];
                        events.extend(turn_events(&state));
                        events
                    }
                    Err(e) => {
                        println!("[错误] {}", e);
                        break;
                    }
                };
                print_events(&state, &human_id, &events);
                continue;
            }

            let Some(actor_idx) = state.cur_player_idx else { break };
            if state.selectable_target(actor_idx).is_none() {
                let game_over = state.pass_turn()?;
                debug!("没有可抽牌的对象，跳过回合 (game_over = {})", game_over);
                let mut events = vec![ServerMessage::TurnPassed { player_id: actor_id }];
                events.extend(turn_events(&state));
                print_events(&state, &human_id, &events);
                continue;
            }

            println!("\n{}", render_view(&state.for_client(&human_id), Some(human_id), color));
            let Some(line) = prompt(&mut stdin, "> ").await? else { break 'session };
            match parse_command(&line) {
                Command::Pick(card_idx) => {
                    let Some(target_idx) = state.selectable_target(actor_idx) else { continue };
                    match state.pick(human_id, target_idx, card_idx) {
                        Ok(outcome) => {
                            println!("你抽到了 {}", card_label(Some(&outcome.card), color));
                            print_events(&state, &human_id, &pick_events(&state, &outcome));
                        }
                        Err(e) if e.is_illegal_move() => println!("[错误] {}", e),
                        Err(e) => {
                            println!("[错误] 牌局已作废: {}", e);
                            break;
                        }
                    }
                }
                Command::Shuffle => {
                    state.shuffle_hand(actor_idx, &mut rand::rng())?;
                    println!("手牌已打乱");
                }
                Command::Show => {}
                Command::Quit => break 'session,
                Command::Unknown(cmd) => println!("未知命令: {}", cmd),
            }
        }

        println!("\n{}", render_view(&state.for_client(&human_id), Some(human_id), color));
        match outcome_for(&state, &human_id) {
            Some(won) => {
                stats.record(won);
                println!("{}", if won { "你赢了！" } else { "你拿着小丑，输了。" });
            }
            None => warn!("本局没有正常结束，不计入战绩"),
        }
        println!("{}", render_stats(&stats));

        let answer = prompt(&mut stdin, "再来一局？(y/n) ").await?.unwrap_or_default();
        if !answer.trim().eq_ignore_ascii_case("y") {
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jackass_core::{Card, GamePhase, Rank, Suit};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("pick 3"), Command::Pick(3));
        assert_eq!(parse_command("  p 0 "), Command::Pick(0));
        assert_eq!(parse_command("shuffle"), Command::Shuffle);
        assert_eq!(parse_command(""), Command::Show);
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("pick x"), Command::Unknown("pick x".to_string()));
        assert_eq!(parse_command("raise 10"), Command::Unknown("raise 10".to_string()));
    }

    #[test]
    fn test_local_players_one_human_three_bots() {
        let human = Uuid::new_v4();
        let players = local_players(human, "me");
        assert_eq!(players.len(), 4);
        assert_eq!(players[0].id, human);
        assert_eq!(players[0].kind, PlayerKind::Human);
        assert!(players[1..].iter().all(|p| p.kind == PlayerKind::Bot));
    }

    #[test]
    fn test_outcome_for() {
        let human = Uuid::new_v4();
        let mut state = GameState::new(Uuid::new_v4());
        state.players = local_players(human, "me");
        assert_eq!(outcome_for(&state, &human), None);

        state.phase = GamePhase::GameOver;
        state.loser_idx = Some(0);
        state.players[0].hand = vec![Card::Joker];
        assert_eq!(outcome_for(&state, &human), Some(false));

        state.loser_idx = Some(2);
        assert_eq!(outcome_for(&state, &human), Some(true));
        assert_eq!(outcome_for(&state, &Uuid::new_v4()), None);

        state.phase = GamePhase::Aborted;
        state.players[1].hand = vec![Card::new(Rank::Two, Suit::Club)];
        assert_eq!(outcome_for(&state, &human), None);
    }
}
