use crossterm::style::Stylize;
use jackass_core::{Card, GamePhase, GameView, PlayerId, PlayerKind, PlayerStats, PlayerView, ServerMessage};

/// 一张牌的文字形式。红色花色和小丑在终端中显示为红色，牌背显示为 [?]
pub fn card_label(card: Option<&Card>, color: bool) -> String {
    match card {
        Some(card) if color && card.is_red() => card.to_string().red().to_string(),
        Some(card) => card.to_string(),
        None => "[?]".to_string(),
    }
}

fn hand_line(player: &PlayerView, color: bool) -> String {
    if player.hand.is_empty() {
        return "-".to_string();
    }
    player.hand.iter()
        .enumerate()
        .map(|(i, card)| match card {
            // 自己的牌带上序号，方便输入 pick
            Some(_) => format!("{}:{}", i, card_label(card.as_ref(), color)),
            None => card_label(None, color),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 把当前牌局渲染成多行文本，me 为观看者自己
pub fn render_view(view: &GameView, me: Option<PlayerId>, color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(match view.phase {
        GamePhase::WaitingForPlayers => format!("牌桌 {} 等待开始", view.table_id),
        GamePhase::Playing => format!("第 {} 手", view.turn),
        GamePhase::GameOver => "本局结束".to_string(),
        GamePhase::Aborted => "本局已作废".to_string(),
    });

    for (idx, player) in view.players.iter().enumerate() {
        let marker = if view.cur_player_idx == Some(idx) { "▶" } else { " " };
        let mut name = player.nickname.clone();
        if Some(player.id) == me {
            name.push_str(" (你)");
        }
        if player.kind == PlayerKind::Bot {
            name.push_str(" [机器人]");
        }
        let mut status = String::new();
        if player.departed {
            status.push_str(" 已离开");
        }
        if player.is_loser {
            status.push_str(" 输家");
        } else if view.phase == GamePhase::GameOver && !player.departed {
            status.push_str(" 胜利");
        }
        lines.push(format!(
            "{} {}. {} | {} 张 | {} 对 | {}{}",
            marker,
            idx,
            name,
            player.hand.len(),
            player.pairs.len(),
            hand_line(player, color),
            status
        ));
    }

    if let Some(me_idx) = me.and_then(|id| view.player_index(&id)) {
        if view.cur_player_idx == Some(me_idx) && view.phase == GamePhase::Playing {
            match view.selectable_target(me_idx) {
                Some(target) => lines.push(format!(
                    "轮到你了：从 {} 手中抽牌 (pick 0..{})",
                    view.players[target].nickname,
                    view.players[target].hand.len().saturating_sub(1)
                )),
                None => lines.push("轮到你了，但没有人可以抽牌".to_string()),
            }
        }
    }
    lines.join("\n")
}

/// 事件的一行描述，快照不在这里处理
pub fn describe_event(msg: &ServerMessage, view: Option<&GameView>) -> Option<String> {
    let name = |id: &PlayerId| {
        view.and_then(|v| v.player_index(id).map(|idx| v.players[idx].nickname.clone()))
            .unwrap_or_else(|| id.to_string())
    };
    let text = match msg {
        ServerMessage::TableJoined { table_id, .. } => format!("已进入牌桌 {}", table_id),
        ServerMessage::GameStateSnapshot(_) => return None,
        ServerMessage::PlayerJoined { nickname, seat, .. } => format!("{} 坐到了 {} 号座位", nickname, seat),
        ServerMessage::PlayerLeft { player_id } => format!("{} 离开了牌桌", name(player_id)),
        ServerMessage::GameStarted { first_player_id } => format!("新的一局开始，{} 先抽牌", name(first_player_id)),
        ServerMessage::CardPicked { actor_id, target_id, pairs_formed } => {
            let mut s = format!("{} 从 {} 手中抽了一张牌", name(actor_id), name(target_id));
            if *pairs_formed > 0 {
                s.push_str(&format!("，凑成了 {} 对", pairs_formed));
            }
            s
        }
        ServerMessage::TurnPassed { player_id } => format!("{} 无牌可抽，跳过", name(player_id)),
        ServerMessage::NextToAct { player_id, .. } => format!("轮到 {}", name(player_id)),
        ServerMessage::GameOver { loser_id, .. } => match loser_id {
            Some(id) => format!("游戏结束，{} 拿着小丑输了！", name(id)),
            None => "游戏结束".to_string(),
        },
        ServerMessage::Info { message } => format!("[提示] {}", message),
        ServerMessage::Error { message } => format!("[错误] {}", message),
    };
    Some(text)
}

pub fn render_stats(stats: &PlayerStats) -> String {
    format!(
        "共 {} 局 | 胜 {} 负 {} | 胜率 {}% | 当前连胜 {} | 最长连胜 {}",
        stats.games,
        stats.wins,
        stats.losses,
        stats.win_rate(),
        stats.current_streak,
        stats.longest_win_streak
    )
}
