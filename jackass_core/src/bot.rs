use crate::error::{GameError, IllegalMove};
use crate::logic::PickOutcome;
use crate::state::GameState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 一次抽牌选择：从哪个座位、抽第几张
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub target_idx: usize,
    pub card_idx: usize,
}

/// 自动走一步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotTurn {
    Picked(PickOutcome),
    /// 没有可抽牌的对象，跳过了回合
    Passed { game_over: bool },
}

/// 机器人的选择：目标由规则唯一确定，牌的位置随机。
/// 游戏未在进行或没有可抽牌的对象时返回 None。
pub fn choose_pick<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Option<Pick> {
    if !state.is_playing() {
        return None;
    }
    let actor_idx = state.cur_player_idx?;
    let target_idx = state.selectable_target(actor_idx)?;
    let len = state.players[target_idx].hand.len();
    if len == 0 {
        return None;
    }
    Some(Pick { target_idx, card_idx: rng.random_range(0..len) })
}

/// 替当前行动的玩家自动走一步
pub fn play_turn<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) -> Result<BotTurn, GameError> {
    let actor_id = state.current_player_id().ok_or(IllegalMove::GameNotInProgress)?;
    match choose_pick(state, rng) {
        Some(pick) => state.pick(actor_id, pick.target_idx, pick.card_idx).map(BotTurn::Picked),
        None => state.pass_turn().map(|game_over| BotTurn::Passed { game_over }),
    }
}

/// 机器人出牌前的"思考"时间：固定基础时长加上随机抖动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingDelay {
    pub base_ms: u64,
    pub jitter_ms: u64,
}

impl Default for ThinkingDelay {
    fn default() -> Self {
        ThinkingDelay { base_ms: 2000, jitter_ms: 1000 }
    }
}

impl ThinkingDelay {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter = if self.jitter_ms == 0 { 0 } else { rng.random_range(0..self.jitter_ms) };
        Duration::from_millis(self.base_ms.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};
    use crate::logic::start_session;
    use crate::state::{GamePhase, Player, PlayerKind, TableId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    fn bots(count: usize) -> Vec<Player> {
        (0..count).map(|i| Player::new(Uuid::new_v4(), format!("Bot_{}", i), PlayerKind::Bot)).collect()
    }

    #[test]
    fn test_choose_pick_targets_selectable_player() {
        let mut rng = StdRng::seed_from_u64(5);
        let state = start_session(TableId::new_v4(), bots(4), &mut rng).unwrap();
        let actor = state.cur_player_idx.unwrap();

        for _ in 0..20 {
            let pick = choose_pick(&state, &mut rng).unwrap();
            assert_eq!(Some(pick.target_idx), state.selectable_target(actor));
            assert!(pick.card_idx < state.players[pick.target_idx].hand.len());
        }
    }

    #[test]
    fn test_choose_pick_none_when_not_playing() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = GameState::new(TableId::new_v4());
        assert_eq!(choose_pick(&state, &mut rng), None);

        state.players = bots(3);
        state.players[0].hand = vec![Card::new(Rank::Two, Suit::Club)];
        state.phase = GamePhase::GameOver;
        state.cur_player_idx = Some(1);
        assert_eq!(choose_pick(&state, &mut rng), None);
    }

    #[test]
    fn test_bots_play_a_full_game() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = start_session(TableId::new_v4(), bots(3), &mut rng).unwrap();

        let mut steps = 0;
        while state.is_playing() {
            play_turn(&mut state, &mut rng).unwrap();
            steps += 1;
            assert!(steps < 10_000);
        }

        let loser = state.loser_idx.unwrap();
        assert!(state.players[loser].is_loser);
        assert_eq!(state.players[loser].hand, vec![Card::Joker]);
        assert_eq!(state.players.iter().filter(|p| p.is_loser).count(), 1);
    }

    #[test]
    fn test_thinking_delay_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let delay = ThinkingDelay::default();
        for _ in 0..100 {
            let d = delay.sample(&mut rng);
            assert!(d >= Duration::from_millis(2000) && d < Duration::from_millis(3000));
        }
        let fixed = ThinkingDelay { base_ms: 10, jitter_ms: 0 };
        assert_eq!(fixed.sample(&mut rng), Duration::from_millis(10));
    }

    #[test]
    fn test_thinking_delay_saturates_at_max() {
        let mut rng = StdRng::seed_from_u64(1);
        let huge = ThinkingDelay { base_ms: u64::MAX, jitter_ms: 10 };
        for _ in 0..20 {
            assert_eq!(huge.sample(&mut rng), Duration::from_millis(u64::MAX));
        }
    }
}
