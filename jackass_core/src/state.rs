use crate::card::Card;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TableId = Uuid;
pub type PlayerId = Uuid;

/// 一局游戏的最少与最多人数
pub const MIN_PLAYERS: usize = 3;
pub const MAX_PLAYERS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub table_id: TableId,
    // 座位顺序即轮转顺序，开局后长度固定
    pub players: Vec<Player>,
    pub phase: GamePhase,
    pub cur_player_idx: Option<usize>,  // 当前行动玩家在 players 中的索引
    pub winner_idx: Option<usize>,
    pub loser_idx: Option<usize>,
    // 每次状态转换后加一，用于识别过期的机器人回合
    pub turn: u64,
    // 本局发出的总牌数，用于检查牌数守恒
    pub dealt_cards: usize,
    // 随离开的玩家一起退出游戏的牌
    pub discarded: Vec<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub kind: PlayerKind,
    pub hand: Vec<Card>,
    pub pairs: Vec<(Card, Card)>,  // 只追加
    pub is_active: bool,
    pub is_loser: bool,
    pub departed: bool,  // 中途离开，不再参与轮转
}

/// 玩家类型。引擎本身不区分它们，只有驱动者 (UI、定时器、网络消息) 不同。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerKind {
    /// 本地操作的真人玩家
    Human,
    /// 由服务器自动操作
    Bot,
    /// 通过网络连接的真人玩家
    Remote,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GamePhase {
    WaitingForPlayers,
    Playing,
    GameOver,
    /// 检测到不变量被破坏，本局作废
    Aborted,
}

impl Player {
    pub fn new(id: PlayerId, nickname: impl Into<String>, kind: PlayerKind) -> Self {
        Player {
            id,
            nickname: nickname.into(),
            kind,
            hand: Vec::new(),
            pairs: Vec::new(),
            is_active: false,
            is_loser: false,
            departed: false,
        }
    }

    pub fn has_cards(&self) -> bool {
        !self.hand.is_empty()
    }

    pub fn has_joker(&self) -> bool {
        self.hand.iter().any(|c| c.is_joker())
    }

    /// 清空上一局留下的所有牌和标记
    pub(crate) fn reset(&mut self) {
        self.hand.clear();
        self.pairs.clear();
        self.is_active = false;
        self.is_loser = false;
    }
}

/// 从 start 之后开始按座位顺序扫描一整圈（不包括 start 本身），
/// 返回第一个满足 pred 的座位。
pub(crate) fn scan_after(count: usize, start: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
    (1..count).map(|step| (start + step) % count).find(|&idx| pred(idx))
}

// --- GameState 的实现方法 ---

impl GameState {
    pub fn new(table_id: TableId) -> Self {
        GameState {
            table_id,
            players: Vec::new(),
            phase: GamePhase::WaitingForPlayers,
            cur_player_idx: None,
            winner_idx: None,
            loser_idx: None,
            turn: 0,
            dealt_cards: 0,
            discarded: Vec::new(),
        }
    }

    /// 获取当前行动的玩家ID (如果存在)
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.cur_player_idx.map(|idx| self.players[idx].id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.cur_player_idx.map(|idx| &self.players[idx])
    }

    pub fn player_index(&self, player_id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == *player_id)
    }

    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// 手上还有牌的玩家索引
    pub fn holders(&self) -> Vec<usize> {
        self.players.iter().enumerate().filter(|(_, p)| p.has_cards()).map(|(i, _)| i).collect()
    }

    /// 没有离开的玩家数
    pub fn occupied_seats(&self) -> usize {
        self.players.iter().filter(|p| !p.departed).count()
    }

    /// 手牌 + 2 × 对子数 + 弃置的牌，正常情况下恒等于本局发出的牌数
    pub fn cards_accounted(&self) -> usize {
        self.players.iter().map(|p| p.hand.len() + 2 * p.pairs.len()).sum::<usize>() + self.discarded.len()
    }

    /// 当前玩家唯一允许抽牌的对象：从 actor 往后数第一个手上有牌的其他玩家。
    /// 纯函数，状态不变时多次调用结果相同。
    pub fn selectable_target(&self, actor_idx: usize) -> Option<usize> {
        scan_after(self.players.len(), actor_idx, |idx| self.players[idx].has_cards())
    }

    /// 生成发给某个客户端的视图：
    /// - 自己的手牌总是可见；
    /// - 游戏结束后输家的手牌对所有人可见；
    /// - 其余手牌只显示牌背 (None)。
    pub fn for_client(&self, viewer: &PlayerId) -> GameView {
        let players = self
            .players
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let revealed = p.id == *viewer || (self.is_game_over() && self.loser_idx == Some(idx));
                PlayerView {
                    id: p.id,
                    nickname: p.nickname.clone(),
                    kind: p.kind,
                    hand: p.hand.iter().map(|c| revealed.then_some(*c)).collect(),
                    pairs: p.pairs.clone(),
                    is_active: p.is_active,
                    is_loser: p.is_loser,
                    departed: p.departed,
                }
            })
            .collect();

        GameView {
            table_id: self.table_id,
            players,
            phase: self.phase,
            cur_player_idx: self.cur_player_idx,
            winner_idx: self.winner_idx,
            loser_idx: self.loser_idx,
            turn: self.turn,
        }
    }
}

// --- 客户端视图 ---

/// 发送给客户端的只读快照，其他人的手牌已被隐藏
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameView {
    pub table_id: TableId,
    pub players: Vec<PlayerView>,
    pub phase: GamePhase,
    pub cur_player_idx: Option<usize>,
    pub winner_idx: Option<usize>,
    pub loser_idx: Option<usize>,
    pub turn: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub kind: PlayerKind,
    // 客户端只知道自己的真实手牌，其他人的牌为 None
    pub hand: Vec<Option<Card>>,
    pub pairs: Vec<(Card, Card)>,
    pub is_active: bool,
    pub is_loser: bool,
    pub departed: bool,
}

impl GameView {
    pub fn player_index(&self, player_id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == *player_id)
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.cur_player_idx.map(|idx| self.players[idx].id)
    }

    pub fn selectable_target(&self, actor_idx: usize) -> Option<usize> {
        scan_after(self.players.len(), actor_idx, |idx| !self.players[idx].hand.is_empty())
    }
}

// --- 战绩统计 ---

/// 本地模式下的胜负统计，只保存在内存中
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub current_streak: u32,
    pub longest_win_streak: u32,
}

impl PlayerStats {
    pub fn record(&mut self, won: bool) {
        self.games += 1;
        if won {
            self.wins += 1;
            self.current_streak += 1;
            self.longest_win_streak = self.longest_win_streak.max(self.current_streak);
        } else {
            self.losses += 1;
            self.current_streak = 0;
        }
    }

    /// 胜率百分比，四舍五入；一局都没玩时为 0
    pub fn win_rate(&self) -> u32 {
        if self.games == 0 {
            return 0;
        }
        ((self.wins as f64 / self.games as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};

    fn table_with_hands(hands: Vec<Vec<Card>>) -> GameState {
        let mut state = GameState::new(Uuid::new_v4());
        for (i, hand) in hands.into_iter().enumerate() {
            let mut p = Player::new(Uuid::new_v4(), format!("P{}", i), PlayerKind::Bot);
            p.hand = hand;
            state.players.push(p);
        }
        state
    }

    #[test]
    fn test_selectable_target_skips_empty_hands() {
        let two = Card::new(Rank::Two, Suit::Spade);
        let state = table_with_hands(vec![vec![two], vec![], vec![], vec![Card::Joker]]);
        assert_eq!(state.selectable_target(0), Some(3));
        assert_eq!(state.selectable_target(3), Some(0));
        // 幂等
        assert_eq!(state.selectable_target(0), state.selectable_target(0));
    }

    #[test]
    fn test_selectable_target_none_when_others_empty() {
        let state = table_with_hands(vec![vec![Card::Joker], vec![], vec![]]);
        assert_eq!(state.selectable_target(0), None);
        // 空手的玩家也能找到有牌的目标
        assert_eq!(state.selectable_target(1), Some(0));
    }

    #[test]
    fn test_for_client_hides_other_hands() {
        let mut state = table_with_hands(vec![
            vec![Card::new(Rank::Two, Suit::Spade)],
            vec![Card::Joker],
            vec![Card::new(Rank::Five, Suit::Club)],
        ]);
        state.phase = GamePhase::Playing;
        let viewer = state.players[0].id;
        let view = state.for_client(&viewer);

        assert_eq!(view.players[0].hand, vec![Some(Card::new(Rank::Two, Suit::Spade))]);
        assert_eq!(view.players[1].hand, vec![None]);
        assert_eq!(view.players[2].hand, vec![None]);
        assert_eq!(view.selectable_target(0), Some(1));
    }

    #[test]
    fn test_for_client_reveals_loser_at_game_over() {
        let mut state = table_with_hands(vec![vec![], vec![Card::Joker], vec![]]);
        state.phase = GamePhase::GameOver;
        state.loser_idx = Some(1);
        let viewer = state.players[0].id;
        let view = state.for_client(&viewer);
        assert_eq!(view.players[1].hand, vec![Some(Card::Joker)]);
    }

    #[test]
    fn test_stats_streaks_and_win_rate() {
        let mut stats = PlayerStats::default();
        assert_eq!(stats.win_rate(), 0);

        stats.record(true);
        stats.record(true);
        stats.record(false);
        stats.record(true);

        assert_eq!(stats.games, 4);
        assert_eq!(stats.wins, 3);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_win_streak, 2);
        assert_eq!(stats.win_rate(), 75);
    }
}
