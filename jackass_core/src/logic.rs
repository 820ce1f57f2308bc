use crate::card::*;
use crate::error::*;
use crate::state::*;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// 一次合法抽牌的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickOutcome {
    pub actor_idx: usize,
    pub target_idx: usize,
    pub card: Card,
    pub pairs_formed: usize,
    pub next_player_idx: Option<usize>,
    pub game_over: bool,
}

// --- 配对 ---

/// 把手牌中点数相同的牌两两配对，移入 pairs。
///
/// - 同一点数有奇数张时 (例如三条)，会留下一张。
/// - 小丑永远不参与配对，原样留在手里。
/// - 剩余手牌保持原有的相对顺序。
///
/// 返回本次新配成的对数。
pub fn extract_pairs(player: &mut Player) -> usize {
    let mut removed = vec![false; player.hand.len()];
    // 还没配上对的牌的位置
    let mut unmatched: Vec<usize> = Vec::new();
    let mut formed = 0;
    for (idx, card) in player.hand.iter().enumerate() {
        match unmatched.iter().position(|&prev| player.hand[prev].matches(card)) {
            Some(pos) => {
                let prev = unmatched.swap_remove(pos);
                player.pairs.push((player.hand[prev], *card));
                removed[prev] = true;
                removed[idx] = true;
                formed += 1;
            }
            None => unmatched.push(idx),
        }
    }

    if formed > 0 {
        let mut idx = 0;
        player.hand.retain(|_| {
            let keep = !removed[idx];
            idx += 1;
            keep
        });
    }
    formed
}

/// 开局时手牌最少的玩家先行动，张数相同时取座位靠前的
pub(crate) fn starting_player(players: &[Player]) -> usize {
    (0..players.len()).min_by_key(|&idx| players[idx].hand.len()).unwrap_or(0)
}

/// 用一组玩家直接开一局新游戏
pub fn start_session<R: Rng + ?Sized>(
    table_id: TableId,
    players: impl IntoIterator<Item = Player>,
    rng: &mut R,
) -> Result<GameState, GameError> {
    let mut state = GameState::new(table_id);
    state.players = players.into_iter().collect();
    state.start_session(rng)?;
    Ok(state)
}

// --- 核心游戏流程 ---

impl GameState {
    /// 在开局前让玩家入座，返回座位号。已经在座的玩家直接返回原座位。
    pub fn seat_player(&mut self, id: PlayerId, nickname: impl Into<String>, kind: PlayerKind) -> Result<usize, IllegalMove> {
        if self.is_playing() {
            return Err(IllegalMove::GameAlreadyStarted);
        }
        if let Some(idx) = self.player_index(&id) {
            return Ok(idx);
        }
        // 上一局离开的玩家在下一局开始前仍占着位置，但不计入人数
        if self.occupied_seats() >= MAX_PLAYERS {
            return Err(IllegalMove::TableFull);
        }
        self.players.push(Player::new(id, nickname, kind));
        Ok(self.players.len() - 1)
    }

    /// 开始新的一局
    ///
    /// - 移除上一局中途离开的玩家，清空所有人的手牌与对子。
    /// - 创建一副新牌，洗牌，轮流发完。
    /// - 每个人立即打出手里的对子。
    /// - 手牌最少的玩家先行动。
    pub fn start_session<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GameError> {
        if self.is_playing() {
            return Err(IllegalMove::GameAlreadyStarted.into());
        }
        self.players.retain(|p| !p.departed);

        let count = self.players.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&count) {
            return Err(IllegalMove::InvalidPlayerCount { count, min: MIN_PLAYERS, max: MAX_PLAYERS }.into());
        }

        self.players.iter_mut().for_each(Player::reset);
        self.discarded.clear();
        self.winner_idx = None;
        self.loser_idx = None;

        let deck = Deck::shuffled(rng);
        self.dealt_cards = deck.len();
        let hands = deck.deal(count);
        for (player, hand) in self.players.iter_mut().zip(hands) {
            player.hand = hand;
            let formed = extract_pairs(player);
            debug!("{} 发牌后打出 {} 对，剩余 {} 张", player.nickname, formed, player.hand.len());
        }

        let first = starting_player(&self.players);
        self.phase = GamePhase::Playing;
        self.cur_player_idx = Some(first);
        self.players[first].is_active = true;
        self.turn += 1;
        info!("牌桌 {} 开局，{} 名玩家，{} 先行动", self.table_id, count, self.players[first].nickname);

        self.check_invariants()?;
        self.evaluate_game_over()?;
        Ok(())
    }

    /// 处理一次抽牌：这是引擎唯一的出牌状态转换。
    ///
    /// 1. 从目标玩家手中取出指定位置的牌 (校验失败时不修改任何状态)；
    /// 2. 放入当前玩家手中并自动配对；
    /// 3. 判断游戏是否结束；
    /// 4. 未结束则把行动权交给下一个有牌的玩家。
    pub fn pick(&mut self, actor_id: PlayerId, target_idx: usize, card_idx: usize) -> Result<PickOutcome, GameError> {
        let actor_idx = self.validate_pick(actor_id, target_idx, card_idx)?;

        let card = self.players[target_idx].hand.remove(card_idx);
        let actor = &mut self.players[actor_idx];
        actor.hand.push(card);
        let pairs_formed = extract_pairs(actor);
        self.turn += 1;
        debug!(
            "{} 从 {} 手中抽到 {}，配成 {} 对",
            self.players[actor_idx].nickname, self.players[target_idx].nickname, card, pairs_formed
        );

        self.check_invariants()?;
        let game_over = self.evaluate_game_over()?;
        if !game_over {
            self.advance_turn();
        }

        Ok(PickOutcome {
            actor_idx,
            target_idx,
            card,
            pairs_formed,
            next_player_idx: self.cur_player_idx,
            game_over,
        })
    }

    /// 当前玩家没有可抽牌的对象时跳过本回合。
    /// 返回游戏是否因此结束。
    pub fn pass_turn(&mut self) -> Result<bool, GameError> {
        let actor_idx = match (self.is_playing(), self.cur_player_idx) {
            (true, Some(idx)) => idx,
            _ => return Err(IllegalMove::GameNotInProgress.into()),
        };
        if let Some(expected) = self.selectable_target(actor_idx) {
            return Err(IllegalMove::TargetAvailable(expected).into());
        }

        self.turn += 1;
        let game_over = self.evaluate_game_over()?;
        if !game_over {
            self.advance_turn();
        }
        Ok(game_over)
    }

    /// 打乱某位玩家手牌的顺序。
    /// 不影响规则，但会改变每个位置上是哪一张牌，之后的抽牌仍按位置进行。
    pub fn shuffle_hand<R: Rng + ?Sized>(&mut self, player_idx: usize, rng: &mut R) -> Result<(), IllegalMove> {
        let player = self.players.get_mut(player_idx).ok_or(IllegalMove::NoSuchSeat(player_idx))?;
        player.hand.shuffle(rng);
        Ok(())
    }

    /// 玩家离开牌桌。
    ///
    /// - 开局前或游戏结束后：直接让出座位 (结束后只做标记，保留结算结果)。
    /// - 游戏进行中：该玩家被标记为已离开，手牌退出游戏，之后轮转时跳过他。
    ///   如果小丑随他一起离开，视为认输，他成为输家，游戏立即结束。
    ///   如果正轮到他行动，行动权强制交给下一位。
    ///
    /// 返回游戏是否因此结束。
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<bool, GameError> {
        let idx = self.player_index(&player_id).ok_or(IllegalMove::UnknownPlayer(player_id))?;

        match self.phase {
            GamePhase::WaitingForPlayers => {
                self.players.remove(idx);
                return Ok(false);
            }
            GamePhase::GameOver | GamePhase::Aborted => {
                self.players[idx].departed = true;
                return Ok(false);
            }
            GamePhase::Playing => {}
        }

        let player = &mut self.players[idx];
        player.departed = true;
        let had_joker = player.has_joker();
        self.discarded.append(&mut player.hand);
        self.turn += 1;
        info!("{} 离开了牌桌 {}，{} 张牌退出游戏", self.players[idx].nickname, self.table_id, self.discarded.len());

        if had_joker {
            self.finish(idx);
            return Ok(true);
        }

        let game_over = self.evaluate_game_over()?;
        if !game_over && self.cur_player_idx == Some(idx) {
            self.advance_turn();
        }
        Ok(game_over)
    }

    // --- 辅助逻辑函数 ---

    /// 校验一次抽牌是否合法，返回行动者的索引
    fn validate_pick(&self, actor_id: PlayerId, target_idx: usize, card_idx: usize) -> Result<usize, IllegalMove> {
        if !self.is_playing() {
            return Err(IllegalMove::GameNotInProgress);
        }
        let actor_idx = self.player_index(&actor_id).ok_or(IllegalMove::UnknownPlayer(actor_id))?;
        if self.cur_player_idx != Some(actor_idx) {
            return Err(IllegalMove::NotYourTurn(actor_id));
        }

        let expected = self.selectable_target(actor_idx).ok_or(IllegalMove::NoSelectableTarget)?;
        let target = self.players.get(target_idx).ok_or(IllegalMove::NoSuchSeat(target_idx))?;
        // 空手的玩家永远不是合法目标，单独报错
        if !target.has_cards() {
            return Err(IllegalMove::EmptyHand(target_idx));
        }
        if target_idx != expected {
            return Err(IllegalMove::WrongTarget { expected, requested: target_idx });
        }

        let len = target.hand.len();
        if card_idx >= len {
            return Err(IllegalMove::CardIndexOutOfRange { index: card_idx, len });
        }
        Ok(actor_idx)
    }

    /// 将行动权转移给下一位手上有牌的玩家
    fn advance_turn(&mut self) {
        let Some(cur) = self.cur_player_idx else { return };
        self.players[cur].is_active = false;

        let next = scan_after(self.players.len(), cur, |idx| self.players[idx].has_cards()).unwrap_or(cur);
        self.cur_player_idx = Some(next);
        self.players[next].is_active = true;
    }

    /// 判断游戏是否结束：恰好只剩一位玩家有牌，且小丑在他手里。
    fn evaluate_game_over(&mut self) -> Result<bool, InvariantViolation> {
        match self.holders().as_slice() {
            [lone] => {
                let lone = *lone;
                if self.players[lone].has_joker() {
                    self.finish(lone);
                    Ok(true)
                } else {
                    Err(self.abort(InvariantViolation::LoneHandWithoutJoker(lone)))
                }
            }
            [] => Err(self.abort(InvariantViolation::JokerMissing)),
            _ => Ok(false),
        }
    }

    /// 检查牌数守恒，以及小丑从未进入任何人的对子
    fn check_invariants(&mut self) -> Result<(), InvariantViolation> {
        if let Some(idx) = self.players.iter().position(|p| p.pairs.iter().any(|(a, b)| a.is_joker() || b.is_joker())) {
            return Err(self.abort(InvariantViolation::JokerPaired(idx)));
        }
        let (expected, found) = (self.dealt_cards, self.cards_accounted());
        if found != expected {
            return Err(self.abort(InvariantViolation::CardCountMismatch { expected, found }));
        }
        Ok(())
    }

    /// 结算：loser 是唯一的输家，其余所有人共同获胜
    fn finish(&mut self, loser: usize) {
        self.phase = GamePhase::GameOver;
        self.cur_player_idx = None;
        for (idx, player) in self.players.iter_mut().enumerate() {
            player.is_active = false;
            player.is_loser = idx == loser;
        }
        self.loser_idx = Some(loser);
        self.winner_idx = (0..self.players.len())
            .find(|&idx| idx != loser && !self.players[idx].departed)
            .or_else(|| (0..self.players.len()).find(|&idx| idx != loser));
        info!("牌桌 {} 游戏结束，{} 拿着小丑输了", self.table_id, self.players[loser].nickname);
    }

    fn abort(&mut self, violation: InvariantViolation) -> InvariantViolation {
        error!("牌桌 {} 不变量被破坏: {}", self.table_id, violation);
        self.phase = GamePhase::Aborted;
        self.cur_player_idx = None;
        self.players.iter_mut().for_each(|p| p.is_active = false);
        violation
    }
}

// --- 单元测试 ---
