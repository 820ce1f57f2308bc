use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
// --- 核心数据结构定义 ---

/// 一副牌的总张数：4 种花色 × 12 个点数（去掉 J）+ 1 张小丑
pub const DECK_SIZE: usize = 49;

/// 花色 (Suit)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 ♠️
    Heart,   // 红心 ♥️
    Diamond, // 方块 ♦️
    Club,    // 梅花 ♣️
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Diamond, Suit::Club];

    pub fn is_red(&self) -> bool {
        matches!(self, Suit::Heart | Suit::Diamond)
    }
}

/// 点数 (Rank)
/// 这个变体里没有 J (11)，因此 J 在类型层面上就无法被构造出来。
/// 判别值与牌面数值一致：A=1，Q=12，K=13。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rank {
    Ace = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Queen = 12,
    King = 13,
}

impl Rank {
    pub const ALL: [Rank; 12] = [
        Rank::Ace, Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six,
        Rank::Seven, Rank::Eight, Rank::Nine, Rank::Ten, Rank::Queen, Rank::King,
    ];

    /// 牌面数值 (1..=13，不含 11)
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// 单张牌 (Card)
/// 普通牌由点数和花色组成；小丑 (Joker) 没有花色，也永远无法配对。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Card {
    Standard { rank: Rank, suit: Suit },
    Joker,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card::Standard { rank, suit }
    }

    pub fn is_joker(&self) -> bool {
        matches!(self, Card::Joker)
    }

    pub fn rank(&self) -> Option<Rank> {
        match self {
            Card::Standard { rank, .. } => Some(*rank),
            Card::Joker => None,
        }
    }

    pub fn suit(&self) -> Option<Suit> {
        match self {
            Card::Standard { suit, .. } => Some(*suit),
            Card::Joker => None,
        }
    }

    /// 两张普通牌点数相同即为一对；小丑和任何牌都不匹配
    pub fn matches(&self, other: &Card) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// 红色牌：红心、方块，以及小丑
    pub fn is_red(&self) -> bool {
        match self {
            Card::Standard { suit, .. } => suit.is_red(),
            Card::Joker => true,
        }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Diamond => "♦",
            Suit::Club => "♣",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rank::Ace => write!(f, "A"),
            Rank::Queen => write!(f, "Q"),
            Rank::King => write!(f, "K"),
            other => write!(f, "{}", other.value()),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Card::Standard { rank, suit } => write!(f, "{}{}", suit, rank),
            Card::Joker => write!(f, "JOKER"),
        }
    }
}

// --- 牌堆 ---

/// 一局游戏使用的牌堆。
/// 每局新建一次，洗牌后被发牌过程完全消耗，之后不再存在。
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// 按固定顺序创建一副 49 张的牌：48 张普通牌 + 1 张小丑
    pub fn new() -> Deck {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        cards.push(Card::Joker);
        Deck { cards }
    }

    /// 创建并洗好一副牌
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Deck {
        let mut deck = Deck::new();
        deck.shuffle(rng);
        deck
    }

    /// Fisher-Yates 均匀洗牌
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// 轮流发牌：每次从牌堆顶部取一张，依次发给 0, 1, 2... 号玩家，直到发完。
    /// 多出来的牌落在靠前的座位上，各手牌张数最多相差 1。
    pub fn deal(mut self, num_players: usize) -> Vec<Vec<Card>> {
        let mut hands = vec![Vec::new(); num_players];
        if num_players == 0 {
            return hands;
        }
        let mut seat = 0;
        while let Some(card) = self.cards.pop() {
            hands[seat].push(card);
            seat = (seat + 1) % num_players;
        }
        hands
    }
}

impl Default for Deck {
    fn default() -> Self {
        Deck::new()
    }
}

// --- 单元测试 ---
