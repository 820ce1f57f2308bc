//! # JackAss 核心逻辑库
//!
//! 这个 `core` crate 包含了 JackAss (带小丑的抽鬼牌) 游戏的全部核心状态管理、
//! 发牌与配对规则、回合轮转、胜负判定，以及客户端-服务器通信消息的定义。
//! 它与具体实现（如网络服务器、客户端UI）解耦，引擎本身从不调度任何事情：
//! 由上层 (UI 事件、定时器、网络消息) 调用唯一的状态转换函数推动游戏。

mod bot;
mod card;
mod error;
mod logic;
mod message;
mod state;

pub use bot::*;

pub use card::*;

pub use error::*;

pub use logic::*;

pub use message::*;

pub use state::*;
