use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, bail};
use jackass_core::{MAX_PLAYERS, MIN_PLAYERS, ThinkingDelay};

/// 服务器配置，全部来自环境变量，未设置时使用默认值
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub bot_delay: ThinkingDelay,
    // 创建牌桌时未指定座位数则使用该值
    pub default_seats: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], 25917)),
            bot_delay: ThinkingDelay::default(),
            default_seats: MAX_PLAYERS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// - JACKASS_HOST / JACKASS_PORT：监听地址
    /// - JACKASS_BOT_DELAY_MS / JACKASS_BOT_JITTER_MS：机器人思考时间
    /// - JACKASS_DEFAULT_SEATS：默认座位数 (3 或 4)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = ServerConfig::default();

        let host: IpAddr = match lookup("JACKASS_HOST") {
            Some(v) => v.parse().with_context(|| format!("JACKASS_HOST 不是合法的 IP 地址: {}", v))?,
            None => defaults.addr.ip(),
        };
        let port: u16 = parse_or(&lookup, "JACKASS_PORT", defaults.addr.port())?;
        let base_ms = parse_or(&lookup, "JACKASS_BOT_DELAY_MS", defaults.bot_delay.base_ms)?;
        let jitter_ms = parse_or(&lookup, "JACKASS_BOT_JITTER_MS", defaults.bot_delay.jitter_ms)?;
        let default_seats = parse_or(&lookup, "JACKASS_DEFAULT_SEATS", defaults.default_seats)?;
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&default_seats) {
            bail!("JACKASS_DEFAULT_SEATS 必须在 {} 到 {} 之间，当前为 {}", MIN_PLAYERS, MAX_PLAYERS, default_seats);
        }

        Ok(ServerConfig {
            addr: SocketAddr::new(host, port),
            bot_delay: ThinkingDelay { base_ms, jitter_ms },
            default_seats,
        })
    }

    /// 客户端请求的座位数，超出范围时截断到 3..=4
    pub fn seats_for(&self, requested: Option<u8>) -> usize {
        requested.map_or(self.default_seats, |n| (n as usize).clamp(MIN_PLAYERS, MAX_PLAYERS))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v.trim().parse().with_context(|| format!("{} 的值无效: {}", key, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.addr, SocketAddr::from(([0, 0, 0, 0], 25917)));
        assert_eq!(config.bot_delay, ThinkingDelay { base_ms: 2000, jitter_ms: 1000 });
        assert_eq!(config.default_seats, 4);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("JACKASS_HOST", "127.0.0.1"),
            ("JACKASS_PORT", "4000"),
            ("JACKASS_BOT_DELAY_MS", "0"),
            ("JACKASS_BOT_JITTER_MS", "50"),
            ("JACKASS_DEFAULT_SEATS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(config.bot_delay, ThinkingDelay { base_ms: 0, jitter_ms: 50 });
        assert_eq!(config.default_seats, 3);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("JACKASS_PORT", "abc")])).is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[("JACKASS_HOST", "not-an-ip")])).is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[("JACKASS_DEFAULT_SEATS", "6")])).is_err());
    }

    #[test]
    fn test_seats_for_clamps() {
        let config = ServerConfig::default();
        assert_eq!(config.seats_for(None), 4);
        assert_eq!(config.seats_for(Some(3)), 3);
        assert_eq!(config.seats_for(Some(2)), 3);
        assert_eq!(config.seats_for(Some(9)), 4);
    }
}
