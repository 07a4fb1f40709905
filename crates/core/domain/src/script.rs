use serde::{Deserialize, Serialize};

const KEY_PREFIX: &str = "script";

/// 用户解析脚本。
///
/// 一旦被运行中的流水线引用，源码即视为不可变：更新会编译出新的程序，
/// 而不是原地修改正在运行的程序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeScript {
    /// ≤ 0 表示由存储分配
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub script: String,
}

impl DecodeScript {
    /// 稳定的缓存/注册表 key。
    pub fn key(&self) -> String {
        Self::key_for(self.id)
    }

    pub fn key_for(id: i64) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    /// 从 key 还原脚本 ID（`script12` → 12）。
    pub fn parse_key(key: &str) -> Option<i64> {
        key.strip_prefix(KEY_PREFIX)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_id() {
        let script = DecodeScript {
            id: 12,
            name: "meter".to_string(),
            script: String::new(),
        };
        assert_eq!(script.key(), "script12");
        assert_eq!(DecodeScript::parse_key("script12"), Some(12));
        assert_eq!(DecodeScript::parse_key("script"), None);
        assert_eq!(DecodeScript::parse_key("modbus_tcp"), None);
    }
}
