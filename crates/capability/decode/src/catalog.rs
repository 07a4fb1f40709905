use crate::BuiltinDecoder;
use domain::DecoderInfo;
use std::collections::HashSet;
use std::sync::RwLock;

/// 解析器目录：静态条目 + 运行时注册的自定义脚本。
#[derive(Debug, Default)]
pub struct DecoderCatalog {
    custom: RwLock<Vec<DecoderInfo>>,
}

impl DecoderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 静态目录（含透传）。
    pub fn all() -> Vec<DecoderInfo> {
        vec![
            DecoderInfo::new(BuiltinDecoder::DLT645, "DLT645协议"),
            DecoderInfo::new(BuiltinDecoder::MODBUS_RTU, "Modbus RTU协议"),
            DecoderInfo::new(BuiltinDecoder::MODBUS_TCP, "Modbus TCP协议"),
            DecoderInfo::new("script", "自定义协议"),
            DecoderInfo::new(BuiltinDecoder::PASS, "忽略"),
        ]
    }

    /// 注册自定义条目；同 key 覆盖名称。
    pub fn register(&self, info: DecoderInfo) {
        let mut custom = match self.custom.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match custom.iter_mut().find(|existing| existing.key == info.key) {
            Some(existing) => existing.name = info.name,
            None => custom.push(info),
        }
    }

    pub fn unregister(&self, key: &str) -> bool {
        let mut custom = match self.custom.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = custom.len();
        custom.retain(|info| info.key != key);
        custom.len() != before
    }

    /// 静态条目在前，自定义条目按注册顺序追加；key 重复的只保留第一次出现。
    pub fn list(&self) -> Vec<DecoderInfo> {
        let custom = match self.custom.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut seen = HashSet::new();
        Self::all()
            .into_iter()
            .chain(custom.iter().cloned())
            .filter(|info| seen.insert(info.key.clone()))
            .collect()
    }
}
