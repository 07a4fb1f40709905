//! 存储层错误类型

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("lock failed")]
    Lock,

    #[error("{kind} {id} exists")]
    Exists { kind: &'static str, id: i64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bootstrap file: {0}")]
    Parse(#[from] serde_json::Error),
}
