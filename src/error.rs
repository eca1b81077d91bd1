use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt journal: {0}")]
    Corrupt(&'static str),
    #[error("unsupported journal version: {0}")]
    UnsupportedVersion(u32),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("journal full")]
    JournalFull,
    #[error("writer already active: {}", .0.display())]
    WriterAlreadyActive(PathBuf),
    #[error("invalid location {field}: {value:?}")]
    InvalidLocation {
        field: &'static str,
        value: String,
    },
    #[error("uid collision {uid:08x}: {existing} vs {incoming}")]
    UidCollision {
        uid: u32,
        existing: String,
        incoming: String,
    },
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("registration ack timeout")]
    RegisterTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;
