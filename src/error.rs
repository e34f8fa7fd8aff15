use thiserror::Error;

/// Failure kinds surfaced by the engine. Parsing and validation failures
/// are never retried internally; navigation failures leave the session at
/// its prior directory.
#[derive(Debug, Error)]
pub enum Ext2Error {
    #[error("invalid partition table: {0}")]
    PartitionTableInvalid(String),

    #[error("not an ext2 filesystem: {0}")]
    SuperblockInvalid(String),

    #[error("inode {number} out of range (valid inode numbers are 1..={max})")]
    InodeOutOfRange { number: u32, max: u32 },

    #[error("no such file or directory: {0}")]
    PathNotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a regular file: {0}")]
    NotARegularFile(String),

    #[error("read of {len} bytes at byte offset {offset} failed: {detail}")]
    IoRead {
        offset: u64,
        len: usize,
        detail: String,
    },

    #[error("name of {got} bytes exceeds the ext2 maximum of 255")]
    NameTooLong { got: usize },

    #[error("writing to sink failed")]
    Sink(#[source] std::io::Error),
}

impl Ext2Error {
    pub(crate) fn io_read(offset: u64, len: usize, detail: impl Into<String>) -> Self {
        Self::IoRead {
            offset,
            len,
            detail: detail.into(),
        }
    }
}
