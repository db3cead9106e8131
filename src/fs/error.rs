use std::fmt;

use thiserror::Error;

/// 资源耗尽的具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    NoInode,       // inode 位图已满
    NoBlock,       // 数据块位图已满
    DirectoryFull, // 目录的 12 个指针块全部写满
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInode => write!(f, "no empty inode available"),
            Self::NoBlock => write!(f, "no empty block available"),
            Self::DirectoryFull => write!(f, "directory full"),
        }
    }
}

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(Capacity),

    #[error("Directory already exists: {0}")]
    DuplicateName(String),

    #[error("File or directory not found: {0}")]
    NotFound(String),

    #[error("File system corrupted: {0}")]
    LayoutCorruption(String),

    #[error("Inode {0} has no free block pointer")]
    InodeFull(u32),

    #[error("Block {0} has no free entry slot")]
    BlockFull(u32),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Invalid block count: {0}")]
    InvalidBlockCount(u32),

    #[error("Invalid inode: {0}")]
    InvalidInode(u32),

    #[error("Invalid block: {0}")]
    InvalidBlock(u32),

    #[error("Expected a directory: {0}")]
    NotADirectory(String),

    #[error("Directory is not empty: {0}")]
    DirectoryNotEmpty(String),
}

impl FsError {
    /// 由调用参数或当前目录内容决定的失败：容量耗尽、重名、找不到、
    /// 名字或块数非法、目录非空。这些错误返回前不会修改镜像
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::CapacityExhausted(_)
                | Self::DuplicateName(_)
                | Self::NotFound(_)
                | Self::InvalidName(_)
                | Self::InvalidBlockCount(_)
                | Self::DirectoryNotEmpty(_)
        )
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FsError>;
