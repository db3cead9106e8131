use bincode::Options;

/// 魔数，用于识别文件系统
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// 超级块头部：magic | block_count | block_size，各 4 字节
pub const HEADER_SIZE: u64 = 12;

/// inode 总数，固定常量，不写入镜像
pub const TOTAL_INODES: u32 = 4096;

/// 格式化时允许的最大数据块个数（数据区 4 GiB）
pub const MAX_BLOCK_COUNT: u32 = 1 << 20;

/// 每个 inode 的直接块指针个数
pub const DIRECT_PTRS: usize = 12;

/// inode 记录大小：1 字节类型 + 12 个 4 字节指针
pub const INODE_SIZE: u64 = 1 + 4 * DIRECT_PTRS as u64;

/// 目录项中名字字段的最大字节数
pub const NAME_LEN: usize = 28;

/// 目录项记录大小：4 字节 inode 编号 + 名字字段
pub const DIR_ENTRY_SIZE: usize = 4 + NAME_LEN;

/// 每个目录块可以容纳的目录项个数
pub const ENTRIES_PER_BLOCK: usize = crate::disk::BLOCK_SIZE / DIR_ENTRY_SIZE;

/// 目录首块开头的锚点项个数（自身 + 父目录）
pub const ANCHOR_COUNT: usize = 2;

/// 根目录 inode 编号
pub const ROOT_INODE: u32 = 1;

/// 根目录的名字
pub const ROOT_NAME: &str = "/";

/// 磁盘记录的编码方式：定长整数、大端序
pub(crate) fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .allow_trailing_bytes()
}
