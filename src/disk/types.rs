/// 每个逻辑块（Block）的大小：4KB
/// 目录块以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 默认的数据块总数：4096 块 * 4KB = 16MB 数据区
pub const DEFAULT_BLOCK_COUNT: u32 = 4096;

/// 定义一个逻辑块类型（每块 4KB 的字节数组）
pub type Block = [u8; BLOCK_SIZE];
