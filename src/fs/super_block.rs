use bincode::Options;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, BLOCK_SIZE},
    fs::{
        config::{codec, HEADER_SIZE, INODE_SIZE, MAGIC, MAX_BLOCK_COUNT, TOTAL_INODES},
        error::{FsError, Result},
    },
};

/// 镜像开头实际持久化的三个整数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Header {
    magic: u32,
    block_count: u32,
    block_size: u32,
}

/// 超级块：描述镜像布局，并推导出所有区域的偏移
///
/// 镜像布局：
///
/// ```text
/// 0                        header (magic | block_count | block_size)
/// 12                       inode 位图, ceil(inode_count / 8) 字节
/// 12 + inode 位图大小       数据块位图, ceil(block_count / 8) 字节
/// 两个位图之后              inode 表, inode_count * 49 字节
/// inode 表之后              数据区, block_count * 4096 字节
/// ```
///
/// 除 header 外的所有偏移都不落盘，每次打开镜像时重新计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_count: u32,
    pub block_size: u32,
    pub inode_count: u32,
}

impl SuperBlock {
    /// 格式化时使用的新超级块
    pub fn new(block_count: u32) -> Self {
        Self {
            magic: MAGIC,
            block_count,
            block_size: BLOCK_SIZE as u32,
            inode_count: TOTAL_INODES,
        }
    }

    /// 格式化前检查块数，必须在清空镜像之前调用
    pub fn check_block_count(block_count: u32) -> Result<()> {
        if block_count == 0 || block_count > MAX_BLOCK_COUNT {
            return Err(FsError::InvalidBlockCount(block_count));
        }
        Ok(())
    }

    /// 从镜像头部重建超级块，并校验布局
    pub fn read(device: &dyn BlockDevice) -> Result<Self> {
        let image_len = device.len()?;
        if image_len < HEADER_SIZE {
            return Err(FsError::LayoutCorruption(format!(
                "image is {} bytes, too short for a header",
                image_len
            )));
        }

        let mut buf = [0u8; HEADER_SIZE as usize];
        device.read_at(0, &mut buf)?;
        let header: Header = codec().deserialize(&buf)?;

        if header.magic != MAGIC {
            return Err(FsError::LayoutCorruption(format!(
                "bad magic number {:#010x}, expected {:#010x}",
                header.magic, MAGIC
            )));
        }
        if header.block_size != BLOCK_SIZE as u32 {
            return Err(FsError::LayoutCorruption(format!(
                "unsupported block size {}",
                header.block_size
            )));
        }
        if header.block_count == 0 {
            return Err(FsError::LayoutCorruption("block count is zero".to_string()));
        }

        let sb = Self {
            magic: header.magic,
            block_count: header.block_count,
            block_size: header.block_size,
            inode_count: TOTAL_INODES,
        };

        if image_len < sb.image_len() {
            return Err(FsError::LayoutCorruption(format!(
                "image is {} bytes, layout needs {}",
                image_len,
                sb.image_len()
            )));
        }

        debug!("read superblock: {:?}", sb);
        Ok(sb)
    }

    pub fn write(&self, device: &dyn BlockDevice) -> Result<()> {
        let header = Header {
            magic: self.magic,
            block_count: self.block_count,
            block_size: self.block_size,
        };
        let bytes = codec().serialize(&header)?;
        device.write_at(0, &bytes)?;
        Ok(())
    }

    pub fn inode_bitmap_offset(&self) -> u64 {
        HEADER_SIZE
    }

    /// ceil(inode_count / 8)
    pub fn inode_bitmap_size(&self) -> u64 {
        (self.inode_count as u64 + 7) / 8
    }

    pub fn block_bitmap_offset(&self) -> u64 {
        self.inode_bitmap_offset() + self.inode_bitmap_size()
    }

    /// ceil(block_count / 8)
    pub fn block_bitmap_size(&self) -> u64 {
        (self.block_count as u64 + 7) / 8
    }

    pub fn inode_table_offset(&self) -> u64 {
        self.block_bitmap_offset() + self.block_bitmap_size()
    }

    pub fn block_region_offset(&self) -> u64 {
        self.inode_table_offset() + self.inode_count as u64 * INODE_SIZE
    }

    /// 整个镜像应有的字节数
    pub fn image_len(&self) -> u64 {
        self.block_region_offset() + self.block_count as u64 * self.block_size as u64
    }

    /// inode 记录的字节偏移，index 从 1 开始
    pub fn inode_offset(&self, index: u32) -> Result<u64> {
        if index == 0 || index > self.inode_count {
            return Err(FsError::InvalidInode(index));
        }
        Ok(self.inode_table_offset() + (index as u64 - 1) * INODE_SIZE)
    }

    /// 数据块的字节偏移，index 从 1 开始
    pub fn block_offset(&self, index: u32) -> Result<u64> {
        if index == 0 || index > self.block_count {
            return Err(FsError::InvalidBlock(index));
        }
        Ok(self.block_region_offset() + (index as u64 - 1) * self.block_size as u64)
    }
}
