use bincode::Options;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::BlockDevice,
    fs::{
        bitmap::{BitmapAllocator, BitmapKind},
        config::{codec, DIRECT_PTRS, INODE_SIZE},
        error::{FsError, Result},
        super_block::SuperBlock,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Unused,    // 未使用的记录
    File,      // 文件
    Directory, // 目录
}

impl InodeType {
    fn tag(self) -> u8 {
        match self {
            Self::Unused => 0,
            Self::File => 1,
            Self::Directory => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Unused),
            1 => Some(Self::File),
            2 => Some(Self::Directory),
            _ => None,
        }
    }
}

/// inode 表中的一条 49 字节记录
#[derive(Debug, Serialize, Deserialize)]
struct InodeRecord {
    kind: u8,
    pointers: [u32; DIRECT_PTRS],
}

/// 定长 inode：类型 + 12 个直接块指针，指针为 0 表示该槽位未使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    index: u32,
    pub inode_type: InodeType,
    pointers: [u32; DIRECT_PTRS],
}

impl Inode {
    pub fn new(index: u32, inode_type: InodeType) -> Self {
        Self {
            index,
            inode_type,
            pointers: [0; DIRECT_PTRS],
        }
    }

    pub fn load(device: &dyn BlockDevice, sb: &SuperBlock, index: u32) -> Result<Self> {
        let offset = sb.inode_offset(index)?;
        let mut buf = [0u8; INODE_SIZE as usize];
        device.read_at(offset, &mut buf)?;

        let record: InodeRecord = codec().deserialize(&buf)?;
        let inode_type = InodeType::from_tag(record.kind).ok_or_else(|| {
            FsError::LayoutCorruption(format!(
                "inode {} has unknown type tag {}",
                index, record.kind
            ))
        })?;

        Ok(Self {
            index,
            inode_type,
            pointers: record.pointers,
        })
    }

    pub fn store(&self, device: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
        let offset = sb.inode_offset(self.index)?;
        let record = InodeRecord {
            kind: self.inode_type.tag(),
            pointers: self.pointers,
        };
        device.write_at(offset, &codec().serialize(&record)?)?;
        debug!("stored inode {} {:?}", self.index, self.pointers);
        Ok(())
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn pointers(&self) -> &[u32; DIRECT_PTRS] {
        &self.pointers
    }

    pub fn is_dir(&self) -> bool {
        self.inode_type == InodeType::Directory
    }

    /// 非零指针及其槽位
    pub fn blocks(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.pointers
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, ptr)| *ptr != 0)
    }

    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// 把块号放进第一个值为 0 的槽位，返回槽位下标
    pub fn add_pointer(&mut self, block: u32) -> Result<usize> {
        let slot = self
            .pointers
            .iter()
            .position(|ptr| *ptr == 0)
            .ok_or(FsError::InodeFull(self.index))?;
        self.pointers[slot] = block;
        Ok(slot)
    }

    pub fn set_pointer(&mut self, slot: usize, block: u32) {
        self.pointers[slot] = block;
    }

    pub fn clear(&mut self) {
        self.inode_type = InodeType::Unused;
        self.pointers = [0; DIRECT_PTRS];
    }

    fn bit(&self) -> Result<u32> {
        self.index
            .checked_sub(1)
            .ok_or(FsError::InvalidInode(self.index))
    }

    pub fn set_in_use(&self, device: &dyn BlockDevice, sb: &SuperBlock, value: bool) -> Result<()> {
        BitmapAllocator::new(device, sb).write_bit(BitmapKind::Inode, self.bit()?, value)
    }

    pub fn is_in_use(&self, device: &dyn BlockDevice, sb: &SuperBlock) -> Result<bool> {
        BitmapAllocator::new(device, sb).is_set(BitmapKind::Inode, self.bit()?)
    }
}
