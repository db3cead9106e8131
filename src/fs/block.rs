use log::debug;

use crate::{
    disk::{Block, BlockDevice, BLOCK_SIZE},
    fs::{
        bitmap::{BitmapAllocator, BitmapKind},
        config::{DIR_ENTRY_SIZE, ENTRIES_PER_BLOCK},
        directory::{names_match, DirEntry},
        error::{FsError, Result},
        super_block::SuperBlock,
    },
};

/// 作为目录块使用的数据块：4096 字节里紧密排列 128 条目录项记录
#[derive(Debug, Clone)]
pub struct DirBlock {
    index: u32,
    data: Box<Block>,
}

impl DirBlock {
    /// 全零的新块，所有槽位都是空的
    pub fn new(index: u32) -> Self {
        Self {
            index,
            data: Box::new([0; BLOCK_SIZE]),
        }
    }

    pub fn load(device: &dyn BlockDevice, sb: &SuperBlock, index: u32) -> Result<Self> {
        let mut block = Self::new(index);
        device.read_at(sb.block_offset(index)?, block.data.as_mut_slice())?;
        Ok(block)
    }

    pub fn store(&self, device: &dyn BlockDevice, sb: &SuperBlock) -> Result<()> {
        device.write_at(sb.block_offset(self.index)?, self.data.as_slice())?;
        debug!("stored block {}", self.index);
        Ok(())
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn record(&self, slot: usize) -> &[u8] {
        &self.data[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE]
    }

    /// 第 `slot` 条记录，空槽位返回 None
    pub fn entry(&self, slot: usize) -> Result<Option<DirEntry>> {
        let entry = DirEntry::decode(self.record(slot))?;
        Ok((!entry.is_unused()).then_some(entry))
    }

    /// 跳过前 `skip` 条记录后的所有已用目录项
    pub fn read_entries(&self, skip: usize) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for slot in skip..ENTRIES_PER_BLOCK {
            if let Some(entry) = self.entry(slot)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// 跳过前 `skip` 条记录后，名字匹配的第一条记录的槽位
    pub fn find_slot(&self, name: &str, skip: usize) -> Result<Option<usize>> {
        for slot in skip..ENTRIES_PER_BLOCK {
            if let Some(entry) = self.entry(slot)? {
                if names_match(&entry.name, name) {
                    return Ok(Some(slot));
                }
            }
        }
        Ok(None)
    }

    /// 写入第一个 inode 编号为 0 的槽位
    pub fn add_entry(&mut self, entry: &DirEntry) -> Result<usize> {
        let bytes = entry.encode()?;
        for slot in 0..ENTRIES_PER_BLOCK {
            // 只看 inode 字段，名字不用解码
            if self.record(slot)[..4] == [0; 4] {
                self.data[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE]
                    .copy_from_slice(&bytes);
                return Ok(slot);
            }
        }
        Err(FsError::BlockFull(self.index))
    }

    /// 清零一条记录，使其重新成为空槽位
    pub fn remove_entry(&mut self, slot: usize) {
        self.data[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE].fill(0);
    }

    fn bit(&self) -> Result<u32> {
        self.index
            .checked_sub(1)
            .ok_or(FsError::InvalidBlock(self.index))
    }

    pub fn set_in_use(&self, device: &dyn BlockDevice, sb: &SuperBlock, value: bool) -> Result<()> {
        BitmapAllocator::new(device, sb).write_bit(BitmapKind::Block, self.bit()?, value)
    }

    pub fn is_in_use(&self, device: &dyn BlockDevice, sb: &SuperBlock) -> Result<bool> {
        BitmapAllocator::new(device, sb).is_set(BitmapKind::Block, self.bit()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    #[test]
    fn add_entry_uses_first_unused_slot() {
        let mut block = DirBlock::new(1);
        assert_eq!(block.add_entry(&DirEntry::new(1, "/")).unwrap(), 0);
        assert_eq!(block.add_entry(&DirEntry::new(1, "/")).unwrap(), 1);
        assert_eq!(block.add_entry(&DirEntry::new(4, "a")).unwrap(), 2);
        assert_eq!(block.add_entry(&DirEntry::new(5, "b")).unwrap(), 3);

        block.remove_entry(2);
        assert_eq!(block.add_entry(&DirEntry::new(6, "c")).unwrap(), 2);
    }

    #[test]
    fn read_entries_skips_anchor_records() {
        let mut block = DirBlock::new(1);
        block.add_entry(&DirEntry::new(2, "self")).unwrap();
        block.add_entry(&DirEntry::new(1, "/")).unwrap();
        block.add_entry(&DirEntry::new(3, "child")).unwrap();

        assert_eq!(block.read_entries(2).unwrap(), vec![DirEntry::new(3, "child")]);
        assert_eq!(block.read_entries(0).unwrap().len(), 3);
        assert_eq!(block.find_slot("CHILD", 2).unwrap(), Some(2));
        assert_eq!(block.find_slot("self", 2).unwrap(), None);
    }

    #[test]
    fn block_full_after_all_slots_used() {
        let mut block = DirBlock::new(7);
        for i in 0..ENTRIES_PER_BLOCK {
            block
                .add_entry(&DirEntry::new(i as u32 + 1, &format!("d{}", i)))
                .unwrap();
        }
        assert!(matches!(
            block.add_entry(&DirEntry::new(999, "extra")),
            Err(FsError::BlockFull(7))
        ));
    }

    #[test]
    fn store_then_load_and_bitmap() {
        let sb = SuperBlock::new(4);
        let disk = MemDisk::new();
        disk.write_at(0, &vec![0u8; sb.image_len() as usize]).unwrap();

        let mut block = DirBlock::new(3);
        block.add_entry(&DirEntry::new(8, "docs")).unwrap();
        block.store(&disk, &sb).unwrap();
        block.set_in_use(&disk, &sb, true).unwrap();

        let loaded = DirBlock::load(&disk, &sb, 3).unwrap();
        assert_eq!(loaded.entry(0).unwrap(), Some(DirEntry::new(8, "docs")));
        assert_eq!(loaded.entry(1).unwrap(), None);
        assert!(loaded.is_in_use(&disk, &sb).unwrap());
        assert!(!DirBlock::new(2).is_in_use(&disk, &sb).unwrap());
    }
}
