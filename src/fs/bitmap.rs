use log::debug;

use crate::{
    disk::BlockDevice,
    fs::{
        error::{Capacity, FsError, Result},
        super_block::SuperBlock,
    },
};

/// 位图种类：inode 位图或数据块位图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    Inode,
    Block,
}

/// 第 `index` 位所在的字节下标以及掩码。
///
/// 单元 K 的位对应第 ⌊K/8⌋ 个字节的最高位优先：K mod 8 == 0 是 0x80，
/// K mod 8 == 7 是 0x01。
pub fn bit_position(index: u32) -> (usize, u8) {
    ((index / 8) as usize, 0x80 >> (index % 8))
}

/// 在已读出的位图中查找第一个空闲位，跳过 `exclude` 中的下标
pub fn first_free(bits: &[bool], exclude: &[u32]) -> Option<u32> {
    bits.iter()
        .enumerate()
        .find(|(i, used)| !**used && !exclude.contains(&(*i as u32)))
        .map(|(i, _)| i as u32)
}

/// 直接在镜像上操作的位图分配器，不做任何缓存
pub struct BitmapAllocator<'a> {
    device: &'a dyn BlockDevice,
    super_block: &'a SuperBlock,
}

impl<'a> BitmapAllocator<'a> {
    pub fn new(device: &'a dyn BlockDevice, super_block: &'a SuperBlock) -> Self {
        Self {
            device,
            super_block,
        }
    }

    /// (起始偏移, 字节数, 单元总数)
    fn region(&self, kind: BitmapKind) -> (u64, u64, u32) {
        let sb = self.super_block;
        match kind {
            BitmapKind::Inode => (
                sb.inode_bitmap_offset(),
                sb.inode_bitmap_size(),
                sb.inode_count,
            ),
            BitmapKind::Block => (
                sb.block_bitmap_offset(),
                sb.block_bitmap_size(),
                sb.block_count,
            ),
        }
    }

    fn check_index(&self, kind: BitmapKind, index: u32) -> Result<()> {
        let (_, _, count) = self.region(kind);
        if index >= count {
            return Err(match kind {
                BitmapKind::Inode => FsError::InvalidInode(index + 1),
                BitmapKind::Block => FsError::InvalidBlock(index + 1),
            });
        }
        Ok(())
    }

    /// 读出整张位图，每个单元一个 bool，false 表示空闲。
    /// 最后一个字节里多出来的填充位不会出现在结果中。
    pub fn read_all(&self, kind: BitmapKind) -> Result<Vec<bool>> {
        let (offset, size, count) = self.region(kind);
        let mut bytes = vec![0u8; size as usize];
        self.device.read_at(offset, &mut bytes)?;

        Ok((0..count)
            .map(|i| {
                let (byte, mask) = bit_position(i);
                bytes[byte] & mask != 0
            })
            .collect())
    }

    pub fn is_set(&self, kind: BitmapKind, index: u32) -> Result<bool> {
        self.check_index(kind, index)?;
        let (offset, _, _) = self.region(kind);
        let (byte, mask) = bit_position(index);

        let mut buf = [0u8; 1];
        self.device.read_at(offset + byte as u64, &mut buf)?;
        Ok(buf[0] & mask != 0)
    }

    /// 读-改-写单个字节，两步之间没有原子性保证
    pub fn write_bit(&self, kind: BitmapKind, index: u32, value: bool) -> Result<()> {
        self.check_index(kind, index)?;
        let (offset, _, _) = self.region(kind);
        let (byte, mask) = bit_position(index);
        let pos = offset + byte as u64;

        let mut buf = [0u8; 1];
        self.device.read_at(pos, &mut buf)?;
        if value {
            buf[0] |= mask;
        } else {
            buf[0] &= !mask;
        }
        self.device.write_at(pos, &buf)?;

        debug!("{:?} bitmap bit {} <- {}", kind, index, value);
        Ok(())
    }

    /// 线性扫描，返回第一个空闲位的下标（从 0 开始）
    pub fn find_first_free(&self, kind: BitmapKind) -> Result<u32> {
        first_free(&self.read_all(kind)?, &[]).ok_or(FsError::CapacityExhausted(match kind {
            BitmapKind::Inode => Capacity::NoInode,
            BitmapKind::Block => Capacity::NoBlock,
        }))
    }

    pub fn count_used(&self, kind: BitmapKind) -> Result<u32> {
        Ok(self.read_all(kind)?.iter().filter(|used| **used).count() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    fn blank(block_count: u32) -> (MemDisk, SuperBlock) {
        let sb = SuperBlock::new(block_count);
        let disk = MemDisk::new();
        disk.write_at(0, &vec![0u8; sb.inode_table_offset() as usize])
            .unwrap();
        (disk, sb)
    }

    #[test]
    fn bit_position_is_msb_first() {
        assert_eq!(bit_position(0), (0, 0x80));
        assert_eq!(bit_position(7), (0, 0x01));
        assert_eq!(bit_position(8), (1, 0x80));
        assert_eq!(bit_position(13), (1, 0x04));
    }

    #[test]
    fn first_free_honours_exclusions() {
        let bits = [true, false, false, true, false];
        assert_eq!(first_free(&bits, &[]), Some(1));
        assert_eq!(first_free(&bits, &[1]), Some(2));
        assert_eq!(first_free(&bits, &[1, 2, 4]), None);
    }

    #[test]
    fn write_bit_has_no_cross_talk() {
        let (disk, sb) = blank(20);
        let bitmap = BitmapAllocator::new(&disk, &sb);

        for i in 0..20 {
            bitmap.write_bit(BitmapKind::Block, i, true).unwrap();
            let bits = bitmap.read_all(BitmapKind::Block).unwrap();
            assert_eq!(bits.len(), 20);
            for (j, bit) in bits.iter().enumerate() {
                assert_eq!(*bit, j as u32 == i, "bit {} after setting {}", j, i);
            }
            bitmap.write_bit(BitmapKind::Block, i, false).unwrap();
        }

        assert!(bitmap
            .read_all(BitmapKind::Inode)
            .unwrap()
            .iter()
            .all(|b| !b));
    }

    #[test]
    fn clearing_one_bit_keeps_set_neighbours() {
        let (disk, sb) = blank(20);
        let bitmap = BitmapAllocator::new(&disk, &sb);

        for kind in [BitmapKind::Inode, BitmapKind::Block] {
            let (_, _, count) = bitmap.region(kind);
            for i in 0..count {
                bitmap.write_bit(kind, i, true).unwrap();
            }
            bitmap.write_bit(kind, 9, false).unwrap();

            let bits = bitmap.read_all(kind).unwrap();
            for (j, bit) in bits.iter().enumerate() {
                assert_eq!(*bit, j != 9, "{:?} bit {}", kind, j);
            }
            assert!(!bitmap.is_set(kind, 9).unwrap());
            assert_eq!(bitmap.count_used(kind).unwrap(), count - 1);
        }
    }

    #[test]
    fn on_disk_byte_matches_bit_order() {
        let (disk, sb) = blank(16);
        let bitmap = BitmapAllocator::new(&disk, &sb);
        bitmap.write_bit(BitmapKind::Block, 0, true).unwrap();
        bitmap.write_bit(BitmapKind::Block, 9, true).unwrap();

        let mut bytes = [0u8; 2];
        disk.read_at(sb.block_bitmap_offset(), &mut bytes).unwrap();
        assert_eq!(bytes, [0x80, 0x40]);
        assert!(bitmap.is_set(BitmapKind::Block, 9).unwrap());
        assert!(!bitmap.is_set(BitmapKind::Block, 8).unwrap());
    }

    #[test]
    fn find_first_free_scans_linearly() {
        let (disk, sb) = blank(16);
        let bitmap = BitmapAllocator::new(&disk, &sb);
        assert_eq!(bitmap.find_first_free(BitmapKind::Inode).unwrap(), 0);

        bitmap.write_bit(BitmapKind::Inode, 0, true).unwrap();
        assert_eq!(bitmap.find_first_free(BitmapKind::Inode).unwrap(), 1);
        assert_eq!(bitmap.count_used(BitmapKind::Inode).unwrap(), 1);
    }

    #[test]
    fn padding_bits_are_never_allocated() {
        let (disk, sb) = blank(3);
        let bitmap = BitmapAllocator::new(&disk, &sb);
        for i in 0..3 {
            bitmap.write_bit(BitmapKind::Block, i, true).unwrap();
        }
        assert!(matches!(
            bitmap.find_first_free(BitmapKind::Block),
            Err(FsError::CapacityExhausted(Capacity::NoBlock))
        ));
        assert!(matches!(
            bitmap.write_bit(BitmapKind::Block, 3, true),
            Err(FsError::InvalidBlock(4))
        ));
    }
}
