use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::{
    disk::{BlockDevice, BLOCK_SIZE},
    fs::{
        bitmap::{first_free, BitmapAllocator, BitmapKind},
        block::DirBlock,
        config::{ANCHOR_COUNT, DIRECT_PTRS, INODE_SIZE, ROOT_INODE, ROOT_NAME},
        directory::{find_entry, validate_name, DirEntry, DirectoryReader},
        error::{Capacity, FsError, Result},
        inode_table::{Inode, InodeType},
        super_block::SuperBlock,
    },
};

pub mod bitmap;
pub mod block;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode_table;
pub mod super_block;

/// inode 与数据块的使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub inodes_used: u32,
    pub inodes_total: u32,
    pub blocks_used: u32,
    pub blocks_total: u32,
}

/// 目录首块跳过两条锚点，其余块全部扫描
fn skip_for_slot(slot: usize) -> usize {
    if slot == 0 {
        ANCHOR_COUNT
    } else {
        0
    }
}

/// 建立在单个镜像文件上的文件系统。
///
/// 不保存“当前目录”：调用方持有一个 [`DirEntry`] 作为工作目录并在每次
/// 调用时传入。每个逻辑操作在执行期间持有整个镜像的互斥锁，但多次写盘
/// 之间没有事务，中途的 I/O 失败会留下部分更新。
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: D,
    super_block: SuperBlock,
    op_lock: Mutex<()>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// 在设备上创建全新的文件系统，原有内容全部丢弃
    pub fn format(device: D, block_count: u32) -> Result<Self> {
        let super_block = Self::write_layout(&device, block_count)?;
        Ok(Self {
            device,
            super_block,
            op_lock: Mutex::new(()),
        })
    }

    /// 挂载一个已经格式化过的镜像
    pub fn mount(device: D) -> Result<Self> {
        let super_block = SuperBlock::read(&device)?;
        let root = Inode::load(&device, &super_block, ROOT_INODE)?;
        if !root.is_dir() || !root.is_in_use(&device, &super_block)? {
            return Err(FsError::LayoutCorruption(
                "root inode is not an allocated directory".to_string(),
            ));
        }
        info!(
            "mounted image: {} blocks, {} inodes",
            super_block.block_count, super_block.inode_count
        );
        Ok(Self {
            device,
            super_block,
            op_lock: Mutex::new(()),
        })
    }

    /// 在已挂载的设备上重新格式化
    pub fn reformat(&mut self, block_count: u32) -> Result<()> {
        self.super_block = Self::write_layout(&self.device, block_count)?;
        Ok(())
    }

    /// 刷盘并交还底层设备
    pub fn unmount(self) -> Result<D> {
        self.device.flush()?;
        info!("unmounted image");
        Ok(self.device)
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// 根目录的目录项
    pub fn root(&self) -> DirEntry {
        DirEntry::new(ROOT_INODE, ROOT_NAME)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bitmap(&self) -> BitmapAllocator<'_> {
        BitmapAllocator::new(&self.device, &self.super_block)
    }

    fn load_inode(&self, index: u32) -> Result<Inode> {
        Inode::load(&self.device, &self.super_block, index)
    }

    fn load_block(&self, index: u32) -> Result<DirBlock> {
        DirBlock::load(&self.device, &self.super_block, index)
    }

    fn load_dir(&self, entry: &DirEntry) -> Result<Inode> {
        let inode = self.load_inode(entry.inode_index)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory(entry.name.clone()));
        }
        Ok(inode)
    }

    fn write_layout(device: &D, block_count: u32) -> Result<SuperBlock> {
        SuperBlock::check_block_count(block_count)?;
        device.reset()?;

        let sb = SuperBlock::new(block_count);
        sb.write(device)?;

        let mut offset = sb.inode_bitmap_offset();
        device.write_at(offset, &vec![0u8; sb.inode_bitmap_size() as usize])?;
        offset += sb.inode_bitmap_size();
        device.write_at(offset, &vec![0u8; sb.block_bitmap_size() as usize])?;

        let inode_table = vec![0u8; (sb.inode_count as u64 * INODE_SIZE) as usize];
        device.write_at(sb.inode_table_offset(), &inode_table)?;

        let zero_block = [0u8; BLOCK_SIZE];
        for index in 1..=sb.block_count {
            device.write_at(sb.block_offset(index)?, &zero_block)?;
        }

        let bitmap = BitmapAllocator::new(device, &sb);
        let inode_index = bitmap.find_first_free(BitmapKind::Inode)? + 1;
        let block_index = bitmap.find_first_free(BitmapKind::Block)? + 1;

        let mut root = Inode::new(inode_index, InodeType::Directory);
        let mut block = DirBlock::new(block_index);
        let anchor = DirEntry::new(root.index(), ROOT_NAME);
        block.add_entry(&anchor)?;
        block.add_entry(&anchor)?;
        root.add_pointer(block.index())?;

        root.set_in_use(device, &sb, true)?;
        root.store(device, &sb)?;
        block.set_in_use(device, &sb, true)?;
        block.store(device, &sb)?;

        info!(
            "formatted image: {} blocks of {} bytes, {} inodes, {} bytes total",
            sb.block_count,
            sb.block_size,
            sb.inode_count,
            sb.image_len()
        );
        Ok(sb)
    }

    /// 目录下所有可见项，按指针槽位和记录顺序排列
    fn visible_entries(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for (slot, ptr) in dir.blocks() {
            let block = self.load_block(ptr)?;
            entries.extend(block.read_entries(skip_for_slot(slot))?);
        }
        Ok(entries)
    }

    /// 在当前目录下创建子目录
    pub fn mkdir(&self, cwd: &DirEntry, name: &str) -> Result<DirEntry> {
        validate_name(name)?;
        let _guard = self.lock();

        let mut parent = self.load_dir(cwd)?;
        if find_entry(&self.visible_entries(&parent)?, name).is_some() {
            warn!("mkdir {}: name already taken in {}", name, cwd.name);
            return Err(FsError::DuplicateName(name.to_string()));
        }

        let bitmap = self.bitmap();
        let inode_index = bitmap.find_first_free(BitmapKind::Inode)? + 1;
        let block_bits = bitmap.read_all(BitmapKind::Block)?;
        let new_block_bit =
            first_free(&block_bits, &[]).ok_or(FsError::CapacityExhausted(Capacity::NoBlock))?;

        let entry = DirEntry::new(inode_index, name);
        let mut inode = Inode::new(inode_index, InodeType::Directory);
        let mut new_block = DirBlock::new(new_block_bit + 1);
        inode.add_pointer(new_block.index())?;
        new_block.add_entry(&entry)?;

        let parent_first = self.load_block(parent.pointers()[0])?;
        let backlink = parent_first.entry(0)?.ok_or_else(|| {
            FsError::LayoutCorruption(format!("directory {} has no self entry", cwd.name))
        })?;
        new_block.add_entry(&backlink)?;

        let mut capacity_blocked = false;
        for slot in 0..DIRECT_PTRS {
            let ptr = parent.pointers()[slot];
            let (mut block, fresh) = if ptr == 0 {
                match first_free(&block_bits, &[new_block_bit]) {
                    Some(bit) => (DirBlock::new(bit + 1), true),
                    None => {
                        capacity_blocked = true;
                        continue;
                    }
                }
            } else {
                (self.load_block(ptr)?, false)
            };

            match block.add_entry(&entry) {
                Ok(_) => {}
                Err(FsError::BlockFull(index)) => {
                    debug!("mkdir {}: block {} is full", name, index);
                    continue;
                }
                Err(e) => return Err(e),
            }

            // 先写记录，最后才置位图，中途失败只会留下未被引用的记录
            new_block.store(&self.device, &self.super_block)?;
            inode.store(&self.device, &self.super_block)?;
            block.store(&self.device, &self.super_block)?;
            if fresh {
                parent.set_pointer(slot, block.index());
                parent.store(&self.device, &self.super_block)?;
                block.set_in_use(&self.device, &self.super_block, true)?;
            }
            new_block.set_in_use(&self.device, &self.super_block, true)?;
            inode.set_in_use(&self.device, &self.super_block, true)?;

            info!(
                "mkdir {}: inode {}, block {}, linked in parent block {}",
                name,
                inode.index(),
                new_block.index(),
                block.index()
            );
            return Ok(entry);
        }

        let reason = if capacity_blocked {
            Capacity::NoBlock
        } else {
            Capacity::DirectoryFull
        };
        warn!("mkdir {} in {}: {}", name, cwd.name, reason);
        Err(FsError::CapacityExhausted(reason))
    }

    /// 从 `start` 出发按路径段逐级查找
    pub fn path_lookup(&self, start: DirEntry, segments: &[&str]) -> Result<DirEntry> {
        let _guard = self.lock();
        directory::path_lookup(self, start, segments)
    }

    /// 解析一个路径字符串：以 `/` 开头时从根目录出发，否则从 `cwd` 出发。
    /// 空段和 `.` 被忽略，`..` 沿父目录回链上溯。
    pub fn resolve(&self, cwd: &DirEntry, path: &str) -> Result<DirEntry> {
        let _guard = self.lock();
        let mut current = if path.starts_with('/') {
            self.root()
        } else {
            cwd.clone()
        };

        for segment in path.split('/') {
            current = match segment {
                "" | "." => current,
                ".." => self.read_parent(&current)?,
                name => directory::path_lookup(self, current, &[name])?,
            };
        }
        Ok(current)
    }

    /// 目录的父目录项（根目录的父目录是它自己）
    pub fn parent(&self, dir: &DirEntry) -> Result<DirEntry> {
        let _guard = self.lock();
        self.read_parent(dir)
    }

    fn read_parent(&self, dir: &DirEntry) -> Result<DirEntry> {
        let inode = self.load_dir(dir)?;
        let first = self.load_block(inode.pointers()[0])?;
        first.entry(1)?.ok_or_else(|| {
            FsError::LayoutCorruption(format!("directory {} has no parent entry", dir.name))
        })
    }

    /// 列出目录下的可见项
    pub fn list(&self, dir: &DirEntry) -> Result<Vec<DirEntry>> {
        let _guard = self.lock();
        let inode = self.load_dir(dir)?;
        self.visible_entries(&inode)
    }

    pub fn stat(&self, entry: &DirEntry) -> Result<Inode> {
        let _guard = self.lock();
        self.load_inode(entry.inode_index)
    }

    pub fn usage(&self) -> Result<Usage> {
        let _guard = self.lock();
        let bitmap = self.bitmap();
        Ok(Usage {
            inodes_used: bitmap.count_used(BitmapKind::Inode)?,
            inodes_total: self.super_block.inode_count,
            blocks_used: bitmap.count_used(BitmapKind::Block)?,
            blocks_total: self.super_block.block_count,
        })
    }

    /// 删除当前目录下的一个空目录，回收其 inode 和所有数据块
    pub fn rm(&self, cwd: &DirEntry, name: &str) -> Result<()> {
        validate_name(name)?;
        let _guard = self.lock();

        let parent = self.load_dir(cwd)?;
        let mut located = None;
        for (slot, ptr) in parent.blocks() {
            let block = self.load_block(ptr)?;
            if let Some(record) = block.find_slot(name, skip_for_slot(slot))? {
                located = Some((block, record));
                break;
            }
        }
        let (mut parent_block, record) =
            located.ok_or_else(|| FsError::NotFound(name.to_string()))?;
        let entry = parent_block
            .entry(record)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let mut target = self.load_dir(&entry)?;
        if !self.visible_entries(&target)?.is_empty() {
            warn!("rm {}: directory is not empty", name);
            return Err(FsError::DirectoryNotEmpty(name.to_string()));
        }

        // 先从父目录摘除，再回收资源
        parent_block.remove_entry(record);
        parent_block.store(&self.device, &self.super_block)?;

        let bitmap = self.bitmap();
        for (_, ptr) in target.blocks() {
            bitmap.write_bit(BitmapKind::Block, ptr - 1, false)?;
        }
        target.clear();
        target.store(&self.device, &self.super_block)?;
        target.set_in_use(&self.device, &self.super_block, false)?;

        info!("rm {}: released inode {}", name, target.index());
        Ok(())
    }
}

impl<D: BlockDevice> DirectoryReader for FileSystem<D> {
    fn entries(&self, dir: &DirEntry) -> Result<Vec<DirEntry>> {
        let inode = self.load_dir(dir)?;
        self.visible_entries(&inode)
    }
}
