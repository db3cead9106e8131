use std::{
    io::{self, Result},
    sync::{Mutex, MutexGuard},
};

use crate::disk::block_device::BlockDevice;

/// 完全位于内存中的磁盘镜像，主要用于测试
#[derive(Debug, Default)]
pub struct MemDisk {
    bytes: Mutex<Vec<u8>>,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回整个镜像的拷贝
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.bytes
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory disk lock poisoned"))
    }
}

impl BlockDevice for MemDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.lock()?;
        let start = offset as usize;
        let end = start + buf.len();
        if end > bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read past end of image: {}..{} > {}", start, end, bytes.len()),
            ));
        }
        buf.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut bytes = self.lock()?;
        let start = offset as usize;
        let end = start + buf.len();
        // 和普通文件一样，写越界时自动扩展
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.lock()?.len() as u64)
    }

    fn reset(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
