use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Result, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::disk::block_device::BlockDevice;

/// 以宿主机上的一个普通文件作为虚拟磁盘
#[derive(Debug)]
pub struct FileDisk {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileDisk {
    /// 打开已存在的镜像文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        debug!("opened disk image {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// 创建（或截断）一个空的镜像文件，随后需要 format
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Self::create_file(&path)?;
        debug!("created disk image {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_file(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "disk file lock poisoned"))
    }
}

impl BlockDevice for FileDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.lock()?.metadata()?.len())
    }

    fn reset(&self) -> Result<()> {
        let mut file = self.lock()?;
        // 先删除旧文件再重建，和直接截断不同，旧的 inode 不会被复用
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        *file = Self::create_file(&self.path)?;
        debug!("recreated disk image {}", self.path.display());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.lock()?.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let disk = FileDisk::create(dir.path().join("rw.img")).unwrap();

        disk.write_at(0, &[1, 2, 3, 4]).unwrap();
        disk.write_at(4096, &[0x42; 16]).unwrap();

        let mut head = [0u8; 4];
        disk.read_at(0, &mut head).unwrap();
        assert_eq!(head, [1, 2, 3, 4]);

        let mut tail = [0u8; 16];
        disk.read_at(4096, &mut tail).unwrap();
        assert_eq!(tail, [0x42; 16]);
        assert_eq!(disk.len().unwrap(), 4096 + 16);
    }

    #[test]
    fn reset_recreates_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let disk = FileDisk::create(dir.path().join("reset.img")).unwrap();
        disk.write_at(0, &[7; 64]).unwrap();

        disk.reset().unwrap();

        assert!(disk.is_empty().unwrap());
        assert!(disk.path().exists());
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileDisk::open(dir.path().join("missing.img")).is_err());
    }
}
