use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::fs::{
    config::{codec, DIR_ENTRY_SIZE, NAME_LEN},
    error::{FsError, Result},
};

/// 目录项在块中的 32 字节记录
#[derive(Debug, Serialize, Deserialize)]
struct DirEntryRecord {
    inode: u32,
    name: [u8; NAME_LEN],
}

/// 一个目录项：(inode 编号, 名字)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_index: u32,
    pub name: String,
}

impl DirEntry {
    pub fn new(inode_index: u32, name: &str) -> Self {
        Self {
            inode_index,
            name: name.to_string(),
        }
    }

    /// inode 编号为 0 的记录表示空槽位
    pub fn is_unused(&self) -> bool {
        self.inode_index == 0
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = self.name.as_bytes();
        if bytes.len() > NAME_LEN {
            return Err(FsError::InvalidName(self.name.clone()));
        }
        let mut name = [0u8; NAME_LEN];
        name[..bytes.len()].copy_from_slice(bytes);

        let record = DirEntryRecord {
            inode: self.inode_index,
            name,
        };
        Ok(codec().serialize(&record)?)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record: DirEntryRecord = codec().deserialize(&buf[..DIR_ENTRY_SIZE])?;
        let len = record
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NAME_LEN);
        let name = std::str::from_utf8(&record.name[..len]).map_err(|_| {
            FsError::LayoutCorruption(format!(
                "entry for inode {} has a non UTF-8 name",
                record.inode
            ))
        })?;
        Ok(Self::new(record.inode, name))
    }
}

/// 校验将要写入目录的名字
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.len() > NAME_LEN
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0');
    if invalid {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// 名字比较不区分大小写
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn find_entry<'a>(entries: &'a [DirEntry], name: &str) -> Option<&'a DirEntry> {
    entries.iter().find(|e| names_match(&e.name, name))
}

/// 读取一个目录下所有可见项（不含锚点）的能力。
///
/// 路径遍历只依赖这个接口，因此可以用一棵假的目录树来测试。
pub trait DirectoryReader {
    fn entries(&self, dir: &DirEntry) -> Result<Vec<DirEntry>>;
}

/// 从 `start` 出发逐段向下查找，每段匹配第一个同名项
pub fn path_lookup<R>(reader: &R, start: DirEntry, segments: &[&str]) -> Result<DirEntry>
where
    R: DirectoryReader + ?Sized,
{
    let mut current = start;
    for (depth, segment) in segments.iter().enumerate() {
        let entries = reader.entries(&current)?;
        current = find_entry(&entries, segment)
            .cloned()
            .ok_or_else(|| FsError::NotFound(segments[..=depth].join("/")))?;
    }
    Ok(current)
}
