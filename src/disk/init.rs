use std::path::Path;

use log::info;

use crate::{
    disk::file_disk::FileDisk,
    fs::{error::Result, super_block::SuperBlock, FileSystem},
};

/// 打开或新建磁盘镜像并挂载文件系统。
///
/// 只有镜像文件不存在或者显式要求时才格式化；已有镜像损坏时直接报错，
/// 不会自动覆盖。`step` 用于向界面汇报当前阶段。
pub fn perform_disk_initialization(
    path: &Path,
    block_count: u32,
    force_format: bool,
    mut step: impl FnMut(&str),
) -> Result<FileSystem<FileDisk>> {
    step("🧠 Initializing virtual disk...");

    let disk_exists = path.exists();

    if disk_exists && !force_format {
        step("⚙️ Mounting file system...");
        let disk = FileDisk::open(path)?;
        return FileSystem::mount(disk);
    }

    // 只有“明确是新磁盘”才格式化；块数不合法时不能先截断旧镜像
    SuperBlock::check_block_count(block_count)?;
    step("🔧 Formatting new file system...");
    info!("formatting {} with {} blocks", path.display(), block_count);
    let disk = FileDisk::create(path)?;
    FileSystem::format(disk, block_count)
}
