pub mod disk;
pub mod fs;

pub use disk::{BlockDevice, FileDisk, MemDisk};
pub use fs::{
    directory::DirEntry,
    error::{Capacity, FsError, Result},
    FileSystem,
};
