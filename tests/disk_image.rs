use minidisk::{fs::config::MAX_BLOCK_COUNT, BlockDevice, Capacity, DirEntry, FileDisk, FileSystem, FsError};
use tempfile::NamedTempFile;

#[test]
fn directories_survive_remount() {
    let tf = NamedTempFile::new().unwrap();

    let fs = FileSystem::format(FileDisk::create(tf.path()).unwrap(), 32).unwrap();
    let root = fs.root();
    let usr = fs.mkdir(&root, "usr").unwrap();
    let local = fs.mkdir(&usr, "local").unwrap();
    fs.unmount().unwrap();

    let fs = FileSystem::mount(FileDisk::open(tf.path()).unwrap()).unwrap();
    assert_eq!(fs.path_lookup(fs.root(), &["usr", "local"]).unwrap(), local);
    assert_eq!(fs.resolve(&local, "..").unwrap(), usr);
    assert_eq!(fs.list(&fs.root()).unwrap(), vec![DirEntry::new(2, "usr")]);
}

#[test]
fn image_length_matches_layout() {
    let tf = NamedTempFile::new().unwrap();
    let fs = FileSystem::format(FileDisk::create(tf.path()).unwrap(), 10).unwrap();
    let expected = 12 + 512 + 2 + 4096 * 49 + 10 * 4096;
    assert_eq!(fs.super_block().image_len(), expected);
    assert_eq!(fs.device().len().unwrap(), expected);
}

#[test]
fn format_replaces_existing_file() {
    let tf = NamedTempFile::new().unwrap();
    std::fs::write(tf.path(), b"not a disk image").unwrap();

    let fs = FileSystem::format(FileDisk::open(tf.path()).unwrap(), 4).unwrap();
    assert_eq!(fs.usage().unwrap().blocks_used, 1);
    fs.unmount().unwrap();

    let fs = FileSystem::mount(FileDisk::open(tf.path()).unwrap()).unwrap();
    assert_eq!(fs.super_block().block_count, 4);
}

#[test]
fn mount_rejects_bad_magic() {
    let tf = NamedTempFile::new().unwrap();
    let fs = FileSystem::format(FileDisk::create(tf.path()).unwrap(), 4).unwrap();
    let disk = fs.unmount().unwrap();
    disk.write_at(0, &[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
    drop(disk);

    match FileSystem::mount(FileDisk::open(tf.path()).unwrap()) {
        Err(FsError::LayoutCorruption(msg)) => assert!(msg.contains("magic")),
        other => panic!("expected layout corruption, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn small_image_runs_out_of_blocks() {
    let tf = NamedTempFile::new().unwrap();
    let fs = FileSystem::format(FileDisk::create(tf.path()).unwrap(), 3).unwrap();
    let root = fs.root();
    fs.mkdir(&root, "a").unwrap();
    fs.mkdir(&root, "b").unwrap();

    assert!(matches!(
        fs.mkdir(&root, "c"),
        Err(FsError::CapacityExhausted(Capacity::NoBlock))
    ));

    fs.rm(&root, "a").unwrap();
    assert_eq!(fs.mkdir(&root, "c").unwrap(), DirEntry::new(2, "c"));
}

#[test]
fn bad_block_count_leaves_image_mountable() {
    let tf = NamedTempFile::new().unwrap();
    let fs = FileSystem::format(FileDisk::create(tf.path()).unwrap(), 8).unwrap();
    fs.mkdir(&fs.root(), "keep").unwrap();
    fs.unmount().unwrap();
    let before = std::fs::read(tf.path()).unwrap();

    for count in [0, MAX_BLOCK_COUNT + 1] {
        assert!(matches!(
            FileSystem::format(FileDisk::open(tf.path()).unwrap(), count),
            Err(FsError::InvalidBlockCount(c)) if c == count
        ));
    }
    assert_eq!(std::fs::read(tf.path()).unwrap(), before);

    let mut fs = FileSystem::mount(FileDisk::open(tf.path()).unwrap()).unwrap();
    assert!(matches!(fs.reformat(0), Err(FsError::InvalidBlockCount(0))));
    assert_eq!(fs.super_block().block_count, 8);
    assert_eq!(fs.resolve(&fs.root(), "/keep").unwrap().name, "keep");
    fs.mkdir(&fs.root(), "more").unwrap();
}
