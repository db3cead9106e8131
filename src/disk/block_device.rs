use std::io::Result;

/// 磁盘镜像的统一访问接口。
///
/// 所有读写都以字节偏移寻址：每次调用都是一次独立的“加锁 -> seek -> 传输”，
/// 调用之间不提供任何事务保证。
pub trait BlockDevice: Send + Sync {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()>;

    /// 当前镜像的字节长度
    fn len(&self) -> Result<u64>;

    /// 删除并重建底层存储，之后镜像长度为 0
    fn reset(&self) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
