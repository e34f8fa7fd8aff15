use std::fs::File;
use std::os::unix::prelude::FileExt;
use std::path::Path;

use zerocopy::{AsBytes, FromBytes};

use crate::error::Ext2Error;
use crate::partition::Partition;
use crate::superblock::OffsetBytes;

/// Something that knows how to serve positioned reads from the raw bytes
/// backing a disk or partition. Reads are synchronous and never retried;
/// a short or out-of-range read is a terminal failure for the operation
/// that issued it.
pub trait BlockSource {
    /// Total readable length in bytes.
    fn len_bytes(&self) -> u64;

    /// Fills `buf` from `offset`. Must fail (not zero-fill, not
    /// truncate) if any requested byte is unavailable.
    fn read_at(&mut self, offset: OffsetBytes, buf: &mut [u8]) -> Result<(), Ext2Error>;

    fn read_vec(&mut self, offset: OffsetBytes, len: usize) -> Result<Vec<u8>, Ext2Error> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads a fixed-layout value straight out of the byte stream.
    fn read_value<T: FromBytes + AsBytes>(&mut self, offset: OffsetBytes) -> Result<T, Ext2Error> {
        let mut value = T::new_zeroed();
        self.read_at(offset, value.as_bytes_mut())?;
        Ok(value)
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn len_bytes(&self) -> u64 {
        (**self).len_bytes()
    }

    fn read_at(&mut self, offset: OffsetBytes, buf: &mut [u8]) -> Result<(), Ext2Error> {
        (**self).read_at(offset, buf)
    }
}

/// In-memory byte source, mainly for tests and small images.
impl BlockSource for Vec<u8> {
    fn len_bytes(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&mut self, offset: OffsetBytes, buf: &mut [u8]) -> Result<(), Ext2Error> {
        let start = offset.0 as usize;
        let end = start.checked_add(buf.len());
        match end {
            Some(end) if offset.0 <= self.len() as u64 && end <= self.len() => {
                buf.copy_from_slice(&self[start..end]);
                Ok(())
            }
            _ => Err(Ext2Error::io_read(
                offset.0,
                buf.len(),
                format!("beyond end of {}-byte source", self.len()),
            )),
        }
    }
}

/// Disk image (or raw block device node) backed by a file.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl BlockSource for FileSource {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: OffsetBytes, buf: &mut [u8]) -> Result<(), Ext2Error> {
        self.file
            .read_exact_at(buf, offset.0)
            .map_err(|e| Ext2Error::io_read(offset.0, buf.len(), e.to_string()))
    }
}

/// Window over one partition of a larger source. Every read is shifted
/// by the partition's start offset and bounded by its declared length,
/// which is what turns "pointer past the end of the partition" into a
/// read failure instead of a read of the neighboring partition.
#[derive(Debug)]
pub struct PartitionSource<S> {
    inner: S,
    start: u64,
    length: u64,
}

impl<S: BlockSource> PartitionSource<S> {
    pub fn new(inner: S, partition: &Partition) -> Self {
        Self {
            inner,
            start: partition.offset,
            length: partition.length,
        }
    }
}

impl<S: BlockSource> BlockSource for PartitionSource<S> {
    fn len_bytes(&self) -> u64 {
        self.length
    }

    fn read_at(&mut self, offset: OffsetBytes, buf: &mut [u8]) -> Result<(), Ext2Error> {
        let end = offset.0.checked_add(buf.len() as u64);
        match end {
            Some(end) if end <= self.length => {
                self.inner.read_at(OffsetBytes(self.start + offset.0), buf)
            }
            _ => Err(Ext2Error::io_read(
                offset.0,
                buf.len(),
                format!("beyond end of {}-byte partition", self.length),
            )),
        }
    }
}
