use std::io::Write;

use crate::block_group::DescriptorTable;
use crate::block_map::BlockMap;
use crate::directory::{DirectoryBlock, DirectoryEntryFileType, MAX_NAME_LEN};
use crate::error::Ext2Error;
use crate::inode::Inode;
use crate::partition::Partition;
use crate::source::{BlockSource, PartitionSource};
use crate::superblock::{
    InodeNumber, OffsetBytes, Superblock, ROOT_DIRECTORY, SUPERBLOCK_OFFSET,
};

/// A directory child as reported by [`Session::list_children`]. The
/// on-disk file type is preserved rather than collapsed to a
/// directory/file boolean; symlinks and device nodes list as
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub inode: InodeNumber,
    pub file_type: DirectoryEntryFileType,
}

impl Child {
    pub fn is_dir(&self) -> bool {
        self.file_type == DirectoryEntryFileType::Directory
    }
}

/// A mounted ext2 filesystem: the superblock and descriptor table read
/// at mount, plus the partition-windowed source every later read goes
/// through. Inodes are read on demand and not cached.
#[derive(Debug)]
pub struct FileSystem<S> {
    source: PartitionSource<S>,
    superblock: Superblock,
    descriptors: DescriptorTable,
}

impl<S: BlockSource> FileSystem<S> {
    /// Reads and validates the superblock, loads the descriptor table,
    /// and probes the root directory inode. Returns a [`Session`]
    /// positioned at the root. On any failure nothing is returned, so a
    /// caller holding a previous session keeps it untouched.
    pub fn mount(source: S, partition: &Partition) -> Result<Session<S>, Ext2Error> {
        let mut source = PartitionSource::new(source, partition);

        let superblock: Superblock = source.read_value(SUPERBLOCK_OFFSET)?;
        superblock.validate()?;

        if superblock.num_block_groups() != superblock.num_block_groups_by_inodes() {
            log::warn!(
                "block and inode geometry disagree on the group count ({} vs {})",
                superblock.num_block_groups(),
                superblock.num_block_groups_by_inodes()
            );
        }

        let descriptors = DescriptorTable::read(&mut source, &superblock)?;

        let mut fs = Self {
            source,
            superblock,
            descriptors,
        };

        let root = fs.read_inode(ROOT_DIRECTORY)?;
        if !root.is_dir() {
            return Err(Ext2Error::SuperblockInvalid(String::from(
                "root inode is not a directory",
            )));
        }

        let blocks_count = fs.superblock.blocks_count;
        log::debug!(
            "mounted ext2 filesystem: {} blocks of {} bytes, {} block group(s)",
            blocks_count,
            fs.superblock.block_size(),
            fs.descriptors.len()
        );

        Ok(Session {
            fs,
            current_directory: ROOT_DIRECTORY,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn block_size(&self) -> u64 {
        self.superblock.block_size()
    }

    /// Locates and reads one on-disk inode record. Any number in
    /// `1..=inodes_count` resolves; the engine reports what is on disk
    /// and does not consult the inode bitmap.
    pub fn read_inode(&mut self, number: InodeNumber) -> Result<Inode, Ext2Error> {
        let max = self.superblock.inodes_count;
        if number.0 < 1 || number.0 > max {
            return Err(Ext2Error::InodeOutOfRange {
                number: number.0,
                max,
            });
        }

        let (group, local) = self.superblock.inode_location(number);
        let descriptor = self.descriptors.get(group).ok_or_else(|| {
            Ext2Error::InodeOutOfRange {
                number: number.0,
                max,
            }
        })?;

        let offset = self.superblock.inode_offset(descriptor.inode_table, local);
        self.source.read_value(offset)
    }

    /// Byte size of an inode's contents. Revision 1 keeps the high 32
    /// bits of regular-file sizes where revision 0 kept the directory
    /// ACL, so the high word only applies to regular files.
    pub fn inode_byte_size(&self, inode: &Inode) -> u64 {
        if self.superblock.rev_level > 0 && inode.is_regular_file() {
            (u64::from(inode.size_high) << 32) | u64::from(inode.size_low)
        } else {
            u64::from(inode.size_low)
        }
    }

    /// Lists a directory's entries in storage order, including `.` and
    /// `..`. Unused slots (inode 0) are skipped; filtering dot entries
    /// is the caller's concern.
    pub fn list_directory(&mut self, inode: &Inode) -> Result<Vec<Child>, Ext2Error> {
        if !inode.is_dir() {
            return Err(Ext2Error::NotADirectory(String::from(
                "cannot list a non-directory inode",
            )));
        }

        let mut children = Vec::new();
        self.for_each_directory_block(inode, |block| {
            for entry in DirectoryBlock(block).iter() {
                if entry.is_unused() {
                    continue;
                }
                children.push(Child {
                    name: entry.name_lossy(),
                    inode: entry.header.inode,
                    file_type: entry.file_type(),
                });
            }
            Ok(true)
        })?;
        Ok(children)
    }

    /// Resolves `name` to an inode number within the given directory.
    /// The name check happens before any read is issued.
    pub fn find_child(
        &mut self,
        dir: &Inode,
        name: &[u8],
    ) -> Result<Option<InodeNumber>, Ext2Error> {
        if name.len() > MAX_NAME_LEN {
            return Err(Ext2Error::NameTooLong { got: name.len() });
        }
        if !dir.is_dir() {
            return Err(Ext2Error::NotADirectory(format!(
                "cannot look up {:?} in a non-directory inode",
                String::from_utf8_lossy(name)
            )));
        }

        let mut found = None;
        self.for_each_directory_block(dir, |block| {
            for entry in DirectoryBlock(block).iter() {
                if !entry.is_unused() && entry.name == name {
                    found = Some(entry.header.inode);
                    return Ok(false);
                }
            }
            Ok(true)
        })?;
        Ok(found)
    }

    /// Streams an inode's contents into `sink`, exactly `size` bytes:
    /// whole blocks, a truncated final block, and zero-fill for holes.
    /// Returns the number of bytes written.
    pub fn extract_to<W: Write>(&mut self, inode: &Inode, sink: &mut W) -> Result<u64, Ext2Error> {
        let block_size = self.block_size();
        let size = self.inode_byte_size(inode);
        let map = BlockMap::new(inode, size, block_size);
        let zeros = vec![0u8; block_size as usize];

        let mut written = 0u64;
        map.for_each(&mut self.source, |source, index, address| {
            // Everything before the last block is a full block; the
            // last is whatever remains of `size`.
            let chunk = (size - index * block_size).min(block_size) as usize;
            match address {
                Some(address) => {
                    let offset = OffsetBytes(u64::from(address.0) * block_size);
                    let buf = source.read_vec(offset, chunk)?;
                    sink.write_all(&buf).map_err(Ext2Error::Sink)?;
                }
                None => {
                    sink.write_all(&zeros[..chunk]).map_err(Ext2Error::Sink)?;
                }
            }
            written += chunk as u64;
            Ok(true)
        })?;

        debug_assert_eq!(written, size);
        Ok(written)
    }

    /// Feeds each data block of a directory to `func`. Directory sizes
    /// are always whole blocks; holes cannot legitimately appear in a
    /// directory, so one is skipped with a warning rather than parsed
    /// as a block of zeros.
    fn for_each_directory_block<F>(&mut self, inode: &Inode, mut func: F) -> Result<(), Ext2Error>
    where
        F: FnMut(&[u8]) -> Result<bool, Ext2Error>,
    {
        let block_size = self.block_size();
        let size = self.inode_byte_size(inode);
        if size % block_size != 0 {
            log::warn!("directory size {size} is not a multiple of the block size {block_size}");
        }

        let map = BlockMap::new(inode, size, block_size);
        map.for_each(&mut self.source, |source, _, address| {
            let Some(address) = address else {
                log::warn!("skipping hole in directory data");
                return Ok(true);
            };
            let offset = OffsetBytes(u64::from(address.0) * block_size);
            let buf = source.read_vec(offset, block_size as usize)?;
            func(&buf)
        })
    }
}

/// A navigation cursor over a mounted filesystem: the session tracks
/// the current directory, which moves only on a successful
/// [`Session::change_directory`]. Failed operations leave it where it
/// was.
#[derive(Debug)]
pub struct Session<S> {
    fs: FileSystem<S>,
    current_directory: InodeNumber,
}

impl<S: BlockSource> Session<S> {
    pub fn filesystem(&mut self) -> &mut FileSystem<S> {
        &mut self.fs
    }

    pub fn superblock(&self) -> &Superblock {
        self.fs.superblock()
    }

    pub fn current_directory(&self) -> InodeNumber {
        self.current_directory
    }

    /// Entries of the current directory, `.` and `..` included.
    pub fn list_children(&mut self) -> Result<Vec<Child>, Ext2Error> {
        let dir = self.fs.read_inode(self.current_directory)?;
        self.fs.list_directory(&dir)
    }

    /// Moves the cursor into `name`. `..` in the root directory points
    /// back at the root, so walking up from `/` is a no-op rather than
    /// an error.
    pub fn change_directory(&mut self, name: &str) -> Result<(), Ext2Error> {
        let dir = self.fs.read_inode(self.current_directory)?;
        let target = self
            .fs
            .find_child(&dir, name.as_bytes())?
            .ok_or_else(|| Ext2Error::PathNotFound(name.to_owned()))?;
        let inode = self.fs.read_inode(target)?;
        if !inode.is_dir() {
            return Err(Ext2Error::NotADirectory(name.to_owned()));
        }
        self.current_directory = target;
        Ok(())
    }

    /// Extracts the regular file `name` from the current directory into
    /// `sink`. Returns the number of bytes written, which always equals
    /// the inode's size.
    pub fn extract_file<W: Write>(&mut self, name: &str, sink: &mut W) -> Result<u64, Ext2Error> {
        let dir = self.fs.read_inode(self.current_directory)?;
        let target = self
            .fs
            .find_child(&dir, name.as_bytes())?
            .ok_or_else(|| Ext2Error::PathNotFound(name.to_owned()))?;
        let inode = self.fs.read_inode(target)?;
        if !inode.is_regular_file() {
            return Err(Ext2Error::NotARegularFile(name.to_owned()));
        }
        self.fs.extract_to(&inode, sink)
    }

    /// Resolves an absolute path from the root, independent of the
    /// cursor. Each intermediate component must be a directory.
    pub fn resolve_path(&mut self, path: &str) -> Result<(InodeNumber, Inode), Ext2Error> {
        if !path.starts_with('/') {
            return Err(Ext2Error::PathNotFound(format!(
                "{path} (paths must be absolute)"
            )));
        }

        let mut number = ROOT_DIRECTORY;
        let mut inode = self.fs.read_inode(number)?;
        let mut walked = String::from("/");

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !inode.is_dir() {
                return Err(Ext2Error::NotADirectory(walked));
            }
            number = self
                .fs
                .find_child(&inode, component.as_bytes())?
                .ok_or_else(|| Ext2Error::PathNotFound(path.to_owned()))?;
            inode = self.fs.read_inode(number)?;
            walked = component.to_owned();
        }

        Ok((number, inode))
    }
}
