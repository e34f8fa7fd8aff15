use core::fmt;
use core::ops::Add;

use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes};

use crate::error::Ext2Error;
use crate::strings::CStringBytes;

/// The superblock lives at byte offset 1024 within the partition,
/// regardless of the filesystem block size.
pub const SUPERBLOCK_OFFSET: OffsetBytes = OffsetBytes(1024);

/// 16bit value identifying the file system as ext2, fixed to
/// EXT2_SUPER_MAGIC of value 0xEF53.
/// <https://www.nongnu.org/ext2-doc/ext2.html#s-magic>
pub const SUPERBLOCK_MAGIC: u16 = 0xEF53;

/// See <https://www.nongnu.org/ext2-doc/ext2.html#superblock>
#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, AsBytes)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub reserved_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: BlockAddress,
    pub log_block_size: u32,
    pub log_frag_size: u32,
    pub blocks_per_group: u32,
    pub frags_per_group: u32,
    pub inodes_per_group: u32,
    pub mount_time: u32,
    pub write_time: u32,
    pub mount_count: u16,
    pub max_mount_count: u16,
    pub magic: u16,
    pub state: u16,
    pub errors: u16,
    pub minor_rev_level: u16,
    pub lastcheck: u32,
    pub checkinterval: u32,
    pub creator_os: u32,
    pub rev_level: u32,
    pub def_resuid: u16,
    pub def_resgid: u16,

    // EXT2_DYNAMIC_REV specific
    pub first_ino: u32,
    pub inode_size: u16,
    pub block_group_nr: u16,
    pub feature_compat: FeatureCompatFlags,
    pub feature_incompat: FeatureIncompatFlags,
    pub feature_ro_compat: FeatureReadOnlyCompatFlags,
    pub uuid: UUID,
    pub volume_name: CStringBytes<[u8; 16]>,
    pub last_mounted: CStringBytes<[u8; 64]>,
    pub algo_bitmap: u32,

    // Performance hints
    pub prealloc_blocks: u8,
    pub prealloc_dir_blocks: u8,
    pub padding1: u16,

    // Journaling support
    pub journal_uuid: UUID,
    pub journal_inum: u32,
    pub journal_dev: u32,
    pub last_orphan: u32,

    // Directory indexing support
    pub hash_seed: [u32; 4],
    pub def_hash_version: u8,
    pub padding2: [u8; 3],

    // Other options
    pub default_mount_options: u32,
    pub first_meta_bg: u32,
}

impl Superblock {
    pub fn magic_valid(&self) -> bool {
        self.magic == SUPERBLOCK_MAGIC
    }

    /// Checks the fields a mount relies on. The magic check is what
    /// distinguishes "not ext2 at all" from a damaged filesystem.
    pub(crate) fn validate(&self) -> Result<(), Ext2Error> {
        if !self.magic_valid() {
            let magic = self.magic;
            return Err(Ext2Error::SuperblockInvalid(format!(
                "bad magic {magic:#06x}, expected {SUPERBLOCK_MAGIC:#06x}"
            )));
        }
        if self.blocks_per_group == 0 || self.inodes_per_group == 0 {
            return Err(Ext2Error::SuperblockInvalid(String::from(
                "zero blocks_per_group or inodes_per_group",
            )));
        }
        // 1024 << 22 overflows the shift into meaningless sizes; real
        // filesystems stop at 64KiB blocks.
        if self.log_block_size > 6 {
            let log = self.log_block_size;
            return Err(Ext2Error::SuperblockInvalid(format!(
                "unreasonable log_block_size {log}"
            )));
        }
        Ok(())
    }

    /// ```text
    /// block size = 1024 << s_log_block_size;
    /// ```
    pub fn block_size(&self) -> u64 {
        1024 << self.log_block_size
    }

    /// The block group descriptor table starts on the first block
    /// following the superblock: block 2 for 1KiB blocks (where the
    /// superblock occupies block 1), block 1 otherwise. Both cases are
    /// `first_data_block + 1`.
    pub fn descriptor_table_offset(&self) -> OffsetBytes {
        let start_block = u64::from(self.first_data_block.0) + 1;
        OffsetBytes(start_block * self.block_size())
    }

    pub fn num_block_groups(&self) -> u32 {
        self.blocks_count.div_ceil(self.blocks_per_group)
    }

    /// Group count implied by the inode geometry. Agrees with
    /// [`Self::num_block_groups`] on a consistent filesystem.
    pub fn num_block_groups_by_inodes(&self) -> u32 {
        self.inodes_count.div_ceil(self.inodes_per_group)
    }

    /// Splits a global inode number into its block group and its index
    /// within that group. Inode numbers start at 1.
    pub fn inode_location(&self, inode_number: InodeNumber) -> (BlockGroupIndex, LocalInodeIndex) {
        let inode_index = inode_number.0 - 1;
        let group = BlockGroupIndex(inode_index / self.inodes_per_group);
        let local = LocalInodeIndex(inode_index % self.inodes_per_group);
        (group, local)
    }

    /// On-disk inode record size. Fixed at 128 bytes for revision 0;
    /// revision 1 filesystems carry it in the superblock.
    pub fn inode_record_size(&self) -> u64 {
        if self.rev_level == 0 {
            128
        } else {
            u64::from(self.inode_size)
        }
    }

    /// Byte offset of an inode record within the partition, given the
    /// group's inode table location.
    pub fn inode_offset(
        &self,
        inode_table: BlockAddress,
        local_index: LocalInodeIndex,
    ) -> OffsetBytes {
        let table_start = u64::from(inode_table.0) * self.block_size();
        OffsetBytes(table_start + u64::from(local_index.0) * self.inode_record_size())
    }

    pub fn volume_name(&self) -> &str {
        self.volume_name.as_str()
    }

    /// EXT2_VALID_FS: the filesystem was unmounted cleanly.
    pub fn is_clean(&self) -> bool {
        self.state & 0x0001 != 0
    }
}

/// Address of a filesystem block, in block-size units from the start of
/// the partition. Address 0 marks an absent block (a hole, or an unused
/// indirect pointer).
#[repr(transparent)]
#[derive(Debug, Copy, Clone, FromBytes, AsBytes, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockAddress(pub u32);

impl BlockAddress {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Address in bytes from the start of the partition (or of the whole
/// disk, for partition table reads).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OffsetBytes(pub u64);

impl Add<Self> for OffsetBytes {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

/// "Global" inode number within the filesystem, starting at 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct InodeNumber(pub u32);

/// The root directory of the filesystem is always inode 2.
pub const ROOT_DIRECTORY: InodeNumber = InodeNumber(2);

/// An inode's index within its block group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalInodeIndex(pub u32);

/// Index of a block group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockGroupIndex(pub u32);

/// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-compat>
#[derive(Debug, Copy, Clone, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct FeatureCompatFlags(pub u32);

bitflags! {
    impl FeatureCompatFlags: u32 {
        const DIR_PREALLOC = 0x0001;
        const IMAGIC_INODES = 0x0002;
        /// An ext3 journal exists
        const HAS_JOURNAL = 0x0004;
        const EXT_ATTR = 0x0008;
        const RESIZE_INODE = 0x0010;
        /// Directory indexing (HTree)
        const DIR_INDEX = 0x0020;
    }
}

/// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-incompat>
#[derive(Debug, Copy, Clone, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct FeatureIncompatFlags(pub u32);

bitflags! {
    impl FeatureIncompatFlags: u32 {
        const COMPRESSION = 0x0001;
        /// Directory entries record the file type
        const FILETYPE = 0x0002;
        const RECOVER = 0x0004;
        const JOURNAL_DEV = 0x0008;
        const META_BG = 0x0010;
    }
}

/// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-ro-compat>
#[derive(Debug, Copy, Clone, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct FeatureReadOnlyCompatFlags(pub u32);

bitflags! {
    impl FeatureReadOnlyCompatFlags: u32 {
        const SPARSE_SUPER = 0x0001;
        /// Filesystem uses a 64bit file size
        const LARGE_FILE = 0x0002;
        const BTREE_DIR = 0x0004;
    }
}

#[derive(Copy, Clone, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct UUID(pub [u8; 16]);

impl fmt::Debug for UUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_bytes = |f: &mut fmt::Formatter<'_>, start: usize, end: usize| -> fmt::Result {
            for i in start..=end {
                write!(f, "{:02x}", self.0[i])?;
            }
            Ok(())
        };

        write!(f, "UUID(")?;
        write_bytes(f, 0, 3)?;
        write!(f, "-")?;
        write_bytes(f, 4, 5)?;
        write!(f, "-")?;
        write_bytes(f, 6, 7)?;
        write!(f, "-")?;
        write_bytes(f, 8, 9)?;
        write!(f, "-")?;
        write_bytes(f, 10, 15)?;
        write!(f, ")")
    }
}
