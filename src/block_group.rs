use zerocopy::{AsBytes, FromBytes};

use crate::error::Ext2Error;
use crate::source::BlockSource;
use crate::superblock::{BlockAddress, BlockGroupIndex, OffsetBytes, Superblock};

/// See <https://www.nongnu.org/ext2-doc/ext2.html#block-group-descriptor-structure>
#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, AsBytes)]
pub struct BlockGroupDescriptor {
    pub block_bitmap: BlockAddress,
    pub inode_bitmap: BlockAddress,
    pub inode_table: BlockAddress,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
    pub _pad: u16,
    pub _reserved: [u8; 12],
}

/// The block group descriptor table, read once at mount from the block
/// following the superblock and kept for the life of the session.
#[derive(Debug)]
pub struct DescriptorTable {
    descriptors: Vec<BlockGroupDescriptor>,
}

impl DescriptorTable {
    /// Reads `num_block_groups` consecutive 32-byte descriptors. The
    /// source is the partition window, so a table that would run past
    /// the end of the partition fails the read.
    pub(crate) fn read<S: BlockSource>(
        source: &mut S,
        superblock: &Superblock,
    ) -> Result<Self, Ext2Error> {
        let start = superblock.descriptor_table_offset();
        // The block and inode geometry imply the same group count on a
        // consistent filesystem; covering the larger of the two keeps
        // every valid inode number resolvable.
        let count = superblock
            .num_block_groups()
            .max(superblock.num_block_groups_by_inodes()) as usize;
        let mut descriptors = Vec::with_capacity(count);
        for i in 0..count {
            let offset =
                start + OffsetBytes((i * core::mem::size_of::<BlockGroupDescriptor>()) as u64);
            descriptors.push(source.read_value::<BlockGroupDescriptor>(offset)?);
        }
        Ok(Self { descriptors })
    }

    pub fn get(&self, index: BlockGroupIndex) -> Option<&BlockGroupDescriptor> {
        self.descriptors.get(index.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
