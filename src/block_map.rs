use crate::error::Ext2Error;
use crate::inode::{Inode, InodeDirectBlocks};
use crate::source::BlockSource;
use crate::superblock::{BlockAddress, OffsetBytes};

/// Indirection depth of the last three entries of an inode's block
/// array: single, double, triple.
const INDIRECT_LEVELS: [u32; 3] = [1, 2, 3];

/// Enumerates the data blocks of one inode in file order: 12 direct
/// pointers, then the single-, double-, and triple-indirect subtrees.
///
/// The walk stops exactly at `ceil(size / block_size)` logical blocks
/// and never reads an indirect block past that point. A zero pointer
/// inside the active range is a hole: the callback receives `None` for
/// every logical block it covers, and a zero pointer at an indirect
/// level covers its whole subtree without a single read.
#[derive(Debug)]
pub struct BlockMap {
    direct: InodeDirectBlocks,
    indirect_roots: [BlockAddress; 3],
    total_blocks: u64,
    block_size: u64,
    pointers_per_block: u64,
}

impl BlockMap {
    pub fn new(inode: &Inode, byte_size: u64, block_size: u64) -> Self {
        Self {
            direct: inode.direct_blocks,
            indirect_roots: [
                inode.singly_indirect_block,
                inode.doubly_indirect_block,
                inode.triply_indirect_block,
            ],
            total_blocks: byte_size.div_ceil(block_size),
            block_size,
            pointers_per_block: block_size / 4,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// Calls `func(source, logical_index, address)` for each data block,
    /// where `None` is a hole. The source is lent back to the callback
    /// so it can read the block's contents mid-walk. `func` returning
    /// `Ok(false)` stops the walk early; calling `for_each` again
    /// restarts it from the beginning.
    pub fn for_each<S, F>(&self, source: &mut S, mut func: F) -> Result<(), Ext2Error>
    where
        S: BlockSource,
        F: FnMut(&mut S, u64, Option<BlockAddress>) -> Result<bool, Ext2Error>,
    {
        let mut remaining = self.total_blocks;
        let mut logical = 0u64;

        for address in self.direct.iter() {
            if remaining == 0 {
                return Ok(());
            }
            if !Self::emit(source, &mut remaining, &mut logical, address, &mut func)? {
                return Ok(());
            }
        }

        for (&root, depth) in self.indirect_roots.iter().zip(INDIRECT_LEVELS) {
            if remaining == 0 {
                return Ok(());
            }
            if !self.walk(source, root, depth, &mut remaining, &mut logical, &mut func)? {
                return Ok(());
            }
        }

        Ok(())
    }

    /// One subtree of the pointer tree. `depth` of 1 means `root` is a
    /// block of data-block pointers; deeper levels point at further
    /// pointer blocks. Depth never exceeds 3, so the recursion is
    /// bounded by the format, not by file contents.
    fn walk<S, F>(
        &self,
        source: &mut S,
        root: BlockAddress,
        depth: u32,
        remaining: &mut u64,
        logical: &mut u64,
        func: &mut F,
    ) -> Result<bool, Ext2Error>
    where
        S: BlockSource,
        F: FnMut(&mut S, u64, Option<BlockAddress>) -> Result<bool, Ext2Error>,
    {
        if root.is_null() {
            // The whole subtree is a hole; emit its span without reads.
            let span = self.pointers_per_block.pow(depth).min(*remaining);
            for _ in 0..span {
                if !Self::emit(source, remaining, logical, BlockAddress(0), func)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        for address in self.read_pointer_block(source, root)? {
            if *remaining == 0 {
                break;
            }
            let keep_going = if depth == 1 {
                Self::emit(source, remaining, logical, address, func)?
            } else {
                self.walk(source, address, depth - 1, remaining, logical, func)?
            };
            if !keep_going {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn emit<S, F>(
        source: &mut S,
        remaining: &mut u64,
        logical: &mut u64,
        address: BlockAddress,
        func: &mut F,
    ) -> Result<bool, Ext2Error>
    where
        S: BlockSource,
        F: FnMut(&mut S, u64, Option<BlockAddress>) -> Result<bool, Ext2Error>,
    {
        *remaining -= 1;
        let index = *logical;
        *logical += 1;
        let block = if address.is_null() {
            None
        } else {
            Some(address)
        };
        func(source, index, block)
    }

    /// An indirect block is an array of `block_size / 4` little-endian
    /// u32 block addresses.
    fn read_pointer_block<S: BlockSource>(
        &self,
        source: &mut S,
        address: BlockAddress,
    ) -> Result<Vec<BlockAddress>, Ext2Error> {
        let offset = OffsetBytes(u64::from(address.0) * self.block_size);
        let buf = source.read_vec(offset, self.block_size as usize)?;
        Ok(buf
            .chunks_exact(4)
            .map(|c| BlockAddress(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect())
    }
}
