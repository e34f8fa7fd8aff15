//! Builds small, valid ext2 images in memory for the integration
//! tests: one block group, 1KiB blocks, a handful of inodes.

use ext2_explorer::{
    BlockAddress, BlockGroupDescriptor, DirectoryEntryHeader, Inode, InodeNumber, Partition,
    Superblock, SECTOR_SIZE, SUPERBLOCK_MAGIC,
};
use zerocopy::{AsBytes, FromBytes};

pub const BLOCK_SIZE: usize = 1024;
pub const INODES_COUNT: u32 = 32;
pub const INODE_SIZE: usize = 128;

/// Fixed metadata layout: boot block, superblock, descriptor table,
/// bitmaps, then a four-block inode table. Data blocks follow.
const INODE_TABLE_BLOCK: u32 = 5;
const FIRST_ALLOCATABLE_BLOCK: u32 = 9;

pub const MODE_DIR: u16 = 0x41ED;
pub const MODE_FILE: u16 = 0x81A4;
pub const MODE_SYMLINK: u16 = 0xA1FF;

pub struct ImageBuilder {
    image: Vec<u8>,
    next_block: u32,
}

impl ImageBuilder {
    pub fn new(total_blocks: u32) -> Self {
        let mut image = vec![0u8; total_blocks as usize * BLOCK_SIZE];

        let mut sb = Superblock::new_zeroed();
        sb.inodes_count = INODES_COUNT;
        sb.blocks_count = total_blocks;
        sb.free_blocks_count = total_blocks - FIRST_ALLOCATABLE_BLOCK;
        sb.free_inodes_count = INODES_COUNT - 10;
        sb.first_data_block = BlockAddress(1);
        sb.log_block_size = 0;
        sb.blocks_per_group = 8192;
        sb.inodes_per_group = INODES_COUNT;
        sb.magic = SUPERBLOCK_MAGIC;
        sb.state = 1;
        sb.rev_level = 1;
        sb.first_ino = 11;
        sb.inode_size = INODE_SIZE as u16;
        sb.volume_name.0[..7].copy_from_slice(b"testvol");
        image[1024..1024 + core::mem::size_of::<Superblock>()].copy_from_slice(sb.as_bytes());

        let mut gd = BlockGroupDescriptor::new_zeroed();
        gd.block_bitmap = BlockAddress(3);
        gd.inode_bitmap = BlockAddress(4);
        gd.inode_table = BlockAddress(INODE_TABLE_BLOCK);
        image[2048..2048 + core::mem::size_of::<BlockGroupDescriptor>()]
            .copy_from_slice(gd.as_bytes());

        Self {
            image,
            next_block: FIRST_ALLOCATABLE_BLOCK,
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.image
    }

    /// Partition record describing the raw image itself, for mounting
    /// without an MBR in front.
    pub fn whole_image_partition(image: &[u8]) -> Partition {
        Partition {
            offset: 0,
            length: image.len() as u64,
            partition_type: 0x83,
            bootable: false,
        }
    }

    fn alloc_block(&mut self) -> u32 {
        let block = self.next_block;
        self.next_block += 1;
        assert!(
            ((block + 1) as usize) * BLOCK_SIZE <= self.image.len(),
            "fixture image too small"
        );
        block
    }

    fn write_block(&mut self, block: u32, data: &[u8]) {
        assert!(data.len() <= BLOCK_SIZE);
        let start = block as usize * BLOCK_SIZE;
        self.image[start..start + data.len()].copy_from_slice(data);
    }

    pub fn set_inode(&mut self, number: u32, inode: &Inode) {
        assert!((1..=INODES_COUNT).contains(&number));
        let offset =
            INODE_TABLE_BLOCK as usize * BLOCK_SIZE + (number as usize - 1) * INODE_SIZE;
        self.image[offset..offset + INODE_SIZE].copy_from_slice(inode.as_bytes());
    }

    /// Writes `content` into freshly allocated blocks and wires the
    /// inode's pointer tree: direct, then single-indirect, then
    /// double-indirect as the content demands.
    pub fn add_file(&mut self, number: u32, content: &[u8]) {
        let mut blocks = Vec::new();
        for chunk in content.chunks(BLOCK_SIZE) {
            let block = self.alloc_block();
            self.write_block(block, chunk);
            blocks.push(block);
        }

        let mut inode = Inode::new_zeroed();
        inode.mode = MODE_FILE;
        inode.size_low = content.len() as u32;
        inode.links_count = 1;
        self.assign_blocks(&mut inode, &blocks);
        self.set_inode(number, &inode);
    }

    fn assign_blocks(&mut self, inode: &mut Inode, blocks: &[u32]) {
        let pointers_per_block = BLOCK_SIZE / 4;

        let direct_count = blocks.len().min(12);
        for (i, &block) in blocks[..direct_count].iter().enumerate() {
            inode.direct_blocks.0[i] = BlockAddress(block);
        }
        let rest = &blocks[direct_count..];
        if rest.is_empty() {
            return;
        }

        let single_count = rest.len().min(pointers_per_block);
        inode.singly_indirect_block = BlockAddress(self.pointer_block(&rest[..single_count]));
        let rest = &rest[single_count..];
        if rest.is_empty() {
            return;
        }

        let level_one: Vec<u32> = rest
            .chunks(pointers_per_block)
            .map(|chunk| self.pointer_block(chunk))
            .collect();
        assert!(
            level_one.len() <= pointers_per_block,
            "fixture files never need triple indirection"
        );
        inode.doubly_indirect_block = BlockAddress(self.pointer_block(&level_one));
    }

    fn pointer_block(&mut self, pointers: &[u32]) -> u32 {
        let block = self.alloc_block();
        let mut data = vec![0u8; BLOCK_SIZE];
        for (i, pointer) in pointers.iter().enumerate() {
            data[i * 4..i * 4 + 4].copy_from_slice(&pointer.to_le_bytes());
        }
        self.write_block(block, &data);
        block
    }

    /// A regular file with explicit holes: only the listed logical
    /// blocks get storage, everything else inside `size` reads as
    /// zeros.
    pub fn add_sparse_file(&mut self, number: u32, size: u32, placed: &[(usize, &[u8])]) {
        let mut inode = Inode::new_zeroed();
        inode.mode = MODE_FILE;
        inode.size_low = size;
        inode.links_count = 1;
        for (logical, content) in placed {
            assert!(*logical < 12, "sparse fixtures place direct blocks only");
            let block = self.alloc_block();
            self.write_block(block, content);
            inode.direct_blocks.0[*logical] = BlockAddress(block);
        }
        self.set_inode(number, &inode);
    }

    /// Single-block directory with the given `(name, inode, file_type)`
    /// entries.
    pub fn add_directory(&mut self, number: u32, entries: &[(&str, u32, u8)]) {
        let block = self.alloc_block();
        let data = directory_block(entries);
        self.write_block(block, &data);

        let mut inode = Inode::new_zeroed();
        inode.mode = MODE_DIR;
        inode.size_low = BLOCK_SIZE as u32;
        inode.links_count = 2;
        inode.direct_blocks.0[0] = BlockAddress(block);
        self.set_inode(number, &inode);
    }
}

/// Packs directory records into one block; the final record's
/// `rec_len` absorbs the remaining space, as on a real disk.
pub fn directory_block(entries: &[(&str, u32, u8)]) -> Vec<u8> {
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut offset = 0;
    for (i, (name, inode, file_type)) in entries.iter().enumerate() {
        let mut header = DirectoryEntryHeader {
            inode: InodeNumber(*inode),
            rec_len: 0,
            name_len: name.len() as u8,
            file_type: *file_type,
        };
        let space = if i == entries.len() - 1 {
            BLOCK_SIZE - offset
        } else {
            header.required_space()
        };
        header.rec_len = space as u16;
        block[offset..offset + 8].copy_from_slice(header.as_bytes());
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name.as_bytes());
        offset += space;
    }
    block
}

/// The standard fixture most tests mount: a root with a file, a
/// subdirectory, a sparse file, an indirect-pointer file, and a
/// symlink entry.
///
/// ```text
/// /
/// ├── hello.txt   26 bytes, one direct block
/// ├── subdir/
/// │   └── nested.txt
/// ├── sparse.bin  3000 bytes, middle block is a hole
/// ├── big.bin     12 KiB + 500 bytes, uses the single-indirect block
/// └── link        symlink entry (never extractable)
/// ```
pub fn sample_image() -> Vec<u8> {
    let mut builder = ImageBuilder::new(64);

    builder.add_directory(
        2,
        &[
            (".", 2, 2),
            ("..", 2, 2),
            ("hello.txt", 11, 1),
            ("subdir", 12, 2),
            ("sparse.bin", 14, 1),
            ("big.bin", 15, 1),
            ("link", 16, 7),
        ],
    );

    builder.add_file(11, HELLO_CONTENT);

    builder.add_directory(
        12,
        &[(".", 12, 2), ("..", 2, 2), ("nested.txt", 13, 1)],
    );
    builder.add_file(13, NESTED_CONTENT);

    let a = [b'a'; BLOCK_SIZE];
    let c = [b'c'; BLOCK_SIZE];
    builder.add_sparse_file(14, SPARSE_SIZE, &[(0, &a), (2, &c)]);

    builder.add_file(15, &big_content());

    let mut symlink = Inode::new_zeroed();
    symlink.mode = MODE_SYMLINK;
    symlink.links_count = 1;
    builder.set_inode(16, &symlink);

    builder.build()
}

pub const HELLO_CONTENT: &[u8] = b"Hello from an ext2 image!\n";
pub const NESTED_CONTENT: &[u8] = b"deeper\n";
pub const SPARSE_SIZE: u32 = 3000;

/// 12 KiB + 500 bytes: spills one block past the direct pointers.
pub fn big_content() -> Vec<u8> {
    (0..12 * BLOCK_SIZE + 500).map(|i| (i % 251) as u8).collect()
}

/// Wraps partition images in a disk with an MBR: each `(start_lba,
/// partition_type, image)` becomes one primary partition table entry,
/// in order, with zeroed entries left absent.
pub fn disk_with_partitions(parts: &[(u32, u8, &[u8])]) -> Vec<u8> {
    let total = parts
        .iter()
        .map(|(lba, _, image)| *lba as usize * SECTOR_SIZE as usize + image.len())
        .max()
        .unwrap_or(SECTOR_SIZE as usize);
    let mut disk = vec![0u8; total.max(SECTOR_SIZE as usize)];

    for (i, (lba, partition_type, image)) in parts.iter().enumerate() {
        let entry_offset = 446 + i * 16;
        disk[entry_offset + 4] = *partition_type;
        let sectors = (image.len() as u64).div_ceil(SECTOR_SIZE) as u32;
        disk[entry_offset + 8..entry_offset + 12].copy_from_slice(&lba.to_le_bytes());
        disk[entry_offset + 12..entry_offset + 16].copy_from_slice(&sectors.to_le_bytes());

        let start = *lba as usize * SECTOR_SIZE as usize;
        disk[start..start + image.len()].copy_from_slice(image);
    }

    disk[510] = 0x55;
    disk[511] = 0xAA;
    disk
}
