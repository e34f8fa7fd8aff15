use core::fmt;

use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes};

use crate::superblock::BlockAddress;

/// On-disk inode record, leading 128 bytes. Revision 1 filesystems may
/// use larger records; the extra space holds extended attributes this
/// engine does not consume.
///
/// See <https://www.nongnu.org/ext2-doc/ext2.html#inode-table>
#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, AsBytes)]
pub struct Inode {
    /// File format and access rights; see [`InodeMode`].
    pub mode: u16,
    pub uid: u16,
    pub size_low: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    /// Number of 512-byte sectors reserved for this inode, not
    /// filesystem-sized blocks.
    pub blocks: u32,
    pub flags: u32,
    pub osd1: u32,
    pub direct_blocks: InodeDirectBlocks,
    pub singly_indirect_block: BlockAddress,
    pub doubly_indirect_block: BlockAddress,
    pub triply_indirect_block: BlockAddress,
    pub generation: u32,
    pub file_acl: u32,
    /// High 32 bits of file size for regular files on revision 1
    /// filesystems. This is dir_acl in revision 0 and for directories.
    pub size_high: u32,
    pub faddr: u32,
    pub osd2: [u8; 12],
}

impl Inode {
    pub fn mode_flags(&self) -> InodeMode {
        InodeMode::from_bits_retain(self.mode)
    }

    /// The file format lives in the top nibble of `mode` and is an
    /// enumeration, not a bitfield: testing single bits misclassifies
    /// e.g. symlinks (0xA000) as regular files (0x8000).
    fn format(&self) -> u16 {
        self.mode & InodeMode::IFMT.bits()
    }

    pub fn is_dir(&self) -> bool {
        self.format() == InodeMode::IFDIR.bits()
    }

    pub fn is_regular_file(&self) -> bool {
        self.format() == InodeMode::IFREG.bits()
    }

    pub fn is_symlink(&self) -> bool {
        self.format() == InodeMode::IFLNK.bits()
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    #[repr(transparent)]
    /// <https://www.nongnu.org/ext2-doc/ext2.html#i-mode>
    pub struct InodeMode: u16 {
        // Access rights

        /// Others execute
        const IXOTH = 0x001;
        /// Others write
        const IWOTH = 0x002;
        /// Others read
        const IROTH = 0x004;
        /// Group execute
        const IXGRP = 0x008;
        /// Group write
        const IWGRP = 0x010;
        /// Group read
        const IRGRP = 0x020;
        /// User execute
        const IXUSR = 0x040;
        /// User write
        const IWUSR = 0x080;
        /// User read
        const IRUSR = 0x100;

        // Process execution user/group override

        /// Sticky bit
        const ISVTX = 0x200;
        /// Set process group id
        const ISGID = 0x400;
        /// Set process user id
        const ISUID = 0x800;

        // File format

        /// FIFO
        const IFIFO = 0x1000;
        /// Character device
        const IFCHR = 0x2000;
        /// Directory
        const IFDIR = 0x4000;
        /// Block device
        const IFBLK = 0x6000;
        /// Regular file
        const IFREG = 0x8000;
        /// Symbolic link
        const IFLNK = 0xA000;
        /// Socket
        const IFSOCK = 0xC000;

        /// Mask for the file format nibble.
        const IFMT = 0xF000;
    }
}

/// The 12 direct block pointers at the head of an inode's block array.
#[derive(Clone, Copy, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct InodeDirectBlocks(pub [BlockAddress; 12]);

impl InodeDirectBlocks {
    pub fn iter(&self) -> impl Iterator<Item = BlockAddress> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Debug for InodeDirectBlocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
