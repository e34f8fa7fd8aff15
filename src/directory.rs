use zerocopy::{AsBytes, FromBytes};

use crate::superblock::InodeNumber;

/// Maximum length of a directory entry name in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Fixed-size head of a directory entry record. The name follows it,
/// `name_len` bytes, not nul-terminated; `rec_len` covers header, name,
/// and any padding up to the next record.
///
/// See <https://www.nongnu.org/ext2-doc/ext2.html#linked-directory-entry-structure>
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, AsBytes)]
pub struct DirectoryEntryHeader {
    pub inode: InodeNumber,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
}

impl DirectoryEntryHeader {
    /// Records are aligned on 4-byte boundaries and may not span data
    /// blocks; the last record of a block absorbs the slack in its
    /// `rec_len`.
    pub fn required_space(&self) -> usize {
        (core::mem::size_of::<Self>() + self.name_len as usize).next_multiple_of(4)
    }
}

/// `file_type` byte values. Present on filesystems with the FILETYPE
/// incompat feature, which is every mkfs.ext2 output this century;
/// anything unrecognized reads as `Unknown`.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectoryEntryFileType {
    Unknown = 0,
    RegularFile = 1,
    Directory = 2,
    CharacterDevice = 3,
    BlockDevice = 4,
    Fifo = 5,
    Socket = 6,
    SymbolicLink = 7,
}

impl From<u8> for DirectoryEntryFileType {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::RegularFile,
            2 => Self::Directory,
            3 => Self::CharacterDevice,
            4 => Self::BlockDevice,
            5 => Self::Fifo,
            6 => Self::Socket,
            7 => Self::SymbolicLink,
            _ => Self::Unknown,
        }
    }
}

/// One data block of a directory inode.
///
/// See <https://www.nongnu.org/ext2-doc/ext2.html#linked-directories>
#[derive(Debug, Clone)]
pub struct DirectoryBlock<'a>(pub &'a [u8]);

impl DirectoryBlock<'_> {
    pub fn iter(&self) -> DirectoryBlockIterator<'_> {
        DirectoryBlockIterator {
            block: self.clone(),
            offset: 0,
        }
    }
}

pub struct DirectoryBlockIterator<'a> {
    block: DirectoryBlock<'a>,
    offset: usize,
}

impl<'a> Iterator for DirectoryBlockIterator<'a> {
    type Item = DirectoryEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.block.0;
        if self.offset >= bytes.len() {
            return None;
        }

        let header = DirectoryEntryHeader::read_from_prefix(&bytes[self.offset..])?;

        // A zero rec_len can never advance; anything else that escapes
        // the block violates the record invariants. Stop at the corrupt
        // record rather than looping or slicing out of bounds.
        let rec_len = header.rec_len as usize;
        if rec_len == 0 || self.offset + rec_len > bytes.len() {
            log::warn!(
                "corrupt directory record at block offset {}: rec_len {rec_len}",
                self.offset
            );
            self.offset = bytes.len();
            return None;
        }

        let name_start = self.offset + core::mem::size_of::<DirectoryEntryHeader>();
        let name_end = name_start + header.name_len as usize;
        if name_end > self.offset + rec_len {
            log::warn!(
                "corrupt directory record at block offset {}: name_len {} exceeds rec_len {rec_len}",
                self.offset,
                header.name_len
            );
            self.offset = bytes.len();
            return None;
        }
        let name = &bytes[name_start..name_end];

        self.offset += rec_len;

        Some(DirectoryEntry { header, name })
    }
}

/// A parsed directory entry. The name is raw bytes: ext2 names have no
/// encoding, and lookups match them byte-for-byte.
#[derive(Debug)]
pub struct DirectoryEntry<'a> {
    pub header: DirectoryEntryHeader,
    pub name: &'a [u8],
}

impl DirectoryEntry<'_> {
    /// An entry pointing at inode 0 is a deleted/unused slot that still
    /// occupies its `rec_len` bytes.
    pub fn is_unused(&self) -> bool {
        let inode = self.header.inode;
        inode == InodeNumber(0)
    }

    pub fn file_type(&self) -> DirectoryEntryFileType {
        self.header.file_type.into()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs entries into a block, giving the last one the remaining
    /// space, the way mkfs and the kernel leave real directory blocks.
    fn build_block(block_size: usize, entries: &[(u32, u8, &[u8])]) -> Vec<u8> {
        let mut block = vec![0u8; block_size];
        let mut offset = 0;
        for (i, (inode, file_type, name)) in entries.iter().enumerate() {
            let mut header = DirectoryEntryHeader {
                inode: InodeNumber(*inode),
                rec_len: 0,
                name_len: name.len() as u8,
                file_type: *file_type,
            };
            let space = if i == entries.len() - 1 {
                block_size - offset
            } else {
                header.required_space()
            };
            header.rec_len = space as u16;
            block[offset..offset + 8].copy_from_slice(header.as_bytes());
            block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
            offset += space;
        }
        block
    }

    #[test]
    fn header_size_and_alignment() {
        assert_eq!(core::mem::size_of::<DirectoryEntryHeader>(), 8);
        let header = DirectoryEntryHeader {
            inode: InodeNumber(1),
            rec_len: 0,
            name_len: 5,
            file_type: 1,
        };
        // 8 + 5 rounded up to a 4-byte boundary.
        assert_eq!(header.required_space(), 16);
    }

    #[test]
    fn walks_records_by_rec_len() {
        let block = build_block(
            1024,
            &[
                (2, 2, b"."),
                (2, 2, b".."),
                (11, 1, b"hello.txt"),
                (12, 2, b"subdir"),
            ],
        );
        let dir = DirectoryBlock(&block);
        let names: Vec<String> = dir.iter().map(|e| e.name_lossy()).collect();
        assert_eq!(names, vec![".", "..", "hello.txt", "subdir"]);

        let total: usize = dir.iter().map(|e| e.header.rec_len as usize).sum();
        assert_eq!(total, 1024);

        let types: Vec<DirectoryEntryFileType> = dir.iter().map(|e| e.file_type()).collect();
        assert_eq!(types[2], DirectoryEntryFileType::RegularFile);
        assert_eq!(types[3], DirectoryEntryFileType::Directory);
    }

    #[test]
    fn unused_slot_consumes_its_record() {
        let block = build_block(512, &[(2, 2, b"."), (0, 0, b"gone"), (11, 1, b"kept")]);
        let dir = DirectoryBlock(&block);
        let entries: Vec<_> = dir.iter().collect();
        assert_eq!(entries.len(), 3);
        assert!(entries[1].is_unused());
        assert_eq!(entries[2].name, b"kept");
    }

    #[test]
    fn zero_rec_len_stops_iteration() {
        // "." occupies 12 bytes, so the second record starts at 12 and
        // its rec_len field sits at bytes 16..18.
        let mut block = build_block(512, &[(2, 2, b"."), (11, 1, b"x")]);
        block[16] = 0;
        block[17] = 0;
        let dir = DirectoryBlock(&block);
        assert_eq!(dir.iter().count(), 1);
    }

    #[test]
    fn overlong_name_stops_iteration() {
        // Middle record has a tight rec_len of 12; a name_len of 200
        // cannot fit inside it.
        let mut block = build_block(512, &[(2, 2, b"."), (11, 1, b"x"), (12, 1, b"y")]);
        block[12 + 6] = 200;
        let dir = DirectoryBlock(&block);
        assert_eq!(dir.iter().count(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn generated_blocks_round_trip(
                names in prop::collection::vec("[a-z0-9_.]{1,16}", 1..24)
            ) {
                let entries: Vec<(u32, u8, &[u8])> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (i as u32 + 11, 1u8, name.as_bytes()))
                    .collect();
                let block = build_block(1024, &entries);
                let dir = DirectoryBlock(&block);

                let got: Vec<String> = dir.iter().map(|e| e.name_lossy()).collect();
                prop_assert_eq!(&got, &names);

                let total: usize = dir.iter().map(|e| e.header.rec_len as usize).sum();
                prop_assert_eq!(total, 1024);
            }
        }
    }
}
