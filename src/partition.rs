use zerocopy::{AsBytes, FromBytes};

use crate::error::Ext2Error;
use crate::source::BlockSource;
use crate::superblock::OffsetBytes;

/// MBR sector size. Partition table LBAs and sector counts are in these
/// units regardless of the filesystem block size.
pub const SECTOR_SIZE: u64 = 512;

/// Byte offset of the first partition table entry within sector 0.
const PARTITION_TABLE_OFFSET: u64 = 446;

/// Number of primary partition table entries in an MBR.
const PARTITION_TABLE_ENTRIES: usize = 4;

/// `0x55 0xAA` at bytes 510..512 of sector 0.
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// A partition discovered in the MBR, reduced to the byte window it
/// occupies on the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Byte offset of the partition from the start of the disk.
    pub offset: u64,
    /// Length of the partition in bytes.
    pub length: u64,
    /// MBR partition type byte (0x83 for native Linux partitions).
    pub partition_type: u8,
    pub bootable: bool,
}

/// One 16-byte entry of the classic MBR partition table.
///
/// See <https://en.wikipedia.org/wiki/Master_boot_record#PTE>
#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, AsBytes)]
struct PartitionTableEntry {
    status: u8,
    first_chs: [u8; 3],
    partition_type: u8,
    last_chs: [u8; 3],
    first_lba: u32,
    sector_count: u32,
}

impl PartitionTableEntry {
    /// A type byte of zero marks the slot as unused.
    fn is_present(&self) -> bool {
        self.partition_type != 0
    }
}

/// Parses the MBR in sector 0 and returns the primary partitions in
/// table order. Extended/logical partitions are not chased; their
/// container entry is reported as-is.
pub fn list_partitions<S: BlockSource>(source: &mut S) -> Result<Vec<Partition>, Ext2Error> {
    let sector = source
        .read_vec(OffsetBytes(0), SECTOR_SIZE as usize)
        .map_err(|e| Ext2Error::PartitionTableInvalid(format!("cannot read sector 0: {e}")))?;

    if sector[510..512] != BOOT_SIGNATURE {
        return Err(Ext2Error::PartitionTableInvalid(String::from(
            "missing 0x55AA boot signature",
        )));
    }

    let mut partitions = Vec::new();
    for i in 0..PARTITION_TABLE_ENTRIES {
        let start = PARTITION_TABLE_OFFSET as usize + i * core::mem::size_of::<PartitionTableEntry>();
        let entry = PartitionTableEntry::read_from(
            &sector[start..start + core::mem::size_of::<PartitionTableEntry>()],
        )
        .ok_or_else(|| {
            Ext2Error::PartitionTableInvalid(String::from("partition table entry truncated"))
        })?;

        if !entry.is_present() {
            continue;
        }

        partitions.push(Partition {
            offset: u64::from(entry.first_lba) * SECTOR_SIZE,
            length: u64::from(entry.sector_count) * SECTOR_SIZE,
            partition_type: entry.partition_type,
            bootable: entry.status & 0x80 != 0,
        });
    }

    log::debug!("found {} partition(s) in the MBR", partitions.len());
    Ok(partitions)
}
