//! Read-only access to ext2 filesystems on raw disks and disk images:
//! MBR partition discovery, superblock and block group parsing, inode
//! resolution, directory navigation, and file extraction.
//!
//! All on-disk values are little-endian and are read in place from
//! `#[repr(C, packed)]` structs.
//!
//! # Resources
//!
//! - <https://wiki.osdev.org/Ext2>
//! - <https://www.nongnu.org/ext2-doc/ext2.html>
//! - <https://en.wikipedia.org/wiki/Ext2>
//! - <https://en.wikipedia.org/wiki/Master_boot_record>

#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cargo_common_metadata,
    clippy::doc_markdown,
    clippy::implicit_return,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::redundant_pub_crate,
    clippy::wildcard_imports
)]

mod block_group;
mod block_map;
mod directory;
mod error;
mod fs;
mod inode;
mod partition;
mod source;
mod strings;
mod superblock;

pub use block_group::*;
pub use block_map::*;
pub use directory::*;
pub use error::*;
pub use fs::*;
pub use inode::*;
pub use partition::*;
pub use source::*;
pub use strings::*;
pub use superblock::*;
