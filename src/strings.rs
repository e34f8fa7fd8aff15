use core::fmt;

use zerocopy::{AsBytes, FromBytes};

/// Byte array holding a nul-terminated string, as ext2 stores the volume
/// name and last mount point.
#[derive(Copy, Clone, FromBytes, AsBytes)]
#[repr(transparent)]
pub struct CStringBytes<B>(pub B);

impl<const N: usize> CStringBytes<[u8; N]> {
    pub fn as_str(&self) -> &str {
        let nul = self.0.iter().position(|&c| c == 0).unwrap_or(N);
        core::str::from_utf8(&self.0[..nul]).unwrap_or("<invalid UTF-8>")
    }
}

impl<const N: usize> fmt::Debug for CStringBytes<[u8; N]> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CStringBytes").field(&self.as_str()).finish()
    }
}
