/*!
 * Cache-Line Alignment
 */

use std::ops::Deref;

/// Pads and aligns a value to a cache line
///
/// Keeps independently-contended atomics (queue head and tail, list heads)
/// from sharing a line.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(T);

impl<T> CacheAligned<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}
