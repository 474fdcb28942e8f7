//! Owned, page-aligned shared buffer backing a coverage descriptor.
//!
//! `CovArea` is a thin wrapper over a heap allocation sized and aligned to a
//! 4 KiB page, following the shape of `mm::shared_memory::SharedBuffer` minus
//! the page-table/mmap plumbing that crate owns — `cov` cannot depend on
//! `slopos-mm`, so it asks the global allocator for a page-aligned `Layout`
//! instead of a physical page frame. The actual mapping into userspace is the
//! out-of-scope VFS integration.

use alloc::alloc::{Layout, alloc_zeroed, dealloc};
use core::ptr::NonNull;
use core::sync::atomic::{Ordering, fence};

use slopos_abi::CovError;

const PAGE_SIZE: usize = 4096;
const WORD_SIZE: usize = 8;

/// A heap-backed, page-aligned region of `word_count` 64-bit words. Word 0 is
/// the record count; words `[1, word_count)` hold the record payload.
///
/// `CovArea` is `Send` but not `Sync`: concurrent access to its contents is
/// made safe by the descriptor lock and the per-task attach discipline, not
/// by the type system — the same division of labor `ShmMapping` relies on.
pub struct CovArea {
    ptr: NonNull<u8>,
    layout: Layout,
    word_count: usize,
}

unsafe impl Send for CovArea {}

impl CovArea {
    /// Allocate a zeroed area with capacity for `word_count` 64-bit words.
    pub fn new(word_count: usize) -> Result<Self, CovError> {
        let byte_len = word_count
            .checked_mul(WORD_SIZE)
            .ok_or(CovError::InvalidArgument)?;
        let layout =
            Layout::from_size_align(byte_len, PAGE_SIZE).map_err(|_| CovError::InvalidArgument)?;
        // SAFETY: layout has non-zero size, checked above via word_count bounds
        // enforced by the caller (COV_MIN_AREA_WORDS..=COV_MAX_AREA_WORDS).
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(CovError::NoMemory)?;
        Ok(Self {
            ptr,
            layout,
            word_count,
        })
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn byte_len(&self) -> usize {
        self.layout.size()
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Pointer to the first byte past the count word, where records begin.
    pub fn records_ptr(&self) -> *mut u8 {
        // SAFETY: the allocation is at least one word long (COV_MIN_AREA_WORDS >= 2).
        unsafe { self.ptr.as_ptr().add(WORD_SIZE) }
    }

    /// Read the count word. The raw memory is userspace-visible, not a Rust
    /// atomic object, so ordering is enforced with an explicit fence rather
    /// than an `AtomicU64` cast (mirrors the mmap ring-buffer header idiom).
    pub fn read_count(&self) -> u64 {
        // SAFETY: ptr is a live, page-sized allocation of at least one word.
        unsafe { raw_read_count(self.ptr.as_ptr()) }
    }

    pub fn write_count(&self, count: u64) {
        // SAFETY: ptr is a live, page-sized allocation of at least one word.
        unsafe { raw_write_count(self.ptr.as_ptr(), count) };
    }
}

/// Read the count word at the base of a raw coverage buffer, with the same
/// fence-based ordering as `CovArea::read_count`. Used by the trace sinks,
/// which only ever see the cached raw pointer published by `task_state`, not
/// a `CovArea` reference (the `CovArea` itself lives behind the descriptor
/// lock, off the fast path).
///
/// # Safety
/// `ptr` must point at a live buffer of at least one 64-bit word.
pub unsafe fn raw_read_count(ptr: *mut u8) -> u64 {
    let val = unsafe { core::ptr::read_volatile(ptr.cast::<u64>()) };
    fence(Ordering::Acquire);
    val
}

/// # Safety
/// `ptr` must point at a live buffer of at least one 64-bit word.
pub unsafe fn raw_write_count(ptr: *mut u8, count: u64) {
    fence(Ordering::Release);
    unsafe { core::ptr::write_volatile(ptr.cast::<u64>(), count) };
}

/// Pointer to the first record byte of a raw coverage buffer (past the
/// count word), matching `CovArea::records_ptr`.
///
/// # Safety
/// `ptr` must point at a live buffer of at least one 64-bit word.
pub unsafe fn raw_records_ptr(ptr: *mut u8) -> *mut u8 {
    unsafe { ptr.add(WORD_SIZE) }
}

impl Drop for CovArea {
    fn drop(&mut self) {
        // SAFETY: ptr/layout were produced together by alloc_zeroed above and
        // are never handed out past this struct's lifetime.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
