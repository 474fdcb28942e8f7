//! `remote_stop`'s merge operation: append-with-truncation from a scratch
//! buffer into a descriptor's shared buffer, performed under the descriptor
//! lock (§4.4). Not atomic with respect to userspace reads — a concurrent
//! reader may observe records before the count update and must tolerate it.

use slopos_lib::klog_warn;

use crate::area::CovArea;
use crate::descriptor::DescMode;

const WORD_SIZE: u64 = 8;

fn entry_words(mode: DescMode) -> Option<u64> {
    match mode {
        DescMode::TracePc => Some(1),
        DescMode::TraceCmp => Some(4),
        DescMode::Init | DescMode::Disabled => None,
    }
}

/// Copy as many complete source records as fit into `dst`'s remaining
/// capacity; overflow is dropped, matching the trace-sink capacity rule.
pub(crate) fn merge(mode: DescMode, dst: &CovArea, src: &CovArea) {
    let Some(words_per_entry) = entry_words(mode) else {
        klog_warn!("cov: merge called with no active trace mode");
        return;
    };
    let entry_bytes = words_per_entry * WORD_SIZE;

    let dst_count = dst.read_count();
    let dst_capacity_entries = (dst.word_count() as u64 - 1) / words_per_entry;
    if dst_count > dst_capacity_entries {
        klog_warn!("cov: destination count {} exceeds declared capacity", dst_count);
        return;
    }

    // No other writer touches the scratch buffer's count once the executor
    // has detached; `read_count` still fences like any other area read.
    let src_count = src.read_count();

    // Free space measured in whole entries, not raw bytes: the record region
    // need not be an exact multiple of entry_bytes (e.g. CMP mode with an
    // odd word count), and copying a partial trailing record would corrupt
    // the next append's offset math.
    let dst_free_entries = dst_capacity_entries - dst_count;
    let entries_to_move = core::cmp::min(dst_free_entries, src_count);
    if entries_to_move == 0 {
        return;
    }
    let bytes_to_move = entries_to_move * entry_bytes;

    let dst_offset = dst_count * entry_bytes;
    // SAFETY: dst_offset + bytes_to_move <= dst's record region by construction
    // above, and src has at least bytes_to_move valid record bytes since
    // bytes_to_move <= src_count * entry_bytes.
    unsafe {
        core::ptr::copy_nonoverlapping(
            src.records_ptr(),
            dst.records_ptr().add(dst_offset as usize),
            bytes_to_move as usize,
        );
    }

    let new_count = dst_count + bytes_to_move / entry_bytes;
    dst.write_count(new_count);
}
