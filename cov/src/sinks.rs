//! Trace sinks called from compiler-instrumented code.
//!
//! Each sink is designed to impose negligible cost when coverage is off and
//! to be callable from any task context. There is no locking on this path —
//! the acquire/release pairing on the per-task mode word (published by
//! `task_state::attach`/`detach`) is the sole correctness guarantee (§5).

use slopos_abi::cov::{CMP_CONST, cmp_size};

use crate::area::{raw_read_count, raw_records_ptr, raw_write_count};
use crate::host;
use crate::task_state::{TASK_MODE_TRACE_CMP, TASK_MODE_TRACE_PC, read_fast};

const WORD_SIZE: usize = 8;
const CMP_ENTRY_WORDS: usize = 4;

fn canonicalize(raw_pc: u64) -> u64 {
    raw_pc.wrapping_sub(host::aslr_offset())
}

/// Steps 1-2 of the common sink contract: short-circuit outside task context
/// or when the attached mode doesn't match `want_mode`.
fn active_buffer(want_mode: u8) -> Option<(*mut u8, usize)> {
    if !host::in_task_context() {
        return None;
    }
    let task_id = host::current_task_id()?;
    let (mode, ptr, words) = read_fast(task_id)?;
    if mode != want_mode {
        return None;
    }
    Some((ptr, words))
}

/// `__sanitizer_cov_trace_pc`-style sink: appends one word at position
/// `count + 1`, up to `size - 1` records total.
pub fn trace_pc(return_address: u64) {
    let Some((ptr, words)) = active_buffer(TASK_MODE_TRACE_PC) else {
        return;
    };
    let pc = canonicalize(return_address);

    // SAFETY: ptr/words were published by an attach() call that allocated
    // exactly `words` 64-bit words at ptr; the buffer outlives this call
    // because detach() only clears these fields after mode, and we already
    // observed a matching mode above.
    unsafe {
        let count = raw_read_count(ptr);
        if count + 1 > (words as u64 - 1) {
            return; // capacity exceeded: silently drop (§7)
        }
        let slot = raw_records_ptr(ptr).add(count as usize * WORD_SIZE).cast::<u64>();
        core::ptr::write_volatile(slot, pc);
        raw_write_count(ptr, count + 1);
    }
}

/// `__sanitizer_cov_trace_cmp`-style family. `width_bits` is one of
/// {8,16,32,64}; `is_const` marks that one operand is a compile-time
/// constant. Appends `(type, arg1, arg2, pc)` iff
/// `(1 + (count+1)*4) * 8 <= size * 8`, using byte arithmetic to avoid
/// overflow as specified.
pub fn trace_cmp(width_bits: u32, is_const: bool, arg1: u64, arg2: u64, return_address: u64) {
    let Some((ptr, words)) = active_buffer(TASK_MODE_TRACE_CMP) else {
        return;
    };
    let Some(k) = width_bits_to_k(width_bits) else {
        return;
    };
    let pc = canonicalize(return_address);
    let entry_type = (cmp_size(k) | if is_const { CMP_CONST } else { 0 }) as u64;

    // SAFETY: see trace_pc.
    unsafe {
        let count = raw_read_count(ptr);
        let needed_bytes = (1 + (count + 1) * CMP_ENTRY_WORDS as u64) * WORD_SIZE as u64;
        if needed_bytes > words as u64 * WORD_SIZE as u64 {
            return;
        }
        let entry = raw_records_ptr(ptr)
            .add(count as usize * CMP_ENTRY_WORDS * WORD_SIZE)
            .cast::<u64>();
        core::ptr::write_volatile(entry, entry_type);
        core::ptr::write_volatile(entry.add(1), arg1);
        core::ptr::write_volatile(entry.add(2), arg2);
        core::ptr::write_volatile(entry.add(3), pc);
        raw_write_count(ptr, count + 1);
    }
}

fn width_bits_to_k(width_bits: u32) -> Option<u32> {
    match width_bits {
        8 => Some(0),
        16 => Some(1),
        32 => Some(2),
        64 => Some(3),
        _ => None,
    }
}

/// Switch sink: one constant-comparison CMP record per case label. Case
/// widths outside {8,16,32,64} are silently ignored, per §4.2.
pub fn trace_switch(match_value: u64, cases: &[u64], width_bits: u32, return_address: u64) {
    if width_bits_to_k(width_bits).is_none() {
        return;
    }
    for &case in cases {
        trace_cmp(width_bits, true, match_value, case, return_address);
    }
}
