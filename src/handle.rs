//! Codec between external handle values and slot indices.
//!
//! Fast event handles share a namespace with handles of unrelated kinds, so
//! the encoding reserves a tag byte that identifies ours at a glance. The
//! index occupies the low bits, shifted to keep the two lowest bits clear.

use std::fmt;

use crate::CAPACITY;

const TAG_MASK: u32 = 0xff00_0000;
const TAG: u32 = 0x0100_0000;
const INDEX_SHIFT: u32 = 2;

/// An opaque handle to a fast event, encoding the slot index it names.
///
/// A `Handle` is a pure value: copying it does not duplicate the event, and
/// it can go stale if the event is closed. Obtain one from
/// [`EventTable::create`](crate::EventTable::create) or by decoding an
/// externally received value with [`Handle::from_raw`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub(crate) fn encode(index: usize) -> Handle {
        debug_assert!(index < CAPACITY);
        Handle(TAG | ((index as u32) << INDEX_SHIFT))
    }

    /// Decodes an external handle value, rejecting anything that carries the
    /// wrong tag, has misaligned low bits, or names an index outside the
    /// slot table.
    pub fn from_raw(raw: u32) -> Option<Handle> {
        if raw & TAG_MASK != TAG {
            return None;
        }
        let body = raw & !TAG_MASK;
        if body & ((1 << INDEX_SHIFT) - 1) != 0 {
            return None;
        }
        if (body >> INDEX_SHIFT) as usize >= CAPACITY {
            return None;
        }
        Some(Handle(raw))
    }

    /// The raw value this handle travels as outside the process.
    pub const fn into_raw(self) -> u32 {
        self.0
    }

    /// Whether a raw handle value belongs to the fast event namespace at
    /// all, without validating the index. Lets callers triaging a mixed
    /// handle namespace route values before decoding.
    pub const fn is_fast_event_raw(raw: u32) -> bool {
        raw & TAG_MASK == TAG
    }

    pub(crate) fn index(self) -> usize {
        ((self.0 & !TAG_MASK) >> INDEX_SHIFT) as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(0x{:08x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_every_index() {
        for index in 0..CAPACITY {
            let handle = Handle::encode(index);
            assert_eq!(handle.index(), index);
            assert_eq!(Handle::from_raw(handle.into_raw()), Some(handle));
        }
    }

    #[test]
    fn rejects_wrong_tag() {
        assert_eq!(Handle::from_raw(0), None);
        assert_eq!(Handle::from_raw(0x0200_0000), None);
        assert_eq!(Handle::from_raw(0xff00_0004), None);
        assert!(!Handle::is_fast_event_raw(0x0200_0000));
    }

    #[test]
    fn rejects_misaligned_body() {
        assert_eq!(Handle::from_raw(TAG | 1), None);
        assert_eq!(Handle::from_raw(TAG | 2), None);
        assert_eq!(Handle::from_raw(TAG | 3), None);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let first_bad = TAG | ((CAPACITY as u32) << INDEX_SHIFT);
        assert_eq!(Handle::from_raw(first_bad), None);
        // The tag still matches even though the index does not decode.
        assert!(Handle::is_fast_event_raw(first_bad));
    }
}
