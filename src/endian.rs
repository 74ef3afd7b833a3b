//! Byte-order helpers used at the on-disk serialization boundary.
//!
//! Every multi-byte field in the database format is big-endian
//! ("network order"), so most of the format is read and written through
//! `zerocopy`'s `U16<BigEndian>`/`U32<BigEndian>`/`U64<BigEndian>`
//! wrappers directly. This module covers what those wrappers don't: the
//! page-alignment padding the writer inserts between sections. The
//! 128-bit address in a v0 network record is a plain `[u8; 16]` that
//! `zerocopy` reads as-is; `u128::from_be_bytes` on that array is enough,
//! so there is no separate helper for it here.

/// Section alignment boundary, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Number of padding bytes needed to bring `len` up to the next page
/// boundary. Zero if `len` is already aligned.
pub fn padding_to_page_boundary(len: usize) -> usize {
    let remainder = len % PAGE_SIZE;
    if remainder == 0 {
        0
    } else {
        PAGE_SIZE - remainder
    }
}

/// Round `len` up to the next page boundary.
pub fn align_to_page_boundary(len: usize) -> usize {
    len + padding_to_page_boundary(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_length_needs_no_padding() {
        assert_eq!(padding_to_page_boundary(PAGE_SIZE), 0);
        assert_eq!(padding_to_page_boundary(0), 0);
    }

    #[test]
    fn unaligned_length_pads_up_to_the_boundary() {
        assert_eq!(padding_to_page_boundary(PAGE_SIZE + 1), PAGE_SIZE - 1);
        assert_eq!(align_to_page_boundary(PAGE_SIZE + 1), PAGE_SIZE * 2);
    }
}
