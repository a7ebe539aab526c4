//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is a plain XOR against a repeating 4-byte key. Because a frame's
//! payload may reach us in several reads, the position inside the key is
//! carried between calls as an offset in `0..4`.

/// XOR `data` with `mask`, starting at key index 0.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_words(data, mask);
}

/// XOR `data` with `mask`, starting at key index `offset % 4`.
///
/// Returns the key index the next byte of the same payload must start at, so a
/// payload processed in arbitrary pieces ends up identical to one processed at
/// once.
#[inline]
pub fn apply_mask_at(data: &mut [u8], mask: [u8; 4], offset: usize) -> usize {
    let offset = offset % 4;
    let mut rotated = mask;
    rotated.rotate_left(offset);
    apply_mask_words(data, rotated);
    (offset + data.len()) % 4
}

/// Byte-by-byte reference implementation.
#[inline]
pub fn apply_mask_bytewise(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Processes eight bytes per step using `u64` XOR, then finishes the tail
/// byte-by-byte.
#[inline]
fn apply_mask_words(data: &mut [u8], mask: [u8; 4]) {
    let wide = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ wide;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    // Every full chunk is a multiple of 4 bytes, so the tail starts at key index 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_example_from_rfc() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();

        apply_mask(&mut data, mask);
        assert_eq!(data, vec![0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_masking_reversible() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"Hello, WebSocket!".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, mask);
        assert_ne!(data, original);

        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn test_masking_empty() {
        let mut data: Vec<u8> = vec![];
        assert_eq!(apply_mask_at(&mut data, [1, 2, 3, 4], 3), 3);
        assert!(data.is_empty());
    }

    #[test]
    fn test_masking_matches_bytewise() {
        let mask = [0xab, 0xcd, 0xef, 0x12];
        for size in [0, 1, 3, 4, 5, 7, 8, 9, 15, 16, 17, 63, 64, 65, 1000] {
            let original: Vec<u8> = (0..size).map(|i| (i & 0xff) as u8).collect();
            let mut fast = original.clone();
            let mut slow = original.clone();

            apply_mask(&mut fast, mask);
            apply_mask_bytewise(&mut slow, mask);

            assert_eq!(fast, slow, "mismatch at size {size}");
        }
    }

    #[test]
    fn test_mask_at_offset_rotates_key() {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut data = vec![0u8; 6];
        let next = apply_mask_at(&mut data, mask, 1);
        assert_eq!(data, vec![0x22, 0x33, 0x44, 0x11, 0x22, 0x33]);
        assert_eq!(next, 3);
    }

    #[test]
    fn test_mask_split_at_every_boundary() {
        let mask = [0x37, 0xfa, 0x21, 0x3d];
        let original: Vec<u8> = (0..37u8).collect();
        let mut expected = original.clone();
        apply_mask_bytewise(&mut expected, mask);

        for split in 0..=original.len() {
            let mut data = original.clone();
            let (head, tail) = data.split_at_mut(split);
            let offset = apply_mask_at(head, mask, 0);
            apply_mask_at(tail, mask, offset);
            assert_eq!(data, expected, "split at {split}");
        }
    }
}
