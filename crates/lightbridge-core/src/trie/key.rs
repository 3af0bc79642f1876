/// Minimal key width, in bytes, for a trie holding `num_keys` dense indices.
///
/// 0 keys need no bytes, a single key still takes one byte, otherwise the
/// width is the number of bytes needed to represent `num_keys - 1`.
pub fn min_repr_bytes(num_keys: usize) -> usize {
    match num_keys {
        0 => 0,
        1 => 1,
        n => {
            let bits = usize::BITS - (n - 1).leading_zeros();
            bits.div_ceil(8) as usize
        }
    }
}

/// Big-endian encoding of `index` in exactly `key_len` bytes.
pub fn to_index_bytes(index: usize, key_len: usize) -> Vec<u8> {
    let mut result = vec![0u8; key_len];
    let mut index = index as u128;
    for byte in result.iter_mut().rev() {
        *byte = index as u8;
        index >>= 8;
    }
    result
}

/// Key of entry `index` in a trie holding `total` entries.
pub fn index_to_key(index: usize, total: usize) -> Vec<u8> {
    to_index_bytes(index, min_repr_bytes(total))
}
