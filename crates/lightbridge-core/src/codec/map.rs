use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use super::{write_length, CanonicalEncode, EncodeError};

/// Encode map entries as a count followed by `key ‖ value` pairs, ordered by
/// the bytes of each encoded key.
///
/// Sorting on encoded bytes rather than on `K: Ord` keeps the order stable no
/// matter how the key type orders itself in memory.
fn encode_entries<'a, K, V, I>(entries: I, out: &mut Vec<u8>) -> Result<(), EncodeError>
where
    K: CanonicalEncode + 'a,
    V: CanonicalEncode + 'a,
    I: ExactSizeIterator<Item = (&'a K, &'a V)>,
{
    write_length(out, entries.len())?;

    let mut encoded = entries
        .map(|(key, value)| {
            let key = key.to_canonical_bytes()?;
            let value = value.to_canonical_bytes()?;
            Ok((key, value))
        })
        .collect::<Result<Vec<_>, EncodeError>>()?;
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, value) in encoded {
        out.extend_from_slice(&key);
        out.extend_from_slice(&value);
    }
    Ok(())
}

impl<K: CanonicalEncode, V: CanonicalEncode> CanonicalEncode for BTreeMap<K, V> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_entries(self.iter(), out)
    }
}

impl<K: CanonicalEncode, V: CanonicalEncode, S: BuildHasher> CanonicalEncode for HashMap<K, V, S> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_entries(self.iter(), out)
    }
}
