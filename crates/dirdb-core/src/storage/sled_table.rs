//! sled-backed ordered tables.
//!
//! Keys are encoded so that byte order equals key order:
//!
//! ```text
//! String:  bytes with 0x00 escaped as 00 FF, terminated by 00 00
//! EntryId: 8 bytes big-endian
//! ```
//!
//! A composite key is the concatenation of its parts.

use std::marker::PhantomData;
use std::ops::Bound;

use dirdb_proto::EntryId;

use super::table::{ForwardKey, OrderedTable, ReverseKey};
use crate::error::{Error, Result};

/// Order-preserving byte encoding of a key.
pub trait KeyCodec: Sized {
    /// Append the encoding to `buf`.
    fn encode_key(&self, buf: &mut Vec<u8>);

    /// Decode a key from the front of `bytes`, returning the rest.
    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8])>;

    /// Encode into a fresh buffer.
    fn to_key_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_key(&mut buf);
        buf
    }

    /// Decode a complete key.
    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        let (key, rest) = Self::decode_key(bytes)?;
        if rest.is_empty() {
            Ok(key)
        } else {
            Err(Error::InvalidKey)
        }
    }
}

impl KeyCodec for EntryId {
    fn encode_key(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8])> {
        if bytes.len() < 8 {
            return Err(Error::InvalidKey);
        }
        let (head, rest) = bytes.split_at(8);
        let id = u64::from_be_bytes(head.try_into().map_err(|_| Error::InvalidKey)?);
        Ok((id, rest))
    }
}

impl KeyCodec for String {
    fn encode_key(&self, buf: &mut Vec<u8>) {
        for &b in self.as_bytes() {
            buf.push(b);
            if b == 0 {
                buf.push(0xFF);
            }
        }
        buf.extend_from_slice(&[0, 0]);
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let mut out = Vec::new();
        let mut i = 0;
        loop {
            match bytes.get(i) {
                None => return Err(Error::InvalidKey),
                Some(0) => match bytes.get(i + 1) {
                    Some(0) => break,
                    Some(0xFF) => {
                        out.push(0);
                        i += 2;
                    }
                    _ => return Err(Error::InvalidKey),
                },
                Some(&b) => {
                    out.push(b);
                    i += 1;
                }
            }
        }
        let value = String::from_utf8(out).map_err(|_| Error::InvalidKey)?;
        Ok((value, &bytes[i + 2..]))
    }
}

impl<V: KeyCodec> KeyCodec for ForwardKey<V> {
    fn encode_key(&self, buf: &mut Vec<u8>) {
        self.value.encode_key(buf);
        self.id.encode_key(buf);
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (value, rest) = V::decode_key(bytes)?;
        let (id, rest) = EntryId::decode_key(rest)?;
        Ok((ForwardKey::new(value, id), rest))
    }
}

impl<V: KeyCodec> KeyCodec for ReverseKey<V> {
    fn encode_key(&self, buf: &mut Vec<u8>) {
        self.id.encode_key(buf);
        self.value.encode_key(buf);
    }

    fn decode_key(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let (id, rest) = EntryId::decode_key(bytes)?;
        let (value, rest) = V::decode_key(rest)?;
        Ok((ReverseKey::new(id, value), rest))
    }
}

/// Ordered table stored as the keys of a sled tree. Values are empty.
pub struct SledTable<K> {
    tree: sled::Tree,
    _key: PhantomData<fn() -> K>,
}

impl<K: KeyCodec> SledTable<K> {
    /// Wrap a tree.
    pub fn new(tree: sled::Tree) -> Self {
        Self {
            tree,
            _key: PhantomData,
        }
    }

    fn byte_range(lower: Bound<&K>, upper: Bound<&K>) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        (
            lower.map(KeyCodec::to_key_bytes),
            upper.map(KeyCodec::to_key_bytes),
        )
    }
}

impl<K: KeyCodec + Ord> OrderedTable<K> for SledTable<K> {
    fn first_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>> {
        if super::table::is_empty_range(lower, upper) {
            return Ok(None);
        }
        match self.tree.range(Self::byte_range(lower, upper)).next() {
            Some(item) => {
                let (key, _) = item?;
                Ok(Some(K::from_key_bytes(&key)?))
            }
            None => Ok(None),
        }
    }

    fn last_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<Option<K>> {
        if super::table::is_empty_range(lower, upper) {
            return Ok(None);
        }
        match self.tree.range(Self::byte_range(lower, upper)).next_back() {
            Some(item) => {
                let (key, _) = item?;
                Ok(Some(K::from_key_bytes(&key)?))
            }
            None => Ok(None),
        }
    }

    fn count_in(&self, lower: Bound<&K>, upper: Bound<&K>) -> Result<u64> {
        if super::table::is_empty_range(lower, upper) {
            return Ok(0);
        }
        let mut count = 0;
        for item in self.tree.range(Self::byte_range(lower, upper)) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn insert(&self, key: K) -> Result<bool> {
        let previous = self.tree.insert(key.to_key_bytes(), &[] as &[u8])?;
        Ok(previous.is_none())
    }

    fn remove(&self, key: &K) -> Result<bool> {
        Ok(self.tree.remove(key.to_key_bytes())?.is_some())
    }
}
