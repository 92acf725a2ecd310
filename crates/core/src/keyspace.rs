//! Keyspace Layout (spec §4.1): deterministic, order-preserving mapping from
//! typed tuples to byte keys, shared by records, indexes, and store
//! metadata.
//!
//! This is the Rust-native analogue of the teacher's `strata_core::types`
//! composite-key scheme, generalized from a fixed `(Namespace, TypeTag,
//! Key)` triple to arbitrary tuples of [`FieldValue`](crate::value::FieldValue)s
//! so it can pack record ids, index entries, and hexastore orderings alike.

use crate::value::FieldValue;
use std::cmp::Ordering as CmpOrdering;

/// Type tags, chosen so that `tag_of(a) < tag_of(b) ⇒` every packed `a`
/// sorts before every packed `b`, matching the cross-type ordering
/// `Null < Bool < Int64/Double < String < Data < Array(nested tuple)`.
mod tag {
    pub const NULL: u8 = 0x00;
    pub const FALSE: u8 = 0x01;
    pub const TRUE: u8 = 0x02;
    pub const INT64: u8 = 0x03;
    pub const DOUBLE: u8 = 0x04;
    pub const STRING: u8 = 0x05;
    pub const DATA: u8 = 0x06;
    pub const NESTED: u8 = 0x07;
    pub const NESTED_END: u8 = 0x00;
    pub const ESCAPE: u8 = 0x00;
    pub const ESCAPE_FOLLOW: u8 = 0xff;
}

/// Pack a tuple of [`FieldValue`]s into an order-preserving byte string.
///
/// Lexicographic order on the output bytes matches `FieldValue::compare`
/// element-by-element, then tuple length (shorter tuple sorts first when
/// one is a prefix of the other) — matching spec's "preserving order across
/// the supported element types".
pub fn pack(elements: &[FieldValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for e in elements {
        pack_one(e, &mut out);
    }
    out
}

fn pack_one(v: &FieldValue, out: &mut Vec<u8>) {
    match v {
        FieldValue::Null => out.push(tag::NULL),
        FieldValue::Bool(false) => out.push(tag::FALSE),
        FieldValue::Bool(true) => out.push(tag::TRUE),
        FieldValue::Int64(n) => {
            out.push(tag::INT64);
            // Order-preserving transform: flip the sign bit so two's-complement
            // ordering becomes unsigned big-endian ordering.
            let u = (*n as u64) ^ (1u64 << 63);
            out.extend_from_slice(&u.to_be_bytes());
        }
        FieldValue::Double(d) => {
            out.push(tag::DOUBLE);
            out.extend_from_slice(&order_preserving_f64(*d));
        }
        FieldValue::String(s) => {
            out.push(tag::STRING);
            escape_into(s.as_bytes(), out);
        }
        FieldValue::Data(d) => {
            out.push(tag::DATA);
            escape_into(d, out);
        }
        FieldValue::Array(items) => {
            out.push(tag::NESTED);
            for item in items {
                pack_one(item, out);
            }
            out.push(tag::NESTED_END);
        }
    }
}

/// IEEE-754 order-preserving transform: for non-negative doubles flip the
/// sign bit; for negative doubles invert every bit. This makes big-endian
/// byte comparison agree with `f64` total ordering (NaN aside).
fn order_preserving_f64(d: f64) -> [u8; 8] {
    let bits = d.to_bits();
    let transformed = if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    };
    transformed.to_be_bytes()
}

fn order_preserving_f64_inverse(bytes: [u8; 8]) -> f64 {
    let transformed = u64::from_be_bytes(bytes);
    let bits = if transformed & (1u64 << 63) != 0 {
        transformed & !(1u64 << 63)
    } else {
        !transformed
    };
    f64::from_bits(bits)
}

/// Escape `0x00` as `0x00 0xff` and terminate with `0x00 0x00`, the standard
/// tuple-layer technique for embedding arbitrary byte strings in an
/// order-preserving, self-delimiting encoding.
fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        out.push(b);
        if b == tag::ESCAPE {
            out.push(tag::ESCAPE_FOLLOW);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

/// Unpack a byte string produced by [`pack`] back into its elements.
///
/// # Errors
/// Returns [`UnpackError`] on truncated or malformed input.
pub fn unpack(mut bytes: &[u8]) -> Result<Vec<FieldValue>, UnpackError> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let (value, rest) = unpack_one(bytes)?;
        out.push(value);
        bytes = rest;
    }
    Ok(out)
}

fn unpack_one(bytes: &[u8]) -> Result<(FieldValue, &[u8]), UnpackError> {
    let (&t, rest) = bytes.split_first().ok_or(UnpackError::Truncated)?;
    match t {
        tag::NULL => Ok((FieldValue::Null, rest)),
        tag::FALSE => Ok((FieldValue::Bool(false), rest)),
        tag::TRUE => Ok((FieldValue::Bool(true), rest)),
        tag::INT64 => {
            if rest.len() < 8 {
                return Err(UnpackError::Truncated);
            }
            let (head, tail) = rest.split_at(8);
            let arr: [u8; 8] = head.try_into().unwrap();
            let u = u64::from_be_bytes(arr);
            let n = (u ^ (1u64 << 63)) as i64;
            Ok((FieldValue::Int64(n), tail))
        }
        tag::DOUBLE => {
            if rest.len() < 8 {
                return Err(UnpackError::Truncated);
            }
            let (head, tail) = rest.split_at(8);
            let arr: [u8; 8] = head.try_into().unwrap();
            Ok((FieldValue::Double(order_preserving_f64_inverse(arr)), tail))
        }
        tag::STRING => {
            let (raw, tail) = unescape(rest)?;
            let s = String::from_utf8(raw).map_err(|_| UnpackError::InvalidUtf8)?;
            Ok((FieldValue::String(s), tail))
        }
        tag::DATA => {
            let (raw, tail) = unescape(rest)?;
            Ok((FieldValue::Data(raw), tail))
        }
        tag::NESTED => {
            let mut items = Vec::new();
            let mut cur = rest;
            loop {
                if cur.first() == Some(&tag::NESTED_END) {
                    cur = &cur[1..];
                    break;
                }
                let (v, next) = unpack_one(cur)?;
                items.push(v);
                cur = next;
            }
            Ok((FieldValue::Array(items), cur))
        }
        _ => Err(UnpackError::UnknownTag(t)),
    }
}

fn unescape(bytes: &[u8]) -> Result<(Vec<u8>, &[u8]), UnpackError> {
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        if i >= bytes.len() {
            return Err(UnpackError::Truncated);
        }
        let b = bytes[i];
        if b == 0x00 {
            match bytes.get(i + 1) {
                Some(&0xff) => {
                    out.push(0x00);
                    i += 2;
                }
                Some(&0x00) => {
                    return Ok((out, &bytes[i + 2..]));
                }
                _ => return Err(UnpackError::Truncated),
            }
        } else {
            out.push(b);
            i += 1;
        }
    }
}

/// Errors from [`unpack`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnpackError {
    /// Input ended before a complete element was read.
    #[error("truncated tuple encoding")]
    Truncated,
    /// A string element was not valid UTF-8.
    #[error("invalid utf-8 in packed string")]
    InvalidUtf8,
    /// An unrecognized type tag was encountered.
    #[error("unknown tuple tag byte {0:#04x}")]
    UnknownTag(u8),
}

/// `strinc`: the smallest byte string greater than every string with `key`
/// as a prefix. Used to build an exclusive upper bound for prefix scans.
///
/// Strips trailing `0xff` bytes, then increments the last remaining byte.
/// Returns `None` if `key` is empty or consists entirely of `0xff` (no
/// finite successor exists).
pub fn strinc(key: &[u8]) -> Option<Vec<u8>> {
    let mut v = key.to_vec();
    while let Some(&0xff) = v.last() {
        v.pop();
    }
    let last = v.pop()?;
    v.push(last + 1);
    Some(v)
}

/// A byte-prefix namespace inside the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Construct a subspace rooted at `prefix`.
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// A child subspace nested under this one by one more path segment.
    pub fn child(&self, segment: &str) -> Subspace {
        let mut p = self.prefix.clone();
        p.push(b'/');
        p.extend_from_slice(segment.as_bytes());
        Subspace { prefix: p }
    }

    /// Pack a tuple into a key inside this subspace.
    pub fn pack(&self, elements: &[FieldValue]) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.push(0x00); // separator between prefix and packed tuple
        out.extend_from_slice(&pack(elements));
        out
    }

    /// Strip this subspace's prefix (and separator) and unpack the
    /// remaining tuple. Returns `None` if `key` is not inside this
    /// subspace.
    pub fn unpack(&self, key: &[u8]) -> Option<Result<Vec<FieldValue>, UnpackError>> {
        let mut expected = self.prefix.clone();
        expected.push(0x00);
        if !key.starts_with(&expected) {
            return None;
        }
        Some(unpack(&key[expected.len()..]))
    }

    /// The raw prefix bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// `[prefix + 0x00, prefix + 0xff)`, excluding the exact prefix key
    /// itself (spec §4.1).
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xff);
        (begin, end)
    }

    /// `[key, strinc(key))`: an exact-key lookup range (spec §4.1), used
    /// instead of `range()` when a pattern is fully bound.
    pub fn exact_range(key: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let end = strinc(key).unwrap_or_else(|| {
            let mut v = key.to_vec();
            v.push(0x00);
            v
        });
        (key.to_vec(), end)
    }
}

/// Compare two packed keys byte-lexicographically — the KV store's native
/// order. Exposed so callers don't need to reach for `Ord` on `Vec<u8>`
/// directly (keeps call sites self-documenting).
pub fn compare_keys(a: &[u8], b: &[u8]) -> CmpOrdering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pack_unpack_roundtrip_scalars() {
        let elems = vec![
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Bool(false),
            FieldValue::Int64(-42),
            FieldValue::Int64(i64::MIN),
            FieldValue::Int64(i64::MAX),
            FieldValue::String("hello\0world".into()),
            FieldValue::Data(vec![0, 1, 2, 0xff, 0]),
        ];
        let packed = pack(&elems);
        let unpacked = unpack(&packed).unwrap();
        assert_eq!(unpacked, elems);
    }

    #[test]
    fn nested_tuple_roundtrip() {
        let elems = vec![FieldValue::Array(vec![
            FieldValue::Int64(1),
            FieldValue::String("a".into()),
        ])];
        let packed = pack(&elems);
        assert_eq!(unpack(&packed).unwrap(), elems);
    }

    #[test]
    fn double_roundtrip_and_order() {
        let vals = [-1.5f64, 0.0, 0.5, 3.25, f64::MIN, f64::MAX];
        for v in vals {
            let packed = pack(&[FieldValue::Double(v)]);
            assert_eq!(unpack(&packed).unwrap(), vec![FieldValue::Double(v)]);
        }
        let a = pack(&[FieldValue::Double(-1.5)]);
        let b = pack(&[FieldValue::Double(0.5)]);
        let c = pack(&[FieldValue::Double(3.25)]);
        assert!(a < b && b < c);
    }

    #[test]
    fn integer_order_preserved() {
        let a = pack(&[FieldValue::Int64(-5)]);
        let b = pack(&[FieldValue::Int64(3)]);
        assert!(a < b);
        let c = pack(&[FieldValue::Int64(i64::MIN)]);
        let d = pack(&[FieldValue::Int64(i64::MAX)]);
        assert!(c < d);
    }

    #[test]
    fn string_prefix_order_preserved() {
        let a = pack(&[FieldValue::String("app".into())]);
        let b = pack(&[FieldValue::String("apple".into())]);
        assert!(a < b, "prefix must sort before extension");
    }

    #[test]
    fn strinc_basic() {
        assert_eq!(strinc(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(strinc(&[0x01, 0xff, 0xff]), Some(vec![0x02]));
        assert_eq!(strinc(&[0xff, 0xff]), None);
    }

    #[test]
    fn subspace_exact_vs_range() {
        let sub = Subspace::new(b"I/by_email".to_vec());
        let key = sub.pack(&[FieldValue::String("a@x".into())]);
        let (b, e) = Subspace::exact_range(&key);
        assert_eq!(b, key);
        assert!(e > key);
        let (rb, re) = sub.range();
        assert!(rb < key && key < re);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_ints(n: i64) {
            let packed = pack(&[FieldValue::Int64(n)]);
            let back = unpack(&packed).unwrap();
            prop_assert_eq!(back, vec![FieldValue::Int64(n)]);
        }

        #[test]
        fn prop_roundtrip_strings(s in "\\PC*") {
            let packed = pack(&[FieldValue::String(s.clone())]);
            let back = unpack(&packed).unwrap();
            prop_assert_eq!(back, vec![FieldValue::String(s)]);
        }

        #[test]
        fn prop_order_preserving_ints(a: i64, b: i64) {
            let pa = pack(&[FieldValue::Int64(a)]);
            let pb = pack(&[FieldValue::Int64(b)]);
            prop_assert_eq!(a.cmp(&b), pa.cmp(&pb));
        }
    }
}
