//! Quoted triples / RDF-star encoding (spec §4.11.7): a canonical string
//! form so a triple can be quoted as a single term without growing the
//! value model a new variant.
//!
//! Encoding: `<<tag:x\ttag:y\ttag:z>>` where each component's tag is one of
//! `S` (string) `I` (int64) `D` (double) `B` (bool) `Y` (data, base16) `N`
//! (null) `Q` (nested quoted triple, recursively encoded). String payloads
//! percent-encode `%`, `<`, `>`, `\t` so a `Q:` component's own `<<...>>`
//! delimiters can't be confused with the outer ones.

use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::value::FieldValue;

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\t' => out.push_str("%09"),
            _ => out.push(c),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            match hex.as_str() {
                "25" => out.push('%'),
                "3C" => out.push('<'),
                "3E" => out.push('>'),
                "09" => out.push('\t'),
                _ => {
                    out.push('%');
                    out.push_str(&hex);
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn encode_component(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => "N:".to_string(),
        FieldValue::Bool(b) => format!("B:{b}"),
        FieldValue::Int64(n) => format!("I:{n}"),
        FieldValue::Double(d) => format!("D:{d}"),
        FieldValue::String(s) => format!("S:{}", percent_encode(s)),
        FieldValue::Data(d) => format!("Y:{}", hex_encode(d)),
        FieldValue::Array(_) => format!("S:{}", percent_encode(&format!("{v:?}"))),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        return Err(RecordGraphError::InvalidPattern("odd-length hex payload in quoted triple".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| RecordGraphError::InvalidPattern(e.to_string())))
        .collect()
}

fn decode_component(s: &str) -> Result<FieldValue> {
    let (tag, rest) = s.split_at(s.find(':').ok_or_else(|| RecordGraphError::InvalidPattern(format!("malformed quoted-triple component: {s:?}")))? + 1);
    let tag = &tag[..tag.len() - 1];
    match tag {
        "N" => Ok(FieldValue::Null),
        "B" => rest.parse().map(FieldValue::Bool).map_err(|_| RecordGraphError::InvalidPattern(format!("bad bool: {rest}"))),
        "I" => rest.parse().map(FieldValue::Int64).map_err(|_| RecordGraphError::InvalidPattern(format!("bad int64: {rest}"))),
        "D" => rest.parse().map(FieldValue::Double).map_err(|_| RecordGraphError::InvalidPattern(format!("bad double: {rest}"))),
        "S" => Ok(FieldValue::String(percent_decode(rest))),
        "Y" => hex_decode(rest).map(FieldValue::Data),
        _ => Err(RecordGraphError::InvalidPattern(format!("unknown quoted-triple tag: {tag:?}"))),
    }
}

/// Encode a quoted triple to its canonical `<<...>>` string form. Nested
/// quoted triples recurse and are tagged `Q:`.
pub fn encode_quoted(s: &FieldValue, p: &FieldValue, o: &FieldValue) -> String {
    format!("<<{}\t{}\t{}>>", encode_component(s), encode_component(p), encode_component(o))
}

/// Encode an already-nested quoted triple string as a `Q:` component —
/// used when a quoted triple itself appears as a component of an outer one.
pub fn encode_quoted_component(inner: &str) -> String {
    format!("Q:{}", percent_encode(inner))
}

/// Parse a canonical `<<...>>` string back into its three components.
/// A component may itself be a nested `Q:<percent-encoded <<...>>>`.
pub fn decode_quoted(encoded: &str) -> Result<(FieldValue, FieldValue, FieldValue)> {
    let inner = encoded
        .strip_prefix("<<")
        .and_then(|s| s.strip_suffix(">>"))
        .ok_or_else(|| RecordGraphError::InvalidPattern("not a quoted triple".into()))?;
    let parts: Vec<&str> = inner.splitn(3, '\t').collect();
    if parts.len() != 3 {
        return Err(RecordGraphError::InvalidPattern("quoted triple must have exactly 3 components".into()));
    }
    let components: Result<Vec<FieldValue>> = parts
        .iter()
        .map(|p| {
            if let Some(q) = p.strip_prefix("Q:") {
                // A nested quoted triple's string form is itself a FieldValue::String
                // carrying the decoded `<<...>>` text; callers distinguish via isTRIPLE.
                Ok(FieldValue::String(percent_decode(q)))
            } else {
                decode_component(p)
            }
        })
        .collect();
    let mut c = components?.into_iter();
    Ok((c.next().unwrap(), c.next().unwrap(), c.next().unwrap()))
}

/// `isTRIPLE`: whether `v` is a string in canonical `<<...>>` quoted-triple
/// form.
pub fn is_triple(v: &FieldValue) -> bool {
    matches!(v, FieldValue::String(s) if s.starts_with("<<") && s.ends_with(">>"))
}

/// `SUBJECT`/`PREDICATE`/`OBJECT`: project one component out of a quoted
/// triple value. Returns `None` if `v` isn't a quoted triple.
pub fn subject(v: &FieldValue) -> Option<FieldValue> {
    component(v, 0)
}
/// See [`subject`].
pub fn predicate(v: &FieldValue) -> Option<FieldValue> {
    component(v, 1)
}
/// See [`subject`].
pub fn object(v: &FieldValue) -> Option<FieldValue> {
    component(v, 2)
}

fn component(v: &FieldValue, index: usize) -> Option<FieldValue> {
    let FieldValue::String(s) = v else { return None };
    let (a, b, c) = decode_quoted(s).ok()?;
    Some([a, b, c].into_iter().nth(index).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalar_components() {
        let s = FieldValue::String("alice".into());
        let p = FieldValue::String("knows".into());
        let o = FieldValue::Int64(42);
        let encoded = encode_quoted(&s, &p, &o);
        let (ds, dp, do_) = decode_quoted(&encoded).unwrap();
        assert_eq!((ds, dp, do_), (s, p, o));
    }

    #[test]
    fn percent_encodes_reserved_characters() {
        let s = FieldValue::String("a<b>c%d\te".into());
        let encoded = encode_quoted(&s, &FieldValue::Null, &FieldValue::Null);
        assert!(!encoded[2..encoded.len() - 2].contains('\t') || encoded.matches('\t').count() == 2);
        let (ds, _, _) = decode_quoted(&encoded).unwrap();
        assert_eq!(ds, s);
    }

    #[test]
    fn is_triple_recognizes_canonical_form() {
        let encoded = encode_quoted(&FieldValue::Int64(1), &FieldValue::Int64(2), &FieldValue::Int64(3));
        assert!(is_triple(&FieldValue::String(encoded.clone())));
        assert!(!is_triple(&FieldValue::String("plain".into())));
        assert_eq!(subject(&FieldValue::String(encoded)), Some(FieldValue::Int64(1)));
    }
}
