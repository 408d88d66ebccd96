//! Object identifier arithmetic.
//!
//! Every varbind returned by an agent is split against a metric root at
//! least once, so parsing, formatting and splitting stay allocation-lean.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OidParseError;

/// An object identifier: a non-empty ordered sequence of sub-identifiers.
///
/// Ordering is lexicographic, which matches the ordering agents use when
/// walking a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Create an OID from raw sub-identifiers.
    pub fn from_subids(subids: Vec<u32>) -> Self {
        Self(subids)
    }

    /// The sub-identifiers of this OID.
    pub fn subids(&self) -> &[u32] {
        &self.0
    }

    /// Number of sub-identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the OID has no sub-identifiers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether this OID lies under `parent` (equal counts as under).
    pub fn starts_with(&self, parent: &Oid) -> bool {
        self.0.len() >= parent.0.len() && self.0[..parent.0.len()] == parent.0[..]
    }

    /// Split at `count` sub-identifiers.
    ///
    /// The head is right-padded with zeros when the OID is shorter than
    /// `count`; some agents exclude trailing zero sub-identifiers in
    /// responses. The tail is everything past the split point.
    pub fn split(&self, count: usize) -> (Oid, Oid) {
        let mut head = vec![0u32; count];
        let copied = count.min(self.0.len());
        head[..copied].copy_from_slice(&self.0[..copied]);

        let tail = if self.0.len() > count {
            self.0[count..].to_vec()
        } else {
            Vec::new()
        };

        (Oid(head), Oid(tail))
    }

    /// Concatenate a suffix onto this OID.
    pub fn join(&self, suffix: &[u32]) -> Oid {
        let mut subids = Vec::with_capacity(self.0.len() + suffix.len());
        subids.extend_from_slice(&self.0);
        subids.extend_from_slice(suffix);
        Oid(subids)
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Oid(Vec::new()));
        }

        // Accept a conventional leading dot (".1.3.6...").
        let s = s.strip_prefix('.').unwrap_or(s);

        let mut subids = Vec::with_capacity(s.bytes().filter(|b| *b == b'.').count() + 1);
        for segment in s.split('.') {
            let subid = segment
                .parse::<u32>()
                .map_err(|_| OidParseError::new(s, segment))?;
            subids.push(subid);
        }

        Ok(Oid(subids))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, subid) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", subid)?;
        }
        Ok(())
    }
}

impl From<&[u32]> for Oid {
    fn from(subids: &[u32]) -> Self {
        Oid(subids.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(subids: [u32; N]) -> Self {
        Oid(subids.to_vec())
    }
}

impl Serialize for Oid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let oid: Oid = "1.3.6.1.2.1.1.3.0".parse().unwrap();
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.3.0");
        assert_eq!(oid.subids(), &[1, 3, 6, 1, 2, 1, 1, 3, 0]);
    }

    #[test]
    fn test_parse_leading_dot() {
        let oid: Oid = ".1.3.6".parse().unwrap();
        assert_eq!(oid.to_string(), "1.3.6");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1.3.x.1".parse::<Oid>().is_err());
        assert!("1..3".parse::<Oid>().is_err());
        assert!("1.3.".parse::<Oid>().is_err());
    }

    #[test]
    fn test_parse_empty_is_empty_oid() {
        let oid: Oid = "".parse().unwrap();
        assert!(oid.is_empty());
    }

    #[test]
    fn test_starts_with() {
        let parent: Oid = "1.3.6.1.2.1.2.2.1".parse().unwrap();
        let child: Oid = "1.3.6.1.2.1.2.2.1.10.1".parse().unwrap();
        let other: Oid = "1.3.6.1.2.1.1.3.0".parse().unwrap();

        assert!(child.starts_with(&parent));
        assert!(parent.starts_with(&parent)); // equal
        assert!(!other.starts_with(&parent));
        assert!(!parent.starts_with(&child)); // parent is shorter
    }

    #[test]
    fn test_split() {
        let oid: Oid = "1.3.6.1.2.1.2.2.1.6.1".parse().unwrap();
        let (head, tail) = oid.split(10);
        assert_eq!(head.to_string(), "1.3.6.1.2.1.2.2.1.6");
        assert_eq!(tail.to_string(), "1");
    }

    #[test]
    fn test_split_pads_short_oid() {
        // Agents may drop trailing zeros; the head is padded back.
        let oid: Oid = "1.3".parse().unwrap();
        let (head, tail) = oid.split(4);
        assert_eq!(head.subids(), &[1, 3, 0, 0]);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_split_concat_law() {
        // Split then concatenate must reproduce the right-padded input.
        let oid: Oid = "1.3.6.1.4.1".parse().unwrap();
        for n in 0..10 {
            let (head, tail) = oid.split(n);
            let rejoined = head.join(tail.subids());
            assert!(rejoined.starts_with(&oid) || oid.starts_with(&rejoined));
            assert_eq!(rejoined.len(), oid.len().max(n));
        }
    }

    #[test]
    fn test_lexicographic_order() {
        let a: Oid = "1.3.6.1".parse().unwrap();
        let b: Oid = "1.3.6.1.0".parse().unwrap();
        let c: Oid = "1.3.6.2".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_join() {
        let root: Oid = "1.3.6.1.2.1.2.2.1.2".parse().unwrap();
        let full = root.join(&[5]);
        assert_eq!(full.to_string(), "1.3.6.1.2.1.2.2.1.2.5");
    }
}
