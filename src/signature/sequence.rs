//! Byte sequences: the pattern primitive behind internal signatures.
//!
//! A byte sequence is anchored to the beginning of the resource, its end, or
//! floats freely, and is made of ordered sub-sequences separated by offset
//! gaps. Each sub-sequence is a fragment of pattern bytes written in hex:
//!
//! - `4D5A`: literal bytes
//! - `??`: any byte
//! - `[30:39]`: any byte in an inclusive range
//! - `[!00]`: any byte except one
//!
//! Richer pattern syntax (alternatives, embedded gaps, side fragments) is not
//! understood; signatures using it fail to compile and are dropped when the
//! signature set is prepared.

use std::borrow::Cow;
use std::fmt;

use memchr::memmem;
use smallvec::SmallVec;

use crate::common::budget::ScanBudget;
use crate::common::error::Result;
use crate::common::request::IdentificationRequest;

/// Bytes fetched from a request at a time while matching.
const SCAN_WINDOW: u64 = 64 * 1024;

/// Where a byte sequence is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Beginning of file
    Bof,
    /// End of file
    Eof,
    /// Anywhere in the scanned region
    Variable,
}

impl Anchor {
    /// Parse a `Reference` attribute value.
    ///
    /// Returns `None` for references the matcher cannot evaluate, such as the
    /// indirect offsets.
    pub fn from_reference(reference: &str) -> Option<Self> {
        match reference {
            "BOFoffset" => Some(Anchor::Bof),
            "EOFoffset" => Some(Anchor::Eof),
            "Variable" | "" => Some(Anchor::Variable),
            _ => None,
        }
    }
}

/// Something that can decide whether a resource matches.
///
/// [`ByteSequence`] is the built-in implementation; other pattern engines can
/// be plugged into an [`InternalSignature`](super::InternalSignature) through
/// this trait.
pub trait ByteMatcher: Send + Sync + fmt::Debug {
    /// Whether the resource matches, reading no further from the anchor than
    /// the budget allows.
    fn matches(&self, request: &dyn IdentificationRequest, budget: ScanBudget) -> Result<bool>;

    /// Anchor used for ordering signatures cheapest-first.
    fn anchor(&self) -> Anchor;

    /// Number of separately positioned parts.
    fn parts(&self) -> usize {
        1
    }
}

/// One byte position inside a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternByte {
    Exact(u8),
    Any,
    Range(u8, u8),
    Not(u8),
}

impl PatternByte {
    #[inline]
    fn matches(self, byte: u8) -> bool {
        match self {
            PatternByte::Exact(b) => byte == b,
            PatternByte::Any => true,
            PatternByte::Range(lo, hi) => (lo..=hi).contains(&byte),
            PatternByte::Not(b) => byte != b,
        }
    }
}

/// A contiguous run of pattern bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    tokens: SmallVec<[PatternByte; 16]>,
    /// Set when every token is exact, enabling substring search.
    literal: Option<Vec<u8>>,
}

impl Fragment {
    /// Parse the hex text of a `Sequence` element.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let chars: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if chars.is_empty() {
            return Err("empty sequence".to_string());
        }

        let mut tokens = SmallVec::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                b'?' => {
                    if chars.get(i + 1) != Some(&b'?') {
                        return Err(format!("lone '?' at {}", i));
                    }
                    tokens.push(PatternByte::Any);
                    i += 2;
                },
                b'[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&c| c == b']')
                        .map(|p| i + p)
                        .ok_or_else(|| format!("unterminated '[' at {}", i))?;
                    tokens.push(parse_bracket(&chars[i + 1..close])?);
                    i = close + 1;
                },
                _ => {
                    let byte = chars
                        .get(i..i + 2)
                        .and_then(hex_byte)
                        .ok_or_else(|| format!("unsupported pattern syntax at {}", i))?;
                    tokens.push(PatternByte::Exact(byte));
                    i += 2;
                },
            }
        }

        let literal = tokens
            .iter()
            .map(|t| match t {
                PatternByte::Exact(b) => Some(*b),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>();
        Ok(Self { tokens, literal })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    fn matches_bytes(&self, window: &[u8]) -> bool {
        window.len() == self.len() && self.tokens.iter().zip(window).all(|(t, &b)| t.matches(b))
    }

    fn matches_at(&self, reader: &mut RegionReader<'_>, pos: u64) -> Result<bool> {
        let window = reader.bytes(pos, self.len() as u64)?;
        Ok(self.matches_bytes(window))
    }

    /// First start position in `from..=last_start` where the fragment matches.
    ///
    /// Every start position is tried, so a candidate may overlap the one
    /// returned by a previous call.
    fn find(&self, reader: &mut RegionReader<'_>, from: u64, last_start: u64) -> Result<Option<u64>> {
        let len = self.len() as u64;
        let mut pos = from;
        while pos <= last_start {
            let window_last = pos - pos % SCAN_WINDOW + (SCAN_WINDOW - 1);
            let span = last_start.min(window_last) - pos + len;
            let haystack = reader.bytes(pos, span)?;
            let available = haystack.len() as u64;
            if available < len {
                return Ok(None);
            }
            let found = match &self.literal {
                Some(needle) => memmem::find(haystack, needle),
                None => haystack.windows(self.len()).position(|w| self.matches_bytes(w)),
            };
            if let Some(offset) = found {
                return Ok(Some(pos + offset as u64));
            }
            pos += available - len + 1;
        }
        Ok(None)
    }
}

/// Windowed view over the part of a request a sequence may inspect.
///
/// Positions are relative to the start of the region. At most one window of
/// bytes (plus a fragment's length) is held at a time.
struct RegionReader<'r> {
    request: &'r dyn IdentificationRequest,
    base: u64,
    len: u64,
    offset: u64,
    block: Cow<'r, [u8]>,
}

impl<'r> RegionReader<'r> {
    fn new(request: &'r dyn IdentificationRequest, base: u64, len: u64) -> Self {
        Self {
            request,
            base,
            len,
            offset: 0,
            block: Cow::Borrowed(&[][..]),
        }
    }

    /// Up to `len` bytes at `pos`; fewer at the end of the region.
    fn bytes(&mut self, pos: u64, len: u64) -> Result<&[u8]> {
        let end = pos.saturating_add(len).min(self.len);
        if pos >= end {
            return Ok(&[]);
        }
        let cached_end = self.offset + self.block.len() as u64;
        if pos < self.offset || end > cached_end {
            let start = pos - pos % SCAN_WINDOW;
            let stop = end.max(start.saturating_add(SCAN_WINDOW)).min(self.len);
            let want = usize::try_from(stop - start).unwrap_or(usize::MAX);
            self.block = self.request.read_bytes(self.base + start, want)?;
            self.offset = start;
        }
        let lo = usize::try_from(pos - self.offset).unwrap_or(usize::MAX);
        let hi = usize::try_from(end - self.offset).unwrap_or(usize::MAX);
        Ok(self.block.get(lo..hi.min(self.block.len())).unwrap_or_default())
    }
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let text = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(text, 16).ok()
}

fn parse_bracket(inner: &[u8]) -> std::result::Result<PatternByte, String> {
    match inner {
        [b'!', hi, lo] => hex_byte(&[*hi, *lo])
            .map(PatternByte::Not)
            .ok_or_else(|| "invalid negated byte".to_string()),
        [a1, a2, b':', b1, b2] => {
            let a = hex_byte(&[*a1, *a2]).ok_or_else(|| "invalid range start".to_string())?;
            let b = hex_byte(&[*b1, *b2]).ok_or_else(|| "invalid range end".to_string())?;
            Ok(PatternByte::Range(a.min(b), a.max(b)))
        },
        _ => Err(format!(
            "unsupported bracket expression [{}]",
            String::from_utf8_lossy(inner)
        )),
    }
}

/// Uncompiled sub-sequence as read from a signature file.
#[derive(Debug, Clone, Default)]
pub struct SubSequenceDef {
    pub position: u32,
    pub min_offset: u64,
    pub max_offset: Option<u64>,
    pub sequence: String,
    /// Left/right fragments were declared; the built-in matcher cannot honour them.
    pub has_side_fragments: bool,
}

/// Uncompiled byte sequence as read from a signature file.
#[derive(Debug, Clone, Default)]
pub struct ByteSequenceDef {
    pub reference: String,
    pub subsequences: Vec<SubSequenceDef>,
}

impl ByteSequenceDef {
    /// Compile into a matcher, or explain why the sequence is unusable.
    pub fn compile(&self) -> std::result::Result<ByteSequence, String> {
        let anchor = Anchor::from_reference(&self.reference)
            .ok_or_else(|| format!("unsupported reference '{}'", self.reference))?;
        if self.subsequences.is_empty() {
            return Err("byte sequence has no sub-sequences".to_string());
        }

        let mut defs: Vec<&SubSequenceDef> = self.subsequences.iter().collect();
        defs.sort_by_key(|d| d.position);

        let mut subsequences = Vec::with_capacity(defs.len());
        for def in defs {
            if def.has_side_fragments {
                return Err(format!(
                    "sub-sequence {} uses side fragments, which are not supported",
                    def.position
                ));
            }
            if let Some(max) = def.max_offset
                && max < def.min_offset
            {
                return Err(format!(
                    "sub-sequence {} has max offset {} below min offset {}",
                    def.position, max, def.min_offset
                ));
            }
            let fragment = Fragment::parse(&def.sequence)
                .map_err(|e| format!("sub-sequence {}: {}", def.position, e))?;
            subsequences.push(SubSequence {
                min_offset: def.min_offset,
                max_offset: def.max_offset,
                fragment,
            });
        }

        Ok(ByteSequence {
            anchor,
            subsequences,
        })
    }
}

/// A fragment plus the gap allowed before it (after it, for EOF sequences).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSequence {
    min_offset: u64,
    max_offset: Option<u64>,
    fragment: Fragment,
}

impl SubSequence {
    pub fn new(min_offset: u64, max_offset: Option<u64>, fragment: Fragment) -> Self {
        Self {
            min_offset,
            max_offset,
            fragment,
        }
    }
}

/// Compiled, anchored sequence of sub-sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSequence {
    anchor: Anchor,
    subsequences: Vec<SubSequence>,
}

impl ByteSequence {
    pub fn new(anchor: Anchor, subsequences: Vec<SubSequence>) -> Self {
        Self {
            anchor,
            subsequences,
        }
    }

    /// Furthest distance from the anchor any match could reach, if bounded.
    fn reach(&self) -> Option<u64> {
        if self.anchor == Anchor::Variable {
            return None;
        }
        self.subsequences.iter().try_fold(0u64, |acc, sub| {
            let max = sub.max_offset?;
            Some(acc.saturating_add(max).saturating_add(sub.fragment.len() as u64))
        })
    }

    fn match_forward(&self, reader: &mut RegionReader<'_>, index: usize, pos: u64) -> Result<bool> {
        let sub = &self.subsequences[index];
        let len = sub.fragment.len() as u64;
        let Some(last_possible) = reader.len.checked_sub(len) else {
            return Ok(false);
        };
        let from = pos.saturating_add(sub.min_offset);
        let floating = index == 0 && self.anchor == Anchor::Variable;
        let last_start = match sub.max_offset {
            Some(max) if !floating => pos.saturating_add(max).min(last_possible),
            _ => last_possible,
        };
        let last = index + 1 == self.subsequences.len();
        let mut cursor = from;
        while let Some(start) = sub.fragment.find(reader, cursor, last_start)? {
            if last || self.match_forward(reader, index + 1, start + len)? {
                return Ok(true);
            }
            cursor = start + 1;
        }
        Ok(false)
    }

    /// `end` is the exclusive end of the region the sub-sequence at `index`
    /// must finish before.
    fn match_backward(&self, reader: &mut RegionReader<'_>, index: usize, end: u64) -> Result<bool> {
        let sub = &self.subsequences[index];
        let len = sub.fragment.len() as u64;
        let Some(latest_end) = end.checked_sub(sub.min_offset) else {
            return Ok(false);
        };
        if latest_end < len {
            return Ok(false);
        }
        let earliest_end = match sub.max_offset {
            Some(max) => end.saturating_sub(max).max(len),
            None => len,
        };
        for match_end in (earliest_end..=latest_end).rev() {
            let start = match_end - len;
            if sub.fragment.matches_at(reader, start)?
                && (index == 0 || self.match_backward(reader, index - 1, start)?)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl ByteMatcher for ByteSequence {
    fn matches(&self, request: &dyn IdentificationRequest, budget: ScanBudget) -> Result<bool> {
        let size = request.size();
        if size == 0 || self.subsequences.is_empty() {
            return Ok(false);
        }
        let mut region = budget.limit(size);
        if let Some(reach) = self.reach() {
            region = region.min(reach);
        }

        match self.anchor {
            Anchor::Bof | Anchor::Variable => {
                let mut reader = RegionReader::new(request, 0, region);
                self.match_forward(&mut reader, 0, 0)
            },
            Anchor::Eof => {
                let mut reader = RegionReader::new(request, size - region, region);
                self.match_backward(&mut reader, self.subsequences.len() - 1, region)
            },
        }
    }

    fn anchor(&self) -> Anchor {
        self.anchor
    }

    fn parts(&self) -> usize {
        self.subsequences.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::request::{MemoryRequest, RequestMetaData};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the largest read the matcher asks for.
    struct TrackedRequest {
        inner: MemoryRequest,
        largest_read: AtomicUsize,
    }

    impl TrackedRequest {
        fn new(data: Vec<u8>) -> Self {
            Self {
                inner: MemoryRequest::new("large.bin", data),
                largest_read: AtomicUsize::new(0),
            }
        }
    }

    impl IdentificationRequest for TrackedRequest {
        fn byte_at(&self, index: u64) -> Result<u8> {
            self.inner.byte_at(index)
        }

        fn read_bytes(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
            self.largest_read.fetch_max(len, Ordering::Relaxed);
            self.inner.read_bytes(offset, len)
        }

        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn extension(&self) -> Option<&str> {
            self.inner.extension()
        }

        fn file_name(&self) -> &str {
            self.inner.file_name()
        }

        fn metadata(&self) -> &RequestMetaData {
            self.inner.metadata()
        }

        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
    }

    fn seq(reference: &str, parts: &[(u64, Option<u64>, &str)]) -> ByteSequence {
        ByteSequenceDef {
            reference: reference.to_string(),
            subsequences: parts
                .iter()
                .enumerate()
                .map(|(i, (min, max, text))| SubSequenceDef {
                    position: i as u32 + 1,
                    min_offset: *min,
                    max_offset: *max,
                    sequence: text.to_string(),
                    has_side_fragments: false,
                })
                .collect(),
        }
        .compile()
        .unwrap()
    }

    fn request(bytes: &[u8]) -> MemoryRequest {
        MemoryRequest::new("test.bin", bytes.to_vec())
    }

    #[test]
    fn test_fragment_parse() {
        let fragment = Fragment::parse("4D 5A ?? [30:39] [!00]").unwrap();
        assert_eq!(fragment.len(), 5);
        assert!(fragment.literal.is_none());
        assert_eq!(Fragment::parse("504b").unwrap().literal, Some(vec![0x50, 0x4B]));
        assert!(Fragment::parse("").is_err());
        assert!(Fragment::parse("4D{2}5A").is_err());
        assert!(Fragment::parse("(4D|5A)").is_err());
        assert!(Fragment::parse("4").is_err());
        assert!(Fragment::parse("[00").is_err());
    }

    #[test]
    fn test_bof_exact_offset() {
        let zip = seq("BOFoffset", &[(0, Some(0), "504B0304")]);
        assert!(zip.matches(&request(b"PK\x03\x04rest"), ScanBudget::Unlimited).unwrap());
        assert!(!zip.matches(&request(b"xPK\x03\x04"), ScanBudget::Unlimited).unwrap());
        assert!(!zip.matches(&request(b""), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_bof_offset_window_and_second_part() {
        let s = seq("BOFoffset", &[(2, Some(4), "AABB"), (0, Some(3), "CC")]);
        assert!(s.matches(&request(&[0, 0, 0, 0xAA, 0xBB, 1, 1, 0xCC]), ScanBudget::Unlimited).unwrap());
        assert!(!s.matches(&request(&[0, 0, 0, 0xAA, 0xBB, 1, 1, 1, 1, 0xCC]), ScanBudget::Unlimited).unwrap());
        assert!(!s.matches(&request(&[0xAA, 0xBB, 0xCC]), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_backtracks_over_candidates() {
        // First "AB" is followed too far from "CD"; the second one is close enough.
        let s = seq("Variable", &[(0, None, "AB"), (0, Some(1), "CD")]);
        let data = [0xAB, 0, 0, 0, 0xAB, 0, 0xCD];
        assert!(s.matches(&request(&data), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_eof_sequence() {
        let s = seq("EOFoffset", &[(0, None, "2525"), (0, Some(2), "454F46")]);
        assert!(s.matches(&request(b"xx%%EOF\n\n"), ScanBudget::Unlimited).unwrap());
        assert!(!s.matches(&request(b"xx%%EOF\n\n\n"), ScanBudget::Unlimited).unwrap());
        assert!(!s.matches(&request(b"EOF"), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_budget_limits_variable_search() {
        let s = seq("Variable", &[(0, None, "FF")]);
        let mut data = vec![0u8; 100];
        data[50] = 0xFF;
        assert!(s.matches(&request(&data), ScanBudget::Unlimited).unwrap());
        assert!(s.matches(&request(&data), ScanBudget::Bytes(51)).unwrap());
        assert!(!s.matches(&request(&data), ScanBudget::Bytes(50)).unwrap());
    }

    #[test]
    fn test_budget_limits_eof_search() {
        let s = seq("EOFoffset", &[(0, None, "FF")]);
        let mut data = vec![0u8; 100];
        data[10] = 0xFF;
        assert!(s.matches(&request(&data), ScanBudget::Unlimited).unwrap());
        assert!(!s.matches(&request(&data), ScanBudget::Bytes(20)).unwrap());
    }

    #[test]
    fn test_compile_rejects_unsupported() {
        let indirect = ByteSequenceDef {
            reference: "IndirectBOFoffset".to_string(),
            subsequences: vec![SubSequenceDef {
                sequence: "00".to_string(),
                ..Default::default()
            }],
        };
        assert!(indirect.compile().is_err());

        let fragments = ByteSequenceDef {
            reference: "BOFoffset".to_string(),
            subsequences: vec![SubSequenceDef {
                sequence: "00".to_string(),
                has_side_fragments: true,
                ..Default::default()
            }],
        };
        assert!(fragments.compile().is_err());

        let inverted = ByteSequenceDef {
            reference: "BOFoffset".to_string(),
            subsequences: vec![SubSequenceDef {
                sequence: "00".to_string(),
                min_offset: 4,
                max_offset: Some(1),
                ..Default::default()
            }],
        };
        assert!(inverted.compile().is_err());
    }

    #[test]
    fn test_overlapping_literal_candidates() {
        // The match for "41414141" that is followed by "4242" starts at 2 and
        // overlaps the earlier candidates at 0 and 1.
        let variable = seq("Variable", &[(0, None, "41414141"), (0, Some(0), "4242")]);
        assert!(variable.matches(&request(b"AAAAAABB"), ScanBudget::Unlimited).unwrap());

        let bof = seq("BOFoffset", &[(0, Some(4), "41424142"), (0, Some(0), "4343")]);
        assert!(bof.matches(&request(b"ABABABCC"), ScanBudget::Unlimited).unwrap());
        assert!(!bof.matches(&request(b"ABABABCD"), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_overlapping_pattern_candidates() {
        let s = seq("Variable", &[(0, None, "41??41"), (0, Some(0), "42")]);
        assert!(s.matches(&request(b"AxAxAB"), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_extreme_offsets() {
        let wide = seq("BOFoffset", &[(0, Some(0), "41"), (0, Some(u64::MAX), "42")]);
        assert!(wide.matches(&request(b"AxxB"), ScanBudget::Unlimited).unwrap());
        assert!(!wide.matches(&request(b"Axxx"), ScanBudget::Unlimited).unwrap());

        let far = seq("BOFoffset", &[(u64::MAX, None, "41")]);
        assert!(!far.matches(&request(b"AAAA"), ScanBudget::Unlimited).unwrap());

        let far_second = seq("BOFoffset", &[(0, Some(0), "41"), (u64::MAX - 1, Some(u64::MAX), "42")]);
        assert!(!far_second.matches(&request(b"AB"), ScanBudget::Unlimited).unwrap());

        let eof = seq("EOFoffset", &[(0, Some(u64::MAX), "41"), (u64::MAX, Some(u64::MAX), "42")]);
        assert!(!eof.matches(&request(b"AB"), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_match_across_window_boundary() {
        let boundary = SCAN_WINDOW as usize;
        let mut data = vec![0u8; boundary * 3];
        data[boundary - 2..boundary + 2].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let literal = seq("Variable", &[(0, None, "DEADBEEF")]);
        assert!(literal.matches(&request(&data), ScanBudget::Unlimited).unwrap());

        let pattern = seq("Variable", &[(0, None, "DE??BE[E0:EF]")]);
        assert!(pattern.matches(&request(&data), ScanBudget::Unlimited).unwrap());

        let eof = seq("EOFoffset", &[(0, None, "DEADBEEF")]);
        assert!(eof.matches(&request(&data), ScanBudget::Unlimited).unwrap());
    }

    #[test]
    fn test_reads_are_windowed() {
        let size = 8 * 1024 * 1024;
        let mut data = vec![0u8; size];
        data[size - 1] = 0xFF;
        data[10] = 0xEE;

        let tracked = TrackedRequest::new(data);
        let variable = seq("Variable", &[(0, None, "FF")]);
        assert!(variable.matches(&tracked, ScanBudget::Unlimited).unwrap());
        let eof = seq("EOFoffset", &[(0, None, "EE")]);
        assert!(eof.matches(&tracked, ScanBudget::Unlimited).unwrap());

        let largest = tracked.largest_read.load(Ordering::Relaxed);
        assert!(largest <= 2 * SCAN_WINDOW as usize, "read {} bytes at once", largest);
    }
}
