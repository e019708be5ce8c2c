//! Byte and string values backed by a flat buffer or a rope of chunks.
//!
//! Concatenation never copies payload bytes: the result is a rope that
//! shares the chunks of both operands. Equality, ordering and hashing look
//! only at the flattened contents, so a rope and a flat buffer holding the
//! same bytes are interchangeable.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared storage behind [`BytesValue`] and [`StringValue`].
#[derive(Clone)]
enum ByteRepr {
    Flat(Arc<[u8]>),
    Rope(Arc<Rope>),
}

struct Rope {
    chunks: Vec<Arc<[u8]>>,
    len: usize,
}

impl ByteRepr {
    fn empty() -> Self {
        ByteRepr::Flat(Arc::from(&[][..]))
    }

    fn len(&self) -> usize {
        match self {
            ByteRepr::Flat(bytes) => bytes.len(),
            ByteRepr::Rope(rope) => rope.len,
        }
    }

    fn push_chunks(&self, out: &mut Vec<Arc<[u8]>>) {
        match self {
            ByteRepr::Flat(bytes) => {
                if !bytes.is_empty() {
                    out.push(Arc::clone(bytes));
                }
            }
            ByteRepr::Rope(rope) => out.extend(rope.chunks.iter().cloned()),
        }
    }

    fn concat(&self, other: &ByteRepr) -> ByteRepr {
        if other.len() == 0 {
            return self.clone();
        }
        if self.len() == 0 {
            return other.clone();
        }
        let mut chunks = Vec::new();
        self.push_chunks(&mut chunks);
        other.push_chunks(&mut chunks);
        ByteRepr::Rope(Arc::new(Rope {
            len: self.len() + other.len(),
            chunks,
        }))
    }

    fn chunks(&self) -> Vec<&[u8]> {
        match self {
            ByteRepr::Flat(bytes) => vec![&bytes[..]],
            ByteRepr::Rope(rope) => rope.chunks.iter().map(|c| &c[..]).collect(),
        }
    }

    fn to_cow(&self) -> Cow<'_, [u8]> {
        match self {
            ByteRepr::Flat(bytes) => Cow::Borrowed(&bytes[..]),
            ByteRepr::Rope(rope) => {
                let mut out = Vec::with_capacity(rope.len);
                for chunk in &rope.chunks {
                    out.extend_from_slice(chunk);
                }
                Cow::Owned(out)
            }
        }
    }

    fn flatten(&self) -> ByteRepr {
        match self {
            ByteRepr::Flat(_) => self.clone(),
            ByteRepr::Rope(_) => ByteRepr::Flat(Arc::from(self.to_cow().into_owned())),
        }
    }

    fn cmp_bytes(&self, other: &ByteRepr) -> Ordering {
        if let (ByteRepr::Flat(a), ByteRepr::Flat(b)) = (self, other) {
            return a[..].cmp(&b[..]);
        }
        self.to_cow().cmp(&other.to_cow())
    }
}

/// Streaming reader over the chunks of a byte or string value.
///
/// Modeled on zero-copy input streams: [`next_chunk`](Self::next_chunk)
/// hands out the next contiguous run, [`back_up`](Self::back_up) returns the
/// tail of the last run to the stream and [`skip`](Self::skip) moves forward
/// without reading.
pub struct ChunkCursor<'a> {
    chunks: Vec<&'a [u8]>,
    index: usize,
    offset: usize,
    position: usize,
    last_len: usize,
}

impl<'a> ChunkCursor<'a> {
    fn new(chunks: Vec<&'a [u8]>) -> Self {
        Self {
            chunks,
            index: 0,
            offset: 0,
            position: 0,
            last_len: 0,
        }
    }

    /// Returns the next non-empty run of bytes, or `None` at the end.
    pub fn next_chunk(&mut self) -> Option<&'a [u8]> {
        while self.index < self.chunks.len() && self.offset >= self.chunks[self.index].len() {
            self.index += 1;
            self.offset = 0;
        }
        let chunk = *self.chunks.get(self.index)?;
        let run = &chunk[self.offset..];
        self.offset = chunk.len();
        self.position += run.len();
        self.last_len = run.len();
        Some(run)
    }

    /// Un-reads the last `count` bytes of the run returned by the previous
    /// `next_chunk` call. Clamped to the length of that run.
    pub fn back_up(&mut self, count: usize) {
        let count = count.min(self.last_len);
        self.offset -= count;
        self.position -= count;
        self.last_len -= count;
    }

    /// Skips `count` bytes. Returns false if the end was reached first.
    pub fn skip(&mut self, mut count: usize) -> bool {
        self.last_len = 0;
        while count > 0 {
            let Some(chunk) = self.chunks.get(self.index) else {
                return false;
            };
            let available = chunk.len() - self.offset;
            if count < available {
                self.offset += count;
                self.position += count;
                return true;
            }
            count -= available;
            self.position += available;
            self.index += 1;
            self.offset = 0;
        }
        true
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// A CEL `bytes` value.
#[derive(Clone)]
pub struct BytesValue {
    repr: ByteRepr,
}

impl BytesValue {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            repr: ByteRepr::Flat(bytes.into()),
        }
    }

    /// Builds a rope from already shared chunks.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Arc<[u8]>>) -> Self {
        Self {
            repr: rope_from_chunks(chunks),
        }
    }

    pub fn len(&self) -> usize {
        self.repr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the value is stored as a single contiguous buffer.
    pub fn is_flat(&self) -> bool {
        matches!(self.repr, ByteRepr::Flat(_))
    }

    /// Concatenates without copying either operand.
    pub fn concat(&self, other: &BytesValue) -> BytesValue {
        Self {
            repr: self.repr.concat(&other.repr),
        }
    }

    /// Contents as one slice. Borrowed when flat.
    pub fn to_cow(&self) -> Cow<'_, [u8]> {
        self.repr.to_cow()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.to_cow().into_owned()
    }

    /// A flat copy of this value.
    pub fn flatten(&self) -> BytesValue {
        Self {
            repr: self.repr.flatten(),
        }
    }

    /// Byte at `index`.
    pub fn get(&self, index: usize) -> Option<u8> {
        let mut remaining = index;
        for chunk in self.repr.chunks() {
            if remaining < chunk.len() {
                return Some(chunk[remaining]);
            }
            remaining -= chunk.len();
        }
        None
    }

    pub fn cursor(&self) -> ChunkCursor<'_> {
        ChunkCursor::new(self.repr.chunks())
    }
}

impl Default for BytesValue {
    fn default() -> Self {
        Self {
            repr: ByteRepr::empty(),
        }
    }
}

impl PartialEq for BytesValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.repr.cmp_bytes(&other.repr) == Ordering::Equal
    }
}

impl Eq for BytesValue {}

impl PartialOrd for BytesValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BytesValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.repr.cmp_bytes(&other.repr)
    }
}

impl Hash for BytesValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_cow().hash(state);
    }
}

impl fmt::Debug for BytesValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BytesValue({:?})", String::from_utf8_lossy(&self.to_cow()))
    }
}

impl From<&[u8]> for BytesValue {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for BytesValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// A CEL `string` value. Always valid UTF-8.
#[derive(Clone)]
pub struct StringValue {
    repr: ByteRepr,
}

impl StringValue {
    pub fn new(s: &str) -> Self {
        Self {
            repr: ByteRepr::Flat(Arc::from(s.as_bytes())),
        }
    }

    /// Builds a rope from string pieces, sharing nothing with them.
    pub fn from_pieces<'s>(pieces: impl IntoIterator<Item = &'s str>) -> Self {
        Self {
            repr: rope_from_chunks(pieces.into_iter().map(|p| Arc::from(p.as_bytes()))),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.repr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.repr, ByteRepr::Flat(_))
    }

    /// Number of Unicode code points.
    pub fn char_count(&self) -> usize {
        self.to_cow().chars().count()
    }

    /// Concatenates without copying either operand.
    pub fn concat(&self, other: &StringValue) -> StringValue {
        Self {
            repr: self.repr.concat(&other.repr),
        }
    }

    /// Contents as one `str`. Borrowed when flat.
    pub fn to_cow(&self) -> Cow<'_, str> {
        match self.repr.to_cow() {
            Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
            Cow::Owned(bytes) => Cow::Owned(
                String::from_utf8(bytes)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
            ),
        }
    }

    pub fn flatten(&self) -> StringValue {
        Self {
            repr: self.repr.flatten(),
        }
    }

    /// The UTF-8 encoding as a bytes value sharing the same storage.
    pub fn to_bytes(&self) -> BytesValue {
        BytesValue {
            repr: self.repr.clone(),
        }
    }

    /// Reinterprets bytes as a string, failing on invalid UTF-8.
    pub fn from_utf8(bytes: &BytesValue) -> Result<StringValue, std::str::Utf8Error> {
        std::str::from_utf8(&bytes.to_cow())?;
        Ok(StringValue {
            repr: bytes.repr.clone(),
        })
    }

    pub fn cursor(&self) -> ChunkCursor<'_> {
        ChunkCursor::new(self.repr.chunks())
    }
}

impl Default for StringValue {
    fn default() -> Self {
        Self {
            repr: ByteRepr::empty(),
        }
    }
}

impl PartialEq for StringValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.repr.cmp_bytes(&other.repr) == Ordering::Equal
    }
}

impl Eq for StringValue {}

impl PartialOrd for StringValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StringValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.repr.cmp_bytes(&other.repr)
    }
}

impl Hash for StringValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_cow().hash(state);
    }
}

impl PartialEq<str> for StringValue {
    fn eq(&self, other: &str) -> bool {
        self.to_cow() == other
    }
}

impl PartialEq<&str> for StringValue {
    fn eq(&self, other: &&str) -> bool {
        self.to_cow() == *other
    }
}

impl fmt::Debug for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_cow())
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.repr.chunks() {
            f.write_str(&String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

impl From<&str> for StringValue {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StringValue {
    fn from(s: String) -> Self {
        Self {
            repr: ByteRepr::Flat(Arc::from(s.into_bytes())),
        }
    }
}

impl From<&String> for StringValue {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

fn rope_from_chunks(chunks: impl IntoIterator<Item = Arc<[u8]>>) -> ByteRepr {
    let chunks: Vec<Arc<[u8]>> = chunks.into_iter().filter(|c| !c.is_empty()).collect();
    match chunks.len() {
        0 => ByteRepr::empty(),
        1 => ByteRepr::Flat(Arc::clone(&chunks[0])),
        _ => ByteRepr::Rope(Arc::new(Rope {
            len: chunks.iter().map(|c| c.len()).sum(),
            chunks,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_concat_builds_rope_without_copy() {
        let a = BytesValue::new(&b"hello "[..]);
        let b = BytesValue::new(&b"world"[..]);
        let joined = a.concat(&b);
        assert!(!joined.is_flat());
        assert_eq!(joined.len(), 11);
        assert_eq!(&joined.to_cow()[..], b"hello world");
    }

    #[test]
    fn test_concat_with_empty_keeps_flat() {
        let a = StringValue::new("abc");
        let joined = a.concat(&StringValue::default());
        assert!(joined.is_flat());
        assert_eq!(joined, "abc");
    }

    #[test]
    fn test_rope_and_flat_are_interchangeable() {
        let rope = StringValue::from_pieces(["ab", "c", "def"]);
        let flat = StringValue::new("abcdef");
        assert_eq!(rope, flat);
        assert_eq!(rope.cmp(&flat), Ordering::Equal);
        assert_eq!(hash_of(&rope), hash_of(&flat));
        assert!(StringValue::new("abd") > rope);
    }

    #[test]
    fn test_string_char_count_and_display() {
        let s = StringValue::from_pieces(["h\u{e9}", "llo"]);
        assert_eq!(s.char_count(), 5);
        assert_eq!(s.to_string(), "h\u{e9}llo");
    }

    #[test]
    fn test_bytes_get_across_chunks() {
        let b = BytesValue::from_chunks([Arc::from(&b"ab"[..]), Arc::from(&b"cd"[..])]);
        assert_eq!(b.get(0), Some(b'a'));
        assert_eq!(b.get(2), Some(b'c'));
        assert_eq!(b.get(4), None);
    }

    #[test]
    fn test_cursor_next_and_back_up() {
        let b = BytesValue::from_chunks([Arc::from(&b"abc"[..]), Arc::from(&b"de"[..])]);
        let mut cursor = b.cursor();
        assert_eq!(cursor.next_chunk(), Some(&b"abc"[..]));
        cursor.back_up(1);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.next_chunk(), Some(&b"c"[..]));
        assert_eq!(cursor.next_chunk(), Some(&b"de"[..]));
        assert_eq!(cursor.next_chunk(), None);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_cursor_skip() {
        let b = BytesValue::from_chunks([Arc::from(&b"abc"[..]), Arc::from(&b"de"[..])]);
        let mut cursor = b.cursor();
        assert!(cursor.skip(4));
        assert_eq!(cursor.next_chunk(), Some(&b"e"[..]));

        let mut cursor = b.cursor();
        assert!(!cursor.skip(10));
        assert_eq!(cursor.position(), 5);
        assert_eq!(cursor.next_chunk(), None);
    }

    #[test]
    fn test_string_from_utf8() {
        assert!(StringValue::from_utf8(&BytesValue::new(&b"ok"[..])).is_ok());
        assert!(StringValue::from_utf8(&BytesValue::new(&[0xffu8][..])).is_err());
    }
}
