//! Growable, NUL-terminated byte strings with heap or arena storage.
//!
//! A [`StrBuf`] is either *unpooled* (backed by a `Vec<u8>` from the global
//! allocator) or *pooled* (carved from an [`Arena`] with
//! [`Arena::alloc_forward`]). The backing kind is fixed at construction and
//! survives every operation, including growth: a pooled buffer grows through
//! [`Arena::realloc`], which resizes in place when the buffer is the arena's
//! most recent allocation.
//!
//! The buffer always holds `len + 1` valid bytes with a trailing NUL, so
//! [`StrBuf::as_bytes_with_nul`] can be handed to C-style consumers.
//!
//! # Examples
//!
//! ```
//! use inac_mem::{Arena, PoolFlags, StrBuf};
//!
//! let arena = Arena::new(4096, PoolFlags::DYNAMIC).unwrap();
//!
//! let mut greeting = StrBuf::from_bytes_in(b"hello", &arena).unwrap();
//! greeting.push_str(", world").unwrap();
//!
//! assert_eq!(greeting, "hello, world");
//! assert_eq!(greeting.len(), 12);
//! assert_eq!(greeting.as_bytes_with_nul()[12], 0);
//! assert!(greeting.is_pooled());
//! ```

use std::cmp::Ordering;
use std::ffi::CStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::wildcard::wildcard_match;

enum Storage<'a> {
    /// `Vec::len()` is the buffer capacity; every byte is initialised.
    Heap(Vec<u8>),
    Pool {
        arena: &'a Arena,
        ptr: NonNull<u8>,
        capacity: usize,
    },
}

/// A growable byte string with a trailing NUL, stored on the heap or in an
/// [`Arena`].
///
/// `'a` is the lifetime of the backing arena; unpooled buffers are
/// `StrBuf<'static>`.
pub struct StrBuf<'a> {
    storage: Storage<'a>,
    len: usize,
}

impl StrBuf<'static> {
    /// Creates an empty unpooled buffer with room for `len` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn with_capacity(len: usize) -> Result<Self> {
        let capacity = len.checked_add(1).ok_or(Error::OutOfMemory)?;
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| Error::OutOfMemory)?;
        data.resize(capacity, 0);
        Ok(StrBuf {
            storage: Storage::Heap(data),
            len: 0,
        })
    }

    #[must_use]
    pub fn new() -> Self {
        StrBuf {
            storage: Storage::Heap(vec![0]),
            len: 0,
        }
    }

    /// Creates an unpooled buffer holding a copy of `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend_from_slice(bytes);
        data.push(0);
        StrBuf {
            storage: Storage::Heap(data),
            len: bytes.len(),
        }
    }

    /// Creates an unpooled buffer from a C string (terminator excluded).
    #[must_use]
    pub fn from_c_str(s: &CStr) -> Self {
        Self::from_bytes(s.to_bytes())
    }

    /// Creates an unpooled buffer from formatting arguments.
    ///
    /// ```
    /// use inac_mem::StrBuf;
    ///
    /// let s = StrBuf::format(format_args!("{}-{:03}", "chunk", 7));
    /// assert_eq!(s, "chunk-007");
    /// ```
    #[must_use]
    pub fn format(args: fmt::Arguments<'_>) -> Self {
        let mut buf = Self::new();
        // Only a failed allocation stops the write; the buffer keeps what was written.
        let _ = fmt::Write::write_fmt(&mut buf, args);
        buf
    }

    /// Splits `text` at every occurrence of `separator`.
    ///
    /// Empty pieces are kept, so `n` separators always produce `n + 1`
    /// buffers. A trailing separator therefore yields a final empty piece
    /// (`"a,"` splits into `["a", ""]`); the C `ina_str_split` returns
    /// `["a,"]` there. An empty `text` or `separator` produces no buffers.
    ///
    /// ```
    /// use inac_mem::StrBuf;
    ///
    /// let parts = StrBuf::split("a::b::", "::");
    /// assert_eq!(parts, ["a", "b", ""]);
    /// ```
    #[must_use]
    pub fn split(text: impl AsRef<[u8]>, separator: impl AsRef<[u8]>) -> Vec<Self> {
        let text = text.as_ref();
        let sep = separator.as_ref();
        if text.is_empty() || sep.is_empty() {
            return Vec::new();
        }

        let mut parts = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i + sep.len() <= text.len() {
            if &text[i..i + sep.len()] == sep {
                parts.push(Self::from_bytes(&text[start..i]));
                i += sep.len();
                start = i;
            } else {
                i += 1;
            }
        }
        parts.push(Self::from_bytes(&text[start..]));
        parts
    }

    /// Concatenates `parts` with `separator` between them.
    #[must_use]
    pub fn join<P: AsRef<[u8]>>(parts: &[P], separator: impl AsRef<[u8]>) -> Self {
        let sep = separator.as_ref();
        let total = parts.iter().map(|p| p.as_ref().len()).sum::<usize>()
            + sep.len() * parts.len().saturating_sub(1);

        let mut data = Vec::with_capacity(total + 1);
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                data.extend_from_slice(sep);
            }
            data.extend_from_slice(part.as_ref());
        }
        data.push(0);
        StrBuf {
            storage: Storage::Heap(data),
            len: total,
        }
    }
}

impl Default for StrBuf<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> StrBuf<'a> {
    /// Creates an empty pooled buffer with room for `len` bytes.
    ///
    /// # Errors
    ///
    /// Whatever [`Arena::alloc_forward`] reports for `len + 1` bytes.
    pub fn with_capacity_in(len: usize, arena: &'a Arena) -> Result<Self> {
        let capacity = len.checked_add(1).ok_or(Error::OutOfMemory)?;
        let ptr = arena.alloc_forward(capacity)?;
        // SAFETY: the block is at least one byte long.
        unsafe { ptr.as_ptr().write(0) };
        Ok(StrBuf {
            storage: Storage::Pool {
                arena,
                ptr,
                capacity,
            },
            len: 0,
        })
    }

    /// Creates a pooled buffer holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::with_capacity_in`].
    pub fn from_bytes_in(bytes: &[u8], arena: &'a Arena) -> Result<Self> {
        let mut buf = Self::with_capacity_in(bytes.len(), arena)?;
        buf.copy_in(0, bytes);
        buf.set_len(bytes.len());
        Ok(buf)
    }

    /// Creates a pooled buffer from a C string.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::with_capacity_in`].
    pub fn from_c_str_in(s: &CStr, arena: &'a Arena) -> Result<Self> {
        Self::from_bytes_in(s.to_bytes(), arena)
    }

    /// Creates a pooled buffer from formatting arguments.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::with_capacity_in`].
    pub fn format_in(args: fmt::Arguments<'_>, arena: &'a Arena) -> Result<Self> {
        let mut buf = Self::with_capacity_in(0, arena)?;
        let mut failure = None;
        let mut sink = FallibleWriter {
            buf: &mut buf,
            failure: &mut failure,
        };
        if fmt::Write::write_fmt(&mut sink, args).is_err() {
            return Err(failure.unwrap_or(Error::InvalidArgument {
                reason: "formatting trait returned an error",
            }));
        }
        Ok(buf)
    }

    /// Number of bytes, excluding the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of storage, including room for the terminator.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Heap(data) => data.len(),
            Storage::Pool { capacity, .. } => *capacity,
        }
    }

    /// Bytes that can be appended without growing.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity() - self.len - 1
    }

    /// Whether the storage came from an arena.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        matches!(self.storage, Storage::Pool { .. })
    }

    fn data_ptr(&self) -> *const u8 {
        match &self.storage {
            Storage::Heap(data) => data.as_ptr(),
            Storage::Pool { ptr, .. } => ptr.as_ptr(),
        }
    }

    fn data_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.storage {
            Storage::Heap(data) => data.as_mut_ptr(),
            Storage::Pool { ptr, .. } => ptr.as_ptr(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the first `len` bytes are always initialised.
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.len) }
    }

    /// The contents followed by the NUL terminator.
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        // SAFETY: `len < capacity` and `data[len]` is always written.
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.len + 1) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        // SAFETY: as `as_bytes`; `&mut self` makes the access unique.
        unsafe { std::slice::from_raw_parts_mut(self.data_mut_ptr(), len) }
    }

    /// The contents as UTF-8.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUtf8`] if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes()).map_err(|_| Error::InvalidUtf8)
    }

    /// Copies `bytes` to `offset`. Caller guarantees
    /// `offset + bytes.len() < capacity`.
    fn copy_in(&mut self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() < self.capacity());
        // SAFETY: in bounds per the caller; `bytes` cannot alias `self`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.data_mut_ptr().add(offset),
                bytes.len(),
            );
        }
    }

    /// Sets the length and writes the terminator. Caller guarantees
    /// `len < capacity`.
    fn set_len(&mut self, len: usize) {
        debug_assert!(len < self.capacity());
        self.len = len;
        // SAFETY: in bounds per the caller.
        unsafe { self.data_mut_ptr().add(len).write(0) };
    }

    /// Grows the storage so it can hold `needed_len` bytes plus the
    /// terminator. Growth is exact; the backing kind is kept.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if heap storage cannot grow; for pooled
    /// buffers, whatever [`Arena::realloc`] reports.
    pub fn ensure_capacity(&mut self, needed_len: usize) -> Result<()> {
        if self.capacity() - 1 >= needed_len {
            return Ok(());
        }
        let new_capacity = needed_len.checked_add(1).ok_or(Error::OutOfMemory)?;

        match &mut self.storage {
            Storage::Heap(data) => {
                data
                    .try_reserve_exact(new_capacity - data.len())
                    .map_err(|_| Error::OutOfMemory)?;
                data.resize(new_capacity, 0);
            }
            Storage::Pool {
                arena,
                ptr,
                capacity,
            } => {
                // SAFETY: `ptr` came from `alloc_forward`/`realloc` on `arena`
                // with `capacity` bytes, and the shared borrow of the arena
                // rules out reset, clear and shrink since then.
                *ptr = unsafe { arena.realloc(*ptr, *capacity, new_capacity)? };
                *capacity = new_capacity;
            }
        }
        Ok(())
    }

    /// Appends `bytes`.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::ensure_capacity`].
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let new_len = self.len.checked_add(bytes.len()).ok_or(Error::OutOfMemory)?;
        self.ensure_capacity(new_len)?;
        self.copy_in(self.len, bytes);
        self.set_len(new_len);
        Ok(())
    }

    /// Appends `s`.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::ensure_capacity`].
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        self.push_bytes(s.as_bytes())
    }

    /// Replaces the contents with `bytes`.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::ensure_capacity`].
    pub fn assign(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(bytes.len())?;
        self.copy_in(0, bytes);
        self.set_len(bytes.len());
        Ok(())
    }

    /// Shortens the string to `pos` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `pos` is past the end.
    pub fn truncate(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            return Err(Error::InvalidArgument {
                reason: "truncate position past the end",
            });
        }
        self.set_len(pos);
        Ok(())
    }

    /// Removes leading and trailing bytes contained in `chars`, in place.
    pub fn trim(&mut self, chars: &[u8]) {
        if chars.is_empty() {
            return;
        }
        let bytes = self.as_bytes();
        let start = bytes
            .iter()
            .position(|b| !chars.contains(b))
            .unwrap_or(bytes.len());
        let end = bytes
            .iter()
            .rposition(|b| !chars.contains(b))
            .map_or(start, |i| i + 1);

        let new_len = end - start;
        if start > 0 {
            self.as_bytes_mut().copy_within(start..end, 0);
        }
        self.set_len(new_len);
    }

    /// Maps every byte to ASCII upper case.
    pub fn make_ascii_uppercase(&mut self) {
        self.as_bytes_mut().make_ascii_uppercase();
    }

    /// Maps every byte to ASCII lower case.
    pub fn make_ascii_lowercase(&mut self) {
        self.as_bytes_mut().make_ascii_lowercase();
    }

    /// Copies bytes `start..=end` into a new unpooled buffer.
    ///
    /// `end` is clamped to the last byte. An empty buffer is returned when
    /// `start > end` or `start` is past the end.
    #[must_use]
    pub fn substr(&self, start: usize, end: usize) -> StrBuf<'static> {
        StrBuf::from_bytes(self.substr_bytes(start, end))
    }

    /// Like [`StrBuf::substr`], with the copy carved from `arena`.
    ///
    /// # Errors
    ///
    /// As [`StrBuf::with_capacity_in`].
    pub fn substr_in<'b>(&self, start: usize, end: usize, arena: &'b Arena) -> Result<StrBuf<'b>> {
        StrBuf::from_bytes_in(self.substr_bytes(start, end), arena)
    }

    fn substr_bytes(&self, start: usize, end: usize) -> &[u8] {
        let len = self.len;
        if len == 0 || start > end || start >= len {
            return &[];
        }
        let end = end.min(len - 1);
        &self.as_bytes()[start..=end]
    }

    /// Whether the whole string matches the glob `pattern`.
    ///
    /// See [`wildcard_match`].
    #[must_use]
    pub fn matches(&self, pattern: impl AsRef<[u8]>) -> bool {
        wildcard_match(self.as_bytes(), pattern)
    }

    /// Releases the buffer. Equivalent to dropping it.
    ///
    /// Pooled bytes stay in the arena until it is reset.
    pub fn free(self) {}
}

/// Adapts a pooled buffer to `fmt::Write` while keeping the real error.
struct FallibleWriter<'s, 'a> {
    buf: &'s mut StrBuf<'a>,
    failure: &'s mut Option<Error>,
}

impl fmt::Write for FallibleWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s).map_err(|err| {
            *self.failure = Some(err);
            fmt::Error
        })
    }
}

impl fmt::Write for StrBuf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}

impl From<&str> for StrBuf<'static> {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<&[u8]> for StrBuf<'static> {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for StrBuf<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for StrBuf<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for StrBuf<'_> {}

impl PartialEq<[u8]> for StrBuf<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<str> for StrBuf<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for StrBuf<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for StrBuf<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StrBuf<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for StrBuf<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Display for StrBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for StrBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrBuf")
            .field("value", &String::from_utf8_lossy(self.as_bytes()))
            .field("capacity", &self.capacity())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// Iterator over the runs of bytes in `text` that contain no delimiter.
///
/// Returned by [`tokens`].
#[derive(Debug, Clone)]
pub struct Tokens<'t> {
    rest: &'t [u8],
    delimiters: [u64; 4],
}

impl Tokens<'_> {
    #[inline]
    fn is_delimiter(&self, b: u8) -> bool {
        self.delimiters[usize::from(b >> 6)] & (1 << (b & 63)) != 0
    }
}

impl<'t> Iterator for Tokens<'t> {
    type Item = &'t [u8];

    fn next(&mut self) -> Option<&'t [u8]> {
        let start = self.rest.iter().position(|&b| !self.is_delimiter(b))?;
        let rest = &self.rest[start..];
        let end = rest
            .iter()
            .position(|&b| self.is_delimiter(b))
            .unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        self.rest = tail;
        Some(token)
    }
}

/// Splits `text` into maximal runs of bytes not in `delimiters`.
///
/// Unlike [`StrBuf::split`], adjacent delimiters never produce empty
/// tokens. With no delimiters there are no tokens.
///
/// ```
/// use inac_mem::tokens;
///
/// let words: Vec<&[u8]> = tokens(b"  alpha,, beta ", b" ,").collect();
/// assert_eq!(words, [&b"alpha"[..], &b"beta"[..]]);
/// ```
#[must_use]
pub fn tokens<'t>(text: &'t [u8], delimiters: &[u8]) -> Tokens<'t> {
    let mut map = [0u64; 4];
    for &b in delimiters {
        map[usize::from(b >> 6)] |= 1 << (b & 63);
    }
    Tokens {
        rest: if delimiters.is_empty() { &[] } else { text },
        delimiters: map,
    }
}
