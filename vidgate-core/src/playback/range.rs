/// Byte range requested by the inbound `Range` header. `last_byte` is
/// `None` for open-ended ranges (`bytes=500-`), meaning "to end of
/// resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub first_byte: u64,
    pub last_byte: Option<u64>,
}

impl ByteRange {
    /// Parses a `Range` header value. Returns `None` for anything that does
    /// not reduce to `<unit>=<first>[-[<last>]]` with numeric bounds;
    /// callers treat an unparseable header as no range at all.
    pub fn parse(value: &str) -> Option<Self> {
        let (_, requested) = value.split_once('=')?;
        let requested = requested.trim();
        let (first, last) = match requested.split_once('-') {
            Some((first, "")) => (first, None),
            Some((first, last)) => (first, Some(last)),
            None => (requested, None),
        };
        let first_byte = first.parse().ok()?;
        let last_byte = match last {
            Some(last) => Some(last.parse().ok()?),
            None => None,
        };
        Some(Self {
            first_byte,
            last_byte,
        })
    }

    /// The form forwarded to the CDN as the `range` query parameter.
    pub fn as_query_value(&self) -> String {
        match self.last_byte {
            Some(last) => format!("{}-{}", self.first_byte, last),
            None => format!("{}-", self.first_byte),
        }
    }
}

/// Contiguous, non-overlapping `(start, end)` spans covering exactly
/// `[first_byte, first_byte + total_bytes - 1]` in steps of `chunk_size`.
/// Empty when the resource has no bytes.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    next: u64,
    end: u64,
    chunk_size: u64,
    done: bool,
}

impl ChunkPlan {
    pub fn new(first_byte: u64, total_bytes: u64, chunk_size: u64) -> Self {
        let done = total_bytes == 0 || chunk_size == 0;
        let end = first_byte.saturating_add(total_bytes.saturating_sub(1));
        Self {
            next: first_byte,
            end,
            chunk_size,
            done,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<(u64, u64)> {
        if self.done {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.chunk_size - 1).min(self.end);
        if end == self.end {
            self.done = true;
        } else {
            self.next = end + 1;
        }
        Some((start, end))
    }
}
