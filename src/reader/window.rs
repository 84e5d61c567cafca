//! Windowed byte source
//!
//! Serves random-offset reads and a sequential cursor over a file (or an
//! in-memory buffer) while keeping at most `window_chunks` fixed-size chunks
//! resident. Chunk `i` always covers bytes `[i * chunk_size, (i + 1) * chunk_size)`.
//!
//! All mutating operations go through one internal lock, so the producer's
//! sequential reads and a consumer's random reads can run from different
//! threads.

use crate::config::WindowConfig;
use crate::error::{Error, Result};
use lru::LruCache;
use memchr::memrchr;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

trait Backing: Read + Seek + Send {}
impl<T: Read + Seek + Send> Backing for T {}

struct Inner {
    backing: Box<dyn Backing>,
    /// Resident chunks; sequential reads evict the least recently loaded
    chunks: LruCache<u64, Arc<[u8]>>,
    /// Chunk under the sequential cursor, kept even if evicted from `chunks`
    cursor_chunk: Option<(u64, Arc<[u8]>)>,
    cursor: u64,
    current_chunk: Option<u64>,
    eof: bool,
}

/// Bounded chunk cache over a file or byte buffer.
pub struct WindowedByteSource {
    inner: Mutex<Inner>,
    file_size: u64,
    chunk_size: u64,
    window_chunks: usize,
}

impl WindowedByteSource {
    /// Open a file-backed source
    pub fn open(path: impl AsRef<Path>, config: &WindowConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();
        log::debug!("opened {} ({} bytes)", path.as_ref().display(), file_size);
        Ok(Self::with_backing(Box::new(file), file_size, config))
    }

    /// In-memory source, chunked exactly like a file
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, config: &WindowConfig) -> Self {
        let bytes = bytes.into();
        let file_size = bytes.len() as u64;
        Self::with_backing(Box::new(Cursor::new(bytes)), file_size, config)
    }

    fn with_backing(backing: Box<dyn Backing>, file_size: u64, config: &WindowConfig) -> Self {
        let window_chunks = config.window_chunks.max(1);
        WindowedByteSource {
            inner: Mutex::new(Inner {
                backing,
                chunks: LruCache::new(NonZeroUsize::new(window_chunks).unwrap_or(NonZeroUsize::MIN)),
                cursor_chunk: None,
                cursor: 0,
                current_chunk: None,
                eof: file_size == 0,
            }),
            file_size,
            chunk_size: config.chunk_size.max(1) as u64,
            window_chunks,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the cache consistent: chunks
        // are only inserted once fully read.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn window_chunks(&self) -> usize {
        self.window_chunks
    }

    /// Index of the chunk containing `offset`
    pub fn chunk_of(&self, offset: u64) -> u64 {
        offset / self.chunk_size
    }

    fn chunk_count(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Read chunk `index` from the backing store
    fn fetch(&self, inner: &mut Inner, index: u64) -> Result<Arc<[u8]>> {
        let start = index * self.chunk_size;
        let len = self.chunk_size.min(self.file_size - start) as usize;
        let mut data = vec![0u8; len];
        inner.backing.seek(SeekFrom::Start(start))?;
        inner.backing.read_exact(&mut data)?;
        log::debug!("loaded chunk {} ({} bytes)", index, len);
        Ok(data.into())
    }

    /// Next byte under the sequential cursor, or `None` at end of stream
    pub fn read_byte(&self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read(&mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Fill `buf` from the sequential cursor, returning the byte count (0 at EOF).
    ///
    /// Never crosses a chunk boundary in one call.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        if inner.eof || buf.is_empty() {
            return Ok(0);
        }
        if inner.cursor >= self.file_size {
            inner.eof = true;
            return Ok(0);
        }

        let index = self.chunk_of(inner.cursor);
        let pinned = match &inner.cursor_chunk {
            Some((i, data)) if *i == index => Some(Arc::clone(data)),
            _ => None,
        };
        let data = match pinned {
            Some(data) => data,
            None => self.advance_cursor_chunk(&mut inner, index)?,
        };

        let local = (inner.cursor - index * self.chunk_size) as usize;
        let n = buf.len().min(data.len() - local);
        buf[..n].copy_from_slice(&data[local..local + n]);
        inner.cursor += n as u64;
        Ok(n)
    }

    /// Move the sequential window forward to chunk `index`
    fn advance_cursor_chunk(&self, inner: &mut Inner, index: u64) -> Result<Arc<[u8]>> {
        let data = match inner.chunks.get(&index).cloned() {
            Some(data) => data,
            None => {
                let data = self.fetch(inner, index)?;
                if let Some((evicted, _)) = inner.chunks.push(index, Arc::clone(&data)) {
                    if evicted != index {
                        log::debug!("evicted chunk {}", evicted);
                    }
                }
                data
            }
        };
        inner.cursor_chunk = Some((index, Arc::clone(&data)));
        inner.current_chunk = Some(index);
        Ok(data)
    }

    /// Inclusive range `[start, min(end, size - 1)]`
    pub fn get_bytes(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let end = end.min(self.file_size.saturating_sub(1));
        if self.file_size == 0 || end < start {
            return Err(Error::InvalidRange { start, end });
        }

        let first = self.chunk_of(start);
        let last = self.chunk_of(end);
        let mut inner = self.lock();
        if !(first..=last).all(|i| inner.chunks.contains(&i)) {
            self.load_window_locked(&mut inner, first)?;
        }

        let mut out = Vec::with_capacity((end - start + 1) as usize);
        for index in first..=last {
            let data = inner.chunks.get(&index).ok_or(Error::BlockNotLoaded { index })?;
            let chunk_start = index * self.chunk_size;
            let from = (start.max(chunk_start) - chunk_start) as usize;
            let to = (end.min(chunk_start + data.len() as u64 - 1) - chunk_start) as usize;
            out.extend_from_slice(&data[from..=to]);
        }
        Ok(out)
    }

    /// Stream the inclusive range `[start, end]` to `out`, one chunk at a time.
    ///
    /// Unlike `get_bytes`, the range may be wider than the window.
    pub fn copy_range_to<W: Write + ?Sized>(&self, start: u64, end: u64, out: &mut W) -> Result<u64> {
        let end = end.min(self.file_size.saturating_sub(1));
        if self.file_size == 0 || end < start {
            return Err(Error::InvalidRange { start, end });
        }
        let mut pos = start;
        while pos <= end {
            let piece_end = end.min((self.chunk_of(pos) + 1) * self.chunk_size - 1);
            out.write_all(&self.get_bytes(pos, piece_end)?)?;
            pos = piece_end + 1;
        }
        Ok(end - start + 1)
    }

    /// Make chunks `[from, from + window - 1]` resident, reusing the overlap
    pub fn load_window(&self, from_chunk: u64) -> Result<()> {
        let mut inner = self.lock();
        self.load_window_locked(&mut inner, from_chunk)
    }

    fn load_window_locked(&self, inner: &mut Inner, from_chunk: u64) -> Result<()> {
        let last = from_chunk + self.window_chunks as u64 - 1;
        let outside: Vec<u64> = inner
            .chunks
            .iter()
            .map(|(index, _)| *index)
            .filter(|index| *index < from_chunk || *index > last)
            .collect();
        for index in &outside {
            inner.chunks.pop(index);
        }

        let mut loaded = 0;
        let count = self.chunk_count();
        if count > 0 {
            for index in from_chunk..=last.min(count - 1) {
                if !inner.chunks.contains(&index) {
                    let data = self.fetch(inner, index)?;
                    inner.chunks.put(index, data);
                    loaded += 1;
                }
            }
        }
        log::debug!(
            "window moved to chunks {}..={} (dropped {}, loaded {})",
            from_chunk,
            last,
            outside.len(),
            loaded
        );
        Ok(())
    }

    /// Last '<' at or before `offset`, scanning only resident chunks.
    ///
    /// Returns `None` if no '<' exists before `offset` or a chunk on the way
    /// back is not resident; this never loads data.
    pub fn find_tag_start_before_or_at(&self, offset: u64) -> Option<u64> {
        if offset >= self.file_size {
            return None;
        }
        let inner = self.lock();
        let mut index = self.chunk_of(offset);
        let mut local_end = (offset - index * self.chunk_size) as usize;
        loop {
            let data = inner
                .chunks
                .peek(&index)
                .or_else(|| inner.cursor_chunk.as_ref().filter(|(i, _)| *i == index).map(|(_, d)| d))?;
            if let Some(i) = memrchr(b'<', &data[..=local_end.min(data.len() - 1)]) {
                return Some(index * self.chunk_size + i as u64);
            }
            if index == 0 {
                return None;
            }
            index -= 1;
            local_end = self.chunk_size as usize - 1;
        }
    }

    /// Chunk under the sequential cursor, `None` before the first read
    pub fn current_chunk_index(&self) -> Option<u64> {
        self.lock().current_chunk
    }

    /// Bytes consumed by the sequential cursor
    pub fn position(&self) -> u64 {
        self.lock().cursor
    }

    /// Highest resident chunk index
    pub fn loaded_window_end_index(&self) -> Option<u64> {
        self.lock().chunks.iter().map(|(index, _)| *index).max()
    }

    /// Resident chunk indices in ascending order
    pub fn resident_chunks(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.lock().chunks.iter().map(|(index, _)| *index).collect();
        indices.sort_unstable();
        indices
    }

    pub fn is_eof(&self) -> bool {
        self.lock().eof
    }
}
