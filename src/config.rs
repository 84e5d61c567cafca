//! Configuration for windowed parsing sessions.
//!
//! [`WindowConfig`] controls how much of the file stays resident, which
//! element type is reclaimed once it falls behind the window, and how long
//! consumers wait on the producer.

use std::collections::HashSet;
use std::time::Duration;

/// Default number of resident chunks.
pub const DEFAULT_WINDOW_CHUNKS: usize = 10;

/// Default chunk size (3 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 3 * 1024 * 1024;

/// Default size of the producer's bulk reads from the byte source.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for a windowed parsing session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use xmlwindow::WindowConfig;
///
/// let config = WindowConfig::new()
///     .reclaim_tag("MeContext")
///     .window_chunks(4)
///     .chunk_size(1024 * 1024)
///     .top_level_tag("SubNetwork")
///     .move_wait_timeout(Duration::from_secs(5));
/// assert_eq!(config.window_chunks, 4);
/// ```
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Element type whose finished subtrees are dropped once their block
    /// falls out of the window. `None` disables reclamation.
    pub reclaim_tag: Option<String>,

    /// Maximum number of resident chunks. Default: 10.
    pub window_chunks: usize,

    /// Size of one chunk in bytes. Default: 3 MiB.
    pub chunk_size: usize,

    /// How long `resume_and_wait` waits for the producer to advance. Default: 2 s.
    pub resume_timeout: Duration,

    /// Upper bound for a navigator move waiting on an unfinished element. Default: 10 s.
    pub move_wait_timeout: Duration,

    /// Element types the navigator never waits on after a move.
    pub top_level_tags: HashSet<String>,

    /// Whether the threaded producer pauses at block boundaries. Default: true.
    pub pause_at_boundaries: bool,

    /// Size of the producer's bulk reads. Default: 64 KiB.
    pub read_buffer_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            reclaim_tag: None,
            window_chunks: DEFAULT_WINDOW_CHUNKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            resume_timeout: Duration::from_millis(2000),
            move_wait_timeout: Duration::from_millis(10_000),
            top_level_tags: HashSet::new(),
            pause_at_boundaries: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl WindowConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the element type used for memory reclamation.
    pub fn reclaim_tag(mut self, tag: impl Into<String>) -> Self {
        self.reclaim_tag = Some(tag.into());
        self
    }

    /// Sets the number of resident chunks (at least 1).
    pub fn window_chunks(mut self, count: usize) -> Self {
        self.window_chunks = count.max(1);
        self
    }

    /// Sets the chunk size in bytes (at least 1).
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Sets the resume-and-wait timeout.
    pub fn resume_timeout(mut self, timeout: Duration) -> Self {
        self.resume_timeout = timeout;
        self
    }

    /// Sets the navigator's wait bound.
    pub fn move_wait_timeout(mut self, timeout: Duration) -> Self {
        self.move_wait_timeout = timeout;
        self
    }

    /// Adds an element type the navigator never waits on.
    pub fn top_level_tag(mut self, tag: impl Into<String>) -> Self {
        self.top_level_tags.insert(tag.into());
        self
    }

    /// Enables or disables pausing at block boundaries.
    pub fn pause_at_boundaries(mut self, enabled: bool) -> Self {
        self.pause_at_boundaries = enabled;
        self
    }

    /// Sets the producer's bulk read size (at least 1).
    pub fn read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes.max(1);
        self
    }

    /// Returns true if `tag` is the configured reclaim-granularity element.
    pub fn is_reclaim_tag(&self, tag: &str) -> bool {
        self.reclaim_tag.as_deref() == Some(tag)
    }

    /// Returns true if `tag` is one of the configured top-level tags.
    pub fn is_top_level(&self, tag: &str) -> bool {
        self.top_level_tags.contains(tag)
    }
}
