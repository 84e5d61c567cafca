//! Parse session
//!
//! A [`ParseSession`] owns the windowed source, the shared tree and the
//! producer thread. Consumers use it to start, resume and stop the producer,
//! read the root list, edit elements and write them back out.
//!
//! The tree lock is never held while waiting on the producer.

use super::streaming::{Control, ElementHandler, ParserState, Shared, StreamingParser, Termination};
use crate::config::WindowConfig;
use crate::dom::{ElementTree, MutationWriter, NodeId};
use crate::error::{Error, Result};
use crate::reader::WindowedByteSource;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one document being parsed
pub struct ParseSession {
    shared: Arc<Shared>,
    /// Producer not yet started; taken by `start` or `run`
    parser: Mutex<Option<StreamingParser>>,
    control: Mutex<Option<Sender<Control>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ParseSession {
    /// Session over a file on disk
    pub fn open(path: impl AsRef<Path>, config: WindowConfig) -> Result<Self> {
        let source = WindowedByteSource::open(path, &config)?;
        Ok(Self::from_source(Arc::new(source), config))
    }

    /// Session over an in-memory document
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, config: WindowConfig) -> Self {
        let source = WindowedByteSource::from_bytes(bytes, &config);
        Self::from_source(Arc::new(source), config)
    }

    pub fn from_source(source: Arc<WindowedByteSource>, config: WindowConfig) -> Self {
        let shared = Shared::new(source, config);
        let parser = StreamingParser::with_shared(Arc::clone(&shared));
        ParseSession {
            shared,
            parser: Mutex::new(Some(parser)),
            control: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Install a per-element callback; only effective before the producer starts
    pub fn with_handler(self, handler: impl ElementHandler + 'static) -> Self {
        if let Some(parser) = lock(&self.parser).as_mut() {
            parser.set_handler(Box::new(handler));
        }
        self
    }

    pub fn config(&self) -> &WindowConfig {
        &self.shared.config
    }

    pub fn source(&self) -> &Arc<WindowedByteSource> {
        &self.shared.source
    }

    fn take_parser(&self) -> Result<StreamingParser> {
        lock(&self.parser).take().ok_or(Error::AlreadyStarted)
    }

    /// Spawn the producer thread and wait for its first pause or its end.
    ///
    /// Returns whether the producer became quiescent within
    /// `move_wait_timeout`.
    pub fn start(&self) -> Result<bool> {
        let parser = self.take_parser()?;
        let (tx, rx) = mpsc::channel();
        // Running before the thread exists, so the wait below cannot see Idle
        self.shared.status.set(ParserState::Running);
        let handle = match thread::Builder::new()
            .name("xmlwindow-parser".to_string())
            .spawn(move || parser.run_threaded(rx))
        {
            Ok(handle) => handle,
            Err(err) => return Err(self.spawn_failed(err)),
        };
        *lock(&self.control) = Some(tx);
        *lock(&self.worker) = Some(handle);

        log::info!("parser started");
        Ok(self.wait_quiescent(self.shared.config.move_wait_timeout))
    }

    /// The producer never ran; waiters must not see it as running
    fn spawn_failed(&self, err: io::Error) -> Error {
        log::error!("failed to spawn parser thread: {}", err);
        self.shared.status.set(ParserState::Terminated(Termination::Failed(err.to_string())));
        Error::Io(err)
    }

    /// Parse the whole document in the calling thread without pausing
    pub fn run(&self) -> Result<()> {
        let mut parser = self.take_parser()?;
        parser.run_to_completion()
    }

    /// Cancel the producer and wait for its thread to exit
    pub fn stop(&self) {
        if let Some(tx) = lock(&self.control).take() {
            // The producer may already be gone
            let _ = tx.send(Control::Cancel);
        }
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                log::error!("parser thread panicked");
            }
        }
    }

    pub fn state(&self) -> ParserState {
        self.shared.status.state()
    }

    /// True while the producer may still add elements
    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state(), ParserState::Paused { .. })
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state(), ParserState::Terminated(_))
    }

    /// Resume a paused producer and wait until it pauses again or finishes
    pub fn resume_and_wait(&self, timeout: Duration) -> Result<()> {
        let Some((send, pauses)) = self.shared.status.begin_resume() else {
            return Ok(());
        };
        if send {
            log::debug!("resuming parser after pause {}", pauses);
            if let Some(tx) = lock(&self.control).as_ref() {
                let _ = tx.send(Control::Resume);
            }
        }
        if self.shared.status.wait_past(pauses, timeout) {
            Ok(())
        } else {
            Err(Error::WaitTimeout { what: "parser to reach the next block", waited: timeout })
        }
    }

    /// Wait until the producer is paused or finished
    pub fn wait_quiescent(&self, timeout: Duration) -> bool {
        self.shared.status.wait_quiescent(timeout)
    }

    /// Wait for the producer to settle past chunk `previous`.
    ///
    /// `None` means no chunk has been read yet.
    pub fn wait_for_chunk(&self, previous: Option<u64>, timeout: Duration) -> bool {
        self.wait_quiescent(timeout) && self.current_chunk() > previous
    }

    /// Chunk under the producer's read cursor
    pub fn current_chunk(&self) -> Option<u64> {
        self.shared.source.current_chunk_index()
    }

    pub fn chunk_of(&self, offset: u64) -> u64 {
        self.shared.source.chunk_of(offset)
    }

    /// Highest chunk resident in the source
    pub fn loaded_window_end(&self) -> Option<u64> {
        self.shared.source.loaded_window_end_index()
    }

    /// Snapshot of the root list, taken once the producer is quiescent
    pub fn roots(&self) -> Vec<NodeId> {
        self.settle();
        self.shared.read_tree().roots()
    }

    pub fn first_root(&self) -> Option<NodeId> {
        self.settle();
        self.shared.read_tree().first_root()
    }

    fn settle(&self) {
        let timeout = self.shared.config.move_wait_timeout;
        if !self.wait_quiescent(timeout) {
            log::warn!("parser still running after {:?}; reading a partial tree", timeout);
        }
    }

    /// Run `f` with shared access to the tree
    pub fn with_tree<R>(&self, f: impl FnOnce(&ElementTree) -> R) -> R {
        f(&self.shared.read_tree())
    }

    /// Run `f` with exclusive access to the tree
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut ElementTree) -> R) -> R {
        f(&mut self.shared.write_tree())
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<String> {
        self.with_tree(|tree| tree.get(id).and_then(|e| e.attribute(key)).map(str::to_string))
    }

    pub fn set_attribute(&self, id: NodeId, key: &str, value: &str) -> bool {
        self.with_tree_mut(|tree| tree.set_attribute(id, key, value))
    }

    /// Change an attribute only if the element already has it
    pub fn update_attribute(&self, id: NodeId, key: &str, value: &str) -> bool {
        self.with_tree_mut(|tree| tree.update_attribute(id, key, value))
    }

    pub fn remove_attribute(&self, id: NodeId, key: &str) -> bool {
        self.with_tree_mut(|tree| tree.remove_attribute(id, key))
    }

    pub fn append_text(&self, id: NodeId, text: &str) -> bool {
        self.with_tree_mut(|tree| tree.append_text(id, text))
    }

    pub fn set_text(&self, id: NodeId, text: &str) -> bool {
        self.with_tree_mut(|tree| tree.set_text(id, text))
    }

    pub fn remove_text(&self, id: NodeId) -> bool {
        self.with_tree_mut(|tree| tree.remove_text(id))
    }

    /// Delete a fully parsed element from its parent
    pub fn delete(&self, id: NodeId) -> Result<bool> {
        self.with_tree_mut(|tree| tree.delete(id))
    }

    /// Write one element with its edits
    pub fn write_element<W: Write + ?Sized>(&self, id: NodeId, out: &mut W) -> Result<()> {
        let tree = self.shared.read_tree();
        MutationWriter::new(&tree, &self.shared.source).write_element(id, out)
    }

    /// Write the whole document with its edits
    pub fn write_document<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let tree = self.shared.read_tree();
        MutationWriter::new(&tree, &self.shared.source).write_document(out)
    }

    pub fn fragment(&self, id: NodeId) -> Result<Vec<u8>> {
        let tree = self.shared.read_tree();
        MutationWriter::new(&tree, &self.shared.source).fragment(id)
    }
}

impl Drop for ParseSession {
    fn drop(&mut self) {
        self.stop();
    }
}
