//! Streaming tree builder (producer)
//!
//! Turns the event stream into an [`ElementTree`] while the document is still
//! being read. In threaded mode the producer stops at every block boundary
//! past the window and waits for a `Resume` message; after each boundary it
//! drops finished reclaim-tag subtrees whose block fell out of the window.

use crate::config::WindowConfig;
use crate::dom::{Element, ElementTree, NodeId};
use crate::error::{Error, Result};
use crate::reader::{EventReader, WindowedByteSource, XmlEvent};
use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// How a producer run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The whole document was parsed
    Completed,
    /// A consumer stopped the session
    Cancelled,
    /// The input was malformed or unreadable; the tree holds the parsed prefix
    Failed(String),
}

/// Producer lifecycle: `Idle -> Running <-> Paused -> Terminated`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    Idle,
    Running,
    /// Waiting for a resume at the boundary of `chunk`
    Paused { chunk: u64 },
    Terminated(Termination),
}

impl ParserState {
    /// True while the producer may still add to the tree
    pub fn is_alive(&self) -> bool {
        matches!(self, ParserState::Running | ParserState::Paused { .. })
    }

    /// True when the tree is not changing: not started, paused or finished
    pub fn is_quiescent(&self) -> bool {
        !matches!(self, ParserState::Running)
    }
}

/// Requests sent from consumers to the producer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Resume,
    Cancel,
}

/// Per-element extension point, called after an element's end offset is set
pub trait ElementHandler: Send {
    fn element_end(&mut self, tree: &ElementTree, id: NodeId) {
        let _ = (tree, id);
    }
}

/// Handler that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ElementHandler for NoopHandler {}

struct Status {
    state: ParserState,
    /// Number of pauses so far; a consumer waits for this to move
    pauses: u64,
    /// A resume was already sent for the current pause
    resume_requested: bool,
}

/// Producer state visible to consumers
pub(crate) struct StatusBoard {
    status: Mutex<Status>,
    changed: Condvar,
}

impl StatusBoard {
    fn new() -> Self {
        StatusBoard {
            status: Mutex::new(Status { state: ParserState::Idle, pauses: 0, resume_requested: false }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ParserState {
        self.lock().state.clone()
    }

    pub(crate) fn set(&self, state: ParserState) {
        let mut status = self.lock();
        match state {
            ParserState::Paused { .. } => status.pauses += 1,
            ParserState::Running => status.resume_requested = false,
            _ => {}
        }
        status.state = state;
        self.changed.notify_all();
    }

    /// Claim the resume for the current pause.
    ///
    /// Returns `None` if there is nothing to wait for, otherwise whether the
    /// caller must send `Resume` and the pause count to wait past.
    pub(crate) fn begin_resume(&self) -> Option<(bool, u64)> {
        let mut status = self.lock();
        match status.state {
            ParserState::Paused { .. } => {
                let send = !status.resume_requested;
                status.resume_requested = true;
                Some((send, status.pauses))
            }
            ParserState::Running => Some((false, status.pauses)),
            ParserState::Idle | ParserState::Terminated(_) => None,
        }
    }

    /// Wait until the producer pauses again after `pauses` or terminates
    pub(crate) fn wait_past(&self, pauses: u64, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| s.pauses > pauses || matches!(s.state, ParserState::Terminated(_)))
    }

    pub(crate) fn wait_quiescent(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| s.state.is_quiescent())
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&Status) -> bool) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| !done(s))
            .unwrap_or_else(PoisonError::into_inner);
        done(&guard)
    }
}

/// State shared between the producer and consumers
pub(crate) struct Shared {
    pub(crate) tree: RwLock<ElementTree>,
    pub(crate) source: Arc<WindowedByteSource>,
    pub(crate) status: StatusBoard,
    pub(crate) config: WindowConfig,
}

impl Shared {
    pub(crate) fn new(source: Arc<WindowedByteSource>, config: WindowConfig) -> Arc<Self> {
        Arc::new(Shared { tree: RwLock::new(ElementTree::new()), source, status: StatusBoard::new(), config })
    }

    pub(crate) fn read_tree(&self) -> RwLockReadGuard<'_, ElementTree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_tree(&self) -> RwLockWriteGuard<'_, ElementTree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Why the event loop stopped early
enum Stop {
    Cancelled,
    Failed(Error),
}

/// Builds the element tree from the event stream
pub struct StreamingParser {
    shared: Arc<Shared>,
    reader: EventReader,
    /// Open elements, innermost last
    stack: Vec<Option<NodeId>>,
    /// Finished reclaim-tag elements by the chunk holding their end offset
    reclaimable: BTreeMap<u64, Vec<NodeId>>,
    /// First block not yet reclaimed
    start_block: u64,
    /// Chunk of the last boundary handled
    last_boundary: Option<u64>,
    handler: Box<dyn ElementHandler>,
}

impl StreamingParser {
    pub fn new(source: Arc<WindowedByteSource>, config: WindowConfig) -> Self {
        Self::with_shared(Shared::new(source, config))
    }

    pub(crate) fn with_shared(shared: Arc<Shared>) -> Self {
        let reader = EventReader::new(Arc::clone(&shared.source), shared.config.read_buffer_size);
        StreamingParser {
            shared,
            reader,
            stack: Vec::new(),
            reclaimable: BTreeMap::new(),
            start_block: 0,
            last_boundary: None,
            handler: Box::new(NoopHandler),
        }
    }

    /// Replace the per-element callback
    pub fn with_handler(mut self, handler: impl ElementHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub(crate) fn set_handler(&mut self, handler: Box<dyn ElementHandler>) {
        self.handler = handler;
    }

    pub fn state(&self) -> ParserState {
        self.shared.status.state()
    }

    /// Parse the whole document in the calling thread, without pausing.
    ///
    /// Reclamation still runs at every block boundary when a reclaim tag is
    /// configured. On malformed input the tree keeps the parsed prefix.
    pub fn run_to_completion(&mut self) -> Result<()> {
        self.shared.status.set(ParserState::Running);
        match self.drive(None) {
            Ok(()) => {
                self.finish(Termination::Completed);
                Ok(())
            }
            Err(Stop::Cancelled) => {
                self.finish(Termination::Cancelled);
                Ok(())
            }
            Err(Stop::Failed(err)) => {
                self.finish(Termination::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Producer thread body; pauses only if `pause_at_boundaries` is set
    pub(crate) fn run_threaded(mut self, control: Receiver<Control>) {
        let termination = match self.drive(Some(&control)) {
            Ok(()) => Termination::Completed,
            Err(Stop::Cancelled) => Termination::Cancelled,
            Err(Stop::Failed(err)) => Termination::Failed(err.to_string()),
        };
        self.finish(termination);
    }

    /// Take the built tree out of a parser used without a session
    pub fn into_tree(self) -> ElementTree {
        let mut tree = self.shared.write_tree();
        std::mem::take(&mut *tree)
    }

    fn finish(&self, termination: Termination) {
        log::info!("parser terminated: {:?}", termination);
        self.shared.status.set(ParserState::Terminated(termination));
    }

    fn drive(&mut self, control: Option<&Receiver<Control>>) -> std::result::Result<(), Stop> {
        loop {
            if let Some(rx) = control {
                match rx.try_recv() {
                    Ok(Control::Cancel) | Err(TryRecvError::Disconnected) => return Err(Stop::Cancelled),
                    Ok(Control::Resume) | Err(TryRecvError::Empty) => {}
                }
            }

            let event = match self.reader.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => return Ok(()),
                Err(err) => {
                    self.log_failure(&err);
                    return Err(Stop::Failed(err));
                }
            };
            self.handle_event(event);
            self.at_boundary(control)?;
        }
    }

    fn handle_event(&mut self, event: XmlEvent) {
        let mut tree = self.shared.write_tree();
        match event {
            XmlEvent::StartElement(start) => {
                let element = Element::new(start.name, start.start).with_attributes(start.attributes);
                let id = match self.stack.last() {
                    Some(Some(parent)) => tree.add_child(*parent, element),
                    Some(None) => None,
                    None => Some(tree.add_root(element)),
                };
                self.stack.push(id);
            }
            XmlEvent::Characters(chars) => {
                if !chars.is_whitespace() {
                    if let Some(Some(id)) = self.stack.last() {
                        tree.push_text_fragment(*id, chars.text);
                    }
                }
            }
            XmlEvent::EndElement(end) => {
                let Some(Some(id)) = self.stack.pop() else {
                    return;
                };
                tree.set_end(id, end.end);
                if self.shared.config.is_reclaim_tag(&end.name) && tree.parent(id).is_some() {
                    let block = self.shared.source.chunk_of(end.end);
                    self.reclaimable.entry(block).or_default().push(id);
                }
                // Readers may proceed while the handler runs
                drop(tree);
                self.handler.element_end(&self.shared.read_tree(), id);
            }
        }
    }

    /// Pause and reclaim once per new chunk past the window
    fn at_boundary(&mut self, control: Option<&Receiver<Control>>) -> std::result::Result<(), Stop> {
        let Some(chunk) = self.shared.source.current_chunk_index() else {
            return Ok(());
        };
        let window = self.shared.config.window_chunks as u64;
        if chunk < window || self.last_boundary == Some(chunk) {
            return Ok(());
        }
        self.last_boundary = Some(chunk);

        if let Some(rx) = control.filter(|_| self.shared.config.pause_at_boundaries) {
            self.pause(chunk, rx)?;
        }
        self.reclaim_through(chunk - window);
        Ok(())
    }

    fn pause(&self, chunk: u64, control: &Receiver<Control>) -> std::result::Result<(), Stop> {
        log::info!("parser paused at chunk {}", chunk);
        self.shared.status.set(ParserState::Paused { chunk });
        loop {
            match control.recv() {
                Ok(Control::Resume) => break,
                Ok(Control::Cancel) | Err(_) => return Err(Stop::Cancelled),
            }
        }
        log::info!("parser resumed after chunk {}", chunk);
        self.shared.status.set(ParserState::Running);
        Ok(())
    }

    /// Drop reclaim-tag subtrees whose end lies in a block up to `last_block`
    fn reclaim_through(&mut self, last_block: u64) {
        if last_block < self.start_block {
            return;
        }
        let rest = self.reclaimable.split_off(&(last_block + 1));
        let expired = std::mem::replace(&mut self.reclaimable, rest);

        let mut removed = 0;
        if !expired.is_empty() {
            let mut tree = self.shared.write_tree();
            for id in expired.into_values().flatten() {
                if let Some(parent) = tree.parent(id) {
                    if tree.remove_child(parent, id) {
                        removed += 1;
                    }
                }
            }
        }
        log::debug!("reclaimed {} elements from blocks {}..={}", removed, self.start_block, last_block);
        self.start_block = last_block + 1;
    }

    fn log_failure(&self, err: &Error) {
        if let Error::Tokenization { offset, .. } = err {
            match self.shared.source.find_tag_start_before_or_at(*offset) {
                Some(tag_start) => log::error!("parse failed: {} (enclosing tag starts at byte {})", err, tag_start),
                None => log::error!("parse failed: {}", err),
            }
        } else {
            log::error!("parse failed: {}", err);
        }
    }
}
