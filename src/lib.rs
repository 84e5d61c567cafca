//! xmlwindow - bounded-memory navigation and editing of very large XML files
//!
//! Layers:
//! - reader: windowed chunk cache over the file and an offset-carrying event stream
//! - strategy: the producer that builds the element tree, pausing at block
//!   boundaries and reclaiming finished subtrees
//! - dom: arena element tree, mutation overlay and the byte-exact writer
//! - navigator: cursor moves and tag search that wait on the producer
//!
//! ```no_run
//! use xmlwindow::{Direction, Navigator, ParseSession, WindowConfig};
//!
//! # fn main() -> xmlwindow::Result<()> {
//! let config = WindowConfig::new().reclaim_tag("MeContext");
//! let session = ParseSession::open("bulk.xml", config)?;
//! session.start()?;
//!
//! let mut nav = Navigator::new(&session);
//! if nav.find("ManagedElement") {
//!     if let Some(id) = nav.current() {
//!         session.set_attribute(id, "userLabel", "edited");
//!     }
//! }
//! nav.to(Direction::Parent);
//!
//! let mut out = std::fs::File::create("bulk.edited.xml")?;
//! session.write_document(&mut out)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod memory;
pub mod navigator;
pub mod reader;
pub mod strategy;

pub use config::WindowConfig;
pub use dom::{Element, ElementTree, MutationWriter, NodeId};
pub use error::{Error, Result};
pub use navigator::{Direction, Navigator};
pub use reader::{EventReader, WindowedByteSource, XmlEvent};
pub use strategy::{ElementHandler, NoopHandler, ParseSession, ParserState, StreamingParser, Termination};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: memory::tracking::TrackingAllocator = memory::tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
