//! XML Reader Module
//!
//! - WindowedByteSource: bounded chunk cache with sequential and random access
//! - Events: owned, offset-carrying XML events
//! - EventReader: incremental event stream over a windowed source

pub mod events;
pub mod stream;
pub mod window;

pub use events::XmlEvent;
pub use stream::EventReader;
pub use window::WindowedByteSource;
