//! Slotdeck Core - Live media slot controller
//!
//! This crate provides the core of the controller: library scanning and
//! collections, the buffer state machine, and routing of keyboard, MIDI and
//! grid input into canonical actions.

pub mod action;
pub mod buffer;
pub mod collection;
pub mod config;
pub mod debounce;
pub mod grid;
pub mod library;
pub mod media;
pub mod router;
pub mod runtime;
pub mod session;
pub mod wire;

pub use action::{ Action, ActionError, SpeedShift, Step, TimeShift };
pub use buffer::{ Buffer, BufferBank, BufferError, BufferKind, BufferState };
pub use collection::{ Catalog, Collection, CollectionError };
pub use config::SessionConfig;
pub use grid::{ GridKey, LedFrame };
pub use library::{ FolderFilter, LibraryScanner, ScanReport };
pub use media::{ MediaEntry, MediaType };
pub use router::{ InputEvent, Key, Router };
pub use runtime::{ Outputs, Runtime, SessionEvent };
pub use session::{ NullSink, RenderSink, Session, SessionError, SessionSnapshot };
pub use wire::{ DeviceMessage, WireError };
