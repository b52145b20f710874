//! In-tree backends
//!
//! - [`renamer`]: renames transcoded output according to a filename template
//! - [`dummy`]: time based stand-ins used by the simulator and tests

pub mod dummy;
pub mod renamer;

pub use dummy::{DummyLogo, DummyTimecode, DummyTranscoder, FlakyDummy};
pub use renamer::FileRenamer;
