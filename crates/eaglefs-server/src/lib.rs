//! eaglefs command line library
//!
//! Subcommand implementations and the optional FUSE adapter behind the
//! `eaglefs` binary.

pub mod commands;
pub mod constants;
#[cfg(feature = "fuse")]
pub mod fuse;

pub use commands::LibraryArgs;
#[cfg(feature = "fuse")]
pub use fuse::EagleFuse;
