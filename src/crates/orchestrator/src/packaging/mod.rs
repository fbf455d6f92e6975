//! Delivering a generated app as an archive or a progress stream.

pub mod archive;
pub mod stream;

pub use archive::{archive_entries, package, unpack, ArchiveEntry};
pub use stream::{
    complete_payload, package_stream, ProgressEmitter, ProgressFrame, ProgressStage, StreamClosed,
};
