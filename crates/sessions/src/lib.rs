//! Thread persistence: checkpoints of conversation state, the thread
//! index used for listings, and append-only transcripts.

pub mod checkpoint;
pub mod index;
pub mod transcript;

pub use checkpoint::{thread_file_stem, Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use index::{ThreadIndex, ThreadSummary};
pub use transcript::{TranscriptLine, TranscriptWriter};
