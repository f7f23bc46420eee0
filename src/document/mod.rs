pub mod parser;
pub mod chunker;

pub use chunker::{Chunk, Chunker};
pub use parser::{DocumentParser, ExtractionStatus, ParsedDocument, PageText};
