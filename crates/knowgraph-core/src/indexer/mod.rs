pub mod callgraph;
pub mod extractor;
pub mod facts;
pub mod filesystem;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod symbols;

pub use extractor::{extract_graph, try_extract_graph};
pub use facts::{SourceFactProvider, SourceFacts};
pub use parser::CSharpFactProvider;
pub use pipeline::{index_directory, IndexOptions, IndexStats};
