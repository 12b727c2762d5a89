//! Knowledge — uploaded documents and search over the indexed corpus.

pub mod documents;
pub mod model;
pub mod search;

pub use documents::{DocumentRegistry, UploadOutcome, filter_documents};
pub use model::{Document, DocumentStatus, DocumentUpload, SearchHit, UploadFile, content_type_for};
pub use search::{KnowledgeSearch, SearchResult};
