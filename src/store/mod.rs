pub mod r#trait;
pub mod drive;
pub mod memory;

pub use drive::DriveDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use r#trait::DocumentFetcher;
