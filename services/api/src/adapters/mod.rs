pub mod db;
pub mod insights_llm;
pub mod memory;

pub use db::DbAdapter;
pub use insights_llm::OpenAiInsightsAdapter;
pub use memory::InMemoryDb;
