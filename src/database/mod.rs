pub mod executor;
pub mod manager;
pub mod memory;
pub mod registry;

pub use executor::{ExecutorError, PgQueryExecutor, QueryExecutor};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::InMemoryQueryRegistry;
pub use registry::{PgQueryRegistry, QueryRegistry, RegistryError, TemplateFilter};
