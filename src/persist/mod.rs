//! Session persistence — external store contract and backends.

pub mod libsql_backend;
pub mod memory;
pub mod traits;

pub use libsql_backend::LibSqlRepository;
pub use memory::MemoryRepository;
pub use traits::ContextRepository;
