pub mod connection;
pub mod metadata;
pub mod table;

pub use connection::Connection;
pub use metadata::DatabaseMetadata;
pub use table::TableOperations;
