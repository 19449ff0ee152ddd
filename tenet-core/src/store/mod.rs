pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use registry::SqliteRegistry;
pub use sqlite::SqliteStore;
pub use traits::{PatternStore, ProjectRegistry};
