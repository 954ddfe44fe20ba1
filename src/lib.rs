pub mod cli;
pub mod config;
pub mod database;
pub mod models;
pub mod schema;
pub mod services;
pub mod sql;
pub mod statement;
pub mod store;
pub mod utils;

pub use config::Config;
pub use database::{BatchError, Database, DatabaseError};
pub use models::{Event, Habit, HabitLog, Note, Routine, Settings, Subtask, Task};
pub use schema::Table;
pub use statement::{OnConflict, OrderBy, Predicate, Select, Statement};
pub use store::{KeyValueStore, MemoryStore, Record, SqliteStore};
pub use utils::Profile;
