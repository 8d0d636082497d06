pub mod memory;
pub mod postgres;
mod record;
pub mod repository;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::{DbError, PostFilter, Repository, Result};
