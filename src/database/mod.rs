pub mod cleanup;
pub mod connection;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;


pub use cleanup::run_cleanup;
pub use connection::{establish_connection, run_migrations, DatabasePool};
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::PriceRepository;
