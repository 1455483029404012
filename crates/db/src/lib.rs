pub mod error;
pub mod ids;
pub mod models;
pub mod pool;

pub use error::StoreError;
pub use pool::connect;
