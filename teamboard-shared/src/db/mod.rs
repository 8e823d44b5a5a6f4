/// Database layer
///
/// - `pool`: connection pool, health check and transient-error detection
/// - `migrations`: embedded schema migrations
///
/// Table access lives with the models in [`crate::models`].

pub mod migrations;
pub mod pool;
