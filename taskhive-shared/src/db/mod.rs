/// Database layer for TaskHive
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Schema migrations embedded from `taskhive-shared/migrations`
///
/// Queries live on the model types in [`crate::models`] and are reached
/// through [`crate::store::postgres::PgStore`].
///
/// # Example
///
/// ```no_run
/// use taskhive_shared::db::{migrations::run_migrations, pool::{create_pool, DatabaseConfig}};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
