use crate::config::AppConfig;
use crate::entities::{cart, cart_item, order, order_item, payment_transaction, product};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, sea_orm::DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with custom pool settings
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, sea_orm::DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    Database::connect(opt).await
}

/// Establishes a connection pool from the application configuration
pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DbPool, sea_orm::DbErr> {
    let db_config = DbConfig {
        url: cfg.database_url.clone(),
        max_connections: cfg.db_max_connections,
        min_connections: cfg.db_min_connections,
        connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
        acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
    };

    establish_connection_with_config(&db_config).await
}

/// Creates any missing tables from the entity definitions.
///
/// The unique key on `payment_transactions.remote_order_id` is part of the
/// entity definition and lands here as well; the reconciler relies on it.
pub async fn bootstrap_schema(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, schema.create_table_from_entity(product::Entity)).await?;
    create_table(db, schema.create_table_from_entity(order::Entity)).await?;
    create_table(db, schema.create_table_from_entity(order_item::Entity)).await?;
    create_table(
        db,
        schema.create_table_from_entity(payment_transaction::Entity),
    )
    .await?;
    create_table(db, schema.create_table_from_entity(cart::Entity)).await?;
    create_table(db, schema.create_table_from_entity(cart_item::Entity)).await?;

    info!("Database schema bootstrapped");
    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    mut statement: sea_orm::sea_query::TableCreateStatement,
) -> Result<(), sea_orm::DbErr> {
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement))
        .await?;
    Ok(())
}
