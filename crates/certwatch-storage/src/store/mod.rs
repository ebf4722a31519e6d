use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod domain;
pub mod settings;

pub use domain::{DomainQuery, SortKey};

/// Unified access layer over the certwatch database.
///
/// All methods are `async fn` on SeaORM. One instance per process in the
/// server; tests open isolated throwaway databases.
pub struct DomainStore {
    db: DatabaseConnection,
}

impl DomainStore {
    /// Connect and initialize the database.
    ///
    /// `db_url` is a full connection URL, e.g. `sqlite://data/certwatch.db?mode=rwc`.
    /// Pending migrations run automatically.
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL only applies to on-disk SQLite
        if db_url.starts_with("sqlite://") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized domain store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
