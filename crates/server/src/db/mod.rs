pub mod models;

use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // Ensure the data directory exists
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Removes phase state rows whose client has been deleted. Returns how many were removed.
    pub async fn purge_orphaned_phase_states(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM client_phase_state WHERE client_id NOT IN (SELECT id FROM clients)",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Inserts an admin with the given password hash unless one with this email
    /// already exists. Returns true when a row was created.
    pub async fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        if existing > 0 {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO admins (id, email, name, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, 'admin', ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }
}
