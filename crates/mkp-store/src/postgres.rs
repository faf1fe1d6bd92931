use async_trait::async_trait;
use mkp_schemas::Customer;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::{RecordStore, StoreError};

/// Postgres-backed store. One row per customer; the record is a jsonb document.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn read(&self, procurement_account_id: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("select record from customers where procurement_account_id = $1")
            .bind(procurement_account_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let Json(c): Json<Customer> = row.try_get("record")?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into customers (procurement_account_id, record, updated_at)
            values ($1, $2, now())
            on conflict (procurement_account_id)
            do update set record = excluded.record, updated_at = excluded.updated_at
            "#,
        )
        .bind(&customer.procurement_account_id)
        .bind(Json(customer))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, procurement_account_id: &str) -> Result<(), StoreError> {
        sqlx::query("delete from customers where procurement_account_id = $1")
            .bind(procurement_account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query("select record from customers order by procurement_account_id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let Json(c): Json<Customer> = row.try_get("record")?;
                Ok(c)
            })
            .collect()
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}
