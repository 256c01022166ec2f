//! Database table operations and implementations.
//!
//! Row-level operations take a `&mut SqliteConnection` so that callers can run
//! them on a plain pooled connection or inside a transaction.

use chrono::DateTime;
use chrono::Utc;
use sqlx::SqliteConnection;
use sqlx::SqlitePool;

use crate::model::ContactField;
use crate::model::ContactModel;
use crate::model::SubscriberModel;
use crate::model::Subscription;
use crate::repository::error::DatabaseError;

/// Base table struct providing database pool access.
#[derive(Clone)]
pub struct BaseTable {
    pub pool: SqlitePool,
}

impl BaseTable {
    /// Creates a new base table with the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Base trait for whole-table maintenance.
#[async_trait::async_trait]
pub trait TableBase {
    /// Deletes all rows from the table.
    async fn delete_all(&self) -> Result<(), DatabaseError>;
    /// Counts all rows in the table.
    async fn count(&self) -> Result<i64, DatabaseError>;
}

/// Trait for keyed tables with row operations.
#[async_trait::async_trait]
pub trait Table<T, ID>: TableBase {
    async fn select_all(&self, conn: &mut SqliteConnection) -> Result<Vec<T>, DatabaseError>;
    async fn select(&self, conn: &mut SqliteConnection, id: &ID)
    -> Result<Option<T>, DatabaseError>;
    async fn insert(&self, conn: &mut SqliteConnection, model: &T) -> Result<ID, DatabaseError>;
    /// Returns whether a row was removed.
    async fn delete(&self, conn: &mut SqliteConnection, id: &ID) -> Result<bool, DatabaseError>;
}

macro_rules! impl_table_base {
    ($struct_name:ident, $table:literal) => {
        #[derive(Clone)]
        pub struct $struct_name {
            base: BaseTable,
        }

        impl $struct_name {
            pub fn new(pool: SqlitePool) -> Self {
                Self {
                    base: BaseTable::new(pool),
                }
            }
        }

        #[async_trait::async_trait]
        impl TableBase for $struct_name {
            async fn delete_all(&self) -> Result<(), DatabaseError> {
                sqlx::query(concat!("DELETE FROM ", $table))
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }

            async fn count(&self) -> Result<i64, DatabaseError> {
                let count: i64 = sqlx::query_scalar(concat!("SELECT COUNT(*) FROM ", $table))
                    .fetch_one(&self.base.pool)
                    .await?;
                Ok(count)
            }
        }
    };
}

impl_table_base!(ContactTable, "contacts");
impl_table_base!(SubscriberTable, "subscribers");

// CONTACTS

impl ContactTable {
    /// Whether a row other than `except_key` already uses `recipient_fa`.
    pub async fn exists_recipient_fa_except(
        &self,
        conn: &mut SqliteConnection,
        recipient_fa: &str,
        except_key: &str,
    ) -> Result<bool, DatabaseError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE recipient_fa = ? AND recipient_en <> ?)",
        )
        .bind(recipient_fa)
        .bind(except_key)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists != 0)
    }

    /// Sets a single editable column. Returns whether the row existed.
    pub async fn update_field(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        field: ContactField,
        value: &str,
    ) -> Result<bool, DatabaseError> {
        // The column name comes from a closed enum, never from input.
        let sql = format!(
            "UPDATE contacts SET {} = ? WHERE recipient_en = ?",
            field.column()
        );
        let res = sqlx::query(&sql)
            .bind(value)
            .bind(key)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Clears the default flag on every row. Returns the number of rows touched.
    pub async fn clear_default(&self, conn: &mut SqliteConnection) -> Result<u64, DatabaseError> {
        let res = sqlx::query("UPDATE contacts SET is_default = 0 WHERE is_default = 1")
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn set_default_flag(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        is_default: bool,
    ) -> Result<bool, DatabaseError> {
        let res = sqlx::query("UPDATE contacts SET is_default = ? WHERE recipient_en = ?")
            .bind(is_default)
            .bind(key)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn select_default(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<ContactModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, ContactModel>("SELECT * FROM contacts WHERE is_default = 1")
                .fetch_optional(&mut *conn)
                .await?,
        )
    }
}

#[async_trait::async_trait]
impl Table<ContactModel, String> for ContactTable {
    /// Ordered by `recipient_en` ascending.
    async fn select_all(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<ContactModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, ContactModel>(
            "SELECT * FROM contacts ORDER BY recipient_en ASC",
        )
        .fetch_all(&mut *conn)
        .await?)
    }

    async fn select(
        &self,
        conn: &mut SqliteConnection,
        id: &String,
    ) -> Result<Option<ContactModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, ContactModel>("SELECT * FROM contacts WHERE recipient_en = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?,
        )
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        model: &ContactModel,
    ) -> Result<String, DatabaseError> {
        sqlx::query(
            r#"INSERT INTO contacts
                (recipient_en, recipient_fa, email, is_default)
            VALUES (?, ?, ?, ?)"#,
        )
        .bind(&model.recipient_en)
        .bind(&model.recipient_fa)
        .bind(&model.email)
        .bind(model.is_default)
        .execute(&mut *conn)
        .await?;
        Ok(model.recipient_en.clone())
    }

    async fn delete(&self, conn: &mut SqliteConnection, id: &String) -> Result<bool, DatabaseError> {
        let res = sqlx::query("DELETE FROM contacts WHERE recipient_en = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

// SUBSCRIBERS

impl SubscriberTable {
    pub async fn select_by_uuid(
        &self,
        conn: &mut SqliteConnection,
        uuid: &str,
    ) -> Result<Option<SubscriberModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, SubscriberModel>("SELECT * FROM subscribers WHERE uuid = ?")
                .bind(uuid)
                .fetch_optional(&mut *conn)
                .await?,
        )
    }

    pub async fn exists_by_uuid(
        &self,
        conn: &mut SqliteConnection,
        uuid: &str,
    ) -> Result<bool, DatabaseError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subscribers WHERE uuid = ?)")
                .bind(uuid)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists != 0)
    }

    pub async fn update_pending(
        &self,
        conn: &mut SqliteConnection,
        inbox: &str,
        pending: Option<Subscription>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let res = sqlx::query(
            "UPDATE subscribers SET pending_subscription = ?, updated_at = ? WHERE inbox = ?",
        )
        .bind(pending)
        .bind(updated_at)
        .bind(inbox)
        .execute(&mut *conn)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Copies the pending value into `subscription` and clears it.
    pub async fn promote_pending(
        &self,
        conn: &mut SqliteConnection,
        uuid: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let res = sqlx::query(
            r#"UPDATE subscribers
            SET subscription = COALESCE(pending_subscription, subscription),
                pending_subscription = NULL,
                updated_at = ?
            WHERE uuid = ?"#,
        )
        .bind(updated_at)
        .bind(uuid)
        .execute(&mut *conn)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl Table<SubscriberModel, String> for SubscriberTable {
    async fn select_all(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<SubscriberModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, SubscriberModel>("SELECT * FROM subscribers ORDER BY inbox ASC")
                .fetch_all(&mut *conn)
                .await?,
        )
    }

    async fn select(
        &self,
        conn: &mut SqliteConnection,
        id: &String,
    ) -> Result<Option<SubscriberModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, SubscriberModel>("SELECT * FROM subscribers WHERE inbox = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?,
        )
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        model: &SubscriberModel,
    ) -> Result<String, DatabaseError> {
        sqlx::query(
            r#"INSERT INTO subscribers
                (inbox, uuid, subscription, pending_subscription, updated_at)
            VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&model.inbox)
        .bind(&model.uuid)
        .bind(model.subscription)
        .bind(model.pending_subscription)
        .bind(model.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(model.inbox.clone())
    }

    async fn delete(&self, conn: &mut SqliteConnection, id: &String) -> Result<bool, DatabaseError> {
        let res = sqlx::query("DELETE FROM subscribers WHERE inbox = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
