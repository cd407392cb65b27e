//! Handle database requests.

use sqlx::pool::PoolConnection;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::config;
use crate::database;
use crate::error::{Result, StoreError};
use crate::user::filter::Value;
use crate::user::{Field, User, UserFilter, UserUpdate};

const SELECT_USER: &str =
    "SELECT id, email, hashed_password, session_id, reset_token FROM users WHERE ";
const INSERT_USER: &str = r#"INSERT INTO users (email, hashed_password) VALUES (?1, ?2)
    RETURNING id, email, hashed_password, session_id, reset_token"#;

/// Data access object over the `users` table.
///
/// All requests go through a single connection acquired on first use and
/// kept until the store is dropped. Methods take `&mut self`: one store
/// serves one execution context at a time.
pub struct UserStore {
    pool: SqlitePool,
    session: Option<PoolConnection<Sqlite>>,
}

impl UserStore {
    /// Open the configured database and create a new [`UserStore`].
    pub async fn new(config: &config::Database) -> Result<Self> {
        let pool = database::connect(config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Create a new [`UserStore`] on an existing pool.
    ///
    /// The `users` table must already exist.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            session: None,
        }
    }

    /// Whether the session connection has been acquired.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Memoized session connection.
    async fn session(&mut self) -> Result<&mut SqliteConnection> {
        let conn = match self.session.take() {
            Some(conn) => conn,
            None => {
                tracing::debug!("opening store session");
                self.pool.acquire().await?
            },
        };

        Ok(&mut **self.session.insert(conn))
    }

    /// Insert a new [`User`] and return it with its assigned `id`.
    pub async fn create_user(
        &mut self,
        email: &str,
        hashed_password: &str,
    ) -> Result<User> {
        let conn = self.session().await?;
        let mut tx = conn.begin().await?;

        let user = sqlx::query_as::<_, User>(INSERT_USER)
            .bind(email)
            .bind(hashed_password)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(user_id = user.id, "user created");

        Ok(user)
    }

    /// Find the first [`User`] matching every field of `filter`.
    ///
    /// When several rows match, which one is returned is unspecified.
    pub async fn find_user_by(&mut self, filter: &UserFilter) -> Result<User> {
        let criteria = filter.criteria();
        if criteria.is_empty() {
            return Err(StoreError::InvalidFilter(
                "at least one field is required".into(),
            ));
        }

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_USER);
        push_criteria(&mut query, criteria);
        query.push(" LIMIT 1");

        let conn = self.session().await?;
        query
            .build_query_as::<User>()
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Overwrite fields of the [`User`] identified by `user_id`.
    ///
    /// A missing user fails with [`StoreError::NotFound`]. Changes are
    /// committed together.
    pub async fn update_user(
        &mut self,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<()> {
        self.find_user_by(&UserFilter::default().id(user_id)).await?;

        if update.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        push_assignments(&mut query, update.assignments());
        query.push(" WHERE id = ").push_bind(user_id);

        let conn = self.session().await?;
        let mut tx = conn.begin().await?;
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(%user_id, "user updated");
        Ok(())
    }
}

/// Push `column = ?` conditions joined by `AND`. `NULL` is matched with
/// `IS NULL`.
fn push_criteria(query: &mut QueryBuilder<'_, Sqlite>, criteria: Vec<(Field, Value)>) {
    for (i, (field, value)) in criteria.into_iter().enumerate() {
        if i > 0 {
            query.push(" AND ");
        }
        query.push(field.column());
        if value == Value::Text(None) {
            query.push(" IS NULL");
        } else {
            query.push(" = ");
            value.push_bind(query);
        }
    }
}

/// Push `column = ?` assignments joined by commas.
fn push_assignments(
    query: &mut QueryBuilder<'_, Sqlite>,
    assignments: Vec<(Field, Value)>,
) {
    for (i, (field, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            query.push(", ");
        }
        query.push(field.column()).push(" = ");
        value.push_bind(query);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn memory_store() -> UserStore {
        let config = config::Database {
            path: ":memory:".into(),
            ..Default::default()
        };
        UserStore::new(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let mut store = memory_store().await;

        let first = store.create_user("a@b.com", "h1").await.unwrap();
        let second = store.create_user("c@d.com", "h2").await.unwrap();
        let third = store.create_user("a@b.com", "h3").await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_ne!(third.id, first.id);
        assert_ne!(third.id, second.id);
        assert_eq!(first.email, "a@b.com");
        assert_eq!(first.hashed_password, "h1");
        assert_eq!(first.session_id, None);
        assert_eq!(first.reset_token, None);
    }

    #[tokio::test]
    async fn test_find_round_trip() {
        let mut store = memory_store().await;
        let user = store.create_user("a@b.com", "h1").await.unwrap();

        let found = store
            .find_user_by(&UserFilter::default().id(user.id))
            .await
            .unwrap();
        assert_eq!(found, user);

        let found = store
            .find_user_by(&UserFilter::default().email("a@b.com").hashed_password("h1"))
            .await
            .unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_find_invalid_filter() {
        let mut store = memory_store().await;
        store.create_user("a@b.com", "h1").await.unwrap();

        assert!(matches!(
            store.find_user_by(&UserFilter::default()).await,
            Err(StoreError::InvalidFilter(_))
        ));
        assert!(matches!(
            UserFilter::from_json(&json!({ "bogus_field": 1 })),
            Err(StoreError::InvalidFilter(_))
        ));
    }

    #[tokio::test]
    async fn test_find_not_found() {
        let mut store = memory_store().await;
        store.create_user("a@b.com", "h1").await.unwrap();

        assert!(matches!(
            store.find_user_by(&UserFilter::default().email("x@y.com")).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store
                .find_user_by(&UserFilter::default().email("a@b.com").hashed_password("nope"))
                .await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_read_your_writes() {
        let mut store = memory_store().await;
        let user = store.create_user("a@b.com", "h1").await.unwrap();

        store
            .update_user(
                user.id,
                &UserUpdate::default()
                    .email("new@x.com")
                    .session_id(Some("sid".into())),
            )
            .await
            .unwrap();

        let found = store
            .find_user_by(&UserFilter::default().session_id(Some("sid".into())))
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "new@x.com");
        assert_eq!(found.hashed_password, "h1");

        // clearing a nullable column.
        store
            .update_user(user.id, &UserUpdate::default().session_id(None))
            .await
            .unwrap();
        let found = store
            .find_user_by(&UserFilter::default().id(user.id))
            .await
            .unwrap();
        assert_eq!(found.session_id, None);
    }

    #[tokio::test]
    async fn test_find_by_null_column() {
        let mut store = memory_store().await;
        let active = store.create_user("a@b.com", "h1").await.unwrap();
        let idle = store.create_user("c@d.com", "h2").await.unwrap();

        store
            .update_user(active.id, &UserUpdate::default().session_id(Some("sid".into())))
            .await
            .unwrap();

        let found = store
            .find_user_by(&UserFilter::from_json(&json!({ "session_id": null })).unwrap())
            .await
            .unwrap();
        assert_eq!(found, idle);

        let found = store
            .find_user_by(&UserFilter::default().email("a@b.com").session_id(None))
            .await;
        assert!(matches!(found, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_invalid_attribute_leaves_record() {
        let mut store = memory_store().await;
        let user = store.create_user("a@b.com", "h1").await.unwrap();

        let err = UserUpdate::from_json(&json!({ "email": "z@z.com", "unknown_field": 1 }))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidAttribute(ref key) if key == "unknown_field"));

        let found = store
            .find_user_by(&UserFilter::default().id(user.id))
            .await
            .unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let mut store = memory_store().await;
        store.create_user("a@b.com", "h1").await.unwrap();

        assert!(matches!(
            store
                .update_user(42, &UserUpdate::default().email("new@x.com"))
                .await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.update_user(42, &UserUpdate::default()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_update_is_noop() {
        let mut store = memory_store().await;
        let user = store.create_user("a@b.com", "h1").await.unwrap();

        store.update_user(user.id, &UserUpdate::default()).await.unwrap();
        let found = store
            .find_user_by(&UserFilter::default().id(user.id))
            .await
            .unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_scenario() {
        let mut store = memory_store().await;

        let first = store.create_user("a@b.com", "h1").await.unwrap();
        let second = store.create_user("c@d.com", "h2").await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let found = store
            .find_user_by(&UserFilter::from_json(&json!({ "email": "a@b.com" })).unwrap())
            .await
            .unwrap();
        assert_eq!(found.id, 1);

        let update = UserUpdate::from_json(&json!({ "hashed_password": "h1new" })).unwrap();
        store.update_user(1, &update).await.unwrap();

        let found = store
            .find_user_by(&UserFilter::default().id(1))
            .await
            .unwrap();
        assert_eq!(found.hashed_password, "h1new");
    }

    #[tokio::test]
    async fn test_session_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let config = config::Database {
            path: dir.path().join("users.db").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut store = UserStore::new(&config).await.unwrap();
        assert!(!store.has_session());

        // temporary tables only exist on the connection that created them.
        let conn = store.session().await.unwrap();
        sqlx::query("CREATE TEMP TABLE marker (x INTEGER)")
            .execute(conn)
            .await
            .unwrap();
        assert!(store.has_session());

        store.create_user("a@b.com", "h1").await.unwrap();
        store
            .find_user_by(&UserFilter::default().id(1))
            .await
            .unwrap();
        store
            .update_user(1, &UserUpdate::default().reset_token(Some("tok".into())))
            .await
            .unwrap();

        let conn = store.session().await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM marker")
            .fetch_one(conn)
            .await
            .unwrap();
        assert_eq!(count, 0);

        // the session is the only connection the pool ever hands out.
        assert_eq!(store.pool.options().get_max_connections(), 1);
        assert_eq!(store.pool.size(), 1);
    }

    #[tokio::test]
    async fn test_reset_schema_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config::Database {
            path: dir.path().join("users.db").to_string_lossy().into_owned(),
            ..Default::default()
        };

        {
            let mut store = UserStore::new(&config).await.unwrap();
            store.create_user("a@b.com", "h1").await.unwrap();
        }

        // existing rows survive by default.
        let mut store = UserStore::new(&config).await.unwrap();
        assert!(
            store
                .find_user_by(&UserFilter::default().email("a@b.com"))
                .await
                .is_ok()
        );
        drop(store);

        config.reset_schema_on_start = true;
        let mut store = UserStore::new(&config).await.unwrap();
        assert!(matches!(
            store.find_user_by(&UserFilter::default().email("a@b.com")).await,
            Err(StoreError::NotFound)
        ));
        let user = store.create_user("c@d.com", "h2").await.unwrap();
        assert_eq!(user.id, 1);
    }
}
