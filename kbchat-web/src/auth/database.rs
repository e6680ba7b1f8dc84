//! Database-backed user storage

use super::{jwt::AuthError, users::UserData};
use crate::database::{format_timestamp, parse_timestamp, Database};
use kbchat_core::UserRole;
use sqlx::SqlitePool;
use tracing::{debug, error};

/// Database user record
#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: String,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    company_id: Option<String>,
    created_at: String,
}

impl UserRecord {
    fn into_user_data(self) -> Result<UserData, AuthError> {
        let role: UserRole = self.role.parse().map_err(AuthError::Storage)?;
        let created_at =
            parse_timestamp(&self.created_at).map_err(|e| AuthError::Storage(e.to_string()))?;

        Ok(UserData {
            id: self.id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role,
            company_id: self.company_id,
            created_at,
        })
    }
}

/// `users` table
#[derive(Debug, Clone)]
pub struct DatabaseUserStore {
    pool: SqlitePool,
}

impl DatabaseUserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool().clone(),
        }
    }

    pub async fn insert_user(&self, user: &UserData) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, company_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.company_id)
        .bind(format_timestamp(&user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return AuthError::EmailTaken;
            }
            error!("Failed to insert user: {}", e);
            AuthError::Storage(e.to_string())
        })?;

        debug!("User inserted: {}", user.id);
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserData>, AuthError> {
        self.find_one(
            "SELECT id, email, name, password_hash, role, company_id, created_at \
             FROM users WHERE email = ?",
            email,
        )
        .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserData>, AuthError> {
        self.find_one(
            "SELECT id, email, name, password_hash, role, company_id, created_at \
             FROM users WHERE id = ?",
            id,
        )
        .await
    }

    async fn find_one(&self, query: &str, key: &str) -> Result<Option<UserData>, AuthError> {
        let record: Option<UserRecord> = sqlx::query_as(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to load user: {}", e);
                AuthError::Storage(e.to_string())
            })?;

        record.map(UserRecord::into_user_data).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::{LoginRequest, RegisterRequest, UserService, UserStore};

    #[tokio::test]
    async fn users_persist_in_sqlite() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let service = UserService::new(UserStore::database(DatabaseUserStore::new(&db)));

        let registered = service
            .register(RegisterRequest {
                email: "owner@acme.test".to_string(),
                password: "secret123".to_string(),
                name: "Acme".to_string(),
                role: "company".to_string(),
                company_id: Some("acme".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(
            registered.user.company_id.as_deref(),
            Some(registered.user.id.as_str())
        );

        let login = service
            .login(LoginRequest {
                email: "owner@acme.test".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, registered.user.id);

        let found = service.get_user(&registered.user.id).await.unwrap().unwrap();
        assert_eq!(found.role, UserRole::Company);

        let customer = service
            .register(RegisterRequest {
                email: "jo@example.com".to_string(),
                password: "secret123".to_string(),
                name: "Jo".to_string(),
                role: "customer".to_string(),
                company_id: Some(registered.user.id.clone()),
            })
            .await
            .unwrap();
        assert_eq!(customer.user.company_id, Some(registered.user.id));
    }

    #[tokio::test]
    async fn unique_email_violation_maps_to_conflict() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let store = DatabaseUserStore::new(&db);
        let user = UserData::new(
            "jo@example.com".to_string(),
            "Jo".to_string(),
            "secret123",
            UserRole::Customer,
            None,
        )
        .unwrap();
        store.insert_user(&user).await.unwrap();

        let duplicate = UserData::new(
            "jo@example.com".to_string(),
            "Jo again".to_string(),
            "secret123",
            UserRole::Customer,
            None,
        )
        .unwrap();
        assert!(matches!(
            store.insert_user(&duplicate).await,
            Err(AuthError::EmailTaken)
        ));
    }
}
