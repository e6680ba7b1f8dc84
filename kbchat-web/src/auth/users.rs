//! User management and authentication

use super::{
    database::DatabaseUserStore,
    jwt::{AuthError, JwtService, TOKEN_TTL_SECONDS},
    User,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use kbchat_core::UserRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;
const MIN_NAME_CHARS: usize = 2;

/// User registration request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "owner@acme.test")]
    pub email: String,
    pub password: String,
    #[schema(example = "Acme Support")]
    pub name: String,
    /// `company` or `customer`
    #[schema(example = "company")]
    pub role: String,
    /// Tenant a customer joins. Company accounts always get a tenant of their own.
    #[serde(default, alias = "companyId")]
    pub company_id: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public user information
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    #[schema(value_type = String, example = "customer")]
    pub role: UserRole,
    pub company_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Registration/login response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserInfo,
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(user: UserInfo, token: String) -> Self {
        Self {
            user,
            token,
            token_type: "Bearer".to_string(),
            expires_in: TOKEN_TTL_SECONDS,
        }
    }
}

/// Internal user data with password hash
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub company_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserData {
    pub fn new(
        email: String,
        name: String,
        password: &str,
        role: UserRole,
        company_id: Option<String>,
    ) -> Result<Self, AuthError> {
        let id = Uuid::new_v4().to_string();
        // A company account's tenant id is its own user id
        let company_id = match role {
            UserRole::Company => Some(id.clone()),
            _ => company_id,
        };

        Ok(Self {
            id,
            email,
            name,
            password_hash: hash_password(password)?,
            role,
            company_id,
            created_at: chrono::Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            company_id: self.company_id.clone(),
        }
    }

    pub fn to_user_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            company_id: self.company_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// User store supporting both in-memory and database storage
#[derive(Debug, Clone)]
pub enum UserStore {
    /// In-memory storage (for development and testing), keyed by email
    Memory(Arc<RwLock<HashMap<String, UserData>>>),
    /// Database storage (for production)
    Database(DatabaseUserStore),
}

impl Default for UserStore {
    fn default() -> Self {
        Self::memory()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Storage("user store lock poisoned".to_string())
}

impl UserStore {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    pub fn database(store: DatabaseUserStore) -> Self {
        Self::Database(store)
    }

    async fn insert(&self, user: &UserData) -> Result<(), AuthError> {
        match self {
            UserStore::Memory(users) => {
                let mut users = users.write().map_err(poisoned)?;
                if users.contains_key(&user.email) {
                    return Err(AuthError::EmailTaken);
                }
                users.insert(user.email.clone(), user.clone());
                Ok(())
            }
            UserStore::Database(store) => store.insert_user(user).await,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserData>, AuthError> {
        match self {
            UserStore::Memory(users) => Ok(users.read().map_err(poisoned)?.get(email).cloned()),
            UserStore::Database(store) => store.find_by_email(email).await,
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserData>, AuthError> {
        match self {
            UserStore::Memory(users) => Ok(users
                .read()
                .map_err(poisoned)?
                .values()
                .find(|u| u.id == id)
                .cloned()),
            UserStore::Database(store) => store.find_by_id(id).await,
        }
    }
}

/// Registration, login and lookup
#[derive(Debug, Clone, Default)]
pub struct UserService {
    store: UserStore,
}

impl UserService {
    pub fn new(store: UserStore) -> Self {
        Self { store }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let name = request.name.trim().to_string();

        if name.chars().count() < MIN_NAME_CHARS {
            return Err(AuthError::InvalidInput(format!(
                "Name must be at least {} characters",
                MIN_NAME_CHARS
            )));
        }
        check_password(&request.password)?;

        let role = match request.role.as_str() {
            "company" => UserRole::Company,
            "customer" => UserRole::Customer,
            _ => return Err(AuthError::InvalidInput("Invalid role".to_string())),
        };

        let company_id = request
            .company_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let company_id = match role {
            UserRole::Customer => self.existing_company(company_id).await?,
            _ => None,
        };

        let user = UserData::new(email, name, &request.password, role, company_id)?;
        self.store.insert(&user).await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        let token = JwtService::issue(&user.to_user())?;
        Ok(AuthResponse::new(user.to_user_info(), token))
    }

    /// A customer may only join a tenant owned by a registered company account
    async fn existing_company(
        &self,
        company_id: Option<String>,
    ) -> Result<Option<String>, AuthError> {
        let Some(company_id) = company_id else {
            return Ok(None);
        };

        match self.store.find_by_id(&company_id).await? {
            Some(owner) if owner.role == UserRole::Company => Ok(Some(company_id)),
            _ => {
                debug!(company_id = %company_id, "Registration for unknown company");
                Err(AuthError::InvalidInput("Unknown company".to_string()))
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.store.find_by_email(&email).await? else {
            debug!("Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.verify_password(&request.password) {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = JwtService::issue(&user.to_user())?;
        Ok(AuthResponse::new(user.to_user_info(), token))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserInfo>, AuthError> {
        Ok(self.store.find_by_id(id).await?.map(|u| u.to_user_info()))
    }

    /// Create the administrator account unless the email is already registered
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email)?;
        if self.store.find_by_email(&email).await?.is_some() {
            debug!("Admin user already exists");
            return Ok(());
        }
        check_password(password)?;

        let admin = UserData::new(
            email,
            "Administrator".to_string(),
            password,
            UserRole::Admin,
            None,
        )?;
        self.store.insert(&admin).await?;
        info!(user_id = %admin.id, "Created admin user");
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if valid && !email.contains(char::is_whitespace) {
        Ok(email)
    } else {
        Err(AuthError::InvalidInput("Invalid email".to_string()))
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    Ok(())
}

/// Hash password using Argon2
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            warn!("Failed to hash password: {}", e);
            AuthError::Storage("password hashing failed".to_string())
        })
}

/// Verify password against hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(email: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "secret123".to_string(),
            name: "Jo Bloggs".to_string(),
            role: role.to_string(),
            company_id: None,
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let service = UserService::default();
        let registered = service
            .register(register_request("Jo@Example.com", "customer"))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "jo@example.com");
        assert_eq!(registered.user.role, UserRole::Customer);

        let logged_in = service
            .login(LoginRequest {
                email: "jo@example.com".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn company_without_tenant_owns_itself() {
        let service = UserService::default();
        let registered = service
            .register(register_request("owner@acme.test", "company"))
            .await
            .unwrap();
        assert_eq!(registered.user.company_id.as_deref(), Some(registered.user.id.as_str()));
    }

    #[tokio::test]
    async fn company_cannot_claim_another_tenant() {
        let service = UserService::default();
        let owner = service
            .register(register_request("owner@acme.test", "company"))
            .await
            .unwrap();

        let mut intruder = register_request("intruder@evil.test", "company");
        intruder.company_id = Some(owner.user.id.clone());
        let registered = service.register(intruder).await.unwrap();

        assert_eq!(registered.user.company_id.as_deref(), Some(registered.user.id.as_str()));
        assert_ne!(registered.user.company_id, owner.user.company_id);
    }

    #[tokio::test]
    async fn customer_joins_only_registered_companies() {
        let service = UserService::default();
        let owner = service
            .register(register_request("owner@acme.test", "company"))
            .await
            .unwrap();

        let mut customer = register_request("jo@example.com", "customer");
        customer.company_id = Some(owner.user.id.clone());
        let joined = service.register(customer).await.unwrap();
        assert_eq!(joined.user.company_id, Some(owner.user.id.clone()));

        let mut stray = register_request("sam@example.com", "customer");
        stray.company_id = Some("acme".to_string());
        assert!(matches!(
            service.register(stray).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));

        // A customer id is not a tenant
        let mut nested = register_request("kim@example.com", "customer");
        nested.company_id = Some(joined.user.id.clone());
        assert!(matches!(
            service.register(nested).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let service = UserService::default();
        service
            .register(register_request("jo@example.com", "customer"))
            .await
            .unwrap();
        let err = service
            .register(register_request("jo@example.com", "customer"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn invalid_registrations_are_rejected() {
        let service = UserService::default();

        let err = service
            .register(register_request("not-an-email", "customer"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let err = service
            .register(register_request("jo@example.com", "admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let mut short = register_request("jo@example.com", "customer");
        short.password = "12345".to_string();
        assert!(matches!(
            service.register(short).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));

        let mut unnamed = register_request("jo@example.com", "customer");
        unnamed.name = " J ".to_string();
        assert!(matches!(
            service.register(unnamed).await.unwrap_err(),
            AuthError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let service = UserService::default();
        service
            .register(register_request("jo@example.com", "customer"))
            .await
            .unwrap();

        let err = service
            .login(LoginRequest {
                email: "jo@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn admin_is_created_once() {
        let service = UserService::default();
        service.ensure_admin("admin@kbchat.test", "admin-pass").await.unwrap();
        service.ensure_admin("admin@kbchat.test", "admin-pass").await.unwrap();

        let login = service
            .login(LoginRequest {
                email: "admin@kbchat.test".to_string(),
                password: "admin-pass".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.role, UserRole::Admin);
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("secret123").unwrap();
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("other", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }
}
