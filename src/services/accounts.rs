//! User accounts and bearer sessions.

use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{
    user::{CreateUserData, Role, User, UserColumn},
    user_session::{CreateSessionData, UserSession},
    RecordState,
};
use crate::services::code_generator::{CodeGenerator, TokenField};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Where a login came from, recorded on the session
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let (password, hash) = (password.to_string(), hash.to_string());
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password verification failed: {e}")))
}

#[tracing::instrument(skip(store, actor, request), fields(admin_id = %actor.id, role = %request.role))]
pub async fn create_user(
    store: &dyn Store,
    actor: &User,
    request: CreateUserRequest,
    password_cost: u32,
) -> Result<User> {
    require_admin(actor)?;

    let email = request.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("email is invalid".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let password_hash = hash_password(&request.password, password_cost).await?;

    let mut uow = store.begin().await?;
    let user = uow
        .insert_user(&CreateUserData {
            name: request.name,
            email,
            password_hash,
            role: request.role,
        })
        .await?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, "User created");
    Ok(user)
}

fn require_admin(actor: &User) -> Result<()> {
    if actor.role.can_review_cards() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub async fn list_users(
    store: &dyn Store,
    actor: &User,
    query: ListQuery<UserColumn>,
) -> Result<Page<User>> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    uow.list_users(&query).await
}

pub async fn get_user(store: &dyn Store, actor: &User, user_id: Uuid) -> Result<User> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    uow.find_user(user_id)
        .await?
        .ok_or(AppError::NotFound { resource: "user" })
}

/// Verifies credentials and opens a session. Unknown emails, wrong
/// passwords and inactive users all fail the same way, and all of them pay
/// for one bcrypt round at `password_cost`.
#[tracing::instrument(skip(store, generator, password, client, password_cost))]
pub async fn login(
    store: &dyn Store,
    generator: &CodeGenerator,
    email: &str,
    password: &str,
    client: ClientInfo,
    password_cost: u32,
) -> Result<(UserSession, User)> {
    let mut lookup = store.begin().await?;
    let found = lookup.find_user_by_email(email.trim()).await?;
    drop(lookup);

    let Some(user) = found else {
        hash_password(password, password_cost).await?;
        tracing::warn!("Login for unknown email");
        return Err(AppError::Unauthorized);
    };

    if !verify_password(password, &user.password_hash).await? {
        tracing::warn!(user_id = %user.id, "Login with wrong password");
        return Err(AppError::Unauthorized);
    }
    if user.state != RecordState::Active {
        tracing::warn!(user_id = %user.id, "Login for inactive user");
        return Err(AppError::Unauthorized);
    }

    let mut uow = store.begin().await?;
    let session_token = generator
        .generate(&mut *uow, TokenField::SessionToken)
        .await?;
    let session = uow
        .insert_session(&CreateSessionData {
            user_id: user.id,
            session_token,
            login_ip: client.ip,
            browser: client.user_agent,
        })
        .await?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok((session, user))
}

/// Resolves a bearer token to its live session and active user.
pub async fn authenticate(store: &dyn Store, token: &str) -> Result<(UserSession, User)> {
    let mut uow = store.begin().await?;
    let session = uow
        .find_session(token)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let user = uow
        .find_user(session.user_id)
        .await?
        .filter(|u| u.state == RecordState::Active)
        .ok_or(AppError::Unauthorized)?;
    Ok((session, user))
}

#[tracing::instrument(skip(store))]
pub async fn logout(store: &dyn Store, session_id: Uuid) -> Result<()> {
    let mut uow = store.begin().await?;
    uow.delete_session(session_id).await?;
    uow.commit().await?;

    tracing::info!("User logged out");
    Ok(())
}
