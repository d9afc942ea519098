use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use common::{
    env_config::JwtConfig,
    error::{AppError, Res},
    jwt,
};
use db::{
    dtos::user::UserCreateRequest,
    models::user::{AuthCredentials, User},
};
use log::info;
use sqlx::PgPool;

use crate::dtos::auth::{AuthResponse, SignInRequest, SignUpRequest, normalize_email};

pub fn hash_password(password: &str) -> Res<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> Res<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Inserts the user and its credentials in one transaction and issues a token.
pub async fn sign_up(pool: &PgPool, req: SignUpRequest, jwt_config: &JwtConfig) -> Res<AuthResponse> {
    let req = req.normalized()?;
    let mut tx = pool.begin().await?;

    if db::user::exists_user_by_email(&mut *tx, &req.email).await? {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let user = db::user::insert_user(
        &mut *tx,
        UserCreateRequest {
            name: req.name,
            email: req.email,
        },
    )
    .await
    .map_err(|e| match e {
        AppError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            AppError::Conflict("User already exists".to_string())
        }
        other => other,
    })?;

    db::user::insert_user_credentials(
        &mut *tx,
        AuthCredentials {
            user_id: user.id,
            password_hash: hash_password(&req.password)?,
        },
    )
    .await?;

    tx.commit().await?;
    info!("User {} signed up", user.id);

    let token = jwt::generate_jwt(user.id, jwt_config)?;
    Ok(AuthResponse { token, user })
}

/// Authenticates an existing user. Unknown e-mail and wrong password are
/// indistinguishable to the caller.
pub async fn authenticate_user(pool: &PgPool, login_data: &SignInRequest) -> Res<User> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let email = normalize_email(&login_data.email).map_err(|_| invalid())?;

    let (user, credentials) = db::user::get_user_with_password_hash(pool, &email)
        .await?
        .ok_or_else(invalid)?;

    if verify_password(&login_data.password, &credentials.password_hash)? {
        Ok(user)
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(AppError::Internal(_))
        ));
    }
}
