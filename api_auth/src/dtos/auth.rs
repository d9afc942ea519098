use common::error::{AppError, Res};
use db::models::user::User;
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

impl SignUpRequest {
    /// Trims the name, lower-cases the e-mail and checks both with the password.
    pub fn normalized(self) -> Res<Self> {
        let name = self.name.trim().to_string();
        let name_len = name.chars().count();
        if !(2..=50).contains(&name_len) {
            return Err(AppError::BadRequest(
                "Name must be between 2 and 50 characters".to_string(),
            ));
        }
        let email = normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(SignUpRequest {
            name,
            email,
            password: self.password,
        })
    }
}

pub fn normalize_email(raw: &str) -> Res<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::BadRequest(
            "Please provide a valid email address".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(" Ada@Example.COM ", Some("ada@example.com"))]
    #[case("a.b+tag@sub.example.org", Some("a.b+tag@sub.example.org"))]
    #[case("no-at-sign.com", None)]
    #[case("@example.com", None)]
    #[case("ada@localhost", None)]
    #[case("ada@ex ample.com", None)]
    #[case("ada@@example.com", None)]
    fn email_normalization(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_email(raw).ok().as_deref(), expected);
    }

    #[rstest]
    #[case("A", "secret1")]
    #[case("Ada", "12345")]
    fn invalid_sign_up_is_rejected(#[case] name: &str, #[case] password: &str) {
        let req = SignUpRequest {
            name: name.to_string(),
            email: "ada@example.com".to_string(),
            password: password.to_string(),
        };
        assert!(matches!(req.normalized(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn valid_sign_up_is_normalized() {
        let req = SignUpRequest {
            name: "  Ada Lovelace ".to_string(),
            email: "ADA@example.com".to_string(),
            password: "analytical".to_string(),
        }
        .normalized()
        .unwrap();
        assert_eq!(req.name, "Ada Lovelace");
        assert_eq!(req.email, "ada@example.com");
    }
}
