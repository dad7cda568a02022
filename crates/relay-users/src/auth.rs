use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::Connection;

use crate::error::{Result, UserError};
use crate::identity::{create_user, find_by_email};
use crate::types::{NewUser, User};
use relay_core::types::UserRole;

/// Register a new password-authenticated user. `argon2id` from the start —
/// no interim plaintext-comparison shortcut (§1a "this implementation does
/// not repeat that shortcut").
pub fn register(conn: &Connection, new_user: NewUser) -> Result<User> {
    let email = new_user.email.trim().to_lowercase();
    let hash = hash_password(&new_user.password)?;
    create_user(conn, &new_user.display_name, &email, &hash, new_user.role)
}

/// Verify an email/password pair and return the owning user.
/// `InvalidCredentials` is returned uniformly for "no such email" and
/// "wrong password" so the endpoint never leaks which one failed.
pub fn login(conn: &Connection, email: &str, password: &str) -> Result<User> {
    let email = email.trim().to_lowercase();
    let user = find_by_email(conn, &email)?.ok_or(UserError::InvalidCredentials)?;
    let hash = user.password_hash.as_deref().ok_or(UserError::InvalidCredentials)?;
    verify_password(password, hash)?;
    Ok(user)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(hash).map_err(|e| UserError::Hashing(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| UserError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn register_and_login_round_trip() {
        let conn = conn();
        register(
            &conn,
            NewUser {
                display_name: "Ana".to_string(),
                email: "Ana@Example.com".to_string(),
                password: "hunter2".to_string(),
                role: UserRole::Operator,
            },
        )
        .unwrap();

        let user = login(&conn, "ana@example.com", "hunter2").unwrap();
        assert_eq!(user.display_name, "Ana");
    }

    #[test]
    fn login_rejects_wrong_password() {
        let conn = conn();
        register(
            &conn,
            NewUser {
                display_name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password: "hunter2".to_string(),
                role: UserRole::Operator,
            },
        )
        .unwrap();

        let err = login(&conn, "ana@example.com", "wrong").unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[test]
    fn register_rejects_duplicate_email() {
        let conn = conn();
        let make = || NewUser {
            display_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "hunter2".to_string(),
            role: UserRole::Operator,
        };
        register(&conn, make()).unwrap();
        let err = register(&conn, make()).unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists(_)));
    }
}
