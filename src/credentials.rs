use rand::Rng;

use crate::error::AppError;

pub const HASH_COST: u32 = 10;
pub const GENERATED_PASSWORD_LEN: usize = 10;

const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%";

/// Check a candidate password against a stored credential.
///
/// Stored values that are not bcrypt hashes are legacy plaintext records and
/// are compared directly. Those records keep working until they are
/// re-issued with a hashed password.
pub fn verify(candidate: &str, stored: &str) -> bool {
    match bcrypt::verify(candidate, stored) {
        Ok(matched) => matched,
        Err(_) => candidate == stored,
    }
}

/// Index of the first stored credential that accepts `candidate`.
///
/// bcrypt at cost 10 is slow on purpose, so the comparisons run on the
/// blocking pool instead of an async worker.
pub async fn first_match(candidate: &str, stored: Vec<String>) -> Result<Option<usize>, AppError> {
    let candidate = candidate.to_owned();
    let matched = tokio::task::spawn_blocking(move || {
        stored.iter().position(|stored| verify(&candidate, stored))
    })
    .await?;
    Ok(matched)
}

pub async fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let plaintext = plaintext.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, HASH_COST)).await??;
    Ok(hash)
}

pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}
