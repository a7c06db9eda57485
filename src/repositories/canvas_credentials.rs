use sqlx::PgPool;

use crate::db::models::{CanvasCredentials, CredentialsSummary};

/// Tokens are stored with `pgp_sym_encrypt`; decryption happens in the query so the key never hits the row cache.
pub(crate) async fn find_for_user(
    pool: &PgPool,
    user_id: &str,
    encryption_key: &str,
) -> Result<Option<CanvasCredentials>, sqlx::Error> {
    sqlx::query_as::<_, CanvasCredentials>(
        "SELECT user_id, canvas_url, pgp_sym_decrypt(token_encrypted, $2) AS canvas_token \
         FROM canvas_credentials WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(encryption_key)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn summary_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<CredentialsSummary>, sqlx::Error> {
    sqlx::query_as::<_, CredentialsSummary>(
        "SELECT canvas_url, updated_at FROM canvas_credentials WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn upsert(
    pool: &PgPool,
    user_id: &str,
    canvas_url: &str,
    canvas_token: &str,
    encryption_key: &str,
) -> Result<CredentialsSummary, sqlx::Error> {
    sqlx::query_as::<_, CredentialsSummary>(
        "INSERT INTO canvas_credentials (user_id, canvas_url, token_encrypted, updated_at) \
         VALUES ($1, $2, pgp_sym_encrypt($3, $4), now()) \
         ON CONFLICT (user_id) DO UPDATE \
         SET canvas_url = EXCLUDED.canvas_url, \
             token_encrypted = EXCLUDED.token_encrypted, \
             updated_at = now() \
         RETURNING canvas_url, updated_at",
    )
    .bind(user_id)
    .bind(canvas_url)
    .bind(canvas_token)
    .bind(encryption_key)
    .fetch_one(pool)
    .await
}
