use sqlx::PgPool;

/// Token storage depends on pgcrypto, so a reachable database without it is still unusable.
pub(crate) async fn check(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let installed: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM pg_extension WHERE extname = 'pgcrypto'")
            .fetch_optional(pool)
            .await?;
    Ok(installed.is_some())
}
