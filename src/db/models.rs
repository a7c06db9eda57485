use sqlx::FromRow;
use time::OffsetDateTime;

/// A user's Canvas connection with the token already decrypted.
#[derive(Clone, FromRow)]
pub(crate) struct CanvasCredentials {
    pub(crate) user_id: String,
    pub(crate) canvas_url: String,
    pub(crate) canvas_token: String,
}

/// Stored connection details without the token.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct CredentialsSummary {
    pub(crate) canvas_url: String,
    pub(crate) updated_at: OffsetDateTime,
}

impl std::fmt::Debug for CanvasCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasCredentials")
            .field("user_id", &self.user_id)
            .field("canvas_url", &self.canvas_url)
            .field("canvas_token", &"<redacted>")
            .finish()
    }
}
