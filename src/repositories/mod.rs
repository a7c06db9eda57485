pub(crate) mod canvas_credentials;
pub(crate) mod health;
