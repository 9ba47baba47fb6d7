use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A distinct user, keyed by normalized email. Created on first successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
