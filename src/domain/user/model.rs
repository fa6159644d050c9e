use chrono::{DateTime, Utc};

/// User aggregate, handled as a value snapshot.
///
/// All mutations go through the small command methods below so the paired
/// optional fields stay consistent: `confirmation_code` is set iff
/// `confirmation_code_expires_at` is set, and likewise for the refresh token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub email_confirmed: bool,
    pub confirmation_code: Option<String>,
    pub confirmation_code_expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new unconfirmed user with a pending confirmation code.
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
        confirmation_code: String,
        code_expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            email_confirmed: false,
            confirmation_code: Some(confirmation_code),
            confirmation_code_expires_at: Some(code_expires_at),
            refresh_token: None,
            refresh_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clear the live code pair and mark the address confirmed.
    pub fn mark_confirmed(&mut self, now: DateTime<Utc>) {
        self.confirmation_code = None;
        self.confirmation_code_expires_at = None;
        self.email_confirmed = true;
        self.updated_at = now;
    }

    /// Replace the live code pair and reopen confirmation.
    pub fn reissue_confirmation(
        &mut self,
        code: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.confirmation_code = Some(code);
        self.confirmation_code_expires_at = Some(expires_at);
        self.email_confirmed = false;
        self.updated_at = now;
    }

    pub fn set_refresh_token(
        &mut self,
        token: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.refresh_token = Some(token);
        self.refresh_token_expires_at = Some(expires_at);
        self.updated_at = now;
    }

    /// Invalidate the current refresh token (single-use rotation).
    pub fn clear_refresh_token(&mut self, now: DateTime<Utc>) {
        self.refresh_token = None;
        self.refresh_token_expires_at = None;
        self.updated_at = now;
    }
}
