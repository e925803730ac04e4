/// Database row types — these map directly to SQLite rows.
/// Distinct from patchboard-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_verified: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<String>,
    pub created_at: String,
}

pub struct BoardRow {
    pub user_id: String,
    pub image_url: String,
    pub patches: String,
    pub updated_at: String,
}
