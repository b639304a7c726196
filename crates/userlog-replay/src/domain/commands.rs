//! Commands for user mutations.

/// Command to create a user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
}

/// Command to overwrite a user's mutable fields.
#[derive(Debug, Clone)]
pub struct EditUser {
    /// The user to edit.
    pub id: i64,
    /// New login name.
    pub username: String,
    /// New contact address.
    pub email: String,
}
