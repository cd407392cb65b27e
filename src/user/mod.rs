mod filter;
mod repository;

pub use filter::*;
pub use repository::*;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// User as saved on database.
///
/// `email` carries no uniqueness constraint: lookups by email return the
/// first matching row.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, sqlx::FromRow,
)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip)]
    pub hashed_password: String,
    #[serde(skip)]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub reset_token: Option<String>,
}

/// Column of the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Email,
    HashedPassword,
    SessionId,
    ResetToken,
}

impl Field {
    /// Every recognized column, in table order.
    pub const ALL: [Field; 5] = [
        Field::Id,
        Field::Email,
        Field::HashedPassword,
        Field::SessionId,
        Field::ResetToken,
    ];

    /// Column name as written in SQL.
    pub fn column(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Email => "email",
            Field::HashedPassword => "hashed_password",
            Field::SessionId => "session_id",
            Field::ResetToken => "reset_token",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Name does not match any column of [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.column() == name)
            .ok_or_else(|| UnknownField(name.to_owned()))
    }
}
