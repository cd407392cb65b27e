//! Typed lookup criteria and field assignments for [`User`](super::User).

use serde_json::{Map, Value as Json};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{Result, StoreError};
use crate::user::Field;

/// Value bound to a column in a generated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Integer(i64),
    Text(Option<String>),
}

impl Value {
    /// Push the value as a bind parameter.
    pub(crate) fn push_bind<'args>(self, query: &mut QueryBuilder<'args, Sqlite>) {
        match self {
            Value::Integer(value) => query.push_bind(value),
            Value::Text(value) => query.push_bind(value),
        };
    }
}

/// Criteria for [`UserStore::find_user_by`](super::UserStore::find_user_by).
///
/// Every present field must match; absent fields are ignored. Nullable
/// columns take `Some(None)` to match `NULL`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub session_id: Option<Option<String>>,
    pub reset_token: Option<Option<String>>,
}

impl UserFilter {
    /// Match on `id`.
    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Match on `email`.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Match on `hashed_password`.
    pub fn hashed_password(mut self, hashed_password: impl Into<String>) -> Self {
        self.hashed_password = Some(hashed_password.into());
        self
    }

    /// Match on `session_id`. `None` selects users without a session.
    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Match on `reset_token`. `None` selects users without a reset in
    /// progress.
    pub fn reset_token(mut self, reset_token: Option<String>) -> Self {
        self.reset_token = Some(reset_token);
        self
    }

    /// Build a filter from a JSON object keyed by column name.
    ///
    /// Unknown keys and mistyped values fail with
    /// [`StoreError::InvalidFilter`].
    pub fn from_json(object: &Json) -> Result<Self> {
        let object = object.as_object().ok_or_else(|| {
            StoreError::InvalidFilter("filter must be an object".into())
        })?;

        let mut filter = Self::default();
        for (key, value) in object {
            let field = key
                .parse::<Field>()
                .map_err(|err| StoreError::InvalidFilter(err.to_string()))?;
            let mistyped =
                || StoreError::InvalidFilter(format!("wrong type for '{key}'"));

            match field {
                Field::Id => filter.id = Some(value.as_i64().ok_or_else(mistyped)?),
                Field::Email => filter.email = Some(text(value).ok_or_else(mistyped)?),
                Field::HashedPassword => {
                    filter.hashed_password = Some(text(value).ok_or_else(mistyped)?)
                },
                Field::SessionId => {
                    filter.session_id = Some(nullable_text(value).ok_or_else(mistyped)?)
                },
                Field::ResetToken => {
                    filter.reset_token = Some(nullable_text(value).ok_or_else(mistyped)?)
                },
            }
        }

        Ok(filter)
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.criteria().is_empty()
    }

    /// Present fields with their expected values, in column order.
    pub(crate) fn criteria(&self) -> Vec<(Field, Value)> {
        let mut criteria = Vec::new();
        if let Some(id) = self.id {
            criteria.push((Field::Id, Value::Integer(id)));
        }
        let required = [
            (Field::Email, &self.email),
            (Field::HashedPassword, &self.hashed_password),
        ];
        for (field, value) in required {
            if let Some(value) = value {
                criteria.push((field, Value::Text(Some(value.clone()))));
            }
        }
        let nullable = [
            (Field::SessionId, &self.session_id),
            (Field::ResetToken, &self.reset_token),
        ];
        for (field, value) in nullable {
            if let Some(value) = value {
                criteria.push((field, Value::Text(value.clone())));
            }
        }
        criteria
    }
}

/// Changes for [`UserStore::update_user`](super::UserStore::update_user).
///
/// Nullable columns take `Some(None)` to be cleared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub session_id: Option<Option<String>>,
    pub reset_token: Option<Option<String>>,
}

impl UserUpdate {
    /// Update `email` field on [`UserUpdate`].
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Update `hashed_password` field on [`UserUpdate`].
    pub fn hashed_password(mut self, hashed_password: impl Into<String>) -> Self {
        self.hashed_password = Some(hashed_password.into());
        self
    }

    /// Update `session_id` field on [`UserUpdate`].
    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Update `reset_token` field on [`UserUpdate`].
    pub fn reset_token(mut self, reset_token: Option<String>) -> Self {
        self.reset_token = Some(reset_token);
        self
    }

    /// Build an update from a JSON object keyed by column name.
    ///
    /// Keys are checked in the order the caller wrote them. The first
    /// unknown key, `id`, or mistyped value aborts with
    /// [`StoreError::InvalidAttribute`] naming that key.
    pub fn from_json(object: &Json) -> Result<Self> {
        let object: &Map<String, Json> = object.as_object().ok_or_else(|| {
            StoreError::InvalidAttribute("update must be an object".into())
        })?;

        let mut update = Self::default();
        for (key, value) in object {
            let invalid = || StoreError::InvalidAttribute(key.clone());
            let field = key.parse::<Field>().map_err(|_| invalid())?;

            match field {
                // identifiers never change.
                Field::Id => return Err(invalid()),
                Field::Email => update.email = Some(text(value).ok_or_else(invalid)?),
                Field::HashedPassword => {
                    update.hashed_password = Some(text(value).ok_or_else(invalid)?)
                },
                Field::SessionId => {
                    update.session_id = Some(nullable_text(value).ok_or_else(invalid)?)
                },
                Field::ResetToken => {
                    update.reset_token = Some(nullable_text(value).ok_or_else(invalid)?)
                },
            }
        }

        Ok(update)
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    /// Present fields with their new values, in column order.
    pub(crate) fn assignments(&self) -> Vec<(Field, Value)> {
        let required = [
            (Field::Email, &self.email),
            (Field::HashedPassword, &self.hashed_password),
        ];
        let nullable = [
            (Field::SessionId, &self.session_id),
            (Field::ResetToken, &self.reset_token),
        ];

        required
            .into_iter()
            .filter_map(|(field, value)| {
                value.clone().map(|value| (field, Value::Text(Some(value))))
            })
            .chain(nullable.into_iter().filter_map(|(field, value)| {
                value.clone().map(|value| (field, Value::Text(value)))
            }))
            .collect()
    }
}

fn text(value: &Json) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn nullable_text(value: &Json) -> Option<Option<String>> {
    match value {
        Json::Null => Some(None),
        Json::String(value) => Some(Some(value.clone())),
        _ => None,
    }
}
