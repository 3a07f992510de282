//! sql.users — Accounts allowed to log in to the gateway.

use diesel::prelude::*;
use serde::Serialize;

use crate::schema::sql_users;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = sql_users)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Django-format password hash.
    #[serde(skip_serializing)]
    pub password: String,
    pub display: String,
    pub role: String,
    pub is_active: bool,
}
