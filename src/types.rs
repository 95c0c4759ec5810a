/// Shared types used across the codebase

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles understood by the dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Builder,
    Telecaller,
    Broker,
    Ca,
    User,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Builder,
        Role::Telecaller,
        Role::Broker,
        Role::Ca,
        Role::User,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use Role::*;
        match self {
            SuperAdmin => "super_admin",
            Admin => "admin",
            Builder => "builder",
            Telecaller => "telecaller",
            Broker => "broker",
            Ca => "ca",
            User => "user",
        }
    }

    pub const fn label(&self) -> &'static str {
        use Role::*;
        match self {
            SuperAdmin => "Super Admin",
            Admin => "Admin",
            Builder => "Builder",
            Telecaller => "Telecaller",
            Broker => "Broker",
            Ca => "Chartered Accountant",
            User => "User",
        }
    }

    /// Unknown codes yield `None`; callers treat that as "no navigation"
    pub fn from_code(code: &str) -> Option<Self> {
        use Role::*;
        match code.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" => Some(SuperAdmin),
            "admin" => Some(Admin),
            "builder" => Some(Builder),
            "telecaller" => Some(Telecaller),
            "broker" => Some(Broker),
            "ca" => Some(Ca),
            "user" => Some(User),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_admin_or_higher(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_code(s).ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// The authenticated identity driving access control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
}

impl Principal {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Full name when known, otherwise the username
    pub fn display_name(&self) -> String {
        let full_name = self.full_name();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name
        }
    }
}

/// Backend ids arrive as numbers or strings depending on the endpoint
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(id_to_string(&value).unwrap_or_default())
}

pub(crate) fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
