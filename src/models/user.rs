use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Dm,
    ReadOnly,
    /// Any other role string; treated as a regular member.
    Standard(String),
}

impl Role {
    /// Roles allowed to toggle chat access and send broadcasts.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Dm)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Dm => "dm",
            Role::ReadOnly => "read-only",
            Role::Standard(other) => other,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Role::Admin,
            "dm" => Role::Dm,
            "read-only" => Role::ReadOnly,
            _ => Role::Standard(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Standard("member".to_string())
    }
}

/// The signed-in identity. Created on login, destroyed on logout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl Session {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Anonymous")
    }
}

/// Result row of the `check_user_login` RPC.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub needs_password_change: bool,
}

impl LoginUser {
    pub fn into_session(self) -> Option<Session> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Session {
            id,
            name: self.name,
            role: self.role.unwrap_or_default(),
            profile_picture: self.profile_picture.filter(|p| !p.is_empty()),
        })
    }
}

/// Avatar lookup row of the `users` table.
#[derive(Clone, Debug, Deserialize)]
pub struct UserRow {
    pub id: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}
