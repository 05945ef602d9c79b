use serde::{Deserialize, Serialize};

/// Global role a user holds. Static: the set is fixed at compile time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control over every collection, including the vault.
    Admin,
    /// Manages users and libraries of their own associations.
    Manager,
    /// Read-only access to their own associations' libraries.
    Member,
}

impl Role {
    /// Human-readable label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Manager => "Association manager",
            Role::Member => "Member",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full access to users, associations, music databases and the credential vault.",
            Role::Manager => {
                "Can manage users and music databases of the associations they belong to."
            }
            Role::Member => "Read-only access to the music databases of their associations.",
        }
    }

    /// Parse from the string value stored in JSON.
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    /// Serialise to the string value stored in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }

    /// All roles, in display order.
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Manager, Role::Member]
    }

    pub fn definition(&self) -> RoleDefinition {
        RoleDefinition {
            id: self.as_str().to_string(),
            name: self.label().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// A row of `roles.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_roundtrip() {
        for role in Role::all() {
            let parsed = Role::from_str(role.as_str()).expect("should parse back");
            assert_eq!(role, &parsed);
        }
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::from_str(" Admin "), Some(Role::Admin));
    }

    #[test]
    fn role_invalid_returns_none() {
        assert!(Role::from_str("superuser").is_none());
    }

    #[test]
    fn definition_uses_storage_id() {
        let def = Role::Manager.definition();
        assert_eq!(def.id, "manager");
        assert!(!def.description.is_empty());
    }
}
