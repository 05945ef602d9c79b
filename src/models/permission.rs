use serde::{Deserialize, Serialize};

use super::role::Role;

/// Fine-grained action a user may perform.
/// Every service operation is mapped to one of these actions; the
/// association scope check happens separately in the visibility filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // ── User actions ───────────────────────────────────────────────────
    /// View the user list.
    ViewUsers,
    /// Create a new user account.
    CreateUser,
    /// Change a user's global role.
    UpdateUserRole,
    /// Change which associations a user belongs to.
    ManageUserAssociations,
    /// Set a new password for another user.
    ResetUserPassword,
    /// Remove a user account.
    DeleteUser,

    // ── Association actions ────────────────────────────────────────────
    /// View associations.
    ViewAssociations,
    /// Create a new association.
    CreateAssociation,
    /// Rename or re-describe an association.
    EditAssociation,
    /// Delete an association.
    DeleteAssociation,

    // ── Music database actions ─────────────────────────────────────────
    /// View music databases and their records.
    ViewLibraries,
    /// Create, rename and delete music databases.
    ManageLibraries,
    /// Add, change, remove or import records.
    EditRecords,

    // ── Vault ──────────────────────────────────────────────────────────
    /// Read and modify the credential vault.
    ManageVault,
    /// Run consistency checks and repairs across files.
    RunMaintenance,
}

impl Permission {
    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Permission::ViewUsers => "View Users",
            Permission::CreateUser => "Create User",
            Permission::UpdateUserRole => "Update User Role",
            Permission::ManageUserAssociations => "Manage User Associations",
            Permission::ResetUserPassword => "Reset User Password",
            Permission::DeleteUser => "Delete User",
            Permission::ViewAssociations => "View Associations",
            Permission::CreateAssociation => "Create Association",
            Permission::EditAssociation => "Edit Association",
            Permission::DeleteAssociation => "Delete Association",
            Permission::ViewLibraries => "View Music Databases",
            Permission::ManageLibraries => "Manage Music Databases",
            Permission::EditRecords => "Edit Records",
            Permission::ManageVault => "Manage Credential Vault",
            Permission::RunMaintenance => "Run Maintenance",
        }
    }

    /// Returns every permission that the given role implicitly grants.
    ///
    /// - `admin`   → all permissions.
    /// - `manager` → user and library management, editing their associations;
    ///               no association create/delete, no vault, no maintenance.
    /// - `member`  → read-only permissions only.
    pub fn for_role(role: Role) -> Vec<Permission> {
        match role {
            Role::Admin => Self::all().to_vec(),
            Role::Manager => vec![
                Permission::ViewUsers,
                Permission::CreateUser,
                Permission::UpdateUserRole,
                Permission::ManageUserAssociations,
                Permission::ResetUserPassword,
                Permission::DeleteUser,
                Permission::ViewAssociations,
                Permission::EditAssociation,
                Permission::ViewLibraries,
                Permission::ManageLibraries,
                Permission::EditRecords,
            ],
            Role::Member => vec![
                Permission::ViewUsers,
                Permission::ViewAssociations,
                Permission::ViewLibraries,
            ],
        }
    }

    /// Check whether a role string from storage grants this permission.
    /// Unknown roles grant nothing.
    pub fn is_allowed_for_role(&self, role: &str) -> bool {
        Role::from_str(role)
            .map(|r| Self::for_role(r).contains(self))
            .unwrap_or(false)
    }

    /// All defined permissions in a stable display order.
    pub fn all() -> &'static [Permission] {
        &[
            Permission::ViewUsers,
            Permission::CreateUser,
            Permission::UpdateUserRole,
            Permission::ManageUserAssociations,
            Permission::ResetUserPassword,
            Permission::DeleteUser,
            Permission::ViewAssociations,
            Permission::CreateAssociation,
            Permission::EditAssociation,
            Permission::DeleteAssociation,
            Permission::ViewLibraries,
            Permission::ManageLibraries,
            Permission::EditRecords,
            Permission::ManageVault,
            Permission::RunMaintenance,
        ]
    }
}
