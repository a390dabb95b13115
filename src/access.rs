//! Role-based access control. Permissions belong to roles, and callers
//! present either a role or one of the two fixed identities.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::info;
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sql::parser::Keyword;

/// The role holding every permission.
pub const ADMIN: &str = "admin";
/// The role given to users first named by a GRANT.
pub const DEFAULT_ROLE: &str = "readonly";

/// A statement verb that can be granted to a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Grant,
    Revoke,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Self::Select,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Create,
        Self::Drop,
        Self::Alter,
        Self::Grant,
        Self::Revoke,
    ];

    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        Some(match keyword {
            Keyword::Select => Self::Select,
            Keyword::Insert => Self::Insert,
            Keyword::Update => Self::Update,
            Keyword::Delete => Self::Delete,
            Keyword::Create => Self::Create,
            Keyword::Drop => Self::Drop,
            Keyword::Alter => Self::Alter,
            Keyword::Grant => Self::Grant,
            Keyword::Revoke => Self::Revoke,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity a statement is executed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    /// The embedding process itself, which is trusted with everything.
    Local,
    /// An unauthenticated caller, which holds no permissions.
    Anonymous,
    /// A caller acting under a named role.
    Role(String),
}

impl From<Option<&str>> for Caller {
    fn from(role: Option<&str>) -> Self {
        match role {
            Some(role) => Self::Role(role.to_string()),
            None => Self::Local,
        }
    }
}

impl From<&str> for Caller {
    fn from(role: &str) -> Self {
        Self::Role(role.to_string())
    }
}

/// A stored user account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Argon2id hash in PHC string form, carrying its own salt. Users
    /// registered through GRANT have no password and cannot log in.
    pub password_hash: Option<String>,
    pub role: String,
}

/// A user as reported to callers, without credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: String,
}

/// Roles and users, and the gate that checks callers against them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Access {
    roles: BTreeMap<String, BTreeSet<Permission>>,
    users: BTreeMap<String, User>,
}

impl Default for Access {
    fn default() -> Self {
        let read: BTreeSet<_> = [Permission::Select].into_iter().collect();
        let write = [Permission::Select, Permission::Insert, Permission::Update, Permission::Delete];
        let mut roles = BTreeMap::new();
        roles.insert(ADMIN.to_string(), Permission::ALL.into_iter().collect());
        roles.insert("operator".to_string(), write.into_iter().collect());
        roles.insert("readonly".to_string(), read.clone());
        roles.insert("viewer".to_string(), read);
        Self { roles, users: BTreeMap::new() }
    }
}

impl Access {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores roles and users, as read from a snapshot.
    pub fn from_parts(roles: BTreeMap<String, BTreeSet<Permission>>, users: BTreeMap<String, User>) -> Self {
        Self { roles, users }
    }

    pub fn roles(&self) -> &BTreeMap<String, BTreeSet<Permission>> {
        &self.roles
    }

    pub fn role(&self, name: &str) -> Option<&BTreeSet<Permission>> {
        self.roles.get(name)
    }

    pub fn user_records(&self) -> &BTreeMap<String, User> {
        &self.users
    }

    /// Checks whether a caller holds a permission. Unknown roles hold none.
    pub fn allows(&self, caller: &Caller, permission: Permission) -> bool {
        match caller {
            Caller::Local => true,
            Caller::Anonymous => false,
            Caller::Role(role) if role == ADMIN => true,
            Caller::Role(role) => self.role(role).map_or(false, |p| p.contains(&permission)),
        }
    }

    /// Like allows(), but errors with the missing permission.
    pub fn authorize(&self, caller: &Caller, permission: Permission) -> Result<()> {
        match self.allows(caller, permission) {
            true => Ok(()),
            false => Err(Error::PermissionDenied(permission)),
        }
    }

    /// Registers a user, replacing any existing account of the same name.
    pub fn add_user(&mut self, username: &str, password: &str, role: &str) -> Result<()> {
        if username.is_empty() {
            return Err(Error::Validation("Username cannot be empty".into()));
        }
        if !self.roles.contains_key(role) {
            return Err(Error::Validation(format!("Unknown role {}", role)));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();
        self.users.insert(username.to_string(), User { password_hash: Some(hash), role: role.to_string() });
        info!("Registered user {} with role {}", username, role);
        Ok(())
    }

    /// Removes a user, returning whether it existed.
    pub fn remove_user(&mut self, username: &str) -> bool {
        self.users.remove(username).is_some()
    }

    /// Checks a password, returning the user's identity if it matches.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        let user = self.users.get(username)?;
        let hash = PasswordHash::new(user.password_hash.as_deref()?).ok()?;
        Argon2::default().verify_password(password.as_bytes(), &hash).ok()?;
        Some(Identity { username: username.to_string(), role: user.role.clone() })
    }

    /// Lists users in name order.
    pub fn users(&self) -> Vec<Identity> {
        self.users
            .iter()
            .map(|(username, user)| Identity { username: username.clone(), role: user.role.clone() })
            .collect()
    }

    /// Applies a GRANT. Roles are fixed, so a grant only makes sure the
    /// grantee exists, registering an unknown one with the default role.
    pub fn grant(&mut self, grantee: &str) -> Result<()> {
        if grantee.is_empty() {
            return Err(Error::Validation("Grantee cannot be empty".into()));
        }
        if !self.users.contains_key(grantee) {
            info!("Registering grantee {} with role {}", grantee, DEFAULT_ROLE);
            self.users
                .insert(grantee.to_string(), User { password_hash: None, role: DEFAULT_ROLE.to_string() });
        }
        Ok(())
    }
}
