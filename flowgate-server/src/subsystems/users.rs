use super::SubsystemError;
use flowgate_props::Props;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub const USERS_KEY: &str = "user.manager.users";

/// A known user and the roles granted to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub roles: Vec<String>,
}

/// Identity subsystem.
pub trait UserManager: Send + Sync {
    fn user_count(&self) -> usize;

    fn get_user(&self, name: &str) -> Option<User>;

    /// Check a password and return the user it belongs to.
    fn authenticate(&self, name: &str, password: &str) -> Result<User, SubsystemError>;

    fn shutdown(&self) -> Result<(), SubsystemError>;
}

/// Users declared in configuration.
///
/// Each entry of `user.manager.users` reads `name:password` or
/// `name:password:role1,role2`. Use the TOML array form when an entry
/// carries several roles.
pub struct InMemoryUserManager {
    users: BTreeMap<String, (String, User)>,
    shut_down: AtomicBool,
}

impl InMemoryUserManager {
    pub fn from_props(props: &Props) -> Result<Self, SubsystemError> {
        let mut users = BTreeMap::new();

        for entry in props.get_string_list(USERS_KEY)? {
            let mut parts = entry.splitn(3, ':');
            let name = parts.next().unwrap_or_default().trim();
            let password = parts.next().ok_or_else(|| {
                SubsystemError::Invalid(format!("User entry '{}' has no password", entry))
            })?;
            if name.is_empty() {
                let message = format!("User entry '{}' has no name", entry);
                return Err(SubsystemError::Invalid(message));
            }

            let roles = parts
                .next()
                .map(|roles| {
                    roles
                        .split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let user = User {
                name: name.to_string(),
                roles,
            };
            if users.insert(name.to_string(), (password.to_string(), user)).is_some() {
                return Err(SubsystemError::Invalid(format!("User '{}' declared twice", name)));
            }
        }

        tracing::debug!("Loaded {} users", users.len());
        Ok(Self {
            users,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl UserManager for InMemoryUserManager {
    fn user_count(&self) -> usize {
        self.users.len()
    }

    fn get_user(&self, name: &str) -> Option<User> {
        self.users.get(name).map(|(_, user)| user.clone())
    }

    fn authenticate(&self, name: &str, password: &str) -> Result<User, SubsystemError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SubsystemError::ShutDown("user manager"));
        }
        match self.users.get(name) {
            Some((expected, user)) if expected == password => Ok(user.clone()),
            _ => Err(SubsystemError::Invalid(format!("Bad credentials for '{}'", name))),
        }
    }

    fn shutdown(&self) -> Result<(), SubsystemError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(toml: &str) -> Result<InMemoryUserManager, SubsystemError> {
        InMemoryUserManager::from_props(&Props::from_str(None, toml).unwrap())
    }

    #[test]
    fn test_parses_entries_with_roles() {
        let users = manager(
            r#"
[user.manager]
users = ["admin:secret:admin,read", "guest:guest"]
"#,
        )
        .unwrap();

        assert_eq!(users.user_count(), 2);
        assert_eq!(users.get_user("admin").unwrap().roles, vec!["admin", "read"]);
        assert!(users.get_user("guest").unwrap().roles.is_empty());
    }

    #[test]
    fn test_authenticate() {
        let users = manager(r#"user.manager.users = "alice:pw""#).unwrap();
        assert_eq!(users.authenticate("alice", "pw").unwrap().name, "alice");
        assert!(users.authenticate("alice", "wrong").is_err());
        assert!(users.authenticate("bob", "pw").is_err());

        users.shutdown().unwrap();
        users.shutdown().unwrap();
        assert!(matches!(
            users.authenticate("alice", "pw"),
            Err(SubsystemError::ShutDown(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_entries() {
        assert!(manager(r#"user.manager.users = "nopassword""#).is_err());
        assert!(manager(r#"user.manager.users = ["a:1", "a:2"]"#).is_err());
        assert_eq!(manager("").unwrap().user_count(), 0);
    }
}
