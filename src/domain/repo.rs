use std::fmt;

/// Organization member, identified by login
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Member {
    pub login: String,
}

impl Member {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// GitHub Repository (never a fork)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// "owner/name"
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Sort members by login and drop repeated logins
pub fn normalize_members(mut members: Vec<Member>) -> Vec<Member> {
    members.sort();
    members.dedup();
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let repo = Repository::new("octo-org", "hello-world");
        assert_eq!(repo.full_name(), "octo-org/hello-world");
        assert_eq!(repo.to_string(), "octo-org/hello-world");
    }

    #[test]
    fn test_normalize_members_sorts_and_dedups() {
        let members = vec![
            Member::new("carol"),
            Member::new("alice"),
            Member::new("bob"),
            Member::new("alice"),
        ];
        let logins: Vec<_> = normalize_members(members)
            .into_iter()
            .map(|m| m.login)
            .collect();
        assert_eq!(logins, vec!["alice", "bob", "carol"]);
    }
}
