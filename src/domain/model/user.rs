use crate::domain::error::Rejection;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Public header of a world (name and image), stored apart from the world
/// document so members can list their worlds cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldHeader {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl WorldHeader {
    pub fn new(name: String) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name,
            image: None,
        }
    }
}

/// Link from a user to a world: the header id and the world document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub header_id: String,
    pub world_id: String,
}

/// User entity. The id is the lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub worlds: Vec<Membership>,
    pub current_world: Option<String>,
    pub image: Option<String>,
}

impl User {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            worlds: Vec::new(),
            current_world: None,
            image: None,
        }
    }

    /// Creates a user for an invited email, named after its local part.
    pub fn from_email(email: &str) -> Result<Self, Rejection> {
        let id = normalize_email(email)?;
        let name = email
            .trim()
            .rsplit_once('@')
            .map(|(local, _)| local.to_string())
            .unwrap_or_default();
        Ok(Self::new(id, name))
    }

    pub fn membership(&self, world_id: &str) -> Option<&Membership> {
        self.worlds.iter().find(|m| m.world_id == world_id)
    }

    pub fn is_member(&self, world_id: &str) -> bool {
        self.membership(world_id).is_some()
    }

    pub fn join(&mut self, membership: Membership) {
        if !self.is_member(&membership.world_id) {
            self.worlds.push(membership);
        }
    }

    /// Drops the membership for `world_id`, deselecting it if current.
    pub fn leave(&mut self, world_id: &str) -> Option<Membership> {
        let index = self.worlds.iter().position(|m| m.world_id == world_id)?;
        if self.current_world.as_deref() == Some(world_id) {
            self.current_world = None;
        }
        Some(self.worlds.remove(index))
    }
}

/// Validates an email address and returns the user id derived from it.
pub fn normalize_email(email: &str) -> Result<String, Rejection> {
    let email = email.trim();
    let invalid = || Rejection::InvalidEmail(email.to_string());

    let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;
    let word = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+'))
            && !s.starts_with(['.', '-'])
            && !s.ends_with(['.', '-'])
    };
    if !word(local) || !word(domain) {
        return Err(invalid());
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(email.to_lowercase()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ana@Example.com "), Ok("ana@example.com".into()));
        assert_eq!(normalize_email("a.b-c@mail.co.uk"), Ok("a.b-c@mail.co.uk".into()));
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@localhost").is_err());
        assert!(normalize_email("ana@example.c").is_err());
        assert!(normalize_email("a na@example.com").is_err());
    }

    #[test]
    fn test_from_email_names_user() {
        let user = User::from_email("Ana.Lopez@Example.com").unwrap();
        assert_eq!(user.id, "ana.lopez@example.com");
        assert_eq!(user.name, "Ana.Lopez");
    }

    #[test]
    fn test_leave_clears_current_world() {
        let mut user = User::new("a@x.io".into(), "a".into());
        user.join(Membership {
            header_id: "h1".into(),
            world_id: "w1".into(),
        });
        user.join(Membership {
            header_id: "h1".into(),
            world_id: "w1".into(),
        });
        assert_eq!(user.worlds.len(), 1);

        user.current_world = Some("w1".into());
        assert!(user.leave("w1").is_some());
        assert_eq!(user.current_world, None);
        assert!(user.leave("w1").is_none());
    }
}
