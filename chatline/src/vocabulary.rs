//! Command vocabulary: the fixed base commands plus the users currently
//! connected to the server.
//!
//! The user set is replaced wholesale whenever the server pushes a roster
//! (see [`crate::classifier`]). Iteration order follows the last roster
//! received so suggestion order is stable between keystrokes.

/// Base commands understood by the chat server, in suggestion order.
pub const BASE_COMMANDS: &[&str] = &[
    "list", "sessions", "stop", "chat:", "file", "accept", "deny", "exit",
];

/// Commands whose argument after `:` is completed from the known users.
pub const USER_ARGUMENT_COMMANDS: &[&str] = &["chat", "stop"];

/// Base commands plus the known user identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    known_users: Vec<String>,
}

impl Vocabulary {
    /// Create a vocabulary with no known users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vocabulary pre-loaded with a roster.
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary = Self::new();
        vocabulary.replace_users(users);
        vocabulary
    }

    /// Replace the known users with `users`, dropping empty names.
    ///
    /// Duplicates keep their first position.
    pub fn replace_users<I, S>(&mut self, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next: Vec<String> = Vec::new();
        for user in users {
            let user = user.into();
            if !user.is_empty() && !next.contains(&user) {
                next.push(user);
            }
        }
        tracing::debug!("roster replaced: {} known users", next.len());
        self.known_users = next;
    }

    /// The fixed base commands.
    pub fn base_commands(&self) -> &'static [&'static str] {
        BASE_COMMANDS
    }

    /// Users from the most recent roster.
    pub fn known_users(&self) -> &[String] {
        &self.known_users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_commands_are_fixed_and_ordered() {
        let vocabulary = Vocabulary::new();
        assert_eq!(
            vocabulary.base_commands(),
            &["list", "sessions", "stop", "chat:", "file", "accept", "deny", "exit"]
        );
    }

    #[test]
    fn replace_users_drops_empty_names() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.replace_users(["Ana", "", "Bob", ""]);
        assert_eq!(vocabulary.known_users(), &["Ana", "Bob"]);
    }

    #[test]
    fn replace_users_is_wholesale() {
        let mut vocabulary = Vocabulary::with_users(["Ana", "Bob"]);
        vocabulary.replace_users(["Carla"]);
        assert_eq!(vocabulary.known_users(), &["Carla"]);
    }

    #[test]
    fn replace_users_is_idempotent() {
        let mut once = Vocabulary::new();
        once.replace_users(["Ana", "Bob", "Ana"]);
        let mut twice = once.clone();
        twice.replace_users(["Ana", "Bob", "Ana"]);
        assert_eq!(once, twice);
        assert_eq!(once.known_users(), &["Ana", "Bob"]);
    }

    #[test]
    fn empty_roster_clears_users() {
        let mut vocabulary = Vocabulary::with_users(["Ana"]);
        vocabulary.replace_users(Vec::<String>::new());
        assert!(vocabulary.known_users().is_empty());
    }
}
