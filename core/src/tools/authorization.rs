//! Deletion authorization shared by the planner, the DELETE tool and the
//! orchestrator for the lifetime of one user request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

/// Whether the user asked for deletion outright, or confirmed it later.
#[derive(Debug, Default)]
pub struct DeleteAuthorization {
    requested: AtomicBool,
    confirmed: AtomicBool,
}

impl DeleteAuthorization {
    /// No deletion requested, nothing confirmed
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the initial state from the user's own words
    pub fn from_request(request: &str) -> Self {
        let auth = Self::new();
        auth.requested
            .store(request_demands_deletion(request), Ordering::SeqCst);
        auth
    }

    /// Like [`from_request`](Self::from_request), but the thing to delete
    /// must also name one of `resources` (see
    /// [`OperationCatalog::delete_resources`](crate::OperationCatalog::delete_resources)).
    /// "Remove a lamp from my cart" does not ask for `DELETE /users/{id}/cart`.
    pub fn from_request_scoped(request: &str, resources: &[String]) -> Self {
        let requested = deletion_targets(request).iter().any(|target| {
            target
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(resource_stem)
                .any(|w| resources.iter().any(|r| *r == w))
        });
        let auth = Self::new();
        auth.requested.store(requested, Ordering::SeqCst);
        auth
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed.load(Ordering::SeqCst)
    }

    /// Record that the user confirmed deletion
    pub fn confirm(&self) {
        info!(target: "authorization", "Deletion confirmed by user");
        self.confirmed.store(true, Ordering::SeqCst);
    }

    /// DELETE requests may be sent
    pub fn allows_delete(&self) -> bool {
        self.requested() || self.confirmed()
    }
}

fn deletion_verb() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(delete[sd]?|deleting|remove[sd]?|removing|erase[sd]?|erasing|destroy(s|ed|ing)?|wipe[sd]?|wiping)\b",
        )
        .expect("static regex")
    })
}

/// Punctuation and conjunctions that start a new clause
fn clause_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[.;:!?,]|\b(but|and|then|instead|just|from)\b").expect("static regex")
    })
}

fn negation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(not|never|no|without|avoid|nothing)\b|n['’]t\b").expect("static regex")
    })
}

/// The object phrase of every deletion verb that is not negated within its
/// own clause, e.g. `"my cart"` for "please delete my cart, then add a lamp".
pub fn deletion_targets(request: &str) -> Vec<&str> {
    deletion_verb()
        .find_iter(request)
        .filter(|verb| {
            let before = &request[..verb.start()];
            let clause_start = clause_break()
                .find_iter(before)
                .last()
                .map(|m| m.end())
                .unwrap_or(0);
            !negation().is_match(&before[clause_start..])
        })
        .map(|verb| {
            let after = &request[verb.end()..];
            let end = clause_break()
                .find(after)
                .map(|m| m.start())
                .unwrap_or(after.len());
            after[..end].trim()
        })
        .collect()
}

/// The request itself asks to delete, remove, erase, destroy or wipe something,
/// and does not say not to.
pub fn request_demands_deletion(request: &str) -> bool {
    !deletion_targets(request).is_empty()
}

/// Lowercased word with a plural `s` dropped, so `users` and `user` compare equal
pub fn resource_stem(word: &str) -> String {
    let lower = word.to_lowercase();
    match lower.strip_suffix('s') {
        Some(stem) if stem.len() > 2 && !stem.ends_with('s') => stem.to_string(),
        _ => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_resources() -> Vec<String> {
        vec!["user".to_string(), "cart".to_string()]
    }

    #[test]
    fn explicit_requests_are_detected() {
        for text in [
            "I want to delete my cart",
            "Please REMOVE the lamp",
            "wipe my order history",
            "erase pet 7",
            "I don't care about the old one, delete my cart",
        ] {
            assert!(request_demands_deletion(text), "{text}");
        }
    }

    #[test]
    fn implicit_requests_are_not() {
        for text in ["I want to start a new cart", "add a couch", "undeleted items please"] {
            assert!(!request_demands_deletion(text), "{text}");
        }
    }

    #[test]
    fn negated_requests_are_not() {
        for text in [
            "Show my cart but do not delete anything",
            "don't remove my cart, just add a lamp",
            "Never erase my order history",
            "add a lamp without removing anything",
        ] {
            assert!(!request_demands_deletion(text), "{text}");
            assert!(!DeleteAuthorization::from_request(text).allows_delete(), "{text}");
        }
    }

    #[test]
    fn targets_stop_at_the_clause_end() {
        assert_eq!(
            deletion_targets("please delete my cart, then add a lamp"),
            vec!["my cart"]
        );
        assert_eq!(deletion_targets("Remove a lamp from my cart"), vec!["a lamp"]);
    }

    #[test]
    fn scoped_requests_must_name_a_deletable_resource() {
        let resources = cart_resources();
        assert!(DeleteAuthorization::from_request_scoped("Delete my carts", &resources).requested());
        assert!(DeleteAuthorization::from_request_scoped("please wipe user 7's cart", &resources)
            .requested());
        assert!(!DeleteAuthorization::from_request_scoped("Remove a lamp from my cart", &resources)
            .requested());
        assert!(!DeleteAuthorization::from_request_scoped("don't delete my cart", &resources)
            .requested());
        assert!(!DeleteAuthorization::from_request_scoped("delete my cart", &[]).requested());
    }

    #[test]
    fn stems_plurals() {
        assert_eq!(resource_stem("Users"), "user");
        assert_eq!(resource_stem("cart"), "cart");
        assert_eq!(resource_stem("address"), "address");
        assert_eq!(resource_stem("is"), "is");
    }

    #[test]
    fn confirmation_unlocks_delete() {
        let auth = DeleteAuthorization::from_request("start a new cart");
        assert!(!auth.allows_delete());
        auth.confirm();
        assert!(auth.confirmed());
        assert!(auth.allows_delete());
        assert!(!auth.requested());
    }
}
