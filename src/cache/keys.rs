//! Cache key definitions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Identifies one cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query_hash: u64,
    /// Hash of the session cookie; `0` for anonymous requests.
    pub session_hash: u64,
}

impl ResponseKey {
    pub fn new(path: &str, query: Option<&str>, session: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            query_hash: hash_value(query.unwrap_or("")),
            session_hash: session.map(hash_value).unwrap_or(0),
        }
    }
}

fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_and_session_split_keys() {
        let anon = ResponseKey::new("/", None, None);
        assert_eq!(anon, ResponseKey::new("/", Some(""), None));
        assert_ne!(anon, ResponseKey::new("/", Some("page=2"), None));
        assert_ne!(anon, ResponseKey::new("/", None, Some("abc.def")));
        assert_ne!(
            ResponseKey::new("/", None, Some("abc.def")),
            ResponseKey::new("/", None, Some("abc.xyz"))
        );
    }
}
