//! Demo page definitions
//!
//! Each page shows one todo fetched through the query cache. The pages differ
//! only in how they shape the query key and in whether they offer a PUT.

use crate::query::{KeyPart, QueryKey};

/// Resource name shared by every todo query key
pub const TODOS_ROOT: &str = "todos";

/// The demo pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    /// Key carries the id inside an object: `["todos", {"id": 1}]`
    #[default]
    Index,
    /// Key carries the bare id: `["todos", 1]`
    Pattern2,
    /// Same key as `Pattern2`, plus a PUT that invalidates all todo queries
    Mutation,
}

impl Page {
    pub fn all() -> &'static [Page] {
        &[Page::Index, Page::Pattern2, Page::Mutation]
    }

    /// Parses a page name (case-insensitive)
    ///
    /// - "index" | "home" -> Index
    /// - "pattern2" | "pattern" -> Pattern2
    /// - "mutation" | "put" -> Mutation
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Page> {
        match s.to_lowercase().trim() {
            "index" | "home" => Some(Page::Index),
            "pattern2" | "pattern" => Some(Page::Pattern2),
            "mutation" | "put" => Some(Page::Mutation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Page::Index => "index",
            Page::Pattern2 => "pattern2",
            Page::Mutation => "mutation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Index => "Home",
            Page::Pattern2 => "Pattern 2",
            Page::Mutation => "Mutation",
        }
    }

    pub fn query_key(&self, id: u64) -> QueryKey {
        match self {
            Page::Index => QueryKey::new(TODOS_ROOT).with(KeyPart::map([("id", id)])),
            Page::Pattern2 | Page::Mutation => QueryKey::new(TODOS_ROOT).with(id),
        }
    }

    pub fn has_mutation(&self) -> bool {
        matches!(self, Page::Mutation)
    }

    pub fn next(&self) -> Page {
        match self {
            Page::Index => Page::Pattern2,
            Page::Pattern2 => Page::Mutation,
            Page::Mutation => Page::Index,
        }
    }

    pub fn previous(&self) -> Page {
        match self {
            Page::Index => Page::Mutation,
            Page::Pattern2 => Page::Index,
            Page::Mutation => Page::Pattern2,
        }
    }
}

/// Key prefix matching every todo query on every page
pub fn todos_root() -> QueryKey {
    QueryKey::new(TODOS_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(Page::from_str("index"), Some(Page::Index));
        assert_eq!(Page::from_str("HOME"), Some(Page::Index));
        assert_eq!(Page::from_str("pattern2"), Some(Page::Pattern2));
        assert_eq!(Page::from_str("pattern"), Some(Page::Pattern2));
        assert_eq!(Page::from_str("mutation"), Some(Page::Mutation));
        assert_eq!(Page::from_str(" put "), Some(Page::Mutation));
        assert_eq!(Page::from_str("settings"), None);
    }

    #[test]
    fn test_name_round_trips_through_from_str() {
        for page in Page::all() {
            assert_eq!(Page::from_str(page.name()), Some(*page));
        }
    }

    #[test]
    fn test_query_keys() {
        assert_eq!(Page::Index.query_key(1).to_string(), r#"["todos",{"id":1}]"#);
        assert_eq!(Page::Pattern2.query_key(1).to_string(), r#"["todos",1]"#);
        assert_eq!(Page::Mutation.query_key(1), Page::Pattern2.query_key(1));
    }

    #[test]
    fn test_todos_root_covers_every_page() {
        for page in Page::all() {
            assert!(todos_root().is_prefix_of(&page.query_key(9)));
        }
    }

    #[test]
    fn test_next_and_previous_cycle() {
        for page in Page::all() {
            assert_eq!(page.next().previous(), *page);
        }
        assert_eq!(Page::Mutation.next(), Page::Index);
    }
}
