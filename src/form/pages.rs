//! Page list of a multi-page form.
//!
//! Every page edits the same record. The layout function declares the pages
//! up front, then builds only the current one.

use super::error::{FormError, FormResult};
use super::key::check_key;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub key: String,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageList {
    pages: Vec<Page>,
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a page. Keys follow the variable key rules and must be unique.
    pub fn add(&mut self, key: &str, label: &str) -> FormResult<()> {
        check_key(key)?;
        if self.contains(key) {
            return Err(FormError::DuplicatePage(key.to_string()));
        }
        self.pages.push(Page {
            key: key.to_string(),
            label: label.to_string(),
        });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pages.iter().any(|p| p.key == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    /// The requested page when it exists, the first page otherwise.
    pub fn resolve(&self, requested: Option<&str>) -> Option<&Page> {
        requested
            .and_then(|key| self.pages.iter().find(|p| p.key == key))
            .or_else(|| self.pages.first())
    }

    /// Key of the page `step` positions away from `current`, wrapping around.
    pub fn step(&self, current: Option<&str>, step: isize) -> Option<&str> {
        let n = self.pages.len() as isize;
        if n == 0 {
            return None;
        }
        let at = current.and_then(|k| self.position(k)).unwrap_or(0) as isize;
        let next = (at + step).rem_euclid(n) as usize;
        Some(self.pages[next].key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_keys_are_checked_and_unique() {
        let mut pages = PageList::new();
        pages.add("identity", "Identity").unwrap();
        pages.add("health", "Health").unwrap();
        assert_eq!(
            pages.add("identity", "Again"),
            Err(FormError::DuplicatePage("identity".into()))
        );
        assert_eq!(pages.add("", "Empty"), Err(FormError::EmptyKey));
        assert!(matches!(pages.add("2nd", "Bad"), Err(FormError::InvalidKey(_))));
        assert!(matches!(pages.add("*req", "Bad"), Err(FormError::InvalidKey(_))));
        assert_eq!(pages.len(), 2);
        assert_eq!(
            FormError::DuplicatePage("identity".into()).to_string(),
            "Page 'identity' is already used in this form"
        );
    }

    #[test]
    fn resolve_and_step_wrap() {
        let mut pages = PageList::new();
        assert!(pages.resolve(None).is_none());
        assert_eq!(pages.step(None, 1), None);
        pages.add("a", "A").unwrap();
        pages.add("b", "B").unwrap();
        assert_eq!(pages.resolve(Some("b")).unwrap().key, "b");
        assert_eq!(pages.resolve(Some("zz")).unwrap().key, "a");
        assert_eq!(pages.step(Some("b"), 1), Some("a"));
        assert_eq!(pages.step(Some("a"), -1), Some("b"));
        assert_eq!(pages.step(None, 1), Some("b"));
    }
}
