use crate::matcher::FileMatcher;
use lecture_models::RequestId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of [`CorrelationRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The identifier already pointed at another request, which lost its mapping
    Replaced(RequestId),
    /// Blank identifiers are never stored
    Ignored,
}

/// Shared identifier -> request mapping between the worker and the monitor.
///
/// Entries keep insertion order, so when several identifiers match a file
/// the oldest registration wins. Re-registering an identifier keeps its slot.
#[derive(Debug, Clone, Default)]
pub struct CorrelationRegistry {
    entries: Arc<Mutex<Vec<(String, RequestId)>>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, RequestId)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, identifier: &str, request: RequestId) -> Registration {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Registration::Ignored;
        }

        let mut entries = self.lock();
        match entries.iter_mut().find(|(id, _)| id == identifier) {
            Some((_, existing)) => Registration::Replaced(std::mem::replace(existing, request)),
            None => {
                entries.push((identifier.to_string(), request));
                Registration::Registered
            }
        }
    }

    /// First registered identifier the matcher accepts for `file_name`
    pub fn find_match(&self, file_name: &str, matcher: &dyn FileMatcher) -> Option<(String, RequestId)> {
        self.lock()
            .iter()
            .find(|(identifier, _)| matcher.matches(identifier, file_name))
            .cloned()
    }

    pub fn get(&self, identifier: &str) -> Option<RequestId> {
        self.lock()
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, request)| request.clone())
    }

    pub fn remove(&self, identifier: &str) -> Option<RequestId> {
        let mut entries = self.lock();
        let position = entries.iter().position(|(id, _)| id == identifier)?;
        Some(entries.remove(position).1)
    }

    /// Drop every identifier owned by `request`; returns how many went
    pub fn remove_request(&self, request: &RequestId) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(_, owner)| owner != request);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::SubstringMatcher;

    #[test]
    fn test_register_and_match() {
        let registry = CorrelationRegistry::new();
        assert_eq!(registry.register("12345", RequestId::from("0_1")), Registration::Registered);

        let found = registry.find_match("Lesson - 12345.mp3", &SubstringMatcher);
        assert_eq!(found, Some(("12345".to_string(), RequestId::from("0_1"))));
        assert_eq!(registry.find_match("Other - 999.mp3", &SubstringMatcher), None);
    }

    #[test]
    fn test_blank_identifier_is_ignored() {
        let registry = CorrelationRegistry::new();
        assert_eq!(registry.register("   ", RequestId::from("0_1")), Registration::Ignored);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_identifier_replaces_previous_request() {
        let registry = CorrelationRegistry::new();
        registry.register("555", RequestId::from("0_1"));
        let outcome = registry.register("555", RequestId::from("3_2"));

        assert_eq!(outcome, Registration::Replaced(RequestId::from("0_1")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("555"), Some(RequestId::from("3_2")));
    }

    #[test]
    fn test_first_registered_match_wins() {
        let registry = CorrelationRegistry::new();
        registry.register("123", RequestId::from("0_1"));
        registry.register("12345", RequestId::from("1_1"));

        let (identifier, request) = registry.find_match("Lesson - 12345.mp3", &SubstringMatcher).unwrap();
        assert_eq!(identifier, "123");
        assert_eq!(request, RequestId::from("0_1"));
    }

    #[test]
    fn test_remove_request_clears_its_entries() {
        let registry = CorrelationRegistry::new();
        registry.register("1", RequestId::from("0_1"));
        registry.register("2", RequestId::from("1_1"));

        assert_eq!(registry.remove_request(&RequestId::from("0_1")), 1);
        assert_eq!(registry.remove("2"), Some(RequestId::from("1_1")));
        assert!(registry.is_empty());
    }
}
