use lecture_config::MatchMode;

/// Decides whether a finished file belongs to a scraped identifier
pub trait FileMatcher: Send + Sync {
    fn matches(&self, identifier: &str, file_name: &str) -> bool;
}

/// Identifier appears anywhere in the file name. Best-effort: "123" also
/// matches "Lesson - 91234.mp3".
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl FileMatcher for SubstringMatcher {
    fn matches(&self, identifier: &str, file_name: &str) -> bool {
        !identifier.is_empty() && file_name.contains(identifier)
    }
}

/// Identifier must equal one whole alphanumeric run of the file name
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatcher;

impl FileMatcher for TokenMatcher {
    fn matches(&self, identifier: &str, file_name: &str) -> bool {
        !identifier.is_empty()
            && file_name
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == identifier)
    }
}

pub fn matcher_for(mode: MatchMode) -> Box<dyn FileMatcher> {
    match mode {
        MatchMode::Substring => Box::new(SubstringMatcher),
        MatchMode::Token => Box::new(TokenMatcher),
    }
}
