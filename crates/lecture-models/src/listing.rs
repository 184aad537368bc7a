use serde::{Deserialize, Serialize};

/// One lecture entry in the rendered result list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    /// Index in the on-page list
    pub id: usize,
    pub title: String,
    #[serde(default)]
    pub rav: String,
    #[serde(default)]
    pub date: String,
}

/// A lecturer entry shown when a search matches several lecturers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rav {
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub count: String,
}

/// A facet group with its selectable filter labels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterCategory {
    pub category_name: String,
    pub filters: Vec<String>,
}

/// What a results page currently shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageResult {
    RavSelection { ravs: Vec<Rav> },
    Lessons {
        lessons: Vec<Lesson>,
        filters: Vec<FilterCategory>,
    },
    Error { message: String },
}

impl PageResult {
    pub fn error(message: impl Into<String>) -> Self {
        PageResult::Error { message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PageResult::Error { .. })
    }

    /// Lessons on the page, empty for rav selections and errors
    pub fn lessons(&self) -> &[Lesson] {
        match self {
            PageResult::Lessons { lessons, .. } => lessons,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lessons_parse_from_page_script_output() {
        let raw = serde_json::json!([
            {"id": 0, "title": "Lesson", "rav": "Rav A", "date": "01/01/2024"},
            {"id": 1, "title": "Other"}
        ]);
        let lessons: Vec<Lesson> = serde_json::from_value(raw).unwrap();
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[1].rav, "");
    }

    #[test]
    fn test_page_result_is_tagged() {
        let result = PageResult::error("nothing found");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "error");
        assert!(result.is_error());
        assert!(result.lessons().is_empty());
    }
}
