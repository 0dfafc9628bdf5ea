use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const CATEGORY_COUNT: usize = 5;

pub fn parse_category(input: &str) -> Result<Category, ValidationError> {
    Category::parse(input)
}

/// Usage-type label counted per session. The set is closed: submissions
/// carrying any other label are rejected at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    IdeaGeneration,
    Refinement,
    Information,
    Cognitive,
    Other,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::IdeaGeneration,
        Category::Refinement,
        Category::Information,
        Category::Cognitive,
        Category::Other,
    ];

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "IDEA_GENERATION" => Ok(Category::IdeaGeneration),
            "REFINEMENT" => Ok(Category::Refinement),
            "INFORMATION" => Ok(Category::Information),
            "COGNITIVE" => Ok(Category::Cognitive),
            "OTHER" => Ok(Category::Other),
            other => Err(ValidationError(format!("unknown category: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::IdeaGeneration => "IDEA_GENERATION",
            Category::Refinement => "REFINEMENT",
            Category::Information => "INFORMATION",
            Category::Cognitive => "COGNITIVE",
            Category::Other => "OTHER",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signed counter per category. Counts are carried as submitted; no
/// magnitude invariant is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryCounts {
    #[serde(rename = "IDEA_GENERATION", default)]
    pub idea_generation: i64,
    #[serde(rename = "REFINEMENT", default)]
    pub refinement: i64,
    #[serde(rename = "INFORMATION", default)]
    pub information: i64,
    #[serde(rename = "COGNITIVE", default)]
    pub cognitive: i64,
    #[serde(rename = "OTHER", default)]
    pub other: i64,
}

impl CategoryCounts {
    #[must_use]
    pub fn get(&self, category: Category) -> i64 {
        match category {
            Category::IdeaGeneration => self.idea_generation,
            Category::Refinement => self.refinement,
            Category::Information => self.information,
            Category::Cognitive => self.cognitive,
            Category::Other => self.other,
        }
    }

    pub fn set(&mut self, category: Category, value: i64) {
        match category {
            Category::IdeaGeneration => self.idea_generation = value,
            Category::Refinement => self.refinement = value,
            Category::Information => self.information = value,
            Category::Cognitive => self.cognitive = value,
            Category::Other => self.other = value,
        }
    }

    /// Saturating element-wise accumulation.
    pub fn accumulate(&mut self, other: &CategoryCounts) {
        for category in Category::ALL {
            self.set(
                category,
                self.get(category).saturating_add(other.get(category)),
            );
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c) == 0)
    }
}
