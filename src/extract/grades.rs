//! Grade tiers: which page section holds which grade's sales.

use serde::{Deserialize, Serialize};

/// Section identifier → grade label, ungraded first, then by service and grade.
pub const DEFAULT_GRADE_TIERS: &[(&str, &str)] = &[
    ("completed-auctions-used", "Ungraded"),
    ("completed-auctions-loose-and-manual", "PSA 1"),
    ("completed-auctions-box-and-manual", "PSA 2"),
    ("completed-auctions-grade-three", "PSA 3"),
    ("completed-auctions-grade-four", "PSA 4"),
    ("completed-auctions-grade-five", "PSA 5"),
    ("completed-auctions-grade-six", "PSA 6"),
    ("completed-auctions-cib", "PSA 7"),
    ("completed-auctions-new", "PSA 8"),
    ("completed-auctions-graded", "PSA 9"),
    ("completed-auctions-box-only", "PSA 9.5"),
    ("completed-auctions-manual-only", "PSA 10"),
    ("completed-auctions-loose-and-box", "BGS 10"),
    ("completed-auctions-grade-seventeen", "CGC 10"),
    ("completed-auctions-grade-eighteen", "SGC 10"),
    ("completed-auctions-grade-nineteen", "CGC 10 Pristine"),
    ("completed-auctions-grade-twenty", "BGS 10 Black Label"),
    ("completed-auctions-grade-twenty-one", "TAG 10"),
    ("completed-auctions-grade-twenty-two", "ACE 10"),
];

/// One recognized grading tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeTier {
    /// Class shared by the tier's tab control and its content panel.
    pub section: String,
    /// Grade label stored with each sale.
    pub grade: String,
}

impl GradeTier {
    /// Creates a tier.
    pub fn new(section: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            grade: grade.into(),
        }
    }
}

/// Owned copy of [`DEFAULT_GRADE_TIERS`].
#[must_use]
pub fn default_grade_tiers() -> Vec<GradeTier> {
    DEFAULT_GRADE_TIERS
        .iter()
        .map(|(section, grade)| GradeTier::new(*section, *grade))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_tiers_have_unique_sections_and_grades() {
        let tiers = default_grade_tiers();
        let sections: HashSet<_> = tiers.iter().map(|t| t.section.as_str()).collect();
        let grades: HashSet<_> = tiers.iter().map(|t| t.grade.as_str()).collect();
        assert_eq!(sections.len(), tiers.len());
        assert_eq!(grades.len(), tiers.len());
    }

    #[test]
    fn test_default_tiers_cover_raw_through_top_grades() {
        let tiers = default_grade_tiers();
        assert_eq!(tiers.first().map(|t| t.grade.as_str()), Some("Ungraded"));
        assert!(tiers.iter().any(|t| t.grade == "PSA 10"));
        assert!(tiers.iter().any(|t| t.grade == "BGS 10 Black Label"));
    }
}
