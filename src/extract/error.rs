//! Error types for document extraction.

use thiserror::Error;

/// Structural failures that cannot degrade to an empty result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The document has none of the structure of a product page.
    #[error(
        "unrecognized product page: {url}\n  Suggestion: The source may have served a block or error page; retry later or check the stored source URL"
    )]
    UnrecognizedPage {
        /// URL of the document.
        url: String,
    },
}

impl ParseError {
    /// Creates an `UnrecognizedPage` error.
    #[must_use]
    pub fn unrecognized_page(url: &str) -> Self {
        Self::UnrecognizedPage {
            url: url.to_string(),
        }
    }
}
