//! DOM-side errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Element is not an input: <{0}>")]
    NotAnInput(String),

    #[error("Invalid locator: {0:?}")]
    InvalidLocator(String),
}
