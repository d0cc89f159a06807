use std::backtrace::Backtrace;

use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// The named variants carry fixed meanings reused by every query operation.
/// Transport and protocol failures from the remote side pass through
/// verbatim so callers always see the original failure.
#[derive(Error, Debug)]
pub enum DroverError {
    /// A bounded wait elapsed without the probed condition becoming true.
    /// Carries the backtrace captured when the deadline fired.
    #[error("wait timed out")]
    WaitTimeout { trace: Box<Backtrace> },

    /// Soft failure an operation may return to force another poll tick.
    #[error("need retry")]
    NeedRetry,

    /// A required locate matched zero elements.
    #[error("element not found")]
    NotFound,

    /// The path expression itself is malformed.
    #[error("invalid selector path: {0}")]
    InvalidSelectorPath(String),

    /// Fallback sentinel.
    #[error("unknown error")]
    Unknown,

    /// Engine process startup or configuration failure.
    #[error("driver startup: {0}")]
    Startup(String),

    #[error(transparent)]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DroverError>;

impl DroverError {
    pub(crate) fn wait_timeout() -> Self {
        DroverError::WaitTimeout {
            trace: Box::new(Backtrace::capture()),
        }
    }

    /// True when the remote side reported a stale element reference, i.e.
    /// the DOM node this handle was resolved from has been mutated away.
    /// Detected lazily from the error signature, never tracked proactively.
    pub fn is_stale(&self) -> bool {
        match self {
            DroverError::WebDriver(err) => remote_text_matches(err, "stale element reference"),
            _ => false,
        }
    }
}

/// Matches remote error text case-insensitively with spacing stripped, so
/// both raw wire messages ("stale element reference: ...") and typed
/// client-side renderings ("StaleElementReference(...)") are recognized.
fn remote_text_matches(err: &thirtyfour::error::WebDriverError, needle: &str) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    if text.contains(needle) {
        return true;
    }
    let squashed: String = text.chars().filter(|c| !c.is_whitespace() && *c != '_').collect();
    let squashed_needle: String = needle.chars().filter(|c| !c.is_whitespace()).collect();
    squashed.contains(&squashed_needle)
}

/// Maps a raw find failure onto the crate taxonomy. Anything unrecognized
/// passes through untouched.
pub(crate) fn classify_find_error(
    err: thirtyfour::error::WebDriverError,
    xpath: &str,
) -> DroverError {
    if remote_text_matches(&err, "no such element") {
        DroverError::NotFound
    } else if remote_text_matches(&err, "invalid selector") {
        DroverError::InvalidSelectorPath(xpath.to_string())
    } else {
        DroverError::WebDriver(err)
    }
}
