//! Errors raised by the automation layer.

use std::time::Duration;

use thiserror::Error;

/// Failure of a browser operation.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The Chrome process could not be started or never exposed DevTools.
    #[error("browser launch: {context}")]
    LaunchFailed {
        /// Underlying cause.
        context: String,
    },

    /// No usable Chrome binary on this machine.
    #[error("no Chrome executable found (set CHROME_PATH)")]
    ChromeNotFound,

    /// The page at `url` did not load.
    #[error("could not open {url}: {reason}")]
    NavigationFailed {
        /// Requested URL.
        url: String,
        /// Net error or CDP message.
        reason: String,
    },

    /// An evaluate, click or capture call came back with an error.
    #[error("{action}: {reason}")]
    ActionFailed {
        /// Short operation name such as `capture`.
        action: String,
        /// Error text.
        reason: String,
    },

    /// A bounded wait ran out.
    #[error("{context} did not finish within {timeout_ms}ms")]
    Timeout {
        /// Length of the wait.
        timeout_ms: u64,
        /// What was being waited on.
        context: String,
    },

    /// The session is gone; every later call fails with this.
    #[error("browser session cancelled")]
    Cancelled,

    /// DevTools transport or protocol failure.
    #[error("devtools: {0}")]
    Cdp(String),
}

impl BrowserError {
    /// [`BrowserError::Timeout`] for a wait of length `after`.
    pub fn timeout(after: Duration, context: impl Into<String>) -> Self {
        let timeout_ms = after.as_millis().try_into().unwrap_or(u64::MAX);
        Self::Timeout {
            timeout_ms,
            context: context.into(),
        }
    }

    /// True for [`BrowserError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let cases = [
            (
                BrowserError::LaunchFailed {
                    context: "exit status 1".into(),
                },
                "browser launch: exit status 1",
            ),
            (
                BrowserError::NavigationFailed {
                    url: "https://example.com".into(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".into(),
                },
                "could not open https://example.com: net::ERR_NAME_NOT_RESOLVED",
            ),
            (
                BrowserError::ActionFailed {
                    action: "capture".into(),
                    reason: "no data".into(),
                },
                "capture: no data",
            ),
            (BrowserError::Cdp("socket closed".into()), "devtools: socket closed"),
            (BrowserError::Cancelled, "browser session cancelled"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn missing_chrome_mentions_env() {
        assert!(BrowserError::ChromeNotFound.to_string().contains("CHROME_PATH"));
    }

    #[test]
    fn timeout_in_millis() {
        let err = BrowserError::timeout(Duration::from_millis(2500), "Page.captureScreenshot");
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Page.captureScreenshot did not finish within 2500ms"
        );
        assert!(!BrowserError::Cancelled.is_timeout());
    }
}
