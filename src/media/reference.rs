use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::utils::{expand_tilde, is_url};

/// The video a run is about, classified once from the raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoReference {
    /// A locator the fetcher downloads
    Remote { url: Url, raw: String },

    /// A path on this machine (already `~`-expanded, not yet resolved)
    Local { path: PathBuf, raw: String },
}

impl VideoReference {
    /// Classify `input`. With `local_only`, URLs are treated as paths too.
    pub fn classify(input: &str, local_only: bool) -> Self {
        if !local_only && is_url(input) {
            if let Ok(url) = Url::parse(input) {
                return Self::Remote {
                    url,
                    raw: input.to_string(),
                };
            }
        }

        Self::Local {
            path: expand_tilde(input),
            raw: input.to_string(),
        }
    }

    /// The reference exactly as supplied by the caller
    pub fn raw(&self) -> &str {
        match self {
            Self::Remote { raw, .. } | Self::Local { raw, .. } => raw,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_remote_url() {
        let reference = VideoReference::classify("https://youtu.be/abc123", false);
        assert!(reference.is_remote());
        assert_eq!(reference.raw(), "https://youtu.be/abc123");
    }

    #[test]
    fn test_classify_local_path() {
        let reference = VideoReference::classify("./talk.mp4", false);
        assert_eq!(
            reference,
            VideoReference::Local {
                path: PathBuf::from("./talk.mp4"),
                raw: "./talk.mp4".to_string(),
            }
        );
    }

    #[test]
    fn test_local_only_overrides_url() {
        let reference = VideoReference::classify("https://youtu.be/abc123", true);
        assert!(!reference.is_remote());
        assert_eq!(reference.to_string(), "https://youtu.be/abc123");
    }
}
