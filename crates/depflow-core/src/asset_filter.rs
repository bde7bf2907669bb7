//! Subscription asset exclusions.
//!
//! Patterns match whole asset names, ignoring case. `*` matches any run of
//! characters; everything else is literal.

use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AssetMatcher {
    patterns: Vec<Regex>,
}

impl AssetMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter(|p| !p.as_ref().trim().is_empty())
            .filter_map(|p| {
                let source = to_regex(p.as_ref().trim());
                match Regex::new(&source) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = %p.as_ref(), error = %e, "ignoring invalid asset exclusion");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_excluded(&self, asset_name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(asset_name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?i)^{body}$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names_ignore_case() {
        let matcher = AssetMatcher::new(&["Microsoft.NET.Sdk"]);
        assert!(matcher.is_excluded("microsoft.net.sdk"));
        assert!(!matcher.is_excluded("Microsoft.NET.Sdk.Web"));
    }

    #[test]
    fn test_wildcards_and_literal_dots() {
        let matcher = AssetMatcher::new(&["Microsoft.Extensions.*", "*.symbols"]);
        assert!(matcher.is_excluded("Microsoft.Extensions.Logging"));
        assert!(matcher.is_excluded("runtime.symbols"));
        assert!(!matcher.is_excluded("MicrosoftXExtensions.Logging"));
        assert!(!matcher.is_excluded("System.Text.Json"));
    }

    #[test]
    fn test_blank_patterns_are_dropped() {
        let matcher = AssetMatcher::new(&["", "   "]);
        assert!(matcher.is_empty());
        assert!(!matcher.is_excluded(""));
    }
}
