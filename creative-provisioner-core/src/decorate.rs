//! Advertiser-specific target URL rewriting.
//!
//! Some advertisers require tracking parameters on every target URL. Rules are
//! kept in a [`DecorationRegistry`] keyed by advertiser id, so adding a rule
//! never touches the provisioning workflow itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

/// Advertiser that receives the built-in UTM rule.
pub const UTM_ADVERTISER_ID: &str = "76829";

/// Query appended to target URLs of [`UTM_ADVERTISER_ID`].
pub const UTM_QUERY: &str =
    "utm_source=pp&utm_medium=cps&utm_campaign=SalesMedia&utm_content=#{PARTNER_ID}";

/// A rewrite applied to a target URL.
pub trait UrlDecorator: Send + Sync {
    fn decorate(&self, url: &str) -> String;
}

impl<F> UrlDecorator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn decorate(&self, url: &str) -> String {
        self(url)
    }
}

/// Appends a fixed query string, joining with `&` when the URL already has a
/// query and with `?` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendQuery {
    query: String,
}

impl AppendQuery {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let query = query.trim_start_matches(['?', '&']).to_string();
        Self { query }
    }
}

impl UrlDecorator for AppendQuery {
    fn decorate(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{}", self.query)
    }
}

/// Table of URL rules keyed by advertiser id.
#[derive(Clone, Default)]
pub struct DecorationRegistry {
    rules: HashMap<String, Arc<dyn UrlDecorator>>,
}

impl DecorationRegistry {
    /// An empty registry: every URL passes through unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in advertiser rules.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::empty();
        registry.register(UTM_ADVERTISER_ID, AppendQuery::new(UTM_QUERY));
        registry
    }

    /// Adds or replaces the rule for an advertiser.
    pub fn register<D>(&mut self, advertiser_id: impl Into<String>, decorator: D)
    where
        D: UrlDecorator + 'static,
    {
        self.rules.insert(advertiser_id.into(), Arc::new(decorator));
    }

    pub fn contains(&self, advertiser_id: &str) -> bool {
        self.rules.contains_key(advertiser_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the advertiser's rule, or returns the URL unchanged.
    pub fn decorate(&self, advertiser_id: &str, url: &str) -> String {
        match self.rules.get(advertiser_id) {
            Some(rule) => {
                let decorated = rule.decorate(url);
                info!(advertiser_id, url = %decorated, "[DECORATE] Target URL rewritten");
                decorated
            }
            None => url.to_string(),
        }
    }
}

impl std::fmt::Debug for DecorationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut advertisers: Vec<&String> = self.rules.keys().collect();
        advertisers.sort();
        f.debug_struct("DecorationRegistry")
            .field("advertisers", &advertisers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rule_uses_question_mark_for_bare_url() {
        let registry = DecorationRegistry::with_builtin_rules();
        assert_eq!(
            registry.decorate(UTM_ADVERTISER_ID, "https://x.com/a"),
            format!("https://x.com/a?{UTM_QUERY}")
        );
    }

    #[test]
    fn builtin_rule_uses_ampersand_when_query_present() {
        let registry = DecorationRegistry::with_builtin_rules();
        assert_eq!(
            registry.decorate(UTM_ADVERTISER_ID, "https://x.com/a?b=1"),
            format!("https://x.com/a?b=1&{UTM_QUERY}")
        );
    }

    #[test]
    fn other_advertisers_are_untouched() {
        let registry = DecorationRegistry::with_builtin_rules();
        assert_eq!(registry.decorate("123", "https://x.com/a"), "https://x.com/a");
        assert_eq!(DecorationRegistry::empty().decorate(UTM_ADVERTISER_ID, "u"), "u");
    }

    #[test]
    fn closures_can_be_registered() {
        let mut registry = DecorationRegistry::empty();
        registry.register("9", |url: &str| url.replace("http://", "https://"));
        assert_eq!(registry.decorate("9", "http://x.com"), "https://x.com");
        assert!(registry.contains("9"));
    }

    #[test]
    fn append_query_strips_leading_separator() {
        let rule = AppendQuery::new("?ref=1");
        assert_eq!(rule.decorate("https://x.com"), "https://x.com?ref=1");
    }
}
