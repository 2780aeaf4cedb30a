//! # Auth Token Sources
//!
//! The settlement endpoint is bearer-authenticated. Widgets never read a
//! token from ambient global state; the host application injects an
//! [`AuthTokenSource`] into the settlement client instead.

use std::sync::{Arc, RwLock};

/// Supplies the bearer token for settlement calls
pub trait AuthTokenSource: Send + Sync {
    /// Current token, or `None` when the shopper is not signed in
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn from_option(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }
}

impl AuthTokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A token slot the host application updates on sign-in / sign-out
#[derive(Debug, Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(token.into());
    }

    pub fn clear(&self) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

impl AuthTokenSource for SharedToken {
    fn bearer_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl<F> AuthTokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken::new("abc").bearer_token(), Some("abc".to_string()));
        assert_eq!(StaticToken::none().bearer_token(), None);
    }

    #[test]
    fn test_shared_token_updates() {
        let token = SharedToken::new();
        let handle = token.clone();
        assert!(token.bearer_token().is_none());

        handle.set("session-1");
        assert_eq!(token.bearer_token().as_deref(), Some("session-1"));

        handle.clear();
        assert!(token.bearer_token().is_none());
    }

    #[test]
    fn test_closure_source() {
        let source = || Some("from-closure".to_string());
        assert_eq!(source.bearer_token().as_deref(), Some("from-closure"));
    }
}
