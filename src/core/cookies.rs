use std::collections::HashMap;

/// Minimal cookie jar for the portal session. The portal hands sessions out
/// through plain `Set-Cookie` headers; path, expiry and the other attributes
/// are irrelevant for this flow and are dropped on parse.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one `Set-Cookie` header value into the jar. Only the leading
    /// `name=value` pair is kept; a repeated name overwrites the old value.
    pub fn store(&mut self, set_cookie_header: &str) {
        let pair = set_cookie_header.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            let value = value.trim();
            if !name.is_empty() && !value.is_empty() {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Merge every `Set-Cookie` header of a response.
    pub fn store_from_response(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                self.store(raw);
            }
        }
    }

    /// Rebuild a single `Cookie` request header from the jar. Every distinct
    /// name appears exactly once.
    pub fn header_value(&self) -> String {
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }
}
