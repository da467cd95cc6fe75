use std::fmt;

/// Username and API token pair sent with every request as HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub token: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

// Tokens end up in verbose logs otherwise.
impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let creds = BasicCredentials::new("ada", "super-secret-token");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("super-secret-token"));
    }
}
