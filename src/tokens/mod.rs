//! Parser for the textual token formats accepted by the add-token and
//! decoder inputs. Each accepted format is one explicit variant; anything
//! else is an error, never a guess.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenInput {
    /// A bare access token.
    Plain { token: String },
    /// `email:password | token`
    EmailPassword {
        email: String,
        password: String,
        token: String,
    },
    /// `Accesstoken:TOKEN|username|uuid`
    Labelled {
        token: String,
        username: String,
        uuid: String,
    },
}

impl TokenInput {
    pub fn token(&self) -> &str {
        match self {
            TokenInput::Plain { token }
            | TokenInput::EmailPassword { token, .. }
            | TokenInput::Labelled { token, .. } => token,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            TokenInput::Labelled { username, .. } => Some(username),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TokenParseError {
    #[error("token input is empty")]
    Empty,
    #[error("unrecognized token format: {0}")]
    Unrecognized(String),
}

const LABELLED_PREFIX: &str = "accesstoken:";

/// Parse one pasted token line into its tagged form.
pub fn parse(raw: &str) -> Result<TokenInput, TokenParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TokenParseError::Empty);
    }

    // `get` declines mid-character indices, so multi-byte input near the
    // prefix boundary falls through instead of panicking.
    if let Some(prefix) = trimmed.get(..LABELLED_PREFIX.len())
        && prefix.eq_ignore_ascii_case(LABELLED_PREFIX)
    {
        return parse_labelled(&trimmed[LABELLED_PREFIX.len()..], trimmed);
    }

    if let Some((credentials, token)) = trimmed.split_once('|') {
        return parse_email_password(credentials, token, trimmed);
    }

    // A bare token carries neither separator. Reject anything that still
    // looks structured so typos surface instead of round-tripping silently.
    if trimmed.contains(char::is_whitespace) {
        return Err(TokenParseError::Unrecognized(preview(trimmed)));
    }
    Ok(TokenInput::Plain {
        token: trimmed.to_owned(),
    })
}

fn parse_labelled(rest: &str, original: &str) -> Result<TokenInput, TokenParseError> {
    let mut parts = rest.split('|');
    let token = parts.next().unwrap_or_default().trim();
    let username = parts.next().unwrap_or_default().trim();
    let uuid = parts.next().unwrap_or_default().trim();
    if token.is_empty() || username.is_empty() || uuid.is_empty() || parts.next().is_some() {
        return Err(TokenParseError::Unrecognized(preview(original)));
    }
    Ok(TokenInput::Labelled {
        token: token.to_owned(),
        username: username.to_owned(),
        uuid: uuid.to_owned(),
    })
}

fn parse_email_password(
    credentials: &str,
    token: &str,
    original: &str,
) -> Result<TokenInput, TokenParseError> {
    let token = token.trim();
    let Some((email, password)) = credentials.trim().split_once(':') else {
        return Err(TokenParseError::Unrecognized(preview(original)));
    };
    let email = email.trim();
    let password = password.trim();
    if email.is_empty() || password.is_empty() || token.is_empty() {
        return Err(TokenParseError::Unrecognized(preview(original)));
    }
    Ok(TokenInput::EmailPassword {
        email: email.to_owned(),
        password: password.to_owned(),
        token: token.to_owned(),
    })
}

fn preview(raw: &str) -> String {
    const MAX: usize = 32;
    if raw.chars().count() <= MAX {
        raw.to_owned()
    } else {
        let cut: String = raw.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_token() {
        let parsed = parse("  eyJhbGciOi.token.value  ").unwrap();
        assert_eq!(
            parsed,
            TokenInput::Plain {
                token: "eyJhbGciOi.token.value".into()
            }
        );
        assert_eq!(parsed.token(), "eyJhbGciOi.token.value");
    }

    #[test]
    fn parses_email_password_pipe_token() {
        let parsed = parse("user@example.com:hunter2 | abc123").unwrap();
        assert_eq!(
            parsed,
            TokenInput::EmailPassword {
                email: "user@example.com".into(),
                password: "hunter2".into(),
                token: "abc123".into(),
            }
        );
    }

    #[test]
    fn parses_labelled_format_case_insensitively() {
        let parsed = parse("Accesstoken:abc123|Steve|11d4-uuid").unwrap();
        assert_eq!(
            parsed,
            TokenInput::Labelled {
                token: "abc123".into(),
                username: "Steve".into(),
                uuid: "11d4-uuid".into(),
            }
        );
        assert_eq!(parsed.username(), Some("Steve"));
    }

    #[test]
    fn multibyte_input_near_the_prefix_length_is_not_sliced() {
        // 13 bytes, with byte 12 inside the final two-byte character.
        let raw = "a\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}";
        assert_eq!(
            parse(raw),
            Ok(TokenInput::Plain {
                token: raw.to_owned()
            })
        );
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse("   "), Err(TokenParseError::Empty));
    }

    #[test]
    fn rejects_malformed_labelled_input() {
        assert!(matches!(
            parse("Accesstoken:abc123|Steve"),
            Err(TokenParseError::Unrecognized(_))
        ));
        assert!(matches!(
            parse("Accesstoken:abc|Steve|uuid|extra"),
            Err(TokenParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn rejects_pipe_without_credentials() {
        assert!(matches!(
            parse("justsomething | abc123"),
            Err(TokenParseError::Unrecognized(_))
        ));
    }

    #[test]
    fn rejects_bare_token_with_spaces() {
        assert!(matches!(
            parse("two words"),
            Err(TokenParseError::Unrecognized(_))
        ));
    }
}
