//! Message protection policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a module must authenticate about a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthSource {
    /// The identity of the sender.
    Sender,
    /// The integrity of the message content.
    Content,
    /// A username/password pair carried by the message.
    UsernamePassword,
}

impl AuthSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthSource::Sender => "sender",
            AuthSource::Content => "content",
            AuthSource::UsernamePassword => "username-password",
        }
    }
}

impl fmt::Display for AuthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(AuthSource::Sender),
            "content" => Ok(AuthSource::Content),
            "username-password" => Ok(AuthSource::UsernamePassword),
            other => Err(format!("unknown auth source '{}'", other)),
        }
    }
}

/// When the recipient must be authenticated relative to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthRecipient {
    BeforeContent,
    AfterContent,
}

/// Requirements a module must guarantee for one direction of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessagePolicy {
    pub auth_source: Option<AuthSource>,
    pub auth_recipient: Option<AuthRecipient>,
    /// Whether the protection is required rather than merely attempted.
    pub mandatory: bool,
}

impl MessagePolicy {
    /// Build a policy from configured parts.
    ///
    /// Returns `None` when neither part is set: a declared policy block with
    /// no requirements imposes nothing.
    pub fn from_parts(
        auth_source: Option<AuthSource>,
        auth_recipient: Option<AuthRecipient>,
    ) -> Option<Self> {
        if auth_source.is_none() && auth_recipient.is_none() {
            return None;
        }
        Some(Self {
            auth_source,
            auth_recipient,
            mandatory: true,
        })
    }

    /// A required policy on the given source.
    pub fn mandatory(source: AuthSource) -> Self {
        Self {
            auth_source: Some(source),
            auth_recipient: None,
            mandatory: true,
        }
    }

    /// An optional policy on the given source.
    pub fn optional(source: AuthSource) -> Self {
        Self {
            auth_source: Some(source),
            auth_recipient: None,
            mandatory: false,
        }
    }
}

impl fmt::Display for MessagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source={} recipient={} mandatory={}",
            self.auth_source.map(AuthSource::as_str).unwrap_or("-"),
            match self.auth_recipient {
                Some(AuthRecipient::BeforeContent) => "before-content",
                Some(AuthRecipient::AfterContent) => "after-content",
                None => "-",
            },
            self.mandatory
        )
    }
}
