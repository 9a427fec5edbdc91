use crate::error::InvocationError;
use std::path::PathBuf;

pub const JUMP_IN_FLAG: &str = "--:jump-in";
pub const LOCAL_CONFIG_FLAG: &str = "--:local-config";

const IN_PROGRESS: &str = "in_progress";

/// One tracker invocation, parsed exactly once.
///
/// `cleaned` is the token stream forwarded to the underlying tool,
/// with both coordination-only flags stripped wherever they appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub raw: Vec<String>,
    pub cleaned: Vec<String>,
    pub override_message: Option<String>,
    pub local_config: Option<PathBuf>,
}

impl CommandInvocation {
    pub fn parse(tokens: &[String]) -> Result<Self, InvocationError> {
        let mut cleaned = Vec::with_capacity(tokens.len());
        let mut override_message = None;
        let mut local_config = None;

        let mut iter = tokens.iter().peekable();
        while let Some(token) = iter.next() {
            match token.as_str() {
                JUMP_IN_FLAG => {
                    let message = match iter.peek() {
                        Some(next) if !next.starts_with('-') => next.as_str(),
                        _ => return Err(InvocationError::OverrideMissingMessage),
                    };
                    if message.trim().is_empty() {
                        return Err(InvocationError::OverrideMissingMessage);
                    }
                    override_message = Some(message.to_string());
                    iter.next();
                }
                LOCAL_CONFIG_FLAG => {
                    let path = match iter.peek() {
                        Some(next) if !next.starts_with('-') => next.as_str(),
                        _ => return Err(InvocationError::LocalConfigMissingPath),
                    };
                    local_config = Some(PathBuf::from(path));
                    iter.next();
                }
                _ => cleaned.push(token.clone()),
            }
        }

        if cleaned.is_empty() {
            return Err(InvocationError::Empty);
        }

        Ok(Self {
            raw: tokens.to_vec(),
            cleaned,
            override_message,
            local_config,
        })
    }

    pub fn verb(&self) -> &str {
        self.cleaned[0].as_str()
    }

    pub fn is_close(&self) -> bool {
        self.verb() == "close"
    }

    /// Bead id by positional convention: the second token for
    /// `update` and `close`.
    pub fn bead_id(&self) -> Option<&str> {
        match self.verb() {
            "update" | "close" => self
                .cleaned
                .get(1)
                .map(String::as_str)
                .filter(|token| !token.starts_with('-')),
            _ => None,
        }
    }

    /// Whether the invocation changes tracked state worth syncing.
    /// `update` counts only when it moves a bead to in-progress.
    pub fn is_mutating(&self) -> bool {
        match self.verb() {
            "create" | "close" | "delete" | "dep" | "reopen" => true,
            "update" => self.has_status_in_progress(),
            _ => false,
        }
    }

    fn has_status_in_progress(&self) -> bool {
        let mut iter = self.cleaned.iter().peekable();
        while let Some(token) = iter.next() {
            if token == "--status" {
                if iter.peek().is_some_and(|next| next.as_str() == IN_PROGRESS) {
                    return true;
                }
            } else if let Some(value) = token.strip_prefix("--status=") {
                if value == IN_PROGRESS {
                    return true;
                }
            }
        }
        false
    }

    /// The cleaned command line as sent in the pre-flight request.
    pub fn command_line(&self) -> String {
        shell_words::join(self.cleaned.iter().map(String::as_str))
    }
}
