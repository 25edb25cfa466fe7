//! Allow-list / deny-list gate for recipient addresses.

use regex::Regex;

use crate::error::ConfigError;

/// Decides which addresses may receive email.
///
/// - Blank addresses are never sendable
/// - A deny-list match always blocks, even when the allow-list also matches
/// - A configured allow-list restricts sending to matching addresses
#[derive(Debug, Clone, Default)]
pub struct RecipientFilter {
    allow: Option<Regex>,
    deny: Option<Regex>,
}

impl RecipientFilter {
    /// Compile the two patterns. An empty pattern disables that list.
    pub fn new(allowlist: &str, denylist: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            allow: compile("EMAIL_ALLOWLIST", allowlist)?,
            deny: compile("EMAIL_DENYLIST", denylist)?,
        })
    }

    /// Filter that only rejects blank addresses.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn can_send_to(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        if self.deny.as_ref().is_some_and(|deny| deny.is_match(address)) {
            return false;
        }
        self.allow
            .as_ref()
            .is_none_or(|allow| allow.is_match(address))
    }
}

fn compile(key: &str, pattern: &str) -> Result<Option<Regex>, ConfigError> {
    if pattern.trim().is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            key: key.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOW: &str = r"(^.+@fider.io$)|(^darthvader\.fider(\+.*)?@gmail\.com$)";
    const DENY: &str = r"(^.+@fider.io$)";

    struct Case {
        allowlist: &'static str,
        denylist: &'static str,
        input: &'static [&'static str],
        can_send: bool,
    }

    #[test]
    fn can_send_to_table() {
        let cases = [
            Case {
                allowlist: ALLOW,
                denylist: "",
                input: &[
                    "me@fider.io",
                    "me+123@fider.io",
                    "darthvader.fider@gmail.com",
                    "darthvader.fider+434@gmail.com",
                ],
                can_send: true,
            },
            Case {
                allowlist: ALLOW,
                denylist: "",
                input: &[
                    "me+123@fider.iod",
                    "me@fidero.io",
                    "darthvader.fidera@gmail.com",
                    "@fider.io",
                ],
                can_send: false,
            },
            // Deny wins over allow.
            Case {
                allowlist: ALLOW,
                denylist: DENY,
                input: &["me@fider.io"],
                can_send: false,
            },
            Case {
                allowlist: ALLOW,
                denylist: DENY,
                input: &["darthvader.fider@gmail.com"],
                can_send: true,
            },
            Case {
                allowlist: "",
                denylist: DENY,
                input: &["me@fider.io", "abc@fider.io"],
                can_send: false,
            },
            Case {
                allowlist: "",
                denylist: DENY,
                input: &["me@fider.com", "abc@fiderio.io"],
                can_send: true,
            },
            Case {
                allowlist: "",
                denylist: "",
                input: &["me@fider.io"],
                can_send: true,
            },
            Case {
                allowlist: "",
                denylist: "",
                input: &["", " "],
                can_send: false,
            },
        ];

        for case in cases {
            let filter = RecipientFilter::new(case.allowlist, case.denylist).unwrap();
            for input in case.input {
                assert_eq!(
                    filter.can_send_to(input),
                    case.can_send,
                    "allow={:?} deny={:?} input={:?}",
                    case.allowlist,
                    case.denylist,
                    input
                );
            }
        }
    }

    #[test]
    fn blank_patterns_disable_lists() {
        let filter = RecipientFilter::new("  ", "").unwrap();
        assert!(filter.can_send_to("anyone@example.com"));
        assert!(!RecipientFilter::allow_all().can_send_to("\t"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = RecipientFilter::new("(unclosed", "").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref key, .. } if key == "EMAIL_ALLOWLIST"));
    }
}
