use crate::config::ContentPolicy;
use crate::router;
use crate::transport::MessageKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    /// The message breaks the community policy; `warning` is the scoped
    /// warning text to send after deleting the offending message.
    Violation { warning: String },
}

pub const VERIFY_ONLY_WARNING: &str = "⚠️ _This group is strictly for verification purposes. \
     Please follow the instructions and avoid unrelated conversations._";

pub const STICKER_WARNING: &str =
    "⚠️ _Stickers are not allowed in this group. Please follow the instructions._";

/// Check a group message against the community's content policy.
///
/// Communities opt in per policy flag; the default policy allows everything.
pub fn classify(policy: &ContentPolicy, body: &str, kind: MessageKind) -> Classification {
    if policy.block_stickers && kind == MessageKind::Sticker {
        return Classification::Violation {
            warning: STICKER_WARNING.to_string(),
        };
    }
    if policy.verify_only {
        let folded = body.trim().to_lowercase();
        let allowed = folded.starts_with("verify/") || router::is_admin_command(body);
        if !allowed {
            return Classification::Violation {
                warning: VERIFY_ONLY_WARNING.to_string(),
            };
        }
    }
    Classification::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_only() -> ContentPolicy {
        ContentPolicy {
            verify_only: true,
            block_stickers: false,
        }
    }

    #[test]
    fn default_policy_is_permissive() {
        let policy = ContentPolicy::default();
        assert_eq!(
            classify(&policy, "random chatter", MessageKind::Text),
            Classification::Allowed
        );
        assert_eq!(
            classify(&policy, "", MessageKind::Sticker),
            Classification::Allowed
        );
    }

    #[test]
    fn verify_only_allows_verify_and_admin_commands() {
        let policy = verify_only();
        for body in ["verify/919876543210", "VERIFY/123", "botstatus", "bothelp", "botgroups"] {
            assert_eq!(classify(&policy, body, MessageKind::Text), Classification::Allowed, "{body}");
        }
    }

    #[test]
    fn verify_only_flags_chatter() {
        let policy = verify_only();
        match classify(&policy, "hello everyone", MessageKind::Text) {
            Classification::Violation { warning } => {
                assert!(warning.contains("verification purposes"));
            }
            Classification::Allowed => panic!("chatter should violate verify-only policy"),
        }
    }

    #[test]
    fn sticker_blocking_is_independent_of_text_policy() {
        let policy = ContentPolicy {
            verify_only: false,
            block_stickers: true,
        };
        match classify(&policy, "", MessageKind::Sticker) {
            Classification::Violation { warning } => assert!(warning.contains("Stickers")),
            Classification::Allowed => panic!("sticker should violate policy"),
        }
        assert_eq!(
            classify(&policy, "normal text", MessageKind::Text),
            Classification::Allowed
        );
    }
}
