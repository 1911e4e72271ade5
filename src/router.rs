/// Where an inbound message arrived, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One-on-one chat with the bot.
    Direct,
    /// The community designated for `verify/<number>` commands.
    VerificationGroup,
    /// Any other group chat.
    OtherGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Status,
    Groups,
    Help,
    /// `verify/<digits>`. Empty digits means the target was unparseable and
    /// the caller should reply with a usage hint.
    Verify { digits: String },
    /// `@all`, optionally followed by the text to broadcast. Parsing does NOT
    /// authorize; the allow-list and rate-limit checks are the caller's job.
    Broadcast { text: Option<String> },
}

/// Classify message text into an intent, or `None` for arbitrary chatter.
///
/// Matching is exact-literal, case-insensitive, whitespace-trimmed. No reply
/// is ever owed for unrecognized text: in a busy group a false positive is
/// worse than silence.
pub fn classify(scope: Scope, body: &str) -> Option<Intent> {
    let trimmed = body.trim();
    let folded = trimmed.to_lowercase();

    // Broadcast trigger works in any group scope.
    if scope != Scope::Direct {
        if folded == "@all" {
            return Some(Intent::Broadcast { text: None });
        }
        if folded.starts_with("@all ") {
            let rest = trimmed[5..].trim();
            return Some(Intent::Broadcast {
                text: (!rest.is_empty()).then(|| rest.to_string()),
            });
        }
    }

    match scope {
        Scope::Direct => match folded.as_str() {
            "ping" | "test" | "hello" | "hi" | "status" => Some(Intent::Status),
            "groups" | "list" => Some(Intent::Groups),
            "help" => Some(Intent::Help),
            _ => None,
        },
        Scope::VerificationGroup => {
            if let Some(target) = folded.strip_prefix("verify/") {
                let digits: String = target.chars().filter(|c| c.is_ascii_digit()).collect();
                return Some(Intent::Verify { digits });
            }
            match folded.as_str() {
                "botstatus" => Some(Intent::Status),
                "botgroups" => Some(Intent::Groups),
                "bothelp" => Some(Intent::Help),
                _ => None,
            }
        }
        Scope::OtherGroup => None,
    }
}

/// True for text the verification-group content policy tolerates.
pub fn is_admin_command(body: &str) -> bool {
    matches!(
        body.trim().to_lowercase().as_str(),
        "botstatus" | "botgroups" | "bothelp"
    )
}
