use crate::config::Config;
use crate::guard::{self, Classification};
use crate::join::{self, JoinDecision, JoinState};
use crate::phone::PhoneNumber;
use crate::ratelimit::{BroadcastDecision, BroadcastLimiter};
use crate::roster::{LookupOutcome, RosterConnector};
use crate::router::{self, Intent, Scope};
use crate::transport::{Command, JoinEvent, MessageReceived};
use crate::verify::Verifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const USAGE_HINT: &str = "Please provide a number to verify, e.g., verify/919876543210";
const TECHNICAL_ISSUE: &str = "⚠️ Sorry, we are unable to verify your entry right now due to a \
     technical issue with the sheet. Please try again later.";
const DEFAULT_BROADCAST: &str = "Attention Everyone!";

/// The decision core: consumes typed transport events and emits typed
/// commands. All side effects happen in the caller via `transport::dispatch`,
/// so every decision path here is testable without a live transport.
pub struct Engine {
    config: Config,
    verifier: Verifier,
    limiter: BroadcastLimiter,
    started: AtomicBool,
    self_id: OnceLock<String>,
}

impl Engine {
    pub fn new(config: Config, connector: Arc<dyn RosterConnector>) -> Self {
        let verifier = Verifier::new(connector, &config.lookup);
        let limiter = BroadcastLimiter::new(
            Duration::from_secs(config.broadcast.window_seconds),
            config.broadcast.max_uses,
        );
        Engine {
            config,
            verifier,
            limiter,
            started: AtomicBool::new(false),
            self_id: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Called once when the transport session comes up. Announces the
    /// configured communities on the first connect of this process; the
    /// flag lives on the engine, not in a marker file.
    pub fn on_ready(&self, self_id: &str) {
        let _ = self.self_id.set(self_id.to_string());
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            log::info!("Transport session ready as {self_id}");
            for community in &self.config.communities {
                log::info!("Community: {} ({})", community.name, community.id);
            }
        }
    }

    /// Handle one inbound message. `participants` is the current member list
    /// of the chat (empty for direct chats); the runtime fetches it so this
    /// function stays free of transport reads.
    pub async fn handle_message(
        &self,
        msg: &MessageReceived,
        participants: &[String],
    ) -> Vec<Command> {
        let is_group = msg.chat.ends_with("@g.us");
        let community = is_group
            .then(|| self.config.community_by_chat(&msg.chat))
            .flatten();

        // Content policy runs before routing: a policed group deletes first
        // and never answers chatter.
        if let Some(community) = community {
            if let Classification::Violation { warning } =
                guard::classify(&community.policy, &msg.body, msg.kind)
            {
                return self.moderation_commands(msg, &warning);
            }
        }

        let scope = if !is_group {
            Scope::Direct
        } else if community.map(|c| c.verification).unwrap_or(false) {
            Scope::VerificationGroup
        } else {
            Scope::OtherGroup
        };

        let Some(intent) = router::classify(scope, &msg.body) else {
            return vec![];
        };

        match intent {
            Intent::Status => self.reply(msg, self.status_text()),
            Intent::Groups => self.reply(msg, self.groups_text()),
            Intent::Help => self.reply(msg, self.help_text()),
            Intent::Verify { digits } => self.handle_verify(msg, &digits).await,
            Intent::Broadcast { text } => self.handle_broadcast(msg, text, participants),
        }
    }

    /// Handle one join event for a governed group.
    pub async fn handle_join(&self, event: &JoinEvent) -> JoinDecision {
        match self.config.community_by_chat(&event.chat) {
            Some(community) => join::handle_join(&self.verifier, community, event).await,
            None => {
                log::debug!("Join event for unmanaged chat {}; ignoring", event.chat);
                JoinDecision {
                    state: JoinState::Ignored,
                    commands: vec![],
                }
            }
        }
    }

    async fn handle_verify(&self, msg: &MessageReceived, digits: &str) -> Vec<Command> {
        if digits.is_empty() {
            return self.reply(msg, USAGE_HINT.to_string());
        }
        let Some(community) = self.config.verification_community() else {
            log::warn!("Verify command received but no verification community is configured");
            return self.reply(msg, "Group configuration not found.".to_string());
        };
        let text = match self.verifier.verify(digits, community).await {
            LookupOutcome::Found(record) => format!(
                "✅ Number +{digits} is VALID.\nName: {}\nGender: {}\nRegion: {}\nEmail: {}",
                record.name, record.gender, record.region, record.email
            ),
            LookupOutcome::NotFound => format!("❌ Number +{digits} is NOT VALID."),
            LookupOutcome::SourceUnavailable => TECHNICAL_ISSUE.to_string(),
        };
        self.reply(msg, text)
    }

    fn handle_broadcast(
        &self,
        msg: &MessageReceived,
        text: Option<String>,
        participants: &[String],
    ) -> Vec<Command> {
        if !self
            .config
            .broadcast
            .allowed_groups
            .iter()
            .any(|g| g == &msg.chat)
        {
            // Not a broadcast-enabled group; stay silent.
            return vec![];
        }

        let Some(sender) = PhoneNumber::from_jid(&msg.sender) else {
            return self.reply(msg, "Could not verify your number. Contact administrator.".to_string());
        };

        // Allow-list first: an unauthorized caller must not consume budget
        // or learn anything about window timing.
        let authorized = self
            .config
            .broadcast
            .admins
            .iter()
            .any(|a| PhoneNumber::normalize(a).matches(&sender));
        if !authorized {
            log::info!("Unauthorized @all attempt by {sender} in {}", msg.chat);
            return self.reply(
                msg,
                "You are not authorized to use @all. Contact administrator.".to_string(),
            );
        }

        match self.limiter.check_and_record(sender.as_digits()) {
            BroadcastDecision::Denied { retry_after } => self.reply(
                msg,
                format!(
                    "⏳ @all limit reached. Try again in {}.",
                    format_duration(retry_after)
                ),
            ),
            BroadcastDecision::Allowed => {
                let mentions = self.broadcast_mentions(participants);
                vec![Command::SendMessage {
                    chat: msg.chat.clone(),
                    text: text.unwrap_or_else(|| DEFAULT_BROADCAST.to_string()),
                    mentions,
                }]
            }
        }
    }

    fn broadcast_mentions(&self, participants: &[String]) -> Vec<String> {
        let excluded: Vec<PhoneNumber> = self
            .config
            .broadcast
            .excluded
            .iter()
            .map(|e| PhoneNumber::normalize(e))
            .collect();
        participants
            .iter()
            .filter(|p| Some(p.as_str()) != self.self_id.get().map(|s| s.as_str()))
            .filter(|p| {
                PhoneNumber::from_jid(p)
                    .map(|n| !excluded.iter().any(|e| e.matches(&n)))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    fn moderation_commands(&self, msg: &MessageReceived, warning: &str) -> Vec<Command> {
        let sender_number = PhoneNumber::from_jid(&msg.sender)
            .map(|n| n.to_string())
            .unwrap_or_else(|| msg.sender.clone());
        vec![
            Command::DeleteMessage {
                chat: msg.chat.clone(),
                message_id: msg.message_id.clone(),
                for_everyone: true,
            },
            Command::SendMessage {
                chat: msg.chat.clone(),
                text: format!("@{sender_number} {warning}"),
                mentions: vec![msg.sender.clone()],
            },
        ]
    }

    fn reply(&self, msg: &MessageReceived, text: String) -> Vec<Command> {
        vec![Command::SendMessage {
            chat: msg.chat.clone(),
            text,
            mentions: vec![],
        }]
    }

    fn status_text(&self) -> String {
        format!(
            "🤖 Up and running. {} communities configured.",
            self.config.communities.len()
        )
    }

    fn groups_text(&self) -> String {
        let mut lines = vec!["Configured groups:".to_string()];
        for community in &self.config.communities {
            lines.push(format!("- {} ({})", community.name, community.id));
        }
        lines.join("\n")
    }

    fn help_text(&self) -> String {
        "Commands:\n\
         verify/<number> - check a number against the roster (verification group)\n\
         @all [text] - notify everyone (authorized admins, rate limited)\n\
         ping | status - liveness check\n\
         groups | list - configured groups\n\
         help - this message"
            .to_string()
    }
}

fn format_duration(d: Duration) -> String {
    let total_minutes = d.as_secs().div_ceil(60);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
