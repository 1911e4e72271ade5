use crate::config::Community;
use crate::phone::PhoneNumber;
use crate::roster::LookupOutcome;
use crate::transport::{Command, JoinEvent};
use crate::verify::Verifier;

/// Terminal state of one join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Approved,
    Rejected,
    /// The roster could not be consulted. No membership action is taken in
    /// this state: an infrastructure hiccup must never read as approval or
    /// rejection.
    Deferred,
    /// Community not opted into auto-moderation, or no usable participant
    /// identifier.
    Ignored,
}

#[derive(Debug)]
pub struct JoinDecision {
    pub state: JoinState,
    pub commands: Vec<Command>,
}

impl JoinDecision {
    fn bare(state: JoinState) -> Self {
        JoinDecision {
            state,
            commands: vec![],
        }
    }
}

/// Decide one join event and emit the membership + notification commands.
///
/// No processed-event bookkeeping is kept: redelivery of the same event
/// recomputes the same decision, and add/remove are idempotent at the
/// transport.
pub async fn handle_join(
    verifier: &Verifier,
    community: &Community,
    event: &JoinEvent,
) -> JoinDecision {
    if community.sources.is_empty() {
        log::debug!(
            "Community '{}' has no roster sources; ignoring join of {}",
            community.name,
            event.participant
        );
        return JoinDecision::bare(JoinState::Ignored);
    }

    let Some(number) = PhoneNumber::from_jid(&event.participant) else {
        log::warn!(
            "Could not extract phone number from participant id: {}",
            event.participant
        );
        return JoinDecision::bare(JoinState::Ignored);
    };

    log::info!(
        "Checking number {number} for community '{}'",
        community.name
    );
    match verifier.verify(number.as_digits(), community).await {
        LookupOutcome::Found(record) => {
            log::info!("Approved {number} for community '{}'", community.name);
            JoinDecision {
                state: JoinState::Approved,
                commands: vec![
                    Command::AddParticipant {
                        chat: event.chat.clone(),
                        participant: event.participant.clone(),
                    },
                    // Best effort; the membership action above is the record
                    // of the decision.
                    Command::SendMessage {
                        chat: event.participant.clone(),
                        text: format!(
                            "✅ You are verified for {}!\nName: {}\nRegion: {}\nEmail: {}",
                            community.name, record.name, record.region, record.email
                        ),
                        mentions: vec![],
                    },
                ],
            }
        }
        LookupOutcome::NotFound => {
            log::info!("Rejected {number} for community '{}'", community.name);
            let form = community
                .form_link
                .as_deref()
                .unwrap_or("the registration form");
            JoinDecision {
                state: JoinState::Rejected,
                commands: vec![
                    Command::RemoveParticipant {
                        chat: event.chat.clone(),
                        participant: event.participant.clone(),
                    },
                    Command::SendMessage {
                        chat: event.participant.clone(),
                        text: format!(
                            "❌ Sorry, your number is not authorized to join {}. Please fill this form: {form}",
                            community.name
                        ),
                        mentions: vec![],
                    },
                ],
            }
        }
        LookupOutcome::SourceUnavailable => {
            log::warn!(
                "Roster unavailable; deferring join of {number} to '{}'",
                community.name
            );
            JoinDecision::bare(JoinState::Deferred)
        }
    }
}
