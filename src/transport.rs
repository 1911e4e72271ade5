use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Sticker,
    Other,
}

/// An inbound chat message, as delivered by the messaging transport.
#[derive(Debug, Clone)]
pub struct MessageReceived {
    pub chat: String,
    pub sender: String,
    pub message_id: String,
    pub body: String,
    pub kind: MessageKind,
}

/// A participant requested to join (or was added pending approval to) a
/// governed group. Consumed once; never retained.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub chat: String,
    pub participant: String,
}

/// Side effects the engine wants performed. Decisions are computed first and
/// commands executed at the boundary, so decision logic stays checkable
/// without a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendMessage {
        chat: String,
        text: String,
        mentions: Vec<String>,
    },
    DeleteMessage {
        chat: String,
        message_id: String,
        for_everyone: bool,
    },
    AddParticipant {
        chat: String,
        participant: String,
    },
    RemoveParticipant {
        chat: String,
        participant: String,
    },
}

/// The messaging transport the engine produces commands to.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(
        &self,
        chat: &str,
        text: &str,
        mentions: &[String],
    ) -> anyhow::Result<()>;
    async fn delete_message(
        &self,
        chat: &str,
        message_id: &str,
        for_everyone: bool,
    ) -> anyhow::Result<()>;
    async fn add_participant(&self, chat: &str, participant: &str) -> anyhow::Result<()>;
    async fn remove_participant(&self, chat: &str, participant: &str) -> anyhow::Result<()>;
    /// Current participant identifiers of a group chat.
    async fn participants(&self, chat: &str) -> anyhow::Result<Vec<String>>;
}

/// Execute commands against the transport, logging and swallowing failures.
///
/// By the time a command exists the decision behind it is final; a failed
/// send or delete is not retried and never rolls the decision back (the
/// membership action and its notification are not transactional).
pub async fn dispatch(transport: &dyn Transport, commands: &[Command]) {
    for command in commands {
        let result = match command {
            Command::SendMessage { chat, text, mentions } => {
                transport.send_message(chat, text, mentions).await
            }
            Command::DeleteMessage { chat, message_id, for_everyone } => {
                transport.delete_message(chat, message_id, *for_everyone).await
            }
            Command::AddParticipant { chat, participant } => {
                transport.add_participant(chat, participant).await
            }
            Command::RemoveParticipant { chat, participant } => {
                transport.remove_participant(chat, participant).await
            }
        };
        if let Err(e) = result {
            log::warn!("Transport command failed ({command:?}): {e}");
        }
    }
}
