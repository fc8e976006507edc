//! Per-viewer message view transformation
//!
//! Rewrites the shared conversation log into the role-relative view a given
//! participant must receive before generation. A bot must see the other
//! bot's turns as `user` messages (external interlocutor, not its own prior
//! output), and the facilitator must see every bot turn that way. The
//! transform is a pure function of the log and the viewer, recomputed fresh
//! on every call.

use crate::chat::{Message, Speaker, FACILITATOR_ID};
use crate::llm::{ChatMessage, Role};

/// Token a human uses to address the facilitator directly
pub const FACILITATOR_MENTION: &str = "@facilitator";

/// Produce the message sequence to submit to the generation backend.
///
/// Rules, applied in order:
/// 1. Truncate history at the most recent human message that does not
///    mention the facilitator, keeping earlier `system` messages as
///    standing context.
/// 2. Relabel the other bot's (or, for the facilitator, every bot's)
///    assistant messages to `user`. The viewer's own turns keep their
///    `assistant` role.
/// 3. Tag assistant-authored messages with their author's participant id as
///    a display-name hint.
pub fn prepare_for_llm(messages: &[Message], viewer: &Speaker) -> Vec<ChatMessage> {
    let cut = messages
        .iter()
        .rposition(|m| m.role == Role::User && !m.content.contains(FACILITATOR_MENTION));

    let selected: Vec<&Message> = match cut {
        Some(k) => messages[..k]
            .iter()
            .filter(|m| m.role == Role::System)
            .chain(messages[k..].iter())
            .collect(),
        None => messages.iter().collect(),
    };

    selected
        .into_iter()
        .map(|msg| {
            // Name hint derives from the authored role, before relabeling.
            let name = if msg.role == Role::Assistant {
                msg.bot_id.clone()
            } else {
                None
            };

            ChatMessage {
                role: relabel(msg, viewer),
                content: msg.content.clone(),
                name,
            }
        })
        .collect()
}

fn relabel(msg: &Message, viewer: &Speaker) -> Role {
    if msg.role != Role::Assistant {
        return msg.role;
    }

    let Some(author) = msg.bot_id.as_deref() else {
        return msg.role;
    };

    match viewer {
        // Another slot's turns look like interlocutor input; the viewer's
        // own history and facilitator messages keep their assistant role.
        Speaker::Bot(me) => {
            if author != me.as_str() && author != FACILITATOR_ID {
                Role::User
            } else {
                Role::Assistant
            }
        }
        Speaker::Facilitator => {
            if author != FACILITATOR_ID {
                Role::User
            } else {
                Role::Assistant
            }
        }
        Speaker::Human => Role::Assistant,
    }
}

/// Last-`limit` window of the log submitted on ordinary bot turns
pub fn relevant_history(messages: &[Message], limit: usize) -> &[Message] {
    &messages[messages.len().saturating_sub(limit)..]
}
