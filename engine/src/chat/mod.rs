//! Conversation data model
//!
//! Defines the shared message log record, the two debate participants, and
//! the conversation-wide settings. Messages are immutable once appended,
//! with a single narrow exception: the facilitator's verdict may be
//! annotated onto an existing bot message after the fact (see
//! [`state::ChatState::annotate_decision`]).

use serde::{Deserialize, Serialize};

use crate::llm::{Provider, Role};

pub mod state;

pub use state::ChatState;

/// Stable slot id of the first participant
pub const BOT_ONE: &str = "bot1";

/// Stable slot id of the second participant
pub const BOT_TWO: &str = "bot2";

/// Reserved id of the facilitator pseudo-participant
pub const FACILITATOR_ID: &str = "facilitator";

/// Facilitator verdict on whether the conversation should go on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacilitatorDecision {
    /// Keep the exchange going
    Continue,

    /// Wrap up the conversation
    End,
}

/// Who authored (or is about to author) a turn
///
/// The facilitator is participant-shaped but structurally special: it is a
/// tagged variant rather than a third entry in the bot list, so it can never
/// leak into bot-pairing or quota logic by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    /// The human driving the conversation
    Human,

    /// One of the two debate slots, by id
    Bot(String),

    /// The singleton reviewer
    Facilitator,
}

/// Optional generation bookkeeping attached to a message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Total token count reported by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,

    /// Wall-clock generation time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,

    /// Sampling temperature the turn was generated with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Facilitator verdict recorded against this message post-hoc
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facilitator_decision: Option<FacilitatorDecision>,
}

/// One entry in the shared conversation log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique id (uuid v4)
    pub id: String,

    /// Author role in the shared log
    pub role: Role,

    /// Message text
    pub content: String,

    /// Optional display-name hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Which participant authored an assistant message, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,

    /// Creation time, epoch milliseconds
    pub timestamp: i64,

    /// Generation bookkeeping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
            bot_id: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new human message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new bot-authored message
    pub fn assistant(content: impl Into<String>, bot_id: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.bot_id = Some(bot_id.into());
        msg
    }

    /// Attach a display-name hint
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Tag the message with a participant id
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    /// Attach generation bookkeeping
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True for assistant messages authored by one of the two debate slots.
    ///
    /// Facilitator messages and untagged assistant messages never count as
    /// bot messages for pairing or scheduling purposes.
    pub fn is_from_bot(&self) -> bool {
        self.role == Role::Assistant
            && self
                .bot_id
                .as_deref()
                .is_some_and(|id| id != FACILITATOR_ID)
    }
}

/// Per-participant model settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotModelConfig {
    /// Sampling temperature in [0.0, 1.0]
    pub temperature: f32,
}

/// One of the two fixed debate participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    /// Stable slot identifier ("bot1" or "bot2")
    pub id: String,

    /// Template uid this bot was instantiated from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Display name
    pub name: String,

    /// Optional blurb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model settings
    pub model_config: BotModelConfig,

    /// Persona instructions
    pub system_prompt: String,

    /// Whether this bot is currently speaking or about to speak
    #[serde(default)]
    pub is_active: bool,
}

/// Settings shared by every generation call in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedSettings {
    /// Which backend serves the conversation
    pub provider: Provider,

    /// Model identifier
    pub model_id: String,

    /// Word budget per bot response
    pub max_response_length: usize,
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model_id: "gpt-4o-mini".to_string(),
            max_response_length: 100,
        }
    }
}

/// The two stock debaters a fresh conversation starts with
pub fn default_bots() -> Vec<Bot> {
    vec![
        Bot {
            id: BOT_ONE.to_string(),
            uid: Some("axiom-template-1".to_string()),
            name: "Axiom".to_string(),
            description: Some(
                "A logical and methodical debater focused on empirical evidence".to_string(),
            ),
            model_config: BotModelConfig { temperature: 0.3 },
            system_prompt: "You are The Rational Analyst, a highly logical and methodical \
                debater. Your goal is to construct well-reasoned, fact-based arguments while \
                maintaining a calm and objective tone. You rely on empirical evidence, sound \
                logic, and structured reasoning. Avoid emotional appeals or excessive \
                speculation. Your responses should be precise, concise, and persuasive, \
                grounded in data and established knowledge. Engage with your opponent's \
                arguments by identifying logical inconsistencies, countering with \
                well-supported evidence, and reinforcing your position with clear reasoning."
                .to_string(),
            is_active: false,
        },
        Bot {
            id: BOT_TWO.to_string(),
            uid: Some("eris-template-1".to_string()),
            name: "Eris".to_string(),
            description: Some(
                "A provocative and dynamic debater who challenges conventional wisdom".to_string(),
            ),
            model_config: BotModelConfig { temperature: 0.7 },
            system_prompt: "You are The Provocative Challenger, a bold, high-energy debater \
                who challenges conventional wisdom and thinks outside the box. Your goal is to \
                push boundaries, introduce unconventional perspectives, and engage your \
                opponent with sharp wit and rhetorical flair. You use analogies, storytelling, \
                and creative reasoning to make compelling points. You are not afraid to \
                question assumptions, propose radical ideas, or play devil's advocate. Engage \
                with your opponent dynamically: disrupt their logic, provoke thought, and make \
                your case with charisma and passion."
                .to_string(),
            is_active: false,
        },
    ]
}
