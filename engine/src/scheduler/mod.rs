//! Turn scheduler
//!
//! Drives the conversation as a state machine over the message log. After
//! every mutation the scheduler re-derives the next turn from the log alone:
//! first speaker is random, the slots then alternate, and every complete
//! exchange is routed through the facilitator before the debate may go on.
//! Quota exhaustion forces a terminal review. The engine holds a single
//! cancellation slot, so issuing a new request always cancels the previous
//! in-flight one.

use std::sync::Arc;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{
    Bot, ChatState, FacilitatorDecision, Message, MessageMetadata, Speaker, FACILITATOR_ID,
};
use crate::error::{EngineError, Result};
use crate::events::{Event, EventBus};
use crate::facilitator::{
    self, InspectionResult, FACILITATOR_NAME, FACILITATOR_TEMPERATURE, SUMMARY_REQUEST,
};
use crate::llm::{ChatMessage, Gateway, GenerationConfig, Role};
use crate::quota::{BOT_RESPONSE_COST, USER_MESSAGE_BONUS};
use crate::view::{self, FACILITATOR_MENTION};

pub mod prompts;

/// Window of recent log entries submitted on ordinary bot turns
const HISTORY_LIMIT: usize = 10;

/// System notice appended when the quota budget runs out
const QUOTA_EXHAUSTED_NOTICE: &str = "The conversation has ended due to insufficient quota.";

/// Next turn derived from the current log
#[derive(Debug, Clone, PartialEq, Eq)]
enum Turn {
    /// The named slot speaks next
    Bot(String),

    /// A complete exchange is pending facilitator review
    Review,

    /// Quota is spent; run the terminal review without generation
    ForcedEnd,

    /// Nothing to do
    Idle,
}

/// Outcome of one scheduler step, controlling the driver loop
enum Step {
    /// Re-derive the next turn and keep going
    Continue { skip_review: bool },

    /// Stop driving turns (end, cancellation, or failure)
    Stop,
}

/// Conversation orchestrator
///
/// Owns the state store and the cancellation slot; talks to the backends
/// through the gateway and publishes every state change on the event bus.
pub struct ConversationEngine {
    state: ChatState,
    gateway: Arc<Gateway>,
    events: Arc<EventBus>,
    inspections: Vec<InspectionResult>,
    cancel: Option<CancellationToken>,
}

impl ConversationEngine {
    /// Create an engine over a fresh default conversation
    pub fn new(gateway: Arc<Gateway>, events: Arc<EventBus>) -> Self {
        Self::with_state(ChatState::default(), gateway, events)
    }

    /// Create an engine over an existing conversation state
    pub fn with_state(state: ChatState, gateway: Arc<Gateway>, events: Arc<EventBus>) -> Self {
        Self {
            state,
            gateway,
            events,
            inspections: Vec::new(),
            cancel: None,
        }
    }

    /// Current conversation state
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Mutable access for top-level configuration actions (bot editing,
    /// settings, restore). Scheduling decisions always re-read this state.
    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    /// Facilitator inspection records, in the order they were produced
    pub fn inspections(&self) -> &[InspectionResult] {
        &self.inspections
    }

    /// Cancel the in-flight request (if any) and install a fresh token
    fn replace_cancel_token(&mut self) -> CancellationToken {
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        token
    }

    /// Accept a human message and drive the conversation forward.
    ///
    /// The message always lands in the log and credits the quota. A message
    /// prefixed with `@facilitator` is answered directly by the facilitator
    /// with no quota debit and no bot turn. While the conversation is ended,
    /// the message is retained but no turns run until an explicit resume.
    pub async fn handle_user_message(&mut self, content: &str) -> Result<()> {
        let content = content.trim();
        let is_facilitator_message = content.to_lowercase().starts_with(FACILITATOR_MENTION);

        self.credit_quota(USER_MESSAGE_BONUS).await;
        self.append_message(Message::user(content)).await;

        if self.state.conversation_ended() {
            debug!("conversation ended; holding message until resume");
            return Ok(());
        }

        if is_facilitator_message {
            self.facilitator_direct_reply().await;
            return Ok(());
        }

        self.run_turns(false).await
    }

    /// Rewind the log to the given message (inclusive) and branch from there.
    ///
    /// Refunds one quota unit per retained human message, clears the ended
    /// flag, and re-derives the next turn from the truncated log.
    pub async fn restart_from_message(&mut self, message_id: &str) -> Result<()> {
        let index = self
            .state
            .message_index(message_id)
            .ok_or_else(|| EngineError::UnknownMessage(message_id.to_string()))?;

        self.state.truncate_messages(index + 1);
        self.state.deactivate_bots();
        self.state.set_typing(false);
        self.state.set_last_speaker(None);
        self.state.set_ended(false);

        let refund = self
            .state
            .messages()
            .iter()
            .filter(|m| m.role == Role::User)
            .count() as i64
            * USER_MESSAGE_BONUS;
        self.credit_quota(refund).await;

        info!(retained = index + 1, refund, "restarting from message");
        self.events
            .publish(Event::ChatReset {
                message_count: index + 1,
            })
            .await;

        self.run_turns(false).await
    }

    /// End the conversation, cancelling any in-flight request
    pub async fn end_conversation(&mut self, notice: Option<&str>) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }

        self.state.set_ended(true);
        self.set_typing(false, None).await;
        self.deactivate_bots().await;

        if let Some(notice) = notice {
            self.append_message(Message::system(notice)).await;
        }

        info!("conversation ended");
        self.events.publish(Event::ConversationEnded).await;
    }

    /// Clear the ended flag and pick the conversation back up
    pub async fn resume_conversation(&mut self) -> Result<()> {
        if !self.state.conversation_ended() {
            return Ok(());
        }

        self.state.set_ended(false);
        info!("conversation resumed");
        self.events.publish(Event::ConversationResumed).await;

        self.run_turns(false).await
    }

    /// Reset to a fresh conversation holding the given messages
    pub async fn reset_chat(&mut self, messages: Vec<Message>) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        let count = messages.len();
        self.state.reset(messages);
        self.inspections.clear();
        self.events
            .publish(Event::ChatReset {
                message_count: count,
            })
            .await;
    }

    /// Derive the next turn from the current log
    fn decide(&self, skip_review: bool) -> Turn {
        if self.state.quota_exhausted() {
            return Turn::ForcedEnd;
        }

        let bot_ids: Vec<&str> = self
            .state
            .bot_messages()
            .filter_map(|m| m.bot_id.as_deref())
            .collect();

        // Nothing spoken yet: a uniformly random slot opens the debate.
        let Some(last_bot_id) = bot_ids.last().copied() else {
            let bots = self.state.bots();
            let index = rand::thread_rng().gen_range(0..bots.len());
            return Turn::Bot(bots[index].id.clone());
        };

        let complete_exchange = bot_ids.len() >= 2 && bot_ids[bot_ids.len() - 2] != last_bot_id;
        let last_is_facilitator = self
            .state
            .messages()
            .last()
            .is_some_and(|m| m.bot_id.as_deref() == Some(FACILITATOR_ID));

        if complete_exchange && !skip_review && !last_is_facilitator {
            Turn::Review
        } else if !complete_exchange || skip_review {
            match self.state.other_bot(last_bot_id) {
                Some(bot) => Turn::Bot(bot.id.clone()),
                None => Turn::Idle,
            }
        } else {
            Turn::Idle
        }
    }

    /// Drive turns until the conversation idles, ends, or a request fails
    async fn run_turns(&mut self, mut skip_review: bool) -> Result<()> {
        loop {
            if self.state.conversation_ended() {
                return Ok(());
            }

            let turn = self.decide(skip_review);
            debug!(?turn, "next turn");

            let step = match turn {
                Turn::Bot(bot_id) => self.generate_bot_response(&bot_id).await?,
                Turn::Review => self.facilitator_assessment(false).await?,
                Turn::ForcedEnd => {
                    self.set_typing(false, None).await;
                    self.deactivate_bots().await;
                    self.append_message(Message::system(QUOTA_EXHAUSTED_NOTICE))
                        .await;
                    self.facilitator_assessment(true).await?
                }
                Turn::Idle => Step::Stop,
            };

            match step {
                Step::Continue { skip_review: skip } => skip_review = skip,
                Step::Stop => return Ok(()),
            }
        }
    }

    /// Generate one bot turn. The quota debit lands before the request is
    /// issued, so a failed attempt still consumes budget.
    async fn generate_bot_response(&mut self, bot_id: &str) -> Result<Step> {
        let bot = self
            .state
            .bot(bot_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownBot(bot_id.to_string()))?;

        self.set_bot_active(&bot.id, true).await;
        self.credit_quota(-BOT_RESPONSE_COST).await;
        self.set_typing(true, Some(Speaker::Bot(bot.id.clone()))).await;

        let settings = self.state.shared_settings().clone();
        let instruction = prompts::bot_instruction(
            &bot,
            self.state.bots(),
            settings.max_response_length,
            self.state.remaining_quota(),
            self.state.messages(),
        );

        let mut turn_input = vec![Message::system(instruction)];
        turn_input.extend_from_slice(view::relevant_history(
            self.state.messages(),
            HISTORY_LIMIT,
        ));
        let prepared = view::prepare_for_llm(&turn_input, &Speaker::Bot(bot.id.clone()));

        let config = GenerationConfig {
            provider: settings.provider,
            model_id: settings.model_id.clone(),
            temperature: bot.model_config.temperature,
        };

        let cancel = self.replace_cancel_token();
        let started = std::time::Instant::now();
        let result = self.gateway.generate(&config, &prepared, &cancel).await;

        self.set_typing(false, self.state.last_speaker().cloned())
            .await;
        self.set_bot_active(&bot.id, false).await;

        let completion = match result {
            Ok(completion) => completion,
            Err(e) if e.is_cancelled() => {
                debug!(bot = %bot.id, "bot response cancelled");
                return Ok(Step::Stop);
            }
            Err(e) => {
                warn!(bot = %bot.id, error = %e, "bot response failed");
                return Ok(Step::Stop);
            }
        };

        // A racing end action wins over a response that was already in
        // flight when it landed.
        if self.state.conversation_ended() {
            return Ok(Step::Stop);
        }

        let content =
            prompts::truncate_to_word_budget(&completion.content, settings.max_response_length);
        let message = Message::assistant(content, &bot.id)
            .with_name(&bot.name)
            .with_metadata(MessageMetadata {
                tokens: completion.tokens,
                response_time_ms: Some(started.elapsed().as_millis() as i64),
                temperature: Some(bot.model_config.temperature),
                facilitator_decision: None,
            });

        info!(bot = %bot.id, tokens = ?completion.tokens, "bot turn appended");
        self.append_message(message).await;

        Ok(Step::Continue { skip_review: false })
    }

    /// Run the facilitator review over the current log.
    ///
    /// With `force_end` the generation call is skipped and the decision is
    /// End with an empty assessment (terminal quota review).
    async fn facilitator_assessment(&mut self, force_end: bool) -> Result<Step> {
        let Some(last_bot_message) = self.state.last_bot_message().cloned() else {
            debug!("no bot messages to review");
            self.set_typing(false, None).await;
            return Ok(Step::Stop);
        };

        let mut decision = if force_end {
            FacilitatorDecision::End
        } else {
            FacilitatorDecision::Continue
        };
        let mut assessment = String::new();

        if !force_end {
            self.set_typing(true, Some(Speaker::Facilitator)).await;
            self.deactivate_bots().await;

            let exchanges = facilitator::count_complete_exchanges(self.state.messages());
            let mut turn_input =
                vec![Message::system(facilitator::review_instruction(exchanges))];
            turn_input.extend_from_slice(self.state.messages());
            let prepared = view::prepare_for_llm(&turn_input, &Speaker::Facilitator);

            let config = self.facilitator_config();
            let cancel = self.replace_cancel_token();
            let verdict = match self.gateway.generate(&config, &prepared, &cancel).await {
                Ok(completion) => completion.content,
                Err(e) if e.is_cancelled() => {
                    debug!("facilitator assessment cancelled");
                    self.set_typing(false, None).await;
                    return Ok(Step::Stop);
                }
                Err(e) => {
                    // Self-healing: hand the turn to the other slot so a
                    // later message can pick the debate back up.
                    warn!(error = %e, "facilitator assessment failed");
                    self.set_typing(false, None).await;
                    if let Some(author) = last_bot_message.bot_id.as_deref() {
                        if let Some(next) = self.state.other_bot(author).map(|b| b.id.clone()) {
                            self.set_bot_active(&next, true).await;
                        }
                    }
                    return Ok(Step::Stop);
                }
            };

            assessment = facilitator::assessment_text(exchanges, &verdict);
            decision = facilitator::classify_verdict(&verdict);
        }

        info!(?decision, force_end, "facilitator decision");

        self.inspections.push(InspectionResult {
            message_id: last_bot_message.id.clone(),
            assessment,
        });

        if self.state.annotate_decision(&last_bot_message.id, decision) {
            self.events
                .publish(Event::MessageAnnotated {
                    message_id: last_bot_message.id.clone(),
                    decision,
                })
                .await;
        }

        if decision == FacilitatorDecision::End {
            self.append_closing_summary().await;
            self.end_conversation(None).await;
            return Ok(Step::Stop);
        }

        self.set_typing(false, None).await;
        self.state.set_last_speaker(None);

        if let Some(author) = last_bot_message.bot_id.as_deref() {
            if let Some(next) = self.state.other_bot(author).map(|b| b.id.clone()) {
                self.set_bot_active(&next, true).await;
            }
        }

        Ok(Step::Continue { skip_review: true })
    }

    /// Ask the facilitator for the closing summary and append it.
    ///
    /// Failures are tolerated: the conversation still ends, just without a
    /// summary message.
    async fn append_closing_summary(&mut self) {
        // The request lands after the view transform; as a plain user
        // message it would otherwise become the truncation point and drop
        // the conversation it is meant to summarize.
        let mut prepared = view::prepare_for_llm(self.state.messages(), &Speaker::Facilitator);
        prepared.push(ChatMessage::user(SUMMARY_REQUEST).with_name(FACILITATOR_ID));

        let config = self.facilitator_config();
        let cancel = self.replace_cancel_token();
        let started = std::time::Instant::now();

        match self.gateway.generate(&config, &prepared, &cancel).await {
            Ok(completion) => {
                let message = Message::system(format!("Final Summary:\n{}", completion.content))
                    .with_bot_id(FACILITATOR_ID)
                    .with_metadata(MessageMetadata {
                        tokens: completion.tokens,
                        response_time_ms: Some(started.elapsed().as_millis() as i64),
                        temperature: Some(FACILITATOR_TEMPERATURE),
                        facilitator_decision: None,
                    });
                self.append_message(message).await;
            }
            Err(e) if e.is_cancelled() => debug!("closing summary cancelled"),
            Err(e) => warn!(error = %e, "closing summary failed"),
        }
    }

    /// Answer a `@facilitator` message directly, outside the turn cycle
    async fn facilitator_direct_reply(&mut self) {
        self.set_typing(true, Some(Speaker::Facilitator)).await;

        let mut turn_input = vec![Message::system(facilitator::direct_reply_instruction(
            self.state.bots(),
        ))];
        turn_input.extend_from_slice(self.state.messages());
        let prepared = view::prepare_for_llm(&turn_input, &Speaker::Facilitator);

        let config = self.facilitator_config();
        let cancel = self.replace_cancel_token();
        let started = std::time::Instant::now();
        let result = self.gateway.generate(&config, &prepared, &cancel).await;

        self.set_typing(false, self.state.last_speaker().cloned())
            .await;

        match result {
            Ok(completion) => {
                let message = Message::assistant(completion.content, FACILITATOR_ID)
                    .with_name(FACILITATOR_NAME)
                    .with_metadata(MessageMetadata {
                        tokens: completion.tokens,
                        response_time_ms: Some(started.elapsed().as_millis() as i64),
                        temperature: Some(FACILITATOR_TEMPERATURE),
                        facilitator_decision: None,
                    });
                self.append_message(message).await;
            }
            Err(e) if e.is_cancelled() => debug!("facilitator reply cancelled"),
            Err(e) => warn!(error = %e, "facilitator reply failed"),
        }
    }

    fn facilitator_config(&self) -> GenerationConfig {
        let settings = self.state.shared_settings();
        GenerationConfig {
            provider: settings.provider,
            model_id: settings.model_id.clone(),
            temperature: FACILITATOR_TEMPERATURE,
        }
    }

    async fn append_message(&mut self, message: Message) {
        self.state.push_message(message.clone());
        self.events
            .publish(Event::MessageAppended {
                message: Box::new(message),
            })
            .await;
    }

    async fn credit_quota(&mut self, delta: i64) {
        self.state.add_to_quota(delta);
        self.events
            .publish(Event::QuotaChanged {
                remaining: self.state.remaining_quota(),
            })
            .await;
    }

    async fn set_typing(&mut self, typing: bool, speaker: Option<Speaker>) {
        self.state.set_typing(typing);
        self.state.set_last_speaker(speaker.clone());
        self.events
            .publish(Event::TypingChanged {
                is_typing: typing,
                speaker,
            })
            .await;
    }

    async fn set_bot_active(&mut self, bot_id: &str, active: bool) {
        if self.state.set_bot_active(bot_id, active) {
            self.events
                .publish(Event::BotUpdated {
                    bot_id: bot_id.to_string(),
                    is_active: active,
                })
                .await;
        }
    }

    async fn deactivate_bots(&mut self) {
        let ids: Vec<String> = self.state.bots().iter().map(|b| b.id.clone()).collect();
        for id in ids {
            self.set_bot_active(&id, false).await;
        }
    }

    /// Replace a participant's configuration by slot id
    pub async fn update_bot(&mut self, bot: Bot) -> Result<()> {
        let id = bot.id.clone();
        if !self.state.replace_bot(bot) {
            return Err(EngineError::UnknownBot(id));
        }
        let is_active = self
            .state
            .bot(&id)
            .map(|b| b.is_active)
            .unwrap_or(false);
        self.events
            .publish(Event::BotUpdated {
                bot_id: id,
                is_active,
            })
            .await;
        Ok(())
    }
}
