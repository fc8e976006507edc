//! Generation instruction assembly
//!
//! Builds the per-turn system instruction handed to a bot before generation:
//! identity and word budget, the participant id/name mapping, the persona,
//! and the quota-aware engagement guidance that shifts to wrap-up mode when
//! the budget runs low.

use crate::chat::{Bot, Message, FACILITATOR_ID};
use crate::llm::Role;

/// Quota threshold at or below which bots are told to wrap up
pub const WRAP_UP_THRESHOLD: i64 = 3;

/// Engagement guidance keyed to the remaining quota.
///
/// Above the threshold, bots are encouraged to engage; at or below it, they
/// are told to stop asking questions and conclude.
pub fn prompt_for_quota(quota: i64) -> &'static str {
    if quota > WRAP_UP_THRESHOLD {
        "Your role in this discussion is to:\n\
         1. Share thoughtful perspectives and insights\n\
         2. Engage meaningfully with the other bot's ideas\n\
         3. Build upon or respectfully challenge previous points\n\
         4. Keep responses focused and concise\n\
         \n\
         Only ask questions or expand on a topic if they would genuinely:\n\
         - Help explore an interesting new angle\n\
         - Clarify an important point\n\
         - Bridge different viewpoints\n\
         - Lead to deeper insights\n\
         \n\
         If it is a straightforward question, answer it directly and plainly. \
         If there's nothing meaningful to ask, do not ask any questions \
         (especially if the answer is straightforward)."
    } else {
        "This is one of the final responses in this discussion. Your role is to:\n\
         1. DO NOT ask any new questions\n\
         2. Briefly summarize your final position\n\
         3. Acknowledge points of agreement with the other bot\n\
         4. End with a concluding statement that wraps up your perspective\n\
         \n\
         Keep your response focused, concise, and conclusive."
    }
}

/// What the bot is replying to, derived from the last log entry
fn responding_to(bot: &Bot, messages: &[Message]) -> &'static str {
    match messages.last() {
        Some(last) if last.role == Role::User => "the user",
        Some(last) if last.bot_id.as_deref() == Some(FACILITATOR_ID) => "the facilitator",
        Some(last) if last.role == Role::Assistant && last.bot_id.as_deref() == Some(bot.id.as_str()) => {
            "the other bot"
        }
        _ => "the conversation",
    }
}

/// Assemble the full system instruction for one bot turn
pub fn bot_instruction(
    bot: &Bot,
    bots: &[Bot],
    max_length: usize,
    quota: i64,
    messages: &[Message],
) -> String {
    let last_human = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    let mapping = bots
        .iter()
        .map(|b| format!("- ID: {} Name: {}", b.id, b.name))
        .collect::<Vec<_>>()
        .join("\n");

    let other_name = bots
        .iter()
        .find(|b| b.id != bot.id)
        .map(|b| b.name.as_str())
        .unwrap_or("the other bot");

    format!(
        "IMPORTANT INSTRUCTIONS:\n\
         1. Please try to limit your response to {max_length} words. Once you go over, wrap up your sentence.\n\
         2. Your response MUST be concise and focused.\n\
         3. You are {name} ({id}) in this conversation.\n\
         \n\
         IMPORTANT: Always stay focused on the original human message: {last_human}\n\
         \n\
         Participating Bot ID to Name Mapping:\n\
         {mapping}\n\
         \n\
         You are also chatting with a user.\n\
         \n\
         {persona}\n\
         \n\
         {quota_guidance}\n\
         \n\
         Respond to the ongoing conversation, addressing what the other bot has said \
         (as necessary). Don't just repeat what the other bot has said. When referring \
         to the other bot, use their name ({other_name}) when appropriate.\n\
         \n\
         You are currently responding to {responding_to}.\n\
         \n\
         Remember:\n\
         - Keep your response under {max_length} words\n\
         - You are {name}\n\
         - Address the other bot by their name when appropriate",
        max_length = max_length,
        name = bot.name,
        id = bot.id,
        last_human = last_human,
        mapping = mapping,
        persona = bot.system_prompt,
        quota_guidance = prompt_for_quota(quota),
        other_name = other_name,
        responding_to = responding_to(bot, messages),
    )
}

/// Truncate a response to the word budget, appending an ellipsis when cut
pub fn truncate_to_word_budget(content: &str, max_words: usize) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.len() > max_words {
        format!("{}...", words[..max_words].join(" "))
    } else {
        content.to_string()
    }
}
