//! Facilitator judge
//!
//! The facilitator is a singleton reviewer with a fixed persona and a low
//! temperature. It is interposed after every complete two-bot exchange to
//! decide whether the debate should continue, and it produces the closing
//! summary when a conversation ends. This module holds the pure pieces:
//! persona prompts, exchange pairing, and verdict classification. The async
//! assessment flow lives in the scheduler, which owns the state.

use serde::{Deserialize, Serialize};

use crate::chat::{FacilitatorDecision, Message};

/// Fixed sampling temperature for every facilitator call
pub const FACILITATOR_TEMPERATURE: f32 = 0.1;

/// Display name of the facilitator
pub const FACILITATOR_NAME: &str = "Facilitator";

/// Persona and decision protocol for the periodic review
pub const FACILITATOR_PROMPT: &str = r#"You are a conversation facilitator overseeing a dialogue between two bots. Your job is to determine if the conversation is productive.

Guidelines:
1. Monitor the conversation and determine if it should continue.
2. Allow the conversation to continue if the bots ask meaningful questions and engage productively.
3. End the conversation if:
   - The bots agree on the answer.
   - Questions are ignored or responses do not address them.
   - The conversation is circular with no new insights.

Decision-making:
- Thoughtful questions indicate the conversation should continue only if they are meaningful.
- End if the discussion is unproductive or they seem to be in agreement.
- Important: You should err on the side of ending the conversation if you are not sure.

Strong indicators of ending the conversation:
- When they stop asking questions.
- When they agree on the answer.
- When they stop engaging in the conversation.
- When they say goodbye or mention a conclusion.

IMPORTANT: Response format:
- If the conversation should continue, respond with: `CONTINUE`, followed by a 1 sentence reason for continuing and the % confidence in the decision.
- If the conversation should end, respond with: `END`, followed by a 1 sentence reason for ending and the % confidence in the decision.

You MUST respond with either `CONTINUE` or `END`."#;

/// Request appended to the facilitator view when a conversation closes
pub const SUMMARY_REQUEST: &str = "Please provide a concise 2-3 sentence summary of the entire \
    conversation, highlighting the key points discussed.";

/// Verdict text associated with the bot message it evaluated.
///
/// Append-only: inspection results are recorded once per facilitator
/// invocation and never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InspectionResult {
    /// Id of the bot message the verdict applies to
    pub message_id: String,

    /// Raw assessment text (exchange-count preamble plus verdict)
    pub assessment: String,
}

/// Count completed exchanges: one message from each slot, paired greedily
/// in encounter order. A message never contributes to more than one pair.
pub fn count_complete_exchanges(messages: &[Message]) -> usize {
    let mut exchanges = 0;
    let mut first: Option<&str> = None;

    for msg in messages.iter().filter(|m| m.is_from_bot()) {
        let Some(author) = msg.bot_id.as_deref() else {
            continue;
        };
        match first {
            None => first = Some(author),
            Some(open) if open != author => {
                exchanges += 1;
                first = None;
            }
            // Same slot speaking again keeps the exchange open.
            Some(_) => {}
        }
    }

    exchanges
}

/// Classify a raw verdict into continue/end.
///
/// Deliberately permissive: the decision is End if and only if the text
/// contains the literal token `END`, so free-form preambles are tolerated.
pub fn classify_verdict(verdict: &str) -> FacilitatorDecision {
    if verdict.contains("END") {
        FacilitatorDecision::End
    } else {
        FacilitatorDecision::Continue
    }
}

/// System instruction for a periodic review call
pub fn review_instruction(complete_exchanges: usize) -> String {
    format!(
        "{}\n\nCurrent complete exchanges: {}",
        FACILITATOR_PROMPT, complete_exchanges
    )
}

/// Assessment record text: exchange-count preamble plus the raw verdict
pub fn assessment_text(complete_exchanges: usize, verdict: &str) -> String {
    format!(
        "Exchange counts: {{\"completeExchanges\": {}}}\n\n{}",
        complete_exchanges, verdict
    )
}

/// System preamble when the human addresses the facilitator directly
pub fn direct_reply_instruction(bots: &[crate::chat::Bot]) -> String {
    let mapping = bots
        .iter()
        .map(|b| format!("- ID: {} Name: {}", b.id, b.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The user has directly asked you a question. Respond helpfully while \
         maintaining your role as a conversation facilitator.\n\n\
         Keep in mind the bot ID to name mapping in your response:\n{}",
        mapping
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{BOT_ONE, BOT_TWO, FACILITATOR_ID};

    #[test]
    fn test_exchange_pairing_in_encounter_order() {
        // [A, B, A, B] interleaved with other roles pairs into exactly 2.
        let messages = vec![
            Message::user("topic"),
            Message::assistant("a1", BOT_ONE),
            Message::system("aside"),
            Message::assistant("b1", BOT_TWO),
            Message::assistant("a2", BOT_ONE),
            Message::user("carry on"),
            Message::assistant("b2", BOT_TWO),
        ];
        assert_eq!(count_complete_exchanges(&messages), 2);
    }

    #[test]
    fn test_exchange_pairing_never_double_counts() {
        // Consecutive turns from the same slot keep the exchange open.
        let messages = vec![
            Message::assistant("a1", BOT_ONE),
            Message::assistant("a2", BOT_ONE),
            Message::assistant("b1", BOT_TWO),
        ];
        assert_eq!(count_complete_exchanges(&messages), 1);

        let messages = vec![
            Message::assistant("a1", BOT_ONE),
            Message::assistant("a2", BOT_ONE),
        ];
        assert_eq!(count_complete_exchanges(&messages), 0);
    }

    #[test]
    fn test_exchange_pairing_ignores_facilitator() {
        let messages = vec![
            Message::assistant("a1", BOT_ONE),
            Message::assistant("ruling", FACILITATOR_ID),
            Message::assistant("b1", BOT_TWO),
        ];
        assert_eq!(count_complete_exchanges(&messages), 1);
    }

    #[test]
    fn test_verdict_classification_is_permissive() {
        assert_eq!(
            classify_verdict("END: they agree (90% confidence)"),
            FacilitatorDecision::End
        );
        assert_eq!(
            classify_verdict("After reflection... END"),
            FacilitatorDecision::End
        );
        assert_eq!(
            classify_verdict("CONTINUE: new ground to cover"),
            FacilitatorDecision::Continue
        );
        // Anything without the literal token means continue.
        assert_eq!(
            classify_verdict("The debate is winding down."),
            FacilitatorDecision::Continue
        );
        assert_eq!(classify_verdict(""), FacilitatorDecision::Continue);
    }

    #[test]
    fn test_review_instruction_embeds_count() {
        let instruction = review_instruction(3);
        assert!(instruction.starts_with(FACILITATOR_PROMPT));
        assert!(instruction.ends_with("Current complete exchanges: 3"));
    }

    #[test]
    fn test_assessment_text_shape() {
        let text = assessment_text(2, "CONTINUE: fine");
        assert!(text.starts_with("Exchange counts: {\"completeExchanges\": 2}"));
        assert!(text.ends_with("CONTINUE: fine"));
    }
}
