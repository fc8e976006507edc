//! End-to-end conversation flow tests against a faked Ollama backend
//!
//! Each test stands up a wiremock server speaking the Ollama chat API and
//! routes requests by the instruction text they carry: bot turns contain
//! the "IMPORTANT INSTRUCTIONS" header, facilitator reviews the facilitator
//! persona, summaries the summary request, and direct replies the direct
//! preamble. That keeps the mocks mutually exclusive without inspecting
//! request order.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley_engine::chat::{
    default_bots, ChatState, FacilitatorDecision, SharedSettings, BOT_ONE, BOT_TWO, FACILITATOR_ID,
};
use parley_engine::events::EventBus;
use parley_engine::llm::{Gateway, OllamaProvider, OpenAiProvider, Provider, Role};
use parley_engine::quota::Quota;
use parley_engine::scheduler::ConversationEngine;

fn ollama_body(content: &str) -> serde_json::Value {
    json!({
        "message": { "role": "assistant", "content": content },
        "prompt_eval_count": 10,
        "eval_count": 20,
        "done": true
    })
}

fn engine_against(server: &MockServer, quota: i64) -> ConversationEngine {
    let state = ChatState::new(
        default_bots(),
        SharedSettings {
            provider: Provider::Ollama,
            model_id: "llama3.1:8b".to_string(),
            max_response_length: 100,
        },
        Quota::new(quota),
    );
    let gateway = Arc::new(Gateway::new(
        OpenAiProvider::new("http://127.0.0.1:1", None),
        OllamaProvider::new(server.uri()),
    ));
    ConversationEngine::with_state(state, gateway, Arc::new(EventBus::new()))
}

async fn mount_bot_turns(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("IMPORTANT INSTRUCTIONS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_body(content)))
        .mount(server)
        .await;
}

async fn mount_summary(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("2-3 sentence summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_body(content)))
        .mount(server)
        .await;
}

async fn mount_verdict(server: &MockServer, verdict: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("conversation facilitator overseeing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_body(verdict)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_exchange_reviewed_once_then_ended() {
    let server = MockServer::start().await;
    mount_summary(&server, "They briefly debated and agreed.").await;
    mount_verdict(&server, "END: they agree (95% confidence)").await;
    mount_bot_turns(&server, "A fine point.").await;

    let mut engine = engine_against(&server, 10);
    engine.handle_user_message("Is remote work better?").await.unwrap();

    // One human message, one turn per slot, one terminal summary.
    let messages = engine.state().messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::User);
    assert!(messages[1].is_from_bot());
    assert!(messages[2].is_from_bot());
    assert_ne!(messages[1].bot_id, messages[2].bot_id);

    let summary = &messages[3];
    assert_eq!(summary.role, Role::System);
    assert_eq!(summary.bot_id.as_deref(), Some(FACILITATOR_ID));
    assert!(summary.content.starts_with("Final Summary:\n"));

    // The verdict is annotated onto the second bot message only.
    assert_eq!(
        messages[2].metadata.as_ref().unwrap().facilitator_decision,
        Some(FacilitatorDecision::End)
    );
    assert!(messages[1]
        .metadata
        .as_ref()
        .is_none_or(|m| m.facilitator_decision.is_none()));

    // Credit 1 for the human message, debit 1 per bot turn.
    assert_eq!(engine.state().remaining_quota(), 9);
    assert!(engine.state().conversation_ended());
    assert!(!engine.state().is_typing());

    assert_eq!(engine.inspections().len(), 1);
    assert!(engine.inspections()[0]
        .assessment
        .starts_with("Exchange counts: {\"completeExchanges\": 1}"));
    assert_eq!(engine.inspections()[0].message_id, messages[2].id);
}

#[tokio::test]
async fn continue_verdict_extends_the_debate() {
    let server = MockServer::start().await;
    mount_summary(&server, "Two rounds, then agreement.").await;
    // First review lets the debate continue; the second closes it.
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("conversation facilitator overseeing"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ollama_body("CONTINUE: productive (80% confidence)")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_verdict(&server, "END: consensus reached").await;
    mount_bot_turns(&server, "Another angle.").await;

    let mut engine = engine_against(&server, 10);
    engine.handle_user_message("Debate taxes.").await.unwrap();

    // CONTINUE hands the turn straight to the other slot, whose reply
    // completes a new pairing and is reviewed in turn: user + 3 bot turns
    // + summary.
    let messages = engine.state().messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages.iter().filter(|m| m.is_from_bot()).count(), 3);

    // Greedy pairing consumed the first two turns and leaves the third
    // open, so the second review still counts one complete exchange.
    assert_eq!(engine.inspections().len(), 2);
    assert!(engine.inspections()[1]
        .assessment
        .starts_with("Exchange counts: {\"completeExchanges\": 1}"));
    assert_eq!(engine.inspections()[0].message_id, messages[2].id);
    assert_eq!(engine.inspections()[1].message_id, messages[3].id);

    // Both reviewed messages carry their verdict.
    assert_eq!(
        messages[2].metadata.as_ref().unwrap().facilitator_decision,
        Some(FacilitatorDecision::Continue)
    );
    assert_eq!(
        messages[3].metadata.as_ref().unwrap().facilitator_decision,
        Some(FacilitatorDecision::End)
    );

    // 10 + 1 user credit - 3 bot debits.
    assert_eq!(engine.state().remaining_quota(), 8);
    assert!(engine.state().conversation_ended());
}

#[tokio::test]
async fn quota_exhaustion_forces_terminal_review() {
    let server = MockServer::start().await;
    mount_summary(&server, "Cut short by the budget.").await;
    mount_bot_turns(&server, "Quick take.").await;

    // 1 starting unit + 1 user credit covers exactly two bot turns.
    let mut engine = engine_against(&server, 1);
    engine.handle_user_message("Short debate.").await.unwrap();

    let messages = engine.state().messages();
    assert!(engine.state().conversation_ended());
    assert_eq!(engine.state().remaining_quota(), 0);

    // user, two bot turns, quota notice, summary — and no facilitator
    // generation call was needed for the forced verdict.
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[3].role, Role::System);
    assert!(messages[3].content.contains("insufficient quota"));
    assert!(messages[4].content.starts_with("Final Summary:\n"));

    // Forced review records an empty assessment and an End verdict.
    assert_eq!(engine.inspections().len(), 1);
    assert!(engine.inspections()[0].assessment.is_empty());
    assert_eq!(
        messages[2].metadata.as_ref().unwrap().facilitator_decision,
        Some(FacilitatorDecision::End)
    );
}

#[tokio::test]
async fn ended_conversation_holds_messages_until_resume() {
    let server = MockServer::start().await;
    mount_summary(&server, "Done.").await;
    mount_bot_turns(&server, "Quick take.").await;

    let mut engine = engine_against(&server, 1);
    engine.handle_user_message("Short debate.").await.unwrap();
    assert!(engine.state().conversation_ended());
    let settled = engine.state().messages().len();

    // A fresh human message lands and credits quota, but generates nothing.
    engine.handle_user_message("Anyone there?").await.unwrap();
    assert_eq!(engine.state().messages().len(), settled + 1);
    assert_eq!(engine.state().remaining_quota(), 1);
    assert!(engine.state().conversation_ended());
}

#[tokio::test]
async fn facilitator_mention_routes_directly_without_debit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("directly asked you a question"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ollama_body("The debate is balanced.")),
        )
        .mount(&server)
        .await;

    let mut engine = engine_against(&server, 5);
    engine
        .handle_user_message("@facilitator how is it going?")
        .await
        .unwrap();

    let messages = engine.state().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].bot_id.as_deref(), Some(FACILITATOR_ID));
    assert_eq!(messages[1].content, "The debate is balanced.");

    // Facilitator replies are exempt from the per-turn debit.
    assert_eq!(engine.state().remaining_quota(), 6);
    assert!(!engine.state().conversation_ended());
    assert!(messages.iter().all(|m| !m.is_from_bot()));
}

#[tokio::test]
async fn restart_rewinds_refunds_and_branches() {
    let server = MockServer::start().await;
    mount_summary(&server, "Settled quickly.").await;
    mount_verdict(&server, "END: agreement").await;
    mount_bot_turns(&server, "A fine point.").await;

    let mut engine = engine_against(&server, 10);
    engine.handle_user_message("First topic.").await.unwrap();
    assert!(engine.state().conversation_ended());
    let first_message_id = engine.state().messages()[0].id.clone();

    // Rewind to the opening human message and let the debate re-run.
    engine.restart_from_message(&first_message_id).await.unwrap();

    let messages = engine.state().messages();
    assert_eq!(messages[0].id, first_message_id);
    // Rewound log re-ran a full exchange plus summary on the new branch.
    assert_eq!(messages.len(), 4);
    assert!(messages[1].is_from_bot());
    assert!(messages[2].is_from_bot());

    // 9 after the first run, +1 refund for the retained human message,
    // -2 for the replayed exchange.
    assert_eq!(engine.state().remaining_quota(), 8);
    assert!(engine.state().conversation_ended());
}

#[tokio::test]
async fn first_speaker_is_one_of_the_two_slots() {
    let server = MockServer::start().await;
    mount_summary(&server, "Done.").await;
    mount_verdict(&server, "END").await;
    mount_bot_turns(&server, "Opening move.").await;

    let mut engine = engine_against(&server, 10);
    engine.handle_user_message("Go.").await.unwrap();

    let first_bot = engine
        .state()
        .messages()
        .iter()
        .find(|m| m.is_from_bot())
        .and_then(|m| m.bot_id.clone())
        .unwrap();
    assert!(first_bot == BOT_ONE || first_bot == BOT_TWO);
}
