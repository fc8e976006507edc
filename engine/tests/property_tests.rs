use proptest::prelude::*;

use parley_engine::chat::{Message, Speaker, BOT_ONE, BOT_TWO};
use parley_engine::facilitator::count_complete_exchanges;
use parley_engine::llm::Role;
use parley_engine::quota::{Quota, MAX_QUOTA, MIN_QUOTA};
use parley_engine::view::{prepare_for_llm, relevant_history};

// Arbitrary conversation logs built from the four author kinds
fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        "[a-z @]{0,40}".prop_map(Message::user),
        "[a-z ]{0,40}".prop_map(Message::system),
        "[a-z ]{0,40}".prop_map(|c| Message::assistant(c, BOT_ONE)),
        "[a-z ]{0,40}".prop_map(|c| Message::assistant(c, BOT_TWO)),
        "[a-z ]{0,40}".prop_map(|c| Message::assistant(c, "facilitator")),
    ]
}

fn arb_log() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(arb_message(), 0..30)
}

fn arb_viewer() -> impl Strategy<Value = Speaker> {
    prop_oneof![
        Just(Speaker::Human),
        Just(Speaker::Facilitator),
        Just(Speaker::Bot(BOT_ONE.to_string())),
        Just(Speaker::Bot(BOT_TWO.to_string())),
    ]
}

proptest! {
    // The quota budget never leaves [MIN_QUOTA, MAX_QUOTA] no matter what
    // sequence of credits and debits is applied.
    #[test]
    fn quota_stays_in_bounds(
        start in -50..150i64,
        deltas in prop::collection::vec(-20..20i64, 0..100),
    ) {
        let mut quota = Quota::new(start);
        prop_assert!((MIN_QUOTA..=MAX_QUOTA).contains(&quota.remaining()));
        for delta in deltas {
            quota.add(delta);
            prop_assert!((MIN_QUOTA..=MAX_QUOTA).contains(&quota.remaining()));
            prop_assert_eq!(quota.is_exhausted(), quota.remaining() == MIN_QUOTA);
        }
    }

    // The view transform is a pure function of (log, viewer): calling it
    // twice yields identical output and never mutates the log.
    #[test]
    fn view_transform_is_pure(log in arb_log(), viewer in arb_viewer()) {
        let before = log.clone();
        let first = prepare_for_llm(&log, &viewer);
        let second = prepare_for_llm(&log, &viewer);
        prop_assert_eq!(first, second);
        prop_assert_eq!(log, before);
    }

    // Relabeling only ever turns assistant into user; system and user
    // entries keep their roles, and for a bot viewer the only messages
    // still labeled assistant are its own or the facilitator's.
    #[test]
    fn view_transform_only_demotes_assistants(log in arb_log(), viewer in arb_viewer()) {
        let cut = log.iter().rposition(|m| {
            m.role == Role::User && !m.content.contains("@facilitator")
        });
        let selected: Vec<&Message> = match cut {
            Some(k) => log[..k]
                .iter()
                .filter(|m| m.role == Role::System)
                .chain(log[k..].iter())
                .collect(),
            None => log.iter().collect(),
        };

        let view = prepare_for_llm(&log, &viewer);
        prop_assert_eq!(view.len(), selected.len());

        for (source, out) in selected.iter().zip(&view) {
            prop_assert_eq!(&source.content, &out.content);
            match source.role {
                Role::System | Role::User => prop_assert_eq!(out.role, source.role),
                Role::Assistant => {
                    prop_assert!(out.role == Role::Assistant || out.role == Role::User);
                    if let (Speaker::Bot(me), Some(author)) = (&viewer, source.bot_id.as_deref()) {
                        let keeps_label = author == me.as_str() || author == "facilitator";
                        prop_assert_eq!(out.role == Role::Assistant, keeps_label);
                    }
                }
            }
        }
    }

    // Everything from the last plain human message onward survives the
    // truncation, in order.
    #[test]
    fn view_transform_keeps_recent_suffix(log in arb_log(), viewer in arb_viewer()) {
        let cut = log.iter().rposition(|m| {
            m.role == Role::User && !m.content.contains("@facilitator")
        });
        let view = prepare_for_llm(&log, &viewer);

        if let Some(k) = cut {
            let suffix: Vec<&str> = log[k..].iter().map(|m| m.content.as_str()).collect();
            let tail: Vec<&str> = view[view.len() - suffix.len()..]
                .iter()
                .map(|m| m.content.as_str())
                .collect();
            prop_assert_eq!(suffix, tail);
        } else {
            prop_assert_eq!(view.len(), log.len());
        }
    }

    // The history window is at most `limit` long and always a suffix.
    #[test]
    fn relevant_history_is_a_bounded_suffix(log in arb_log(), limit in 0usize..20) {
        let window = relevant_history(&log, limit);
        prop_assert!(window.len() <= limit);
        prop_assert_eq!(window.len(), log.len().min(limit));
        prop_assert_eq!(window, &log[log.len() - window.len()..]);
    }

    // Exchange pairing is greedy over slot alternation: the count equals
    // what a direct scan of the bot-authored subsequence produces, and a
    // strictly alternating log of 2n bot turns yields exactly n.
    #[test]
    fn exchange_count_matches_greedy_scan(log in arb_log()) {
        let mut expected = 0usize;
        let mut open: Option<&str> = None;
        for msg in log.iter().filter(|m| m.is_from_bot()) {
            let author = msg.bot_id.as_deref().unwrap();
            match open {
                None => open = Some(author),
                Some(o) if o != author => { expected += 1; open = None; }
                Some(_) => {}
            }
        }
        prop_assert_eq!(count_complete_exchanges(&log), expected);
    }

    #[test]
    fn alternating_log_pairs_fully(n in 0usize..10) {
        let mut log = Vec::new();
        for _ in 0..n {
            log.push(Message::assistant("a", BOT_ONE));
            log.push(Message::assistant("b", BOT_TWO));
        }
        prop_assert_eq!(count_complete_exchanges(&log), n);
    }
}
