//! Property tests: cached lists always agree with the store after mutations.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use mailpane_core::{
    CacheKey, Filter, InMemoryAuthority, MailClient, MessageId, NewMessage, ViewData,
};

#[derive(Debug, Clone, Copy)]
enum Op {
    MarkRead,
    MarkUnread,
    Archive,
    Unarchive,
    Delete,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::MarkRead),
        Just(Op::MarkUnread),
        Just(Op::Archive),
        Just(Op::Unarchive),
        Just(Op::Delete),
    ]
}

fn seed(authority: &InMemoryAuthority, flags: &[(bool, bool)]) {
    let start = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();
    for (offset, &(is_read, archived)) in (0..).zip(flags) {
        authority.insert(
            NewMessage {
                sender_name: "Sender".into(),
                sender_email: "sender@example.com".into(),
                recipient: "me@example.com".into(),
                subject: format!("Message {offset}"),
                body: "Body".into(),
            },
            start + Duration::hours(offset),
            is_read,
            archived,
        );
    }
}

/// Ids the store itself admits to `filter`, newest first.
fn expected(authority: &InMemoryAuthority, count: i64, filter: Filter) -> Vec<i64> {
    (1..=count)
        .rev()
        .filter(|&id| {
            authority
                .get(MessageId(id))
                .is_some_and(|message| filter.matches(&message))
        })
        .collect()
}

async fn cached(client: &MailClient<InMemoryAuthority>, filter: Filter) -> Vec<i64> {
    match client.load(CacheKey::List(filter)).await.unwrap() {
        ViewData::List(entries) => entries.iter().map(|e| e.id.0).collect(),
        ViewData::Message(_) => Vec::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lists_follow_mutations(
        flags in prop::collection::vec(any::<(bool, bool)>(), 1..6),
        ops in prop::collection::vec((op_strategy(), 0..8i64), 0..12),
    ) {
        tokio_test::block_on(async {
            let authority = Arc::new(InMemoryAuthority::new());
            seed(&authority, &flags);
            let count = i64::try_from(flags.len()).unwrap();
            let client = MailClient::with_shared(Arc::clone(&authority));

            for filter in Filter::ALL {
                cached(&client, filter).await;
            }

            for (op, target) in ops {
                // Ids past the seeded range exercise the not-found path.
                let id = MessageId(target % (count + 2) + 1);
                let _ = match op {
                    Op::MarkRead => client.mark_read(id).await.map(drop),
                    Op::MarkUnread => client.mark_unread(id).await.map(drop),
                    Op::Archive => client.archive(id).await.map(drop),
                    Op::Unarchive => client.unarchive(id).await.map(drop),
                    Op::Delete => client.delete(id).await,
                };

                for filter in Filter::ALL {
                    prop_assert_eq!(
                        cached(&client, filter).await,
                        expected(&authority, count, filter),
                        "filter {} after {:?} on {}", filter, op, id
                    );
                }

                let detail = client.read(CacheKey::Detail(id));
                match authority.get(id) {
                    Some(message) => {
                        if let Some(shown) = detail.message() {
                            prop_assert_eq!(shown, &message);
                        }
                    }
                    None => prop_assert!(detail.is_removed() || detail.is_loading()),
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_mark_read_is_idempotent(
        flags in prop::collection::vec(any::<(bool, bool)>(), 1..6),
        target in 1..6i64,
    ) {
        tokio_test::block_on(async {
            let authority = Arc::new(InMemoryAuthority::new());
            seed(&authority, &flags);
            let count = i64::try_from(flags.len()).unwrap();
            let client = MailClient::with_shared(Arc::clone(&authority));
            let id = MessageId(target.min(count));

            let once = client.mark_read(id).await.unwrap();
            let unread_once = cached(&client, Filter::Unread).await;
            let twice = client.mark_read(id).await.unwrap();

            prop_assert_eq!(once, twice);
            prop_assert_eq!(cached(&client, Filter::Unread).await, unread_once);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
