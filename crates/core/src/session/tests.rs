use std::sync::Arc;
use std::time::Duration;

use folio_api::{ConversationId, Credential, Message, Role};
use folio_test_backend::{Failure, Operation, TestBackend, valid_credential};
use tokio::time::timeout;

use super::state::HistoryLoads;
use super::*;
use crate::segment::{Segment, segments};
use crate::store::{CONVERSATION_ID_KEY, CREDENTIAL_KEY, MemoryStore, Store};

const FIB_REPLY: &str = "```python\ndef fib(n): ...\n```";

struct Fixture {
    backend: TestBackend,
    store: Arc<dyn Store>,
    identity: Identity,
}

impl Fixture {
    fn signed_in() -> Self {
        Self::with_credential(Some(valid_credential()))
    }

    fn signed_out() -> Self {
        Self::with_credential(None)
    }

    fn with_credential(credential: Option<Credential>) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        if let Some(credential) = credential {
            store.set(CREDENTIAL_KEY, credential.token());
        }
        Self {
            backend: TestBackend::default(),
            identity: Identity::rehydrate(Arc::clone(&store)),
            store,
        }
    }

    fn with_active_id(self, id: u64) -> Self {
        self.store.set(CONVERSATION_ID_KEY, &id.to_string());
        Self {
            identity: Identity::rehydrate(Arc::clone(&self.store)),
            ..self
        }
    }

    fn persisted_id(&self) -> Option<String> {
        self.store.get(CONVERSATION_ID_KEY)
    }

    fn build(&self) -> SessionController {
        SessionBuilder::with_backend(self.backend.clone())
            .with_identity(self.identity.clone())
            .build()
    }

    fn build_with_answer(&self, approve: bool) -> SessionController {
        SessionBuilder::with_backend(self.backend.clone())
            .with_identity(self.identity.clone())
            .on_delete_request(move |approval| {
                if approve {
                    approval.approve();
                } else {
                    approval.reject();
                }
            })
            .build()
    }
}

async fn settle(controller: &SessionController) -> SessionSnapshot {
    timeout(Duration::from_secs(2), controller.settled())
        .await
        .expect("session did not settle in time")
        .expect("session has stopped")
}

fn list_ids(snapshot: &SessionSnapshot) -> Vec<u64> {
    snapshot
        .conversations
        .items()
        .iter()
        .map(|c| c.id.0)
        .collect()
}

#[tokio::test]
async fn test_first_prompt_starts_conversation() {
    let fixture = Fixture::signed_in();
    fixture.backend.set_next_id(7);
    fixture.backend.add_codegen_reply(FIB_REPLY);

    let controller = fixture.build();
    controller.send_prompt("write a fibonacci function");
    let snapshot = settle(&controller).await;

    assert_eq!(
        snapshot.transcript,
        [
            Message::user("write a fibonacci function"),
            Message::assistant(FIB_REPLY),
        ]
    );
    let reply = &snapshot.transcript[1];
    assert_eq!(reply.role, Role::Assistant);
    let segs = segments(&reply.text).collect::<Vec<_>>();
    assert_eq!(segs.len(), 1);
    let Segment::Code(block) = segs[0] else {
        panic!("expected a code segment, got {:?}", segs[0]);
    };
    assert_eq!(block.language(), "python");
    assert_eq!(block.code(), "def fib(n): ...");

    assert_eq!(snapshot.active_id, Some(ConversationId(7)));
    assert_eq!(fixture.persisted_id().as_deref(), Some("7"));
    assert_eq!(list_ids(&snapshot), [7]);
    assert_eq!(snapshot.notice, None);

    // The first request carries no id, the next one continues the
    // conversation.
    controller.send_prompt("now make it iterative");
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.transcript.len(), 4);
    let requests = fixture
        .backend
        .requests()
        .into_iter()
        .filter(|r| r.operation == Operation::GenerateCode)
        .map(|r| r.conversation_id)
        .collect::<Vec<_>>();
    assert_eq!(requests, [None, Some(ConversationId(7))]);
}

#[tokio::test]
async fn test_duplicate_prompt_is_ignored() {
    let fixture = Fixture::signed_in();
    fixture.backend.set_delay(Duration::from_millis(50));

    let controller = fixture.build();
    controller.send_prompt("first");
    controller.send_prompt("second");
    let snapshot = settle(&controller).await;

    assert_eq!(fixture.backend.request_count(Operation::GenerateCode), 1);
    assert_eq!(
        snapshot.transcript,
        [Message::user("first"), Message::assistant("You said first")]
    );
}

#[tokio::test]
async fn test_blank_prompt_is_ignored() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    controller.send_prompt("   \n ");
    let snapshot = settle(&controller).await;
    assert!(snapshot.transcript.is_empty());
    assert_eq!(fixture.backend.request_count(Operation::GenerateCode), 0);
}

#[tokio::test]
async fn test_prompt_is_trimmed() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    controller.send_prompt("  hello \n");
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.transcript[0], Message::user("hello"));
}

#[tokio::test]
async fn test_prompt_requires_sign_in() {
    let fixture = Fixture::signed_out();
    let controller = fixture.build();
    controller.send_prompt("hello");
    let snapshot = settle(&controller).await;

    assert!(!snapshot.signed_in);
    assert!(snapshot.transcript.is_empty());
    let notice = snapshot.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::SignInRequired);
    assert!(fixture.backend.requests().is_empty());
}

#[tokio::test]
async fn test_failed_prompt() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .fail_next(Operation::GenerateCode, Failure::status(500, "Model unavailable"));

    let controller = fixture.build();
    controller.send_prompt("hello");
    let snapshot = settle(&controller).await;

    assert_eq!(
        snapshot.transcript,
        [
            Message::user("hello"),
            Message::assistant("Error: Model unavailable"),
        ]
    );
    assert_eq!(snapshot.active_id, None);
    assert_eq!(fixture.persisted_id(), None);
    assert_eq!(snapshot.notice.unwrap().kind, NoticeKind::RequestFailed);
    assert!(!snapshot.busy);
}

#[tokio::test]
async fn test_empty_reply() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(1), Vec::<Message>::new());
    fixture.backend.add_codegen_reply("");

    let controller = fixture.with_active_id(1).build();
    // Let the startup history load land first, it would replace the
    // transcript otherwise.
    settle(&controller).await;
    controller.send_prompt("hello");
    let snapshot = settle(&controller).await;
    assert_eq!(
        snapshot.transcript,
        [Message::user("hello"), Message::assistant(NO_CODE_GENERATED)]
    );
}

#[tokio::test]
async fn test_new_conversation() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    controller.send_prompt("hello");
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.transcript.len(), 2);

    fixture.backend.set_next_id(42);
    controller.start_new_conversation();
    let snapshot = settle(&controller).await;

    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.active_id, Some(ConversationId(42)));
    assert_eq!(fixture.persisted_id().as_deref(), Some("42"));
    assert_eq!(list_ids(&snapshot)[0], 42);
    assert_eq!(snapshot.notice, None);
}

#[tokio::test]
async fn test_failed_new_conversation() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(
        ConversationId(3),
        [Message::user("hi"), Message::assistant("hello")],
    );
    fixture.backend.fail_next(
        Operation::CreateConversation,
        Failure::status(500, "Failed to create new conversation."),
    );

    let controller = fixture.with_active_id(3).build();
    controller.start_new_conversation();
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, Some(ConversationId(3)));
    assert_eq!(snapshot.transcript.len(), 2);
    let notice = snapshot.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::RequestFailed);
    assert_eq!(notice.message, "Failed to create new conversation.");
}

#[tokio::test]
async fn test_rehydrate_loads_history() {
    let fixture = Fixture::signed_in();
    let history = [Message::user("hi"), Message::assistant("hello")];
    fixture.backend.add_conversation(ConversationId(5), history.clone());

    let fixture = fixture.with_active_id(5);
    let controller = fixture.build();
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, Some(ConversationId(5)));
    assert_eq!(snapshot.transcript, history);
    assert_eq!(list_ids(&snapshot), [5]);
    assert!(snapshot.signed_in);
}

#[tokio::test]
async fn test_missing_conversation_is_forgotten() {
    let fixture = Fixture::signed_in().with_active_id(99);
    let controller = fixture.build();
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, None);
    assert_eq!(fixture.persisted_id(), None);
    assert!(snapshot.transcript.is_empty());
    let notice = snapshot.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::ConversationGone);
    assert_eq!(notice.message, CONVERSATION_GONE);
}

#[tokio::test]
async fn test_failed_history_keeps_transcript() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    controller.send_prompt("hello");
    let before = settle(&controller).await;
    assert_eq!(before.transcript.len(), 2);

    fixture.backend.fail_next(
        Operation::ConversationHistory,
        Failure::status(500, "Internal Server Error"),
    );
    controller.reload_history();
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.transcript, before.transcript);
    assert_eq!(snapshot.active_id, before.active_id);
    let notice = snapshot.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::HistoryFailed);
    assert_eq!(notice.message, HISTORY_FAILED);
}

#[tokio::test]
async fn test_select_conversation() {
    let fixture = Fixture::signed_in();
    let history = vec![Message::user("sort a list"), Message::assistant("sorted()")];
    fixture.backend.add_conversation(ConversationId(3), history.clone());
    fixture.backend.add_conversation(ConversationId(4), Vec::<Message>::new());

    let controller = fixture.build();
    controller.select_conversation(ConversationId(3));
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.transcript, history);
    assert_eq!(fixture.persisted_id().as_deref(), Some("3"));

    // Selecting the active conversation again doesn't refetch it.
    let loads = fixture.backend.request_count(Operation::ConversationHistory);
    controller.select_conversation(ConversationId(3));
    settle(&controller).await;
    assert_eq!(
        fixture.backend.request_count(Operation::ConversationHistory),
        loads
    );

    controller.select_conversation(ConversationId(4));
    let snapshot = settle(&controller).await;
    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.active_id, Some(ConversationId(4)));
}

#[tokio::test]
async fn test_clear_conversation() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    controller.send_prompt("hello");
    settle(&controller).await;

    controller.clear_conversation();
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.active_id, None);
    assert_eq!(fixture.persisted_id(), None);
    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.notice, None);
    // Only local state is reset.
    assert_eq!(fixture.backend.conversation_ids(), [ConversationId(1)]);
}

#[tokio::test]
async fn test_delete_active_conversation() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(7), [Message::user("hi")]);
    fixture.backend.add_conversation(ConversationId(8), Vec::<Message>::new());

    let fixture = fixture.with_active_id(7);
    let controller = fixture.build_with_answer(true);
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.transcript.len(), 1);

    controller.delete_conversation(ConversationId(7));
    let snapshot = settle(&controller).await;

    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.active_id, None);
    assert_eq!(fixture.persisted_id(), None);
    assert!(!snapshot.conversations.contains(ConversationId(7)));
    assert_eq!(list_ids(&snapshot), [8]);
    assert_eq!(fixture.backend.conversation_ids(), [ConversationId(8)]);
}

#[tokio::test]
async fn test_delete_other_conversation() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(7), [Message::user("hi")]);
    fixture.backend.add_conversation(ConversationId(8), Vec::<Message>::new());

    let fixture = fixture.with_active_id(7);
    let controller = fixture.build_with_answer(true);
    settle(&controller).await;

    controller.delete_conversation(ConversationId(8));
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.active_id, Some(ConversationId(7)));
    assert_eq!(snapshot.transcript.len(), 1);
    assert_eq!(list_ids(&snapshot), [7]);
}

#[tokio::test]
async fn test_rejected_delete() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(ConversationId(7), Vec::<Message>::new());

    let controller = fixture.build_with_answer(false);
    settle(&controller).await;
    controller.delete_conversation(ConversationId(7));
    let snapshot = settle(&controller).await;

    assert_eq!(fixture.backend.request_count(Operation::DeleteConversation), 0);
    assert!(snapshot.conversations.contains(ConversationId(7)));
    assert_eq!(snapshot.pending_deletes, 0);
}

#[tokio::test]
async fn test_delete_without_confirmation() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(ConversationId(7), Vec::<Message>::new());

    let controller = fixture.build();
    controller.delete_conversation(ConversationId(7));
    let snapshot = settle(&controller).await;

    assert_eq!(fixture.backend.request_count(Operation::DeleteConversation), 0);
    assert!(snapshot.conversations.contains(ConversationId(7)));
}

#[tokio::test]
async fn test_failed_delete() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(ConversationId(7), Vec::<Message>::new());
    fixture.backend.fail_next(
        Operation::DeleteConversation,
        Failure::status(500, "Failed to delete conversation."),
    );

    let controller = fixture.build_with_answer(true);
    settle(&controller).await;
    controller.delete_conversation(ConversationId(7));
    let snapshot = settle(&controller).await;

    assert!(snapshot.conversations.contains(ConversationId(7)));
    assert_eq!(
        snapshot.conversations.error(),
        Some("Failed to delete conversation.")
    );
}

#[tokio::test]
async fn test_failed_refresh_keeps_list() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(ConversationId(1), Vec::<Message>::new());
    fixture.backend.add_conversation(ConversationId(2), Vec::<Message>::new());

    let controller = fixture.build();
    let snapshot = settle(&controller).await;
    assert_eq!(list_ids(&snapshot), [2, 1]);

    fixture.backend.fail_next(
        Operation::ListConversations,
        Failure::status(500, "Failed to fetch conversations."),
    );
    controller.refresh_conversations();
    let snapshot = settle(&controller).await;
    assert_eq!(list_ids(&snapshot), [2, 1]);
    assert_eq!(
        snapshot.conversations.error(),
        Some("Failed to fetch conversations.")
    );

    controller.refresh_conversations();
    let snapshot = settle(&controller).await;
    assert_eq!(snapshot.conversations.error(), None);
}

#[tokio::test]
async fn test_sign_in_later() {
    let fixture = Fixture::signed_out();
    fixture
        .backend
        .add_conversation(ConversationId(4), [Message::user("hi")]);

    let fixture = fixture.with_active_id(4);
    let controller = fixture.build();
    let snapshot = settle(&controller).await;
    assert!(!snapshot.signed_in);
    assert!(fixture.backend.requests().is_empty());

    fixture.identity.sign_in(valid_credential()).unwrap();
    controller.credential_changed();
    let snapshot = settle(&controller).await;
    assert!(snapshot.signed_in);
    assert_eq!(snapshot.transcript, [Message::user("hi")]);
    assert_eq!(list_ids(&snapshot), [4]);

    fixture.identity.sign_out();
    controller.credential_changed();
    let snapshot = settle(&controller).await;
    assert!(!snapshot.signed_in);
    assert!(snapshot.conversations.items().is_empty());
    assert_eq!(fixture.store.get(CREDENTIAL_KEY), None);
}

#[tokio::test]
async fn test_revision_increases() {
    let fixture = Fixture::signed_in();
    let controller = fixture.build();
    let first = settle(&controller).await.revision;
    controller.clear_conversation();
    let second = settle(&controller).await.revision;
    assert!(second > first);
    assert_eq!(controller.snapshot().revision, second);
}

#[tokio::test]
async fn test_shutdown_aborts_requests() {
    let fixture = Fixture::signed_in();
    fixture.backend.set_delay(Duration::from_secs(30));

    let controller = fixture.build();
    controller.send_prompt("hello");
    controller.shutdown();

    let settled = timeout(Duration::from_secs(2), controller.settled())
        .await
        .expect("session did not stop in time");
    assert!(settled.is_none());
}

#[tokio::test]
async fn test_started_conversation_is_adopted_after_select() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(3), [Message::user("old")]);
    fixture.backend.set_next_id(7);
    fixture
        .backend
        .set_operation_delay(Operation::GenerateCode, Duration::from_millis(100));

    let controller = fixture.build();
    controller.send_prompt("write a fibonacci function");
    controller.select_conversation(ConversationId(3));
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, Some(ConversationId(7)));
    assert_eq!(fixture.persisted_id().as_deref(), Some("7"));
    assert_eq!(
        snapshot.transcript,
        [
            Message::user("write a fibonacci function"),
            Message::assistant("You said write a fibonacci function"),
        ]
    );
}

#[tokio::test]
async fn test_late_history_replaces_transcript() {
    let fixture = Fixture::signed_in();
    fixture.backend.add_conversation(
        ConversationId(3),
        [Message::user("old"), Message::assistant("old reply")],
    );
    fixture.backend.set_operation_delay(
        Operation::ConversationHistory,
        Duration::from_millis(100),
    );

    let fixture = fixture.with_active_id(3);
    let controller = fixture.build();
    controller.send_prompt("hello");

    // The exchange shows up while the startup history is still loading.
    let mut snapshot_rx = controller.subscribe();
    let exchange = [Message::user("hello"), Message::assistant("You said hello")];
    timeout(
        Duration::from_secs(2),
        snapshot_rx.wait_for(|s| s.transcript == exchange),
    )
    .await
    .unwrap()
    .unwrap();

    // Then the history lands and wins.
    let snapshot = settle(&controller).await;
    assert_eq!(
        snapshot.transcript,
        [
            Message::user("old"),
            Message::assistant("old reply"),
            Message::user("hello"),
            Message::assistant("You said hello"),
        ]
    );
    assert_eq!(
        Some(snapshot.transcript),
        fixture.backend.messages(ConversationId(3))
    );
}

#[tokio::test]
async fn test_history_of_inactive_conversation_is_discarded() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(3), [Message::user("three")]);
    fixture
        .backend
        .add_conversation(ConversationId(4), [Message::user("four")]);
    fixture.backend.set_operation_delay(
        Operation::ConversationHistory,
        Duration::from_millis(50),
    );

    let fixture = fixture.with_active_id(3);
    let controller = fixture.build();
    controller.select_conversation(ConversationId(4));
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, Some(ConversationId(4)));
    assert_eq!(snapshot.transcript, [Message::user("four")]);
    assert!(!snapshot.history_loading);
    assert_eq!(
        fixture.backend.request_count(Operation::ConversationHistory),
        2
    );
}

#[tokio::test]
async fn test_reselected_conversation_waits_for_every_load() {
    let fixture = Fixture::signed_in();
    fixture
        .backend
        .add_conversation(ConversationId(3), [Message::user("three")]);
    fixture
        .backend
        .add_conversation(ConversationId(4), [Message::user("four")]);
    fixture.backend.set_operation_delay(
        Operation::ConversationHistory,
        Duration::from_millis(50),
    );

    let fixture = fixture.with_active_id(3);
    let controller = fixture.build();
    controller.select_conversation(ConversationId(4));
    controller.select_conversation(ConversationId(3));
    let snapshot = settle(&controller).await;

    assert_eq!(snapshot.active_id, Some(ConversationId(3)));
    assert_eq!(snapshot.transcript, [Message::user("three")]);
    assert!(!snapshot.history_loading);
    assert_eq!(
        fixture.backend.request_count(Operation::ConversationHistory),
        3
    );
}

#[test]
fn test_history_loads_are_counted() {
    let mut loads = HistoryLoads::default();
    loads.start(ConversationId(3));
    loads.start(ConversationId(4));
    loads.start(ConversationId(3));

    loads.finish(ConversationId(3));
    assert!(loads.is_loading(ConversationId(3)));
    loads.finish(ConversationId(3));
    assert!(!loads.is_loading(ConversationId(3)));
    assert!(loads.is_loading(ConversationId(4)));

    // A result nobody waits for is ignored.
    loads.finish(ConversationId(9));
    assert!(!loads.is_loading(ConversationId(9)));
}
