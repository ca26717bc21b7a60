mod common;

use std::sync::Arc;
use std::time::Duration;

use solace_client::{Backend, ClientError, HttpBackend, Messenger};

use common::{signed_up, spawn_server, spawn_server_with_gateway, user_id, wait_until};

#[tokio::test]
async fn conversation_shows_only_the_two_participants() {
    let base = spawn_server().await;
    let backend = Arc::new(HttpBackend::new(&base));
    let a = signed_up(backend.as_ref(), "A", false).await;
    let b = signed_up(backend.as_ref(), "B", false).await;
    let c = signed_up(backend.as_ref(), "C", false).await;
    let (a_id, b_id, c_id) = (user_id(&a), user_id(&b), user_id(&c));

    let a_messenger = Messenger::new(a.clone(), backend.clone());
    let contacts = a_messenger.contacts().await.unwrap();
    assert_eq!(contacts.len(), 2);
    assert!(contacts.iter().all(|u| u.id != a_id));

    let with_b = a_messenger.open(b_id).await.unwrap();
    let mut updates = with_b.watch();

    let with_c = a_messenger.open(c_id).await.unwrap();
    with_c.send("only for c").await.unwrap();

    let b_view = Messenger::new(b.clone(), backend.clone()).open(a_id).await.unwrap();
    let reply = b_view.send("hi a").await.unwrap();

    wait_until(&mut updates, |msgs| msgs.iter().any(|m| m.id == reply.id)).await;
    let sent = with_b.send("hi b").await.unwrap();

    let shown = with_b.messages();
    assert!(shown.iter().all(|m| m.is_between(a_id, b_id)));
    assert_eq!(shown.iter().filter(|m| m.id == sent.id).count(), 1);

    // Reopening reads the same two-party history.
    let reopened = a_messenger.open(b_id).await.unwrap();
    let contents: Vec<String> = reopened.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["hi a", "hi b"]);
}

#[tokio::test]
async fn receiver_marks_messages_read() {
    let base = spawn_server().await;
    let backend = Arc::new(HttpBackend::new(&base));
    let a = signed_up(backend.as_ref(), "A", false).await;
    let b = signed_up(backend.as_ref(), "B", false).await;

    let a_view = Messenger::new(a.clone(), backend.clone()).open(user_id(&b)).await.unwrap();
    let sent = a_view.send("read me").await.unwrap();
    assert!(matches!(a_view.mark_read(sent.id).await, Err(ClientError::Forbidden(_))));

    let b_view = Messenger::new(b.clone(), backend.clone()).open(user_id(&a)).await.unwrap();
    b_view.mark_read(sent.id).await.unwrap();
    assert!(b_view.messages()[0].read);
}

#[tokio::test]
async fn closed_conversation_stops_updating() {
    let base = spawn_server().await;
    let backend = Arc::new(HttpBackend::new(&base));
    let a = signed_up(backend.as_ref(), "A", false).await;
    let b = signed_up(backend.as_ref(), "B", false).await;

    let a_view = Messenger::new(a.clone(), backend.clone()).open(user_id(&b)).await.unwrap();
    a_view.close();
    assert!(a_view.is_closed());

    let b_view = Messenger::new(b.clone(), backend.clone()).open(user_id(&a)).await.unwrap();
    b_view.send("too late").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(a_view.messages().is_empty());
    assert!(matches!(a_view.send("hello?").await, Err(ClientError::ViewClosed)));
}

#[tokio::test]
async fn empty_messages_are_rejected_locally() {
    let base = spawn_server().await;
    let backend = Arc::new(HttpBackend::new(&base));
    let a = signed_up(backend.as_ref(), "A", false).await;
    let b = signed_up(backend.as_ref(), "B", false).await;

    let view = Messenger::new(a.clone(), backend.clone()).open(user_id(&b)).await.unwrap();
    assert!(matches!(view.send("  ").await, Err(ClientError::InvalidInput(_))));
    assert!(matches!(
        Messenger::new(a.clone(), backend.clone()).open(user_id(&a)).await,
        Err(ClientError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn gateway_tracks_live_connections() {
    let (base, dispatcher) = spawn_server_with_gateway().await;
    let backend = HttpBackend::new(&base);
    let a = signed_up(&backend, "A", false).await;
    let token = a.snapshot().signed_in.unwrap().token;
    assert_eq!(dispatcher.connection_count().await, 0);

    let first = backend.subscribe(&token, &[]).await.unwrap();
    let second = backend.subscribe(&token, &[]).await.unwrap();
    assert_eq!(dispatcher.connection_count().await, 2);

    first.unsubscribe();
    drop(second);
    tokio::time::timeout(Duration::from_secs(5), async {
        while dispatcher.connection_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connections were not released");
}
