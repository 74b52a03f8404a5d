//! NEXT/LAST cursor semantics: ordered traversal, hole skipping, bounds

use crate::support::{TestClient, code, start_default};

#[tokio::test]
async fn test_next_walks_ascending() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let reply = client.cmd("NEXT").await;
    assert!(reply.starts_with("223 2 <seed2@x.invalid>"), "{reply}");
    let reply = client.cmd("NEXT").await;
    assert!(reply.starts_with("223 3 <seed3@x.invalid>"), "{reply}");

    // Past the high watermark
    assert_eq!(code(&client.cmd("NEXT").await), 421);
}

#[tokio::test]
async fn test_last_walks_descending() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    client.cmd("STAT 3").await;
    let reply = client.cmd("LAST").await;
    assert!(reply.starts_with("223 2 "), "{reply}");
    let reply = client.cmd("LAST").await;
    assert!(reply.starts_with("223 1 "), "{reply}");

    // Below the low watermark
    assert_eq!(code(&client.cmd("LAST").await), 422);
}

#[tokio::test]
async fn test_navigation_skips_holes() {
    let server = start_default().await;
    assert!(server.store.cancel_message("<seed2@x.invalid>"));

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("GROUP freenews.misc").await;

    // Forward over the hole
    let reply = client.cmd("NEXT").await;
    assert!(reply.starts_with("223 3 "), "hole not skipped: {reply}");

    // Backward over the hole
    let reply = client.cmd("LAST").await;
    assert!(reply.starts_with("223 1 "), "hole not skipped: {reply}");
}

#[tokio::test]
async fn test_stat_repositions_cursor() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let reply = client.cmd("STAT 3").await;
    assert!(reply.starts_with("223 3 "), "{reply}");

    let reply = client.cmd("LAST").await;
    assert!(reply.starts_with("223 2 "), "{reply}");
}

#[tokio::test]
async fn test_stat_by_message_id_leaves_cursor() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let reply = client.cmd("STAT <seed3@x.invalid>").await;
    assert!(reply.starts_with("223 0 <seed3@x.invalid>"), "{reply}");

    // Cursor still on article 1
    let reply = client.cmd("STAT").await;
    assert!(reply.starts_with("223 1 "), "{reply}");
}

#[tokio::test]
async fn test_navigation_without_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    assert_eq!(code(&client.cmd("NEXT").await), 412);
    assert_eq!(code(&client.cmd("LAST").await), 412);
}

#[tokio::test]
async fn test_navigation_in_empty_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("GROUP rec.food").await;
    assert_eq!(code(&client.cmd("NEXT").await), 420);
    assert_eq!(code(&client.cmd("LAST").await), 420);
}
