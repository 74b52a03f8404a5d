//! GROUP and LISTGROUP selection semantics, including meta-catalogs

use crate::support::{TestClient, code, start_default};

#[tokio::test]
async fn test_group_selection() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let reply = client.cmd("GROUP freenews.misc").await;
    assert_eq!(reply, "211 3 1 3 freenews.misc");
}

#[tokio::test]
async fn test_group_no_such_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    assert_eq!(code(&client.cmd("GROUP absent.group").await), 411);
}

#[tokio::test]
async fn test_group_requires_argument() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    assert_eq!(code(&client.cmd("GROUP").await), 501);
    assert_eq!(code(&client.cmd("GROUP a b").await), 501);
}

#[tokio::test]
async fn test_empty_group_watermarks() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    // Never-posted group: count 0, low one past high
    let reply = client.cmd("GROUP rec.food").await;
    assert_eq!(reply, "211 0 1 0 rec.food");
}

#[tokio::test]
async fn test_listgroup_with_current_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (status, numbers) = client.cmd_multiline("LISTGROUP").await;
    assert_eq!(code(&status), 211);
    assert_eq!(numbers, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_listgroup_with_name_and_range() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, numbers) = client.cmd_multiline("LISTGROUP freenews.misc 2-3").await;
    assert_eq!(code(&status), 211);
    assert!(status.contains("freenews.misc"));
    assert_eq!(numbers, vec!["2", "3"]);

    // Open-ended range
    let (_, numbers) = client.cmd_multiline("LISTGROUP freenews.misc 2-").await;
    assert_eq!(numbers, vec!["2", "3"]);
}

#[tokio::test]
async fn test_listgroup_selects_the_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd_multiline("LISTGROUP freenews.misc").await;
    // Cursor now sits on the low watermark
    let reply = client.cmd("STAT").await;
    assert_eq!(code(&reply), 223);
    assert!(reply.starts_with("223 1 "));
}

#[tokio::test]
async fn test_listgroup_without_selection() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    assert_eq!(code(&client.cmd("LISTGROUP").await), 412);
}

#[tokio::test]
async fn test_meta_catalog_deleted() {
    let server = start_default().await;
    assert!(server.store.cancel_message("<seed2@x.invalid>"));

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    // The plain group no longer shows the cancelled article
    let reply = client.cmd("GROUP freenews.misc").await;
    assert_eq!(reply, "211 2 1 3 freenews.misc");

    // The .deleted view shows exactly the cancelled one
    let reply = client.cmd("GROUP freenews.misc.deleted").await;
    assert_eq!(reply, "211 1 2 2 freenews.misc.deleted");

    let (status, _) = client.cmd_multiline("ARTICLE 2").await;
    assert_eq!(code(&status), 220);
    assert!(status.contains("<seed2@x.invalid>"));
}

#[tokio::test]
async fn test_meta_catalog_pending() {
    let server = start_default().await;
    server.store.create_catalog("mod.group", "moderated", "admin");
    server.store.set_moderated("mod.group", true).unwrap();
    crate::support::seed_article(&server.store, "mod.group", "<held@x.invalid>", "held body");

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let reply = client.cmd("GROUP mod.group").await;
    assert!(reply.starts_with("211 0 "), "pending article hidden: {reply}");

    let reply = client.cmd("GROUP mod.group.pending").await;
    assert_eq!(reply, "211 1 1 1 mod.group.pending");
}
