//! POST: continuation, parsing, normalization and rejection replies

use crate::support::{TestClient, code, start, start_default};

#[tokio::test]
async fn test_post_round_trip_with_dot_stuffing() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.authenticate("alice", "s3cret").await;

    let reply = client.cmd("POST").await;
    assert_eq!(code(&reply), 340);

    // The first body line starts with a dot and goes out stuffed
    client.send("From: alice@x").await;
    client.send("Newsgroups: freenews.misc").await;
    client.send("Subject: dots").await;
    client.send("").await;
    client.send("..line begins with one dot").await;
    client.send("real text").await;
    client.send(".").await;

    let reply = client.line().await;
    assert_eq!(code(&reply), 240);
    let message_id = reply
        .split_whitespace()
        .find(|w| w.starts_with('<'))
        .expect("generated message-id in reply");
    assert!(message_id.ends_with("@news.test>"));

    // Stored body carries exactly one dot again
    let (_, lines) = client
        .cmd_multiline(&format!("BODY {message_id}"))
        .await;
    assert_eq!(lines, vec![".line begins with one dot", "real text"]);

    // And the group high watermark moved to 4
    let reply = client.cmd("GROUP freenews.misc").await;
    assert_eq!(reply, "211 4 1 4 freenews.misc");
}

#[tokio::test]
async fn test_post_supplied_message_id_kept() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let reply = client.cmd("POST").await;
    assert_eq!(code(&reply), 340);
    client.send("From: u@x").await;
    client.send("Newsgroups: freenews.misc").await;
    client.send("Subject: keeps id").await;
    client.send("Message-ID: <mine@elsewhere.example>").await;
    client.send("").await;
    client.send("content").await;
    client.send(".").await;

    let reply = client.line().await;
    assert_eq!(code(&reply), 240);
    assert!(reply.contains("<mine@elsewhere.example>"), "{reply}");
}

#[tokio::test]
async fn test_post_missing_header_rejected() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("POST").await;
    client.send("From: u@x").await;
    client.send("Subject: no groups header").await;
    client.send("").await;
    client.send("content").await;
    client.send(".").await;

    let reply = client.line().await;
    assert_eq!(code(&reply), 441);
    assert!(reply.contains("Newsgroups"), "{reply}");

    // The session stays usable
    assert_eq!(code(&client.cmd("DATE").await), 111);
}

#[tokio::test]
async fn test_post_empty_body_rejected() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("POST").await;
    client.send("From: u@x").await;
    client.send("Newsgroups: freenews.misc").await;
    client.send("Subject: hollow").await;
    client.send("").await;
    client.send(".").await;

    assert_eq!(code(&client.line().await), 441);
}

#[tokio::test]
async fn test_post_duplicate_message_id_rejected() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("POST").await;
    client.send("From: u@x").await;
    client.send("Newsgroups: freenews.misc").await;
    client.send("Subject: dup").await;
    client.send("Message-ID: <seed1@x.invalid>").await;
    client.send("").await;
    client.send("content").await;
    client.send(".").await;

    let reply = client.line().await;
    assert_eq!(code(&reply), 441);
    assert!(reply.contains("duplicate"), "{reply}");
}

#[tokio::test]
async fn test_post_unknown_group_rejected() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("POST").await;
    client.send("From: u@x").await;
    client.send("Newsgroups: no.such.group").await;
    client.send("Subject: lost").await;
    client.send("").await;
    client.send("content").await;
    client.send(".").await;

    assert_eq!(code(&client.line().await), 441);
}

#[tokio::test]
async fn test_post_not_permitted() {
    let server = start(|config| config.without_posting()).await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    assert_eq!(code(&client.cmd("POST").await), 440);
}

#[tokio::test]
async fn test_post_to_moderated_group_is_held() {
    let server = start_default().await;
    server.store.set_moderated("rec.food", true).unwrap();

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("POST").await;
    client.send("From: u@x").await;
    client.send("Newsgroups: rec.food").await;
    client.send("Subject: needs approval").await;
    client.send("").await;
    client.send("content").await;
    client.send(".").await;
    assert_eq!(code(&client.line().await), 240);

    // Held articles are invisible until approved
    let reply = client.cmd("GROUP rec.food").await;
    assert!(reply.starts_with("211 0 "), "{reply}");
    let reply = client.cmd("GROUP rec.food.pending").await;
    assert!(reply.starts_with("211 1 "), "{reply}");
}
