//! ARTICLE/HEAD/BODY/STAT retrieval, framing and dot-stuffing on the wire

use crate::support::{TestClient, code, seed_article, start_default};

#[tokio::test]
async fn test_article_by_number() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (status, lines) = client.cmd_multiline("ARTICLE 1").await;
    assert_eq!(status, "220 1 <seed1@x.invalid>");

    // Headers, blank separator, body
    assert!(lines.iter().any(|l| l == "From: u@x"));
    assert!(lines.iter().any(|l| l == "Newsgroups: freenews.misc"));
    assert!(lines.iter().any(|l| l == "Subject: seeded"));
    assert!(lines.iter().any(|l| l == "Message-ID: <seed1@x.invalid>"));
    assert!(lines.iter().any(|l| l.starts_with("Date: ")));
    let blank = lines.iter().position(|l| l.is_empty()).expect("separator");
    assert_eq!(lines[blank + 1..], ["hello"]);
}

#[tokio::test]
async fn test_head_and_body_parts() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("GROUP freenews.misc").await;

    let (status, lines) = client.cmd_multiline("HEAD 1").await;
    assert_eq!(code(&status), 221);
    assert!(lines.iter().any(|l| l == "Subject: seeded"));
    assert!(!lines.iter().any(|l| l == "hello"));

    let (status, lines) = client.cmd_multiline("BODY 1").await;
    assert_eq!(code(&status), 222);
    assert_eq!(lines, vec!["hello"]);

    // STAT carries no content at all
    let reply = client.cmd("STAT 1").await;
    assert_eq!(reply, "223 1 <seed1@x.invalid>");
}

#[tokio::test]
async fn test_article_by_message_id_without_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    // No GROUP issued; message-id lookup still works, number reads 0
    let (status, lines) = client.cmd_multiline("ARTICLE <seed2@x.invalid>").await;
    assert_eq!(status, "220 0 <seed2@x.invalid>");
    assert!(lines.iter().any(|l| l == "second body"));
}

#[tokio::test]
async fn test_article_error_codes() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    // Number without a group
    assert_eq!(code(&client.cmd("ARTICLE 1").await), 412);
    // Bare ARTICLE without a group
    assert_eq!(code(&client.cmd("ARTICLE").await), 412);
    // Unknown message-id
    assert_eq!(code(&client.cmd("ARTICLE <nope@x.invalid>").await), 430);

    client.cmd("GROUP freenews.misc").await;
    // Number with no article behind it
    assert_eq!(code(&client.cmd("ARTICLE 99").await), 423);
    // Garbage argument
    assert_eq!(code(&client.cmd("ARTICLE abc").await), 501);
}

#[tokio::test]
async fn test_bare_article_in_empty_group() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("GROUP rec.food").await;
    assert_eq!(code(&client.cmd("ARTICLE").await), 420);
}

#[tokio::test]
async fn test_body_lines_are_dot_stuffed_on_the_wire() {
    let server = start_default().await;
    seed_article(
        &server.store,
        "rec.food",
        "<dots@x.invalid>",
        ".leading dot\r\n..two dots\r\nplain",
    );

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;
    client.cmd("GROUP rec.food").await;
    client.send("BODY 1").await;
    assert_eq!(code(&client.line().await), 222);

    // Raw wire lines: each leading dot gained one more
    assert_eq!(client.line().await, "..leading dot");
    assert_eq!(client.line().await, "...two dots");
    assert_eq!(client.line().await, "plain");
    assert_eq!(client.line().await, ".");
}
