//! NEWGROUPS and NEWNEWS discovery commands

use crate::support::{TestClient, code, seed_article, start_default};

#[tokio::test]
async fn test_newgroups_since_epoch() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, lines) = client.cmd_multiline("NEWGROUPS 19990101 000000 GMT").await;
    assert_eq!(code(&status), 231);
    let names: Vec<&str> = lines
        .iter()
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert!(names.contains(&"freenews.misc"));
    assert!(names.contains(&"comp.lang.rs"));

    // LIST ACTIVE format per line
    assert!(lines.iter().any(|l| l == "freenews.misc 3 1 y"));
}

#[tokio::test]
async fn test_newgroups_future_cutoff() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, lines) = client.cmd_multiline("NEWGROUPS 20990101 000000").await;
    assert_eq!(code(&status), 231);
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_newgroups_two_digit_year() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    // 990101 is 1999 per the RFC 3977 century rule
    let (status, lines) = client.cmd_multiline("NEWGROUPS 990101 000000").await;
    assert_eq!(code(&status), 231);
    assert!(!lines.is_empty());
}

#[tokio::test]
async fn test_newgroups_bad_arguments() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    assert_eq!(code(&client.cmd("NEWGROUPS").await), 501);
    assert_eq!(code(&client.cmd("NEWGROUPS 2025 0000").await), 501);
    assert_eq!(code(&client.cmd("NEWGROUPS 20250101 000000 PST").await), 501);
}

#[tokio::test]
async fn test_newnews_wildmat_and_date() {
    let server = start_default().await;
    seed_article(&server.store, "comp.lang.rs", "<fresh@x.invalid>", "rust news");

    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, lines) = client.cmd_multiline("NEWNEWS comp.* 19990101 000000 GMT").await;
    assert_eq!(code(&status), 230);
    assert_eq!(lines, vec!["<fresh@x.invalid>"]);

    // Groups outside the wildmat contribute nothing
    let (_, lines) = client.cmd_multiline("NEWNEWS rec.* 19990101 000000").await;
    assert!(lines.is_empty());

    // Future cutoff excludes everything
    let (_, lines) = client.cmd_multiline("NEWNEWS * 20990101 000000").await;
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_newnews_bad_arguments() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    assert_eq!(code(&client.cmd("NEWNEWS").await), 501);
    assert_eq!(code(&client.cmd("NEWNEWS comp.*").await), 501);
    assert_eq!(code(&client.cmd("NEWNEWS comp.* baddate 000000").await), 501);
}
