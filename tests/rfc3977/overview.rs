//! OVER/XOVER and HDR/XHDR output

use crate::support::{TestClient, code, start_default};

#[tokio::test]
async fn test_over_range() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (status, lines) = client.cmd_multiline("OVER 1-3").await;
    assert_eq!(code(&status), 224);
    assert_eq!(lines.len(), 3);

    let fields: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[0], "1");
    assert_eq!(fields[1], "seeded"); // Subject
    assert_eq!(fields[2], "u@x"); // From
    assert_eq!(fields[4], "<seed1@x.invalid>"); // Message-ID
    assert!(fields[6].parse::<u64>().unwrap() > 0); // :bytes
    assert_eq!(fields[7], "1"); // :lines
    assert_eq!(fields[8], "Xref: news.test freenews.misc:1");
}

#[tokio::test]
async fn test_over_defaults_to_cursor() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    client.cmd("NEXT").await;
    let (_, lines) = client.cmd_multiline("OVER").await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("2\t"));
}

#[tokio::test]
async fn test_over_by_message_id() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, lines) = client.cmd_multiline("OVER <seed3@x.invalid>").await;
    assert_eq!(code(&status), 224);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("0\t"));
    assert!(lines[0].contains("<seed3@x.invalid>"));
}

#[tokio::test]
async fn test_xover_is_over() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (_, over_lines) = client.cmd_multiline("OVER 1-3").await;
    let (status, xover_lines) = client.cmd_multiline("XOVER 1-3").await;
    assert_eq!(code(&status), 224);
    assert_eq!(over_lines, xover_lines);
}

#[tokio::test]
async fn test_over_errors() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    assert_eq!(code(&client.cmd("OVER 1-3").await), 412);
    client.cmd("GROUP freenews.misc").await;
    assert_eq!(code(&client.cmd("OVER 50-60").await), 423);
    assert_eq!(code(&client.cmd("OVER x").await), 501);
}

#[tokio::test]
async fn test_hdr_subject_range() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (status, lines) = client.cmd_multiline("HDR Subject 1-3").await;
    assert_eq!(code(&status), 225);
    assert_eq!(lines, vec!["1 seeded", "2 seeded", "3 seeded"]);
}

#[tokio::test]
async fn test_hdr_metadata_items() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (_, lines) = client.cmd_multiline("HDR :lines 1").await;
    assert_eq!(lines, vec!["1 1"]);

    let (_, lines) = client.cmd_multiline("HDR :bytes 1").await;
    let bytes: u64 = lines[0].split_whitespace().nth(1).unwrap().parse().unwrap();
    assert!(bytes > 0);
}

#[tokio::test]
async fn test_hdr_by_message_id_and_missing_header() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    let (status, lines) = client.cmd_multiline("HDR Subject <seed1@x.invalid>").await;
    assert_eq!(code(&status), 225);
    assert_eq!(lines, vec!["0 seeded"]);

    // Absent header yields an empty value, not an error
    client.cmd("GROUP freenews.misc").await;
    let (_, lines) = client.cmd_multiline("HDR X-Nonexistent 1").await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].trim_end(), "1");
}

#[tokio::test]
async fn test_hdr_xref_is_generated() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (_, lines) = client.cmd_multiline("HDR Xref 1").await;
    assert_eq!(lines, vec!["1 news.test freenews.misc:1"]);
}

#[tokio::test]
async fn test_xhdr_is_hdr() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    client.cmd("GROUP freenews.misc").await;
    let (_, hdr_lines) = client.cmd_multiline("HDR Message-ID 1-3").await;
    let (status, xhdr_lines) = client.cmd_multiline("XHDR Message-ID 1-3").await;
    assert_eq!(code(&status), 225);
    assert_eq!(hdr_lines, xhdr_lines);
}

#[tokio::test]
async fn test_hdr_errors() {
    let server = start_default().await;
    let (mut client, _) = TestClient::connect_and_greet(server.addr).await;

    assert_eq!(code(&client.cmd("HDR").await), 501);
    assert_eq!(code(&client.cmd("HDR Subject 1").await), 412);
    client.cmd("GROUP freenews.misc").await;
    assert_eq!(code(&client.cmd("HDR Subject 50-60").await), 423);
}
