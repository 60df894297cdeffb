// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use cue_core::OverlapPolicy;

#[test]
fn encode_decode_skip_request() {
    let request = Request::Skip {
        key: EntryKey::new("daily", "morning"),
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_decode_status_response() {
    let response = Response::Status {
        uptime_secs: 3600,
        status: RuntimeStatus {
            jobs: 3,
            active: 1,
            queued: 2,
            skipped: 0,
            pending_retries: 1,
            global_limit: 4,
        },
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn requests_are_tagged_by_type() {
    let encoded = encode(&Request::Stop {
        run_id: "run-1".to_string(),
    })
    .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

    assert_eq!(value["type"], "Stop");
    assert_eq!(value["run_id"], "run-1");
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Ok;
    let encoded = encode(&response).expect("encode failed");

    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(
        json_str.starts_with('{'),
        "should be JSON object: {}",
        json_str
    );
}

#[test]
fn jobs_response_serialization() {
    let job = JobSnapshot {
        key: EntryKey::new("daily", "morning"),
        scenario_id: "farm".into(),
        character_id: "char-1".into(),
        cadence: "every 60m".to_string(),
        overlap: OverlapPolicy::Queue,
        next_run_at: None,
        last_run_at: None,
    };

    let response = Response::Jobs {
        jobs: vec![job.clone()],
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    match decoded {
        Response::Jobs { jobs } => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0], job);
        }
        other => panic!("Expected Jobs response, got {:?}", other),
    }
}

#[test]
fn decode_rejects_unknown_request() {
    let result: Result<Request, _> = decode(br#"{"type":"Launch"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_on_empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn read_message_rejects_oversized_frame() {
    let len = (MAX_MESSAGE_SIZE as u32) + 1;
    let mut cursor = std::io::Cursor::new(len.to_be_bytes().to_vec());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
}

#[tokio::test]
async fn request_survives_a_socket_pair() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_request(&mut client, &Request::ListSkipped, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let request = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(request, Request::ListSkipped);

    write_response(&mut server, &Response::Pong, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let response = read_response(&mut client, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(response, Response::Pong);
}
