//! Stream-level properties: feeding a wire stream in arbitrary pieces gives
//! the same events, and what one side encodes the other decodes.

use bytes::Bytes;
use hwire::{
    Connection, Data, EndOfMessage, Event, Headers, NextEvent, Request, Response, Role,
};

mod common;
use common::setup_logger;

/// Events with `Data` payloads coalesced, so streams fed in different
/// chunkings compare equal.
#[derive(Debug, PartialEq)]
enum Folded {
    Request(Vec<u8>),
    Response(u16),
    Informational(u16),
    Body(Vec<u8>),
    End(Headers),
    Closed,
}

fn fold(events: Vec<Event>) -> Vec<Folded> {
    let mut out = Vec::new();
    for event in events {
        match event {
            Event::Request(req) => out.push(Folded::Request(req.target.to_vec())),
            Event::Response(res) => out.push(Folded::Response(res.status_code)),
            Event::InformationalResponse(res) => out.push(Folded::Informational(res.status_code)),
            Event::Data(data) => {
                let bytes = data.data.as_bytes().unwrap();
                if let Some(Folded::Body(prev)) = out.last_mut() {
                    prev.extend_from_slice(bytes);
                } else {
                    out.push(Folded::Body(bytes.to_vec()));
                }
            }
            Event::EndOfMessage(end) => out.push(Folded::End(end.headers)),
            Event::ConnectionClosed => out.push(Folded::Closed),
        }
    }
    out
}

fn events_from(conn: &mut Connection, stream: &[u8], piece_len: usize) -> Vec<Folded> {
    let mut events = Vec::new();
    for piece in stream.chunks(piece_len.max(1)) {
        conn.receive_data(piece).unwrap();
        loop {
            match conn.next_event().unwrap() {
                NextEvent::Event(event) => events.push(event),
                NextEvent::NeedData | NextEvent::Paused => break,
            }
        }
    }
    fold(events)
}

fn chunked_request_stream() -> Bytes {
    let mut client = Connection::new(Role::Client);
    let mut wire = Vec::new();
    let request = Request::new(
        "POST",
        "/upload",
        [("Host", "example.com"), ("Transfer-Encoding", "chunked")],
    )
    .unwrap();
    for event in [
        Event::Request(request),
        Event::Data(Data::new("hello ")),
        Event::Data(Data::new("world")),
        EndOfMessage::with_trailers([("X-Checksum", "abc123")])
            .unwrap()
            .into(),
    ] {
        if let Some(bytes) = client.send(event).unwrap() {
            wire.extend_from_slice(&bytes);
        }
    }
    Bytes::from(wire)
}

#[test]
fn split_invariance_for_requests() {
    setup_logger();
    let stream = chunked_request_stream();

    let whole = events_from(&mut Connection::new(Role::Server), &stream, stream.len());
    for piece_len in [1, 2, 3, 7, 16] {
        let pieces = events_from(&mut Connection::new(Role::Server), &stream, piece_len);
        assert_eq!(whole, pieces, "piece_len {}", piece_len);
    }
}

#[test]
fn split_invariance_for_responses() {
    setup_logger();
    let mut server = Connection::new(Role::Server);
    server
        .receive_data(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .unwrap();
    while !matches!(server.next_event().unwrap(), NextEvent::NeedData) {}

    let mut wire = Vec::new();
    let response = Response::new(200, Vec::<(&str, &str)>::new(), "OK").unwrap();
    for event in [
        Event::Response(response),
        Event::Data(Data::new("chunk one, ")),
        Event::Data(Data::new("chunk two")),
        EndOfMessage::default().into(),
    ] {
        if let Some(bytes) = server.send(event).unwrap() {
            wire.extend_from_slice(&bytes);
        }
    }

    let receive = |piece_len: usize| {
        let mut client = Connection::new(Role::Client);
        let request = Request::new("GET", "/", [("Host", "example.com")]).unwrap();
        client.send(Event::Request(request)).unwrap();
        client.send(EndOfMessage::default().into()).unwrap();
        events_from(&mut client, &wire, piece_len)
    };

    let whole = receive(wire.len());
    assert_eq!(
        whole,
        vec![
            Folded::Response(200),
            Folded::Body(b"chunk one, chunk two".to_vec()),
            Folded::End(Headers::new()),
        ]
    );
    for piece_len in [1, 3, 10] {
        assert_eq!(whole, receive(piece_len), "piece_len {}", piece_len);
    }
}

#[test]
fn chunked_round_trip_brackets_chunks() {
    setup_logger();
    let stream = chunked_request_stream();
    let mut server = Connection::new(Role::Server);
    server.receive_data(&stream).unwrap();

    let mut data_events = Vec::new();
    loop {
        match server.next_event().unwrap() {
            NextEvent::Event(Event::Data(data)) => data_events.push(data),
            NextEvent::Event(Event::EndOfMessage(end)) => {
                assert_eq!(end.headers.get("x-checksum"), Some(&b"abc123"[..]));
                break;
            }
            NextEvent::Event(_) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
    // Whole chunks arrived in one piece each, bracketed by both flags.
    assert_eq!(data_events.len(), 2);
    for data in &data_events {
        assert!(data.chunk_start && data.chunk_end);
    }
    let body: Vec<u8> = data_events
        .iter()
        .flat_map(|d| d.data.as_bytes().unwrap().to_vec())
        .collect();
    assert_eq!(body, b"hello world");
}

#[test]
fn content_length_exactness() {
    setup_logger();
    let mut client = Connection::new(Role::Client);
    let mut server = Connection::new(Role::Server);

    let request = Request::new(
        "POST",
        "/",
        [("Host", "example.com"), ("Content-Length", "11")],
    )
    .unwrap();
    let mut wire = Vec::new();
    for event in [
        Event::Request(request),
        Event::Data(Data::new("hello")),
        Event::Data(Data::new(" ")),
        Event::Data(Data::new("world")),
        EndOfMessage::default().into(),
    ] {
        if let Some(bytes) = client.send(event).unwrap() {
            wire.extend_from_slice(&bytes);
        }
    }

    let folded = events_from(&mut server, &wire, 4);
    assert_eq!(
        folded,
        vec![
            Folded::Request(b"/".to_vec()),
            Folded::Body(b"hello world".to_vec()),
            Folded::End(Headers::new()),
        ]
    );
}

#[test]
fn send_receive_symmetry() {
    setup_logger();
    // Everything the client emits, a fresh server decodes to the same
    // event sequence, and vice versa for the response leg.
    let mut client = Connection::new(Role::Client);
    let mut server = Connection::new(Role::Server);

    let sent = vec![
        Event::Request(
            Request::new(
                "PUT",
                "/doc",
                [("Host", "example.com"), ("Content-Length", "4")],
            )
            .unwrap(),
        ),
        Event::Data(Data::new("data")),
        EndOfMessage::default().into(),
    ];
    let mut wire = Vec::new();
    for event in sent.clone() {
        if let Some(bytes) = client.send(event).unwrap() {
            wire.extend_from_slice(&bytes);
        }
    }
    server.receive_data(&wire).unwrap();
    let mut received = Vec::new();
    loop {
        match server.next_event().unwrap() {
            NextEvent::Event(event) => {
                let done = matches!(event, Event::EndOfMessage(_));
                received.push(event);
                if done {
                    break;
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(fold(sent), fold(received));
}
