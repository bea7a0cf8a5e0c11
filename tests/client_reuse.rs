use hwire::{Connection, EndOfMessage, Event, Request, Response, Role, State};

mod common;
use common::{drain, setup_logger, transfer};

fn run_cycle(client: &mut Connection, server: &mut Connection, target: &str) {
    let request = Request::new("GET", target, [("Host", "example.com")]).unwrap();
    transfer(client, server, Event::Request(request));
    transfer(client, server, EndOfMessage::default().into());
    let events = drain(server);
    match &events[0] {
        Event::Request(req) => assert_eq!(req.target.as_ref(), target.as_bytes()),
        other => panic!("unexpected {:?}", other),
    }

    let response = Response::new(200, [("Content-Length", "0")], "").unwrap();
    transfer(server, client, Event::Response(response));
    transfer(server, client, EndOfMessage::default().into());
    assert_eq!(drain(client).len(), 2);
}

#[test]
fn two_cycles_on_one_connection() {
    setup_logger();
    let mut client = Connection::new(Role::Client);
    let mut server = Connection::new(Role::Server);

    run_cycle(&mut client, &mut server, "/first");
    client.start_next_cycle().unwrap();
    server.start_next_cycle().unwrap();
    // The peer's version is remembered across cycles.
    assert_eq!(server.their_http_version(), Some(&b"1.1"[..]));

    run_cycle(&mut client, &mut server, "/second");
}

#[test]
fn reset_requires_both_sides_done() {
    setup_logger();
    let mut client = Connection::new(Role::Client);

    assert!(client.start_next_cycle().is_err());

    let request = Request::new("GET", "/", [("Host", "example.com")]).unwrap();
    client.send(Event::Request(request)).unwrap();
    client.send(EndOfMessage::default().into()).unwrap();
    // We are done, the server is not.
    assert_eq!(client.our_state(), State::Done);
    assert!(client.start_next_cycle().is_err());
}

#[test]
fn connection_close_request_prevents_reuse() {
    setup_logger();
    let mut client = Connection::new(Role::Client);
    let mut server = Connection::new(Role::Server);

    let request = Request::new(
        "GET",
        "/",
        [("Host", "example.com"), ("Connection", "close")],
    )
    .unwrap();
    transfer(&mut client, &mut server, Event::Request(request));
    transfer(&mut client, &mut server, EndOfMessage::default().into());
    drain(&mut server);

    let response = Response::new(200, [("Content-Length", "0")], "").unwrap();
    let head = server.send(Event::Response(response)).unwrap().unwrap();
    let text = String::from_utf8(head.to_vec()).unwrap();
    assert!(text.contains("Connection: close\r\n"), "{:?}", text);
    server.send(EndOfMessage::default().into()).unwrap();

    assert_eq!(server.our_state(), State::MustClose);
    assert_eq!(client.our_state(), State::MustClose);
    assert!(server.start_next_cycle().is_err());
    assert!(client.start_next_cycle().is_err());

    // Closing from MUST_CLOSE is the clean way out.
    assert_eq!(server.send(Event::ConnectionClosed).unwrap(), None);
    assert_eq!(server.our_state(), State::Closed);
}

#[test]
fn http10_peer_disables_keep_alive() {
    setup_logger();
    let mut server = Connection::new(Role::Server);
    server.receive_data(b"GET / HTTP/1.0\r\n\r\n").unwrap();
    drain(&mut server);

    let response = Response::new(200, [("Content-Length", "0")], "").unwrap();
    server.send(Event::Response(response)).unwrap();
    server.send(EndOfMessage::default().into()).unwrap();
    assert_eq!(server.our_state(), State::MustClose);
    assert!(server.start_next_cycle().is_err());
}
