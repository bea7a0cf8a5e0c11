//! The connection facade: bytes in, events out, events in, bytes out.

use bytes::Bytes;

use crate::buffer::{Limits, ReceiveBuffer};
use crate::error::Error;
use crate::event::{Event, EventKind, NextEvent, Request, Response, Segments};
use crate::headers::Headers;
use crate::http11;
use crate::limit::{
    request_body_mode, response_body_mode, BodyMode, LimitRead, LimitWrite,
};
use crate::state::{Annotation, ConnectionState, Role, State, Switch};

/// A sans-I/O HTTP/1.1 connection endpoint.
///
/// One instance tracks both sides of the conversation: what we may send and
/// what the peer is in the middle of sending. Feed received bytes in with
/// [`receive_data`], pull parsed events out with [`next_event`], and turn
/// outgoing events into wire bytes with [`send`]. Nothing here ever touches
/// a socket; the embedder owns all I/O.
///
/// [`receive_data`]: Connection::receive_data
/// [`next_event`]: Connection::next_event
/// [`send`]: Connection::send
#[derive(Debug)]
pub struct Connection {
    our_role: Role,
    cstate: ConnectionState,
    limits: Limits,
    receive_buffer: ReceiveBuffer,
    receive_buffer_closed: bool,
    /// Body reader for the incoming message; present exactly while the
    /// peer's state is SendBody.
    reader: Option<LimitRead>,
    /// Body writer for the outgoing message; present exactly while our
    /// state is SendBody.
    writer: Option<LimitWrite>,
    their_http_version: Option<Bytes>,
    /// Method of the request in flight; responses need it for framing.
    request_method: Option<Bytes>,
    client_is_waiting_for_100_continue: bool,
}

impl Connection {
    pub fn new(our_role: Role) -> Connection {
        Connection::with_limits(our_role, Limits::default())
    }

    pub fn with_limits(our_role: Role, limits: Limits) -> Connection {
        Connection {
            our_role,
            cstate: ConnectionState::new(),
            limits,
            receive_buffer: ReceiveBuffer::new(),
            receive_buffer_closed: false,
            reader: None,
            writer: None,
            their_http_version: None,
            request_method: None,
            client_is_waiting_for_100_continue: false,
        }
    }

    pub fn our_role(&self) -> Role {
        self.our_role
    }

    pub fn their_role(&self) -> Role {
        self.our_role.peer()
    }

    pub fn our_state(&self) -> State {
        self.cstate.state(self.our_role)
    }

    pub fn their_state(&self) -> State {
        self.cstate.state(self.their_role())
    }

    /// The peer's HTTP version as two ASCII digits (e.g. `b"1.0"`), once a
    /// start line from them has been seen. Survives `start_next_cycle`.
    pub fn their_http_version(&self) -> Option<&[u8]> {
        self.their_http_version.as_deref()
    }

    /// True while a request with `Expect: 100-continue` is outstanding and
    /// nothing has answered or started the body yet.
    pub fn client_is_waiting_for_100_continue(&self) -> bool {
        self.client_is_waiting_for_100_continue
    }

    /// Server-side view of the same latch: the peer is holding its request
    /// body back until we react.
    pub fn they_are_waiting_for_100_continue(&self) -> bool {
        self.their_role() == Role::Client && self.client_is_waiting_for_100_continue
    }

    /// Buffered bytes the engine is not going to interpret, plus whether the
    /// peer has signalled EOF. This is what a new protocol owner takes over
    /// after a successful switch, or what a post-mortem gets after an
    /// unclean close.
    pub fn trailing_data(&self) -> (Bytes, bool) {
        (self.receive_buffer.peek_all(), self.receive_buffer_closed)
    }

    /// Feed bytes received from the peer. An empty slice means the peer will
    /// send no more bytes (half-duplex EOF); receiving actual data after
    /// that is an error.
    pub fn receive_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            trace!("peer signalled EOF");
            self.receive_buffer_closed = true;
            return Ok(());
        }
        if self.receive_buffer_closed {
            return Err(Error::user("received close, then received more data"));
        }
        trace!("buffering {} received bytes", data.len());
        self.receive_buffer.extend(data);
        Ok(())
    }

    /// Parse the next event out of the receive buffer.
    ///
    /// Besides events this can report [`NextEvent::NeedData`] (feed more
    /// bytes) and [`NextEvent::Paused`] (buffered bytes exist but belong to
    /// someone else: the next cycle, or the protocol we switched to). After
    /// a clean close it keeps returning `ConnectionClosed`.
    pub fn next_event(&mut self) -> Result<NextEvent, Error> {
        if self.their_state() == State::Error {
            return Err(Error::remote(
                "Can't receive data when peer state is ERROR",
            ));
        }
        match self.next_event_inner() {
            Ok(event) => Ok(event),
            Err(err) => {
                self.cstate.process_error(self.their_role());
                Err(err.into_remote())
            }
        }
    }

    fn next_event_inner(&mut self) -> Result<NextEvent, Error> {
        let event = self.extract_next_receive_event()?;
        match &event {
            NextEvent::Event(ev) => {
                debug!("received event {:?}", ev.kind());
                self.process_receive_event(ev)?;
            }
            NextEvent::NeedData => {
                if self.receive_buffer_closed {
                    return Err(Error::remote("peer unexpectedly closed connection"));
                }
            }
            NextEvent::Paused => {}
        }
        Ok(event)
    }

    fn extract_next_receive_event(&mut self) -> Result<NextEvent, Error> {
        let state = self.their_state();
        if state == State::Done && !self.receive_buffer.is_empty() {
            // Pipelined bytes for the next cycle; not ours to touch until
            // start_next_cycle().
            return Ok(NextEvent::Paused);
        }
        if state == State::MightSwitchProtocol || state == State::SwitchedProtocol {
            return Ok(NextEvent::Paused);
        }

        if let Some(event) = self.read_from_peer(state)? {
            return Ok(NextEvent::Event(event));
        }

        if self.receive_buffer.is_empty() && self.receive_buffer_closed {
            // EOF mid-body can be a real protocol event (an unframed
            // response body ends this way); anywhere else it is either a
            // clean close or an error the state machine flags.
            let event = match (&self.reader, state) {
                (Some(reader), State::SendBody) => reader.read_eof()?,
                _ => Event::ConnectionClosed,
            };
            return Ok(NextEvent::Event(event));
        }
        Ok(NextEvent::NeedData)
    }

    fn read_from_peer(&mut self, state: State) -> Result<Option<Event>, Error> {
        match (self.their_role(), state) {
            (Role::Client, State::Idle) => self.maybe_read_request(),
            (Role::Server, State::Idle) | (Role::Server, State::SendResponse) => {
                self.maybe_read_response()
            }
            (_, State::SendBody) => match self.reader.as_mut() {
                Some(reader) => reader.read(&mut self.receive_buffer, &self.limits),
                None => unreachable!("body reader present while peer sends a body"),
            },
            (_, State::Done) | (_, State::MustClose) | (_, State::Closed) => {
                if !self.receive_buffer.is_empty() {
                    return Err(Error::remote("got data when nothing was expected"));
                }
                Ok(None)
            }
            (role, state) => unreachable!("no reader for {:?} in {:?}", role, state),
        }
    }

    fn maybe_read_request(&mut self) -> Result<Option<Event>, Error> {
        // Fail fast if the first byte cannot possibly start a request line;
        // someone is probably speaking a binary protocol at us.
        if let Some(b) = self.receive_buffer.first() {
            let printable = (0x21..=0x7e).contains(&b);
            let whitespace = matches!(b, b'\r' | b'\n' | b' ' | b'\t');
            if !printable && !whitespace {
                return Err(Error::remote(
                    "first byte is not printable ASCII (peer is not speaking HTTP?)",
                ));
            }
        }
        let lines = match self.receive_buffer.extract_lines(self.limits.max_headers_len)? {
            Some(lines) => lines,
            None => return Ok(None),
        };
        if lines.is_empty() {
            return Err(Error::remote("no request line received"));
        }
        let (method, target, http_version) = http11::parse_request_line(&lines[0])?;
        let headers = http11::parse_header_block(&lines[1..])?;
        let request = Request::from_wire(method, target, headers, http_version)?;
        Ok(Some(Event::Request(request)))
    }

    fn maybe_read_response(&mut self) -> Result<Option<Event>, Error> {
        let lines = match self.receive_buffer.extract_lines(self.limits.max_headers_len)? {
            Some(lines) => lines,
            None => return Ok(None),
        };
        if lines.is_empty() {
            return Err(Error::remote("no status line received"));
        }
        let (http_version, status_code, reason) = http11::parse_status_line(&lines[0])?;
        let headers = http11::parse_header_block(&lines[1..])?;
        let response = Response {
            status_code,
            headers,
            http_version,
            reason,
        };
        Ok(Some(if status_code < 200 {
            Event::InformationalResponse(response)
        } else {
            Event::Response(response)
        }))
    }

    fn process_receive_event(&mut self, event: &Event) -> Result<(), Error> {
        self.process_event(self.their_role(), event, None)?;
        match event {
            Event::Request(req) => {
                let mode = request_body_mode(&req.headers)?;
                self.reader = Some(LimitRead::from_mode(mode));
            }
            Event::Response(res) => {
                self.reader = if self.their_state() == State::SendBody {
                    let mode = response_body_mode(
                        self.request_method.as_deref(),
                        res.status_code,
                        &res.headers,
                    )?;
                    Some(LimitRead::from_mode(mode))
                } else {
                    None
                };
            }
            Event::EndOfMessage(_) | Event::ConnectionClosed => {
                self.reader = None;
            }
            _ => {}
        }
        Ok(())
    }

    /// Turn an outgoing event into wire bytes, concatenated. `None` when the
    /// event was `ConnectionClosed`, which has no wire form. Opaque body
    /// payloads cannot be concatenated and are rejected here; use
    /// [`send_with_data_passthrough`] for those.
    ///
    /// [`send_with_data_passthrough`]: Connection::send_with_data_passthrough
    pub fn send(&mut self, event: Event) -> Result<Option<Bytes>, Error> {
        if let Event::Data(data) = &event {
            if data.data.as_bytes().is_none() {
                return Err(Error::user(
                    "opaque body payloads require send_with_data_passthrough",
                ));
            }
        }
        match self.send_with_data_passthrough(event)? {
            Some(segments) => Ok(Some(segments.into_bytes()?)),
            None => Ok(None),
        }
    }

    /// Like [`send`], but the result keeps framing bytes and body payloads
    /// as separate ordered segments, so an opaque payload can go straight to
    /// a zero-copy send primitive.
    ///
    /// [`send`]: Connection::send
    pub fn send_with_data_passthrough(
        &mut self,
        event: Event,
    ) -> Result<Option<Segments>, Error> {
        if self.our_state() == State::Error {
            return Err(Error::user("Can't send data when our state is ERROR"));
        }
        match self.send_inner(event) {
            Ok(out) => Ok(out),
            Err(err) => {
                self.cstate.process_error(self.our_role);
                Err(err)
            }
        }
    }

    /// Bytes handed out by a previous `send` were not actually transmitted.
    /// The wire state is unknowable now, so this side goes to ERROR and the
    /// connection will not be reused.
    pub fn send_failed(&mut self) {
        self.cstate.process_error(self.our_role);
    }

    fn send_inner(&mut self, event: Event) -> Result<Option<Segments>, Error> {
        let event = match event {
            Event::Response(response) => {
                Event::Response(self.clean_up_response_headers_for_sending(response)?)
            }
            other => other,
        };

        match &event {
            Event::Request(req) => {
                if req.http_version.as_ref() != b"1.1" {
                    return Err(Error::user("only HTTP/1.1 can be sent"));
                }
            }
            Event::InformationalResponse(res) => {
                if !(100..=199).contains(&res.status_code) {
                    return Err(Error::user(format!(
                        "InformationalResponse status_code should be in range [100, 199], not {}",
                        res.status_code
                    )));
                }
                if res.http_version.as_ref() != b"1.1" {
                    return Err(Error::user("only HTTP/1.1 can be sent"));
                }
            }
            Event::Response(res) => {
                if !(200..=999).contains(&res.status_code) {
                    return Err(Error::user(format!(
                        "Response status_code should be in range [200, 999], not {}",
                        res.status_code
                    )));
                }
                if res.http_version.as_ref() != b"1.1" {
                    return Err(Error::user("only HTTP/1.1 can be sent"));
                }
            }
            _ => {}
        }

        let mode = match &event {
            Event::Request(req) => Some(request_body_mode(&req.headers)?),
            Event::Response(res) => Some(response_body_mode(
                self.request_method.as_deref(),
                res.status_code,
                &res.headers,
            )?),
            _ => None,
        };
        let extra = match (&event, mode) {
            (Event::Response(_), Some(BodyMode::NoBody)) => {
                Some(Annotation::ResponseWithoutBody)
            }
            _ => None,
        };

        self.process_event(self.our_role, &event, extra)?;
        debug!("sending event {:?}", event.kind());

        let mut out = Segments::new();
        match event {
            Event::ConnectionClosed => return Ok(None),
            Event::Request(req) => {
                http11::write_request_head(&req, out.bytes_mut());
                self.writer = Some(LimitWrite::from_mode(mode.unwrap_or(BodyMode::NoBody)));
            }
            Event::InformationalResponse(res) => {
                http11::write_response_head(&res, out.bytes_mut());
            }
            Event::Response(res) => {
                http11::write_response_head(&res, out.bytes_mut());
                self.writer = if self.our_state() == State::SendBody {
                    Some(LimitWrite::from_mode(mode.unwrap_or(BodyMode::NoBody)))
                } else {
                    None
                };
            }
            Event::Data(data) => match self.writer.as_mut() {
                Some(writer) => writer.write_data(data.data, &mut out)?,
                None => unreachable!("body writer present while we send a body"),
            },
            Event::EndOfMessage(end) => match self.writer.take() {
                Some(mut writer) => writer.finish(&end.headers, &mut out)?,
                None => unreachable!("body writer present while we send a body"),
            },
        }
        Ok(Some(out))
    }

    /// Event bookkeeping shared by the send and receive paths: sub-state
    /// latches, version/method tracking, and the state machine itself.
    fn process_event(
        &mut self,
        role: Role,
        event: &Event,
        extra: Option<Annotation>,
    ) -> Result<(), Error> {
        if role == Role::Client {
            if let Event::Request(req) = event {
                if req.method.as_ref() == b"CONNECT" {
                    self.cstate.process_client_switch_proposal(Switch::Connect);
                }
                if !req.headers.get_comma("upgrade", true).is_empty() {
                    self.cstate.process_client_switch_proposal(Switch::Upgrade);
                }
            }
        }

        let switch = if role == Role::Server {
            self.server_switch_annotation(event)
        } else {
            None
        };
        self.cstate.process_event(role, event.kind(), switch.or(extra))?;

        if let Event::Request(req) = event {
            self.request_method = Some(req.method.clone());
        }
        if role == self.their_role() {
            match event {
                Event::Request(req) => {
                    self.their_http_version = Some(req.http_version.clone());
                }
                Event::InformationalResponse(res) | Event::Response(res) => {
                    self.their_http_version = Some(res.http_version.clone());
                }
                _ => {}
            }
        }

        match event {
            Event::Request(req) => {
                if !keep_alive_allowed(&req.headers, &req.http_version) {
                    self.cstate.process_keep_alive_disabled();
                }
                if has_expect_100_continue(req) {
                    self.client_is_waiting_for_100_continue = true;
                }
            }
            Event::Response(res) => {
                if !keep_alive_allowed(&res.headers, &res.http_version) {
                    self.cstate.process_keep_alive_disabled();
                }
            }
            _ => {}
        }
        match event.kind() {
            EventKind::InformationalResponse | EventKind::Response => {
                self.client_is_waiting_for_100_continue = false;
            }
            EventKind::Data | EventKind::EndOfMessage if role == Role::Client => {
                self.client_is_waiting_for_100_continue = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn server_switch_annotation(&self, event: &Event) -> Option<Annotation> {
        match event {
            Event::InformationalResponse(res) if res.status_code == 101 => {
                Some(Annotation::SwitchUpgrade)
            }
            Event::Response(res)
                if self.cstate.pending(Switch::Connect)
                    && (200..300).contains(&res.status_code) =>
            {
                Some(Annotation::SwitchConnect)
            }
            _ => None,
        }
    }

    /// Fill in the framing headers the response needs, as decided by us and
    /// the peer's HTTP version, and add `Connection: close` when this
    /// connection is not coming back.
    fn clean_up_response_headers_for_sending(
        &self,
        response: Response,
    ) -> Result<Response, Error> {
        let Response {
            status_code,
            mut headers,
            http_version,
            reason,
        } = response;
        let mut need_close = false;

        // Decide which framing headers to add as if the request had been a
        // GET: a HEAD response advertises the framing its GET twin would
        // have used, while still sending no body.
        let method_for_framing = match self.request_method.as_deref() {
            Some(b"HEAD") => Some(&b"GET"[..]),
            other => other,
        };
        let mode = response_body_mode(method_for_framing, status_code, &headers)?;
        if matches!(mode, BodyMode::Chunked | BodyMode::ReadUntilClose) {
            // The framing is ours to pick; a Content-Length would be a lie.
            headers.set_comma("Content-Length", &[]);
            let peer_is_http10 = self
                .their_http_version
                .as_deref()
                .map(|v| v < &b"1.1"[..])
                .unwrap_or(true);
            if peer_is_http10 {
                // An HTTP/1.0 peer does not know chunked; the body has to
                // be delimited by closing the connection.
                headers.set_comma("Transfer-Encoding", &[]);
                if self.request_method.as_deref() != Some(&b"HEAD"[..]) {
                    need_close = true;
                }
            } else {
                headers.set_comma("Transfer-Encoding", &[&b"chunked"[..]]);
            }
        }

        if !self.cstate.keep_alive || need_close {
            let mut connection = headers.get_comma("connection", true);
            connection.retain(|token| token.as_ref() != b"keep-alive");
            if !connection.iter().any(|token| token.as_ref() == b"close") {
                connection.push(Bytes::from_static(b"close"));
            }
            let values: Vec<&[u8]> = connection.iter().map(|token| token.as_ref()).collect();
            headers.set_comma("Connection", &values);
        }

        Ok(Response {
            status_code,
            headers,
            http_version,
            reason,
        })
    }

    /// Both sides are DONE and the connection may be reused: reset both
    /// state machines to IDLE for the next request/response cycle.
    pub fn start_next_cycle(&mut self) -> Result<(), Error> {
        self.cstate.start_next_cycle()?;
        // their_http_version is left alone; the peer's version outlives a
        // single cycle.
        self.request_method = None;
        self.client_is_waiting_for_100_continue = false;
        self.reader = None;
        self.writer = None;
        Ok(())
    }
}

fn keep_alive_allowed(headers: &Headers, http_version: &Bytes) -> bool {
    if headers.contains_token("connection", b"close") {
        return false;
    }
    http_version.as_ref() >= &b"1.1"[..]
}

fn has_expect_100_continue(request: &Request) -> bool {
    // "A server that receives a 100-continue expectation in an HTTP/1.0
    // request MUST ignore that expectation."
    // https://tools.ietf.org/html/rfc7231#section-5.1.1
    if request.http_version.as_ref() < &b"1.1"[..] {
        return false;
    }
    request.headers.contains_token("expect", b"100-continue")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Data, EndOfMessage};

    fn drain(conn: &mut Connection) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match conn.next_event().unwrap() {
                NextEvent::Event(Event::ConnectionClosed) => {
                    events.push(Event::ConnectionClosed);
                    return events;
                }
                NextEvent::Event(event) => events.push(event),
                NextEvent::NeedData | NextEvent::Paused => return events,
            }
        }
    }

    #[test]
    fn server_parses_simple_request() {
        let mut server = Connection::new(Role::Server);
        server
            .receive_data(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .unwrap();
        let events = drain(&mut server);
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::Request(req) => {
                assert_eq!(req.method.as_ref(), b"GET");
                assert_eq!(req.target.as_ref(), b"/");
                assert_eq!(req.headers.get("host"), Some(&b"example.com"[..]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events[1], Event::EndOfMessage(_)));
        assert_eq!(server.their_state(), State::Done);
        assert_eq!(server.our_state(), State::SendResponse);
        assert_eq!(server.their_http_version(), Some(&b"1.1"[..]));
    }

    #[test]
    fn server_rejects_binary_garbage_immediately() {
        let mut server = Connection::new(Role::Server);
        server.receive_data(&[0x16, 0x03, 0x01]).unwrap();
        // No full line yet, but this cannot be HTTP.
        let err = server.next_event().unwrap_err();
        assert!(matches!(err, Error::Protocol(..)));
        assert_eq!(server.their_state(), State::Error);
    }

    #[test]
    fn next_event_keeps_reporting_closed() {
        let mut server = Connection::new(Role::Server);
        server.receive_data(b"").unwrap();
        for _ in 0..3 {
            assert_eq!(
                server.next_event().unwrap(),
                NextEvent::Event(Event::ConnectionClosed)
            );
        }
        assert_eq!(server.their_state(), State::Closed);
        assert_eq!(server.our_state(), State::MustClose);
    }

    #[test]
    fn data_after_eof_rejected() {
        let mut server = Connection::new(Role::Server);
        server.receive_data(b"").unwrap();
        assert!(server.receive_data(b"more").is_err());
    }

    #[test]
    fn eof_mid_header_block_is_an_error() {
        let mut client = Connection::new(Role::Client);
        client
            .send(Event::Request(
                Request::new("GET", "/", [("Host", "a")]).unwrap(),
            ))
            .unwrap();
        client.send(EndOfMessage::default().into()).unwrap();
        client.receive_data(b"HTTP/1.1 200 OK\r\nContent-").unwrap();
        assert_eq!(client.next_event().unwrap(), NextEvent::NeedData);
        client.receive_data(b"").unwrap();
        let err = client.next_event().unwrap_err();
        assert!(matches!(err, Error::Protocol(..)));
    }

    #[test]
    fn pipelined_request_pauses_until_next_cycle() {
        let mut server = Connection::new(Role::Server);
        server
            .receive_data(
                b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n",
            )
            .unwrap();
        let events = drain(&mut server);
        assert_eq!(events.len(), 2);
        assert_eq!(server.next_event().unwrap(), NextEvent::Paused);

        let response = Response::new(200, [("Content-Length", "0")], "").unwrap();
        server.send(Event::Response(response)).unwrap();
        server.send(EndOfMessage::default().into()).unwrap();
        server.start_next_cycle().unwrap();

        let events = drain(&mut server);
        match &events[0] {
            Event::Request(req) => assert_eq!(req.target.as_ref(), b"/b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn send_in_error_state_keeps_failing() {
        let mut client = Connection::new(Role::Client);
        client.send_failed();
        assert_eq!(client.our_state(), State::Error);
        let err = client
            .send(Event::Request(
                Request::new("GET", "/", [("Host", "a")]).unwrap(),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::User(..)));
    }

    #[test]
    fn server_can_still_respond_after_peer_error() {
        let mut server = Connection::new(Role::Server);
        server.receive_data(b"\x00\x00garbage").unwrap();
        assert!(server.next_event().is_err());
        assert_eq!(server.their_state(), State::Error);

        let response = Response::new(400, [("Content-Length", "0")], "").unwrap();
        assert!(server.send(Event::Response(response)).is_ok());
        server.send(EndOfMessage::default().into()).unwrap();
        assert_eq!(server.our_state(), State::MustClose);
    }

    #[test]
    fn connection_close_header_disables_reuse() {
        let mut server = Connection::new(Role::Server);
        server
            .receive_data(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .unwrap();
        drain(&mut server);
        let response = Response::new(200, [("Content-Length", "0")], "").unwrap();
        let bytes = server.send(Event::Response(response)).unwrap().unwrap();
        // The engine adds Connection: close on its own.
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Connection: close\r\n"), "{:?}", text);
        server.send(EndOfMessage::default().into()).unwrap();
        assert_eq!(server.our_state(), State::MustClose);
        assert!(server.start_next_cycle().is_err());
    }

    #[test]
    fn http10_response_body_is_close_delimited() {
        let mut server = Connection::new(Role::Server);
        server.receive_data(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        drain(&mut server);
        assert_eq!(server.their_http_version(), Some(&b"1.0"[..]));

        let response = Response::new(200, Vec::<(&str, &str)>::new(), "").unwrap();
        let bytes = server.send(Event::Response(response)).unwrap().unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("Transfer-Encoding"), "{:?}", text);
        assert!(text.contains("Connection: close\r\n"), "{:?}", text);

        let data = server
            .send(Event::Data(Data::new("unframed")))
            .unwrap()
            .unwrap();
        assert_eq!(data.as_ref(), b"unframed");
        server.send(EndOfMessage::default().into()).unwrap();
    }

    #[test]
    fn auto_chunked_for_http11_peer_without_framing() {
        let mut server = Connection::new(Role::Server);
        server
            .receive_data(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();
        drain(&mut server);

        let response = Response::new(200, Vec::<(&str, &str)>::new(), "").unwrap();
        let bytes = server.send(Event::Response(response)).unwrap().unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Transfer-Encoding: chunked\r\n"), "{:?}", text);

        let data = server
            .send(Event::Data(Data::new("hello")))
            .unwrap()
            .unwrap();
        assert_eq!(data.as_ref(), b"5\r\nhello\r\n");
        let end = server.send(EndOfMessage::default().into()).unwrap().unwrap();
        assert_eq!(end.as_ref(), b"0\r\n\r\n");
    }

    #[test]
    fn expect_100_continue_latch() {
        let mut server = Connection::new(Role::Server);
        server
            .receive_data(
                b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\nExpect: 100-Continue\r\n\r\n",
            )
            .unwrap();
        server.next_event().unwrap();
        assert!(server.they_are_waiting_for_100_continue());

        let informational = Response::new(100, Vec::<(&str, &str)>::new(), "Continue").unwrap();
        server
            .send(Event::InformationalResponse(informational))
            .unwrap();
        assert!(!server.they_are_waiting_for_100_continue());
        assert_eq!(server.our_state(), State::SendResponse);
    }
}
