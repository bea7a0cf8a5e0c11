#![no_main]
use libfuzzer_sys::fuzz_target;

use hwire::{Connection, Event, NextEvent, Role};

const CHUNKED_HEAD: &[u8] =
    b"POST / HTTP/1.1\r\nhost: fuzz\r\ntransfer-encoding: chunked\r\n\r\n";
const CLEN_HEAD: &[u8] = b"POST / HTTP/1.1\r\nhost: fuzz\r\ncontent-length: 512\r\n\r\n";

fn run(head: &[u8], body: &[u8]) {
    let mut conn = Connection::new(Role::Server);
    conn.receive_data(head).unwrap();
    let mut fed = false;
    loop {
        match conn.next_event() {
            Ok(NextEvent::Event(Event::ConnectionClosed)) | Ok(NextEvent::Paused) | Err(_) => {
                return;
            }
            Ok(NextEvent::Event(_)) => {}
            Ok(NextEvent::NeedData) => {
                if fed {
                    return;
                }
                if conn.receive_data(body).is_err() || conn.receive_data(b"").is_err() {
                    return;
                }
                fed = true;
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a chunked body and as a fixed-length body.
    run(CHUNKED_HEAD, data);
    run(CLEN_HEAD, data);
});
