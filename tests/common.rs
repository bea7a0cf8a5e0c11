#![allow(dead_code)]

use hwire::{Connection, Event, NextEvent};

pub fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Send an event on one side and feed the produced bytes to the other.
pub fn transfer(from: &mut Connection, to: &mut Connection, event: Event) {
    if let Some(bytes) = from.send(event).unwrap() {
        // An empty slice would mean EOF, so only feed actual bytes.
        if !bytes.is_empty() {
            to.receive_data(&bytes).unwrap();
        }
    }
}

/// Pull events until the connection wants more data, pauses, or reports the
/// close.
pub fn drain(conn: &mut Connection) -> Vec<Event> {
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

/// Concatenated payload bytes of all `Data` events.
pub fn body_of(events: &[Event]) -> Vec<u8> {
    let mut out = Vec::new();
    for event in events {
        if let Event::Data(data) = event {
            out.extend_from_slice(data.data.as_bytes().expect("byte payload"));
        }
    }
    out
}
