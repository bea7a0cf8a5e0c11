#![no_main]
use libfuzzer_sys::fuzz_target;

use hwire::{Connection, Event, NextEvent, Role};

fn run(conn: &mut Connection) {
    for _ in 0..1024 {
        match conn.next_event() {
            Ok(NextEvent::Event(Event::ConnectionClosed)) => return,
            Ok(NextEvent::Event(_)) => {}
            Ok(NextEvent::NeedData) | Ok(NextEvent::Paused) => return,
            Err(_) => return,
        }
    }
}

fuzz_target!(|data: &[u8]| {
    // Whole input at once.
    let mut conn = Connection::new(Role::Server);
    let _ = conn.receive_data(data);
    run(&mut conn);
    let _ = conn.receive_data(b"");
    run(&mut conn);

    // Same input, trickled in small pieces; must never panic and must not
    // behave differently enough to crash.
    let mut conn = Connection::new(Role::Server);
    for piece in data.chunks(3) {
        if conn.receive_data(piece).is_err() {
            return;
        }
        run(&mut conn);
    }
    let _ = conn.receive_data(b"");
    run(&mut conn);
});
