
use std::sync::Arc;

use serde_json::json;

use crate::config::Config;
use crate::event::{UiBus, UiEvent};
use crate::resource::testing::{FakeClient, fake};
use crate::session::Session;

struct Harness {
    session: Session,
    client: Arc<FakeClient>,
    events: flume::Receiver<UiEvent>,
    _listener: crate::bus::Subscription,
}

impl Harness {
    fn new() -> Self {
        let bus = UiBus::new();
        let (listener, events) = bus.listen();
        let session = Session::with_bus(Config::default(), bus).expect("session should build");
        let client = fake();
        client.respond(
            "directory:/home",
            30,
            Ok(json!([
                {"file_id": "1", "name": "notes.txt", "size": 12},
                {"file_id": "2", "name": "report.pdf", "size": 4096},
                {"directory_id": "9", "name": "archive"}
            ])),
        );
        client.respond(
            "directory:/home/archive",
            30,
            Ok(json!([{"file_id": "3", "name": "old.txt", "size": 1}])),
        );
        Self {
            session,
            client,
            events,
            _listener: listener,
        }
    }

    fn drain(&self) -> Vec<UiEvent> {
        self.events.try_iter().collect()
    }

    fn topics(&self) -> Vec<&'static str> {
        self.drain().iter().map(UiEvent::topic).collect()
    }
}
