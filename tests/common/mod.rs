//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;

use beacon_remote::{DeviceFilter, Dispatcher, LoopbackTransport, SessionManager, Vocabulary};

/// A dispatcher wired to a loopback peripheral
pub struct Harness {
    pub transport: Arc<LoopbackTransport>,
    pub session: Arc<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Build a harness over the default vocabulary, not yet connected
#[must_use]
pub fn harness() -> Harness {
    harness_with(LoopbackTransport::new())
}

/// Build a harness around a preconfigured loopback transport
#[must_use]
pub fn harness_with(transport: LoopbackTransport) -> Harness {
    let transport = Arc::new(transport);
    let session = Arc::new(SessionManager::new(
        transport.clone(),
        DeviceFilter::default(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Vocabulary::new().into_shared(),
        session.clone(),
    ));

    Harness {
        transport,
        session,
        dispatcher,
    }
}

/// Build a harness with an established session
pub async fn connected_harness() -> Harness {
    let harness = harness();
    harness
        .session
        .connect()
        .await
        .expect("loopback connect failed");
    harness
}
