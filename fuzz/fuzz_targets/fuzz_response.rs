//! Fuzz target for response ingestion.
//!
//! Any JSON the backend might put on the response queue must either fail to
//! parse or be ingested without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use movilizer_outbox::{OutboxClient, OutboxConfig, Response};

fuzz_target!(|data: &[u8]| {
    let Ok(response) = serde_json::from_slice::<Response>(data) else {
        return;
    };
    let Ok(mut client) = OutboxClient::new(OutboxConfig::for_testing(1)) else {
        return;
    };

    let expected = response.reply_movelets.len() + response.upload_containers.len();
    client.treat_response(&response);
    assert_eq!(client.inbound_len(), expected);
    assert_eq!(client.acknowledge_key(), response.request_acknowledge_key.as_deref());

    let mut dequeued = 0;
    while client.dequeue_response_object().is_some() {
        dequeued += 1;
    }
    assert_eq!(dequeued, expected);
});
