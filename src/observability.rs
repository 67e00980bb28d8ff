use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("streamchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("streamchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("streamchat.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("streamchat.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("streamchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("streamchat.stream.bytes");
pub(crate) static MALFORMED_EVENTS: Counter = Counter::new("streamchat.stream.malformed_events");
pub(crate) static STREAM_TTFE: Moments = Moments::new("streamchat.stream.ttfe_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("streamchat.stream.duration_seconds");

pub(crate) static REPLY_FRAGMENTS: Counter = Counter::new("streamchat.reply.fragments");
pub(crate) static REPLY_FOLLOW_UPS: Counter = Counter::new("streamchat.reply.follow_ups");
pub(crate) static REPLY_MESSAGES: Counter = Counter::new("streamchat.reply.messages");

pub(crate) static SENDS_IGNORED: Counter = Counter::new("streamchat.controller.sends_ignored");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&MALFORMED_EVENTS);
    collector.register_moments(&STREAM_TTFE);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&REPLY_FRAGMENTS);
    collector.register_counter(&REPLY_FOLLOW_UPS);
    collector.register_counter(&REPLY_MESSAGES);

    collector.register_counter(&SENDS_IGNORED);
}
