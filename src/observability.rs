use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_UNAUTHORIZED: Counter = Counter::new("parley.client.unauthorized");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_LINES: Counter = Counter::new("parley.stream.lines");
pub(crate) static STREAM_TURNS: Counter = Counter::new("parley.stream.turns");
pub(crate) static STREAM_MALFORMED_LINES: Counter = Counter::new("parley.stream.malformed_lines");
pub(crate) static STREAM_IGNORED_RECORDS: Counter = Counter::new("parley.stream.ignored_records");
pub(crate) static STREAM_STALE_TURNS: Counter = Counter::new("parley.stream.stale_turns");
pub(crate) static STREAM_TRANSPORT_FAILURES: Counter =
    Counter::new("parley.stream.transport_failures");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parley.stream.duration_seconds");

pub(crate) static SESSION_PLACEHOLDER_IDS: Counter =
    Counter::new("parley.sessions.placeholder_ids");
pub(crate) static SESSION_REFRESHES: Counter = Counter::new("parley.sessions.refreshes");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UNAUTHORIZED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_TURNS);
    collector.register_counter(&STREAM_MALFORMED_LINES);
    collector.register_counter(&STREAM_IGNORED_RECORDS);
    collector.register_counter(&STREAM_STALE_TURNS);
    collector.register_counter(&STREAM_TRANSPORT_FAILURES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_PLACEHOLDER_IDS);
    collector.register_counter(&SESSION_REFRESHES);
}
