//! Wire format for invalidation signals.
//!
//! A signal is the list of tags joined with [`SIGNAL_DELIMITER`], published
//! on the topic `{scope}disttl_signal`. There is no escaping: a tag that
//! contains the delimiter is split into several tokens on the receiving side.

/// Separator between tags in a published payload.
pub const SIGNAL_DELIMITER: &str = "@@";

/// Suffix appended to the scope to form the pub/sub topic.
pub const SIGNAL_TOPIC_SUFFIX: &str = "disttl_signal";

/// Topic carrying invalidation signals for `scope`.
pub fn signal_topic(scope: &str) -> String {
    format!("{scope}{SIGNAL_TOPIC_SUFFIX}")
}

pub fn encode_signals<S: AsRef<str>>(tags: &[S]) -> String {
    let parts: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
    parts.join(SIGNAL_DELIMITER)
}

pub fn decode_signals(payload: &str) -> Vec<String> {
    payload.split(SIGNAL_DELIMITER).map(str::to_owned).collect()
}
