//! Participant extraction across a set of messages.

use std::collections::BTreeSet;

use crate::graph::Message;

/// Unique lower-cased addresses from the from/to/cc fields, sorted.
///
/// Missing senders, missing recipient lists and recipients without an
/// address are skipped.
pub fn extract_participants(messages: &[Message]) -> Vec<String> {
    let mut addresses = BTreeSet::new();
    for message in messages {
        let all = message
            .sender_address()
            .into_iter()
            .chain(message.to_addresses())
            .chain(message.cc_addresses());
        for address in all {
            addresses.insert(address.trim().to_lowercase());
        }
    }
    addresses.into_iter().collect()
}
