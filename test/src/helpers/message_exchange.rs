use crate::local_connection::LocalLink;

use super::TestInstance;

/// Upper bound on delivery rounds before a link is considered stuck
const MAX_ROUNDS: usize = 64;

/// Deliver queued messages in both directions until the link is quiet.
/// Returns the number of messages delivered.
///
/// Panics if the instances keep talking for more than a bounded number of
/// rounds, which means a sync is echoing changes back and forth.
pub fn exchange_messages(a: &mut TestInstance, b: &mut TestInstance, link: &LocalLink) -> usize {
    let mut delivered = 0;
    for _ in 0..MAX_ROUNDS {
        if link.is_idle() {
            return delivered;
        }
        delivered += exchange_once(a, b, link);
    }
    panic!(
        "link {} between {} and {} did not settle after {} rounds",
        link.id(),
        a.sid,
        b.sid,
        MAX_ROUNDS
    );
}

/// Deliver exactly `n` rounds of queued messages
pub fn exchange_messages_n_times(
    a: &mut TestInstance,
    b: &mut TestInstance,
    link: &LocalLink,
    n: usize,
) -> usize {
    (0..n).map(|_| exchange_once(a, b, link)).sum()
}

fn exchange_once(a: &mut TestInstance, b: &mut TestInstance, link: &LocalLink) -> usize {
    let to_b = link.take_for_b();
    let to_a = link.take_for_a();
    let delivered = to_b.len() + to_a.len();
    for message in to_b {
        b.handle(&link.b, message);
    }
    for message in to_a {
        a.handle(&link.a, message);
    }
    delivered
}
