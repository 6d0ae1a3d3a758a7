/// PROPERTY-BASED TESTS: network view pruning
///
/// Key invariants, checked after every connect or disconnect:
/// 1. Every node other than the instance itself has at least one direct link
/// 2. The visible nodes are exactly the peers with a live connection
/// 3. Parallel connections to one peer are counted one link each
/// 4. Losing a connection that was never recorded changes nothing

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use meshnet_shared::{ConnectionId, Sid};
use meshnet_test::{LocalLink, TestInstance};

const LOCAL: u32 = 0x002;
const PEERS: [u32; 4] = [0x105, 0x205, 0x102, 0x302];

#[derive(Clone, Debug)]
enum Op {
    Connect(usize),
    Disconnect(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PEERS.len()).prop_map(Op::Connect),
        (0..PEERS.len()).prop_map(Op::Disconnect),
    ]
}

fn check(
    instance: &TestInstance,
    live: &BTreeMap<Sid, Vec<LocalLink>>,
) -> Result<(), TestCaseError> {
    let local = instance.sid;
    let nodes: BTreeSet<Sid> = instance.network.nodes().into_iter().collect();

    for node in nodes.iter().filter(|node| **node != local) {
        prop_assert!(
            !instance.network.direct_links(*node).is_empty(),
            "{} is visible without a link",
            node
        );
    }

    let mut expected: BTreeSet<Sid> = live
        .iter()
        .filter(|(_, links)| !links.is_empty())
        .map(|(sid, _)| *sid)
        .collect();
    expected.insert(local);
    prop_assert_eq!(&nodes, &expected);

    for (sid, links) in live {
        prop_assert_eq!(
            instance.network.direct_links_between(local, *sid).len(),
            links.len()
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_only_linked_nodes_stay_visible(ops in prop::collection::vec(op(), 1..40)) {
        let instance = TestInstance::new(Sid::from_raw(LOCAL));
        let mut live: BTreeMap<Sid, Vec<LocalLink>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Connect(peer) => {
                    let remote = Sid::from_raw(PEERS[peer]);
                    let link = LocalLink::new(instance.sid, remote);
                    instance.connect(&link.a);
                    live.entry(remote).or_default().push(link);
                }
                Op::Disconnect(peer) => {
                    let remote = Sid::from_raw(PEERS[peer]);
                    let links = live.entry(remote).or_default();
                    if links.is_empty() {
                        instance.network.on_connection_lost(ConnectionId::random(), remote);
                    } else {
                        let link = links.remove(0);
                        link.close();
                        instance.disconnect(&link.a);
                    }
                }
            }
            check(&instance, &live)?;
        }
    }

    #[test]
    fn prop_dropping_every_link_leaves_only_the_local_node(
        connections in prop::collection::vec(0..PEERS.len(), 1..12),
    ) {
        let instance = TestInstance::new(Sid::from_raw(LOCAL));
        let links: Vec<LocalLink> = connections
            .iter()
            .map(|peer| {
                let link = LocalLink::new(instance.sid, Sid::from_raw(PEERS[*peer]));
                instance.connect(&link.a);
                link
            })
            .collect();

        for link in links.iter().rev() {
            link.close();
            instance.disconnect(&link.a);
        }
        prop_assert_eq!(instance.network.nodes(), vec![instance.sid]);
        prop_assert!(instance.network.direct_links(instance.sid).is_empty());
    }
}
