//! Round-robin distribution of contacts across agents
//!
//! Contact `i` goes to bucket `i mod M`. With N contacts the first
//! `N mod M` buckets hold `ceil(N/M)` contacts and the rest `floor(N/M)`.
//! Relative order is preserved inside each bucket.

use roster_common::db::{AgentRef, NormalizedContact};

use super::IngestError;

/// Contacts assigned to one agent in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub agent: AgentRef,
    pub items: Vec<NormalizedContact>,
}

/// Split contacts across agents, one bucket per agent in roster order
pub fn distribute(
    contacts: Vec<NormalizedContact>,
    agents: &[AgentRef],
) -> Result<Vec<Bucket>, IngestError> {
    if agents.is_empty() {
        return Err(IngestError::NoAgentsAvailable);
    }

    let per_bucket = contacts.len().div_ceil(agents.len());
    let mut buckets: Vec<Bucket> = agents
        .iter()
        .map(|agent| Bucket {
            agent: agent.clone(),
            items: Vec::with_capacity(per_bucket),
        })
        .collect();

    let agent_count = buckets.len();
    for (index, contact) in contacts.into_iter().enumerate() {
        buckets[index % agent_count].items.push(contact);
    }

    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn agents(count: usize) -> Vec<AgentRef> {
        (0..count)
            .map(|i| AgentRef {
                id: format!("agent-{}", i),
                name: format!("Agent {}", i),
                email: format!("agent{}@example.com", i),
            })
            .collect()
    }

    fn contacts(count: usize) -> Vec<NormalizedContact> {
        (0..count)
            .map(|i| NormalizedContact::new(format!("Contact {}", i), format!("{}", 1000 + i), ""))
            .collect()
    }

    fn sizes(buckets: &[Bucket]) -> Vec<usize> {
        buckets.iter().map(|b| b.items.len()).collect()
    }

    #[test]
    fn test_26_contacts_5_agents() {
        let buckets = distribute(contacts(26), &agents(5)).unwrap();

        assert_eq!(sizes(&buckets), vec![6, 5, 5, 5, 5]);
        assert_eq!(buckets.iter().filter(|b| b.items.len() == 6).count(), 1);
        assert_eq!(buckets.iter().filter(|b| b.items.len() == 5).count(), 4);
        assert_eq!(sizes(&buckets).iter().sum::<usize>(), 26);
    }

    #[test]
    fn test_no_agents_fails() {
        let err = distribute(contacts(10), &[]).unwrap_err();
        assert!(matches!(err, IngestError::NoAgentsAvailable));
    }

    #[test]
    fn test_fewer_contacts_than_agents_leaves_empty_buckets() {
        let buckets = distribute(contacts(2), &agents(4)).unwrap();

        assert_eq!(buckets.len(), 4);
        assert_eq!(sizes(&buckets), vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_buckets_follow_roster_order() {
        let roster = agents(3);
        let buckets = distribute(contacts(3), &roster).unwrap();

        for (bucket, agent) in buckets.iter().zip(roster.iter()) {
            assert_eq!(&bucket.agent, agent);
        }
        assert_eq!(buckets[1].items[0].first_name, "Contact 1");
    }

    #[test]
    fn test_deterministic() {
        let first = distribute(contacts(17), &agents(4)).unwrap();
        let second = distribute(contacts(17), &agents(4)).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_round_robin_invariants(n in 1usize..300, m in 1usize..25) {
            let input = contacts(n);
            let buckets = distribute(input.clone(), &agents(m)).unwrap();

            prop_assert_eq!(buckets.len(), m);

            let bucket_sizes = sizes(&buckets);
            prop_assert_eq!(bucket_sizes.iter().sum::<usize>(), n);
            let max = *bucket_sizes.iter().max().unwrap();
            let min = *bucket_sizes.iter().min().unwrap();
            prop_assert!(max - min <= 1);

            // Undo the interleave: round r of bucket b is input index r*m + b
            let mut rebuilt = Vec::with_capacity(n);
            for round in 0..max {
                for bucket in &buckets {
                    if let Some(item) = bucket.items.get(round) {
                        rebuilt.push(item.clone());
                    }
                }
            }
            prop_assert_eq!(rebuilt, input);
        }
    }
}
