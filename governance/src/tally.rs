//! Delegated voting weight.
//!
//! A ballot carries its voter plus every eligible member whose delegation
//! chain reaches the voter before reaching anyone who has already voted.
//! Chains are walked with cycle detection and a depth limit, so a malformed
//! delegation graph can only shorten a chain, never loop.

use agora_store::{Proposal, VoteDelegation};
use agora_types::params::MAX_DELEGATION_DEPTH;
use agora_types::UserId;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Delegator → delegate edges.
pub struct DelegationGraph {
    edges: HashMap<UserId, UserId>,
    max_depth: usize,
}

impl DelegationGraph {
    pub fn new(max_depth: usize) -> Self {
        Self {
            edges: HashMap::new(),
            max_depth,
        }
    }

    /// Edges from every active delegation, whatever its scope.
    pub fn from_active<'a>(delegations: impl IntoIterator<Item = &'a VoteDelegation>) -> Self {
        let mut graph = Self::default();
        for d in delegations.into_iter().filter(|d| d.is_active) {
            graph.edges.insert(d.delegator_id, d.delegate_id);
        }
        graph
    }

    /// Edges from the delegations that route votes on `proposal`.
    pub fn for_proposal<'a>(
        delegations: impl IntoIterator<Item = &'a VoteDelegation>,
        proposal: &Proposal,
    ) -> Self {
        let mut graph = Self::default();
        for d in delegations.into_iter().filter(|d| d.applies_to(proposal)) {
            graph.edges.insert(d.delegator_id, d.delegate_id);
        }
        graph
    }

    pub fn insert(&mut self, delegator: UserId, delegate: UserId) {
        self.edges.insert(delegator, delegate);
    }

    pub fn remove(&mut self, delegator: &UserId) {
        self.edges.remove(delegator);
    }

    /// Members reached by following delegations from `from`, nearest first.
    /// Stops at the end of the chain, on a cycle, or after `max_depth` hops.
    pub fn chain(&self, from: UserId) -> Vec<UserId> {
        let mut hops = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(from);
        let mut current = from;
        for _ in 0..self.max_depth {
            match self.edges.get(&current) {
                Some(next) if visited.insert(*next) => {
                    hops.push(*next);
                    current = *next;
                }
                _ => break,
            }
        }
        hops
    }

    /// Whether adding `delegator → delegate` would close a loop.
    ///
    /// Walks the whole chain from `delegate`; the depth limit only bounds
    /// weight resolution.
    pub fn would_cycle(&self, delegator: UserId, delegate: UserId) -> bool {
        let mut visited = HashSet::new();
        let mut current = delegate;
        loop {
            if current == delegator {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            match self.edges.get(&current) {
                Some(next) => current = *next,
                None => return false,
            }
        }
    }
}

impl Default for DelegationGraph {
    fn default() -> Self {
        Self::new(MAX_DELEGATION_DEPTH)
    }
}

/// Who a new ballot from `voter` carries, besides the voter.
///
/// * `eligible`: approved members of the DAO.
/// * `accounted`: members already counted by an earlier ballot.
/// * `voted`: members who cast an earlier ballot themselves; a chain stops there.
pub fn represented_by(
    graph: &DelegationGraph,
    voter: UserId,
    eligible: &BTreeSet<UserId>,
    accounted: &HashSet<UserId>,
    voted: &HashSet<UserId>,
) -> Vec<UserId> {
    let mut carried = Vec::new();
    for member in eligible {
        if *member == voter || accounted.contains(member) {
            continue;
        }
        for hop in graph.chain(*member) {
            if hop == voter {
                carried.push(*member);
                break;
            }
            if voted.contains(&hop) || !eligible.contains(&hop) {
                break;
            }
        }
    }
    carried
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u64) -> UserId {
        UserId::new(n)
    }

    fn graph(edges: &[(u64, u64)]) -> DelegationGraph {
        let mut g = DelegationGraph::default();
        for (from, to) in edges {
            g.insert(u(*from), u(*to));
        }
        g
    }

    fn members(ids: &[u64]) -> BTreeSet<UserId> {
        ids.iter().map(|n| u(*n)).collect()
    }

    #[test]
    fn transitive_chain() {
        let g = graph(&[(1, 2), (2, 3)]);
        assert_eq!(g.chain(u(1)), vec![u(2), u(3)]);
        assert_eq!(g.chain(u(3)), Vec::<UserId>::new());
    }

    #[test]
    fn cycle_terminates() {
        let g = graph(&[(1, 2), (2, 3), (3, 1)]);
        assert_eq!(g.chain(u(1)), vec![u(2), u(3)]);
        assert!(g.would_cycle(u(3), u(1)));
    }

    #[test]
    fn depth_limit_truncates() {
        let mut g = DelegationGraph::new(3);
        for i in 0..6 {
            g.insert(u(i), u(i + 1));
        }
        assert_eq!(g.chain(u(0)), vec![u(1), u(2), u(3)]);
    }

    #[test]
    fn cycle_detection_ignores_depth_limit() {
        let mut g = DelegationGraph::new(3);
        for i in 2..13 {
            g.insert(u(i), u(i + 1));
        }
        assert_eq!(g.chain(u(2)).len(), 3);
        assert!(g.would_cycle(u(13), u(2)));
        assert!(!g.would_cycle(u(14), u(2)));
    }

    #[test]
    fn existing_loop_elsewhere_is_not_a_new_cycle() {
        let g = graph(&[(1, 2), (2, 1)]);
        assert!(!g.would_cycle(u(5), u(1)));
    }

    #[test]
    fn self_delegation_counts_as_cycle() {
        assert!(DelegationGraph::default().would_cycle(u(1), u(1)));
    }

    #[test]
    fn fan_in_weight() {
        let g = graph(&[(1, 9), (2, 9), (3, 9), (4, 1)]);
        let eligible = members(&[1, 2, 3, 4, 9]);
        let carried = represented_by(&g, u(9), &eligible, &HashSet::new(), &HashSet::new());
        assert_eq!(carried, vec![u(1), u(2), u(3), u(4)]);
    }

    #[test]
    fn chain_stops_at_earlier_voter() {
        // 4 → 1 → 9, but 1 already voted and carried 4.
        let g = graph(&[(4, 1), (1, 9)]);
        let eligible = members(&[1, 4, 9]);
        let voted: HashSet<_> = [u(1)].into_iter().collect();
        let accounted: HashSet<_> = [u(1), u(4)].into_iter().collect();
        let carried = represented_by(&g, u(9), &eligible, &accounted, &voted);
        assert!(carried.is_empty());
    }

    #[test]
    fn ineligible_intermediate_breaks_chain() {
        let g = graph(&[(1, 2), (2, 9)]);
        let eligible = members(&[1, 9]);
        let carried = represented_by(&g, u(9), &eligible, &HashSet::new(), &HashSet::new());
        assert!(carried.is_empty());
    }
}
