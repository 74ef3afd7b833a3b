//! Binary trie over network prefixes: insertion, longest-prefix lookup,
//! in-order walking, and the CIDR range algebra (`subnets`/`exclude`/
//! `exclude_list`) used to punch holes in a network.

use crate::error::{Error, Result};
use crate::network::{self, Network};
use std::collections::VecDeque;
use std::rc::Rc;

struct Node {
    children: [Option<u32>; 2],
    network: Option<Rc<Network>>,
}

impl Node {
    fn empty() -> Self {
        Node {
            children: [None, None],
            network: None,
        }
    }
}

/// A bit-indexed binary trie of networks, supporting longest-prefix-match
/// lookup. Mirrors `struct loc_network_tree`/`loc_network_tree_node`,
/// using an arena of owned nodes instead of individually reference
/// counted heap nodes, since nothing outside the trie ever holds onto a
/// node directly.
pub struct NetworkTrie {
    nodes: Vec<Node>,
}

impl NetworkTrie {
    /// A trie with only a root node, no networks.
    pub fn new() -> Self {
        NetworkTrie {
            nodes: vec![Node::empty()],
        }
    }

    /// Insert a network. Returns [`Error::AlreadyPresent`] if a network
    /// with the exact same first address and prefix already exists.
    pub fn insert(&mut self, network: Network) -> Result<()> {
        let mut current = 0u32;
        let first = network.first_address();
        for depth in 0..network.prefix() {
            let bit = first.bit(depth) as usize;
            current = match self.nodes[current as usize].children[bit] {
                Some(child) => child,
                None => {
                    let idx = self.nodes.len() as u32;
                    self.nodes.push(Node::empty());
                    self.nodes[current as usize].children[bit] = Some(idx);
                    idx
                }
            };
        }
        if self.nodes[current as usize].network.is_some() {
            return Err(Error::AlreadyPresent(format!(
                "network {} is already present",
                network
            )));
        }
        self.nodes[current as usize].network = Some(Rc::new(network));
        Ok(())
    }

    /// Visit every network for which `filter` returns true, supernets
    /// before the subnets carved out of them (pre-order).
    pub fn walk(&self, filter: impl Fn(&Network) -> bool, mut visit: impl FnMut(&Network)) {
        self.walk_node(0, &filter, &mut visit);
    }

    fn walk_node(&self, idx: u32, filter: &impl Fn(&Network) -> bool, visit: &mut impl FnMut(&Network)) {
        let node = &self.nodes[idx as usize];
        if let Some(net) = &node.network {
            if filter(net) {
                visit(net);
            }
        }
        for child in node.children.into_iter().flatten() {
            self.walk_node(child, filter, visit);
        }
    }

    /// Longest-prefix-match lookup: the most specific network containing
    /// `addr`, if any.
    pub fn lookup(&self, addr: crate::address::Address) -> Option<Rc<Network>> {
        let mut current = 0u32;
        let mut best: Option<Rc<Network>> = None;
        for depth in 0..128u8 {
            if let Some(net) = &self.nodes[current as usize].network {
                best = Some(net.clone());
            }
            let bit = addr.bit(depth) as usize;
            match self.nodes[current as usize].children[bit] {
                Some(child) => current = child,
                None => return best,
            }
        }
        if let Some(net) = &self.nodes[current as usize].network {
            best = Some(net.clone());
        }
        best
    }

    /// Total number of networks stored.
    pub fn count_networks(&self) -> usize {
        self.nodes.iter().filter(|n| n.network.is_some()).count()
    }

    /// Total number of trie nodes, including the root.
    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Renumber the arena breadth-first and return the node records plus
    /// the FIFO-ordered list of leaf networks, ready for
    /// [`crate::writer::Writer`] to serialize. Children that don't exist
    /// are recorded as `0` (safe, since BFS numbering never assigns 0 to
    /// anything but the root, and the root is never anyone's child);
    /// `network_index` is `u32::MAX` when the node carries no network.
    pub(crate) fn serialize_bfs(&self) -> (Vec<BfsNode>, Vec<Rc<Network>>) {
        let mut old_to_new = vec![u32::MAX; self.nodes.len()];
        let mut bfs_old_order = vec![0u32];
        old_to_new[0] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(0u32);
        let mut next_index = 1u32;

        while let Some(old_idx) = queue.pop_front() {
            for child in self.nodes[old_idx as usize].children.into_iter().flatten() {
                if old_to_new[child as usize] == u32::MAX {
                    old_to_new[child as usize] = next_index;
                    next_index += 1;
                    bfs_old_order.push(child);
                    queue.push_back(child);
                }
            }
        }

        let mut leaves = Vec::new();
        let mut out = Vec::with_capacity(bfs_old_order.len());
        for &old_idx in &bfs_old_order {
            let node = &self.nodes[old_idx as usize];
            let child0 = node.children[0].map(|c| old_to_new[c as usize]).unwrap_or(0);
            let child1 = node.children[1].map(|c| old_to_new[c as usize]).unwrap_or(0);
            let network_index = match &node.network {
                Some(net) => {
                    let idx = leaves.len() as u32;
                    leaves.push(net.clone());
                    idx
                }
                None => u32::MAX,
            };
            out.push(BfsNode {
                child0,
                child1,
                network_index,
            });
        }
        (out, leaves)
    }
}

impl Default for NetworkTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// A BFS-numbered trie node record, ready to be written as the fixed
/// 12-byte on-disk layout.
pub(crate) struct BfsNode {
    pub child0: u32,
    pub child1: u32,
    pub network_index: u32,
}

/// Split `network` into its two halves at `prefix + 1`. Errors if
/// `network` is already a single host (`/128` internally) and cannot be
/// split further. Mirrors `loc_network_subnets`.
pub fn subnets(net: &Network) -> Result<(Network, Network)> {
    if net.prefix() >= 128 {
        return Err(Error::InvalidArgument(format!(
            "{} cannot be split any further",
            net
        )));
    }
    let new_prefix = net.prefix() + 1;
    let distinguishing_bit = 1u128 << (128 - new_prefix as u32);
    let first = Network::from_parts(
        net.first_address(),
        new_prefix,
        net.family(),
        net.country_code_raw(),
        net.asn(),
        net.flags(),
    );
    let second_first = crate::address::Address::from_bits(net.first_address().bits() | distinguishing_bit);
    let second = Network::from_parts(
        second_first,
        new_prefix,
        net.family(),
        net.country_code_raw(),
        net.asn(),
        net.flags(),
    );
    Ok((first, second))
}

/// Subtract `other` from `net`, returning the list of networks that
/// remain. `other` must be a (possibly equal) subnet of `net`. Mirrors
/// `loc_network_exclude`.
pub fn exclude(net: &Network, other: &Network) -> Result<Vec<Network>> {
    if !other.is_subnet_of(net) {
        return Err(Error::InvalidArgument(format!(
            "{} is not a subnet of {}, cannot exclude",
            other, net
        )));
    }
    if net.eq_network(other) {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();
    let mut current = *net;
    loop {
        let (first_half, second_half) = subnets(&current)?;
        let (containing, remainder) = if other.is_subnet_of(&first_half) {
            (first_half, second_half)
        } else {
            (second_half, first_half)
        };
        result.push(remainder);
        if containing.eq_network(other) {
            break;
        }
        current = containing;
    }
    result.sort_by(network::by_first_address_then_prefix);
    Ok(result)
}

/// Subtract every network in `others` from `net`. Mirrors
/// `loc_network_exclude_list`: any `other` not contained in `net` is
/// simply ignored.
pub fn exclude_list(net: &Network, others: &[Network]) -> Result<Vec<Network>> {
    let mut working = vec![*net];
    for other in others {
        let mut next = Vec::new();
        for candidate in working {
            if candidate.eq_network(other) {
                continue;
            }
            if other.is_subnet_of(&candidate) {
                next.extend(exclude(&candidate, other)?);
            } else {
                next.push(candidate);
            }
        }
        working = next;
    }
    working.sort_by(network::by_first_address_then_prefix);
    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Flags;

    fn net(cidr: &str) -> Network {
        Network::parse(cidr, None, 0, Flags::NONE).unwrap()
    }

    #[test]
    fn insert_and_lookup_longest_prefix() {
        let mut trie = NetworkTrie::new();
        trie.insert(Network::parse("8.8.8.0/24", Some("US"), 15169, Flags::NONE).unwrap())
            .unwrap();
        trie.insert(Network::parse("8.8.8.0/22", Some("XX"), 1, Flags::NONE).unwrap())
            .unwrap();

        let addr = crate::address::Address::from_ipv4("8.8.8.8".parse().unwrap());
        let found = trie.lookup(addr).unwrap();
        assert_eq!(found.user_prefix(), 24);
        assert_eq!(found.asn(), 15169);
    }

    #[test]
    fn insert_duplicate_is_rejected() {
        let mut trie = NetworkTrie::new();
        trie.insert(net("10.0.0.0/8")).unwrap();
        assert!(matches!(trie.insert(net("10.0.0.0/8")), Err(Error::AlreadyPresent(_))));
    }

    #[test]
    fn lookup_misses_return_none() {
        let mut trie = NetworkTrie::new();
        trie.insert(net("10.0.0.0/8")).unwrap();
        let addr = crate::address::Address::from_ipv4("192.168.1.1".parse().unwrap());
        assert!(trie.lookup(addr).is_none());
    }

    #[test]
    fn subnets_splits_into_two_equal_halves() {
        let (a, b) = subnets(&net("10.0.0.0/8")).unwrap();
        assert_eq!(a.to_string(), "10.0.0.0/9");
        assert_eq!(b.to_string(), "10.128.0.0/9");
    }

    #[test]
    fn exclude_removes_a_subnet_and_covers_the_rest() {
        let result = exclude(&net("10.0.0.0/8"), &net("10.1.0.0/16")).unwrap();
        assert_eq!(result.len(), 8);
        let total: u128 = result
            .iter()
            .map(|n| n.last_address().bits() - n.first_address().bits() + 1)
            .sum();
        let excluded_size = 1u128 << (128 - net("10.1.0.0/16").prefix() as u32);
        let whole_size = 1u128 << (128 - net("10.0.0.0/8").prefix() as u32);
        assert_eq!(total, whole_size - excluded_size);
    }

    #[test]
    fn count_networks_and_nodes_agree_with_inserts() {
        let mut trie = NetworkTrie::new();
        trie.insert(net("10.0.0.0/8")).unwrap();
        trie.insert(net("192.168.0.0/16")).unwrap();
        assert_eq!(trie.count_networks(), 2);
        assert!(trie.count_nodes() >= 2);
    }

    #[test]
    fn serialize_bfs_assigns_root_index_zero_and_fifo_leaves() {
        let mut trie = NetworkTrie::new();
        trie.insert(net("1.0.0.0/8")).unwrap();
        trie.insert(net("2.0.0.0/8")).unwrap();
        let (nodes, leaves) = trie.serialize_bfs();
        assert!(!nodes.is_empty());
        assert_eq!(leaves.len(), 2);
    }
}
