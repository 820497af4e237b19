//! Connected components of the bus graph.
//!
//! Components are numbered by descending bus count (ties keep graph order), so
//! component `0` is always the main one. Generators and loads belong to the
//! component of their bus.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::{BusId, Edge, Network, Node};

/// Mapping from bus to connected-component number.
#[derive(Debug, Clone, Default)]
pub struct ComponentMap {
    by_bus: HashMap<BusId, usize>,
    sizes: Vec<usize>,
}

impl ComponentMap {
    /// Component number of a bus, `None` for an unknown bus.
    pub fn component_of(&self, bus: BusId) -> Option<usize> {
        self.by_bus.get(&bus).copied()
    }

    /// Number of components found.
    pub fn num_components(&self) -> usize {
        self.sizes.len()
    }

    /// Number of buses in a component.
    pub fn component_size(&self, component: usize) -> usize {
        self.sizes.get(component).copied().unwrap_or(0)
    }
}

/// Compute connected components over in-service branches.
pub fn connected_components(network: &Network) -> ComponentMap {
    let buses: Vec<BusId> = network
        .graph
        .node_weights()
        .filter_map(|n| match n {
            Node::Bus(b) => Some(b.id),
            _ => None,
        })
        .collect();
    let position: HashMap<BusId, usize> =
        buses.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut uf = UnionFind::<usize>::new(buses.len());
    for edge in network.graph.edge_weights() {
        let Edge::Branch(branch) = edge;
        if !branch.status {
            continue;
        }
        if let (Some(&a), Some(&b)) = (position.get(&branch.from_bus), position.get(&branch.to_bus))
        {
            uf.union(a, b);
        }
    }

    // Group buses by representative, remembering first appearance
    let mut groups: Vec<(usize, Vec<BusId>)> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for (i, id) in buses.iter().enumerate() {
        let root = uf.find(i);
        let slot = *group_of_root.entry(root).or_insert_with(|| {
            groups.push((i, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(*id);
    }

    // Stable sort keeps first-appearance order among equal sizes
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut map = ComponentMap::default();
    for (num, (_, members)) in groups.into_iter().enumerate() {
        map.sizes.push(members.len());
        for id in members {
            map.by_bus.insert(id, num);
        }
    }

    debug!(
        buses = buses.len(),
        components = map.num_components(),
        "computed connected components"
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, BranchId, Bus};

    fn add_bus(network: &mut Network, id: usize) {
        network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(id),
            name: format!("Bus {}", id),
            ..Bus::default()
        }));
    }

    fn add_branch(network: &mut Network, id: usize, from: usize, to: usize, in_service: bool) {
        let a = network
            .graph
            .node_indices()
            .find(|i| matches!(&network.graph[*i], Node::Bus(b) if b.id == BusId::new(from)))
            .unwrap();
        let b = network
            .graph
            .node_indices()
            .find(|i| matches!(&network.graph[*i], Node::Bus(b) if b.id == BusId::new(to)))
            .unwrap();
        let mut branch = Branch::new(
            BranchId::new(id),
            format!("Line {}-{}", from, to),
            BusId::new(from),
            BusId::new(to),
        );
        if !in_service {
            branch = branch.out_of_service();
        }
        network.graph.add_edge(a, b, Edge::Branch(branch));
    }

    #[test]
    fn test_largest_component_is_main() {
        let mut network = Network::new();
        for id in 1..=5 {
            add_bus(&mut network, id);
        }
        // Bus 1 alone; buses 2-5 connected
        add_branch(&mut network, 1, 2, 3, true);
        add_branch(&mut network, 2, 3, 4, true);
        add_branch(&mut network, 3, 4, 5, true);

        let map = connected_components(&network);
        assert_eq!(map.num_components(), 2);
        assert_eq!(map.component_of(BusId::new(3)), Some(0));
        assert_eq!(map.component_of(BusId::new(1)), Some(1));
        assert_eq!(map.component_size(0), 4);
        assert_eq!(map.component_size(1), 1);
    }

    #[test]
    fn test_out_of_service_branch_splits() {
        let mut network = Network::new();
        for id in 1..=4 {
            add_bus(&mut network, id);
        }
        add_branch(&mut network, 1, 1, 2, true);
        add_branch(&mut network, 2, 2, 3, false);
        add_branch(&mut network, 3, 3, 4, true);

        let map = connected_components(&network);
        assert_eq!(map.num_components(), 2);
        // Equal sizes keep graph order
        assert_eq!(map.component_of(BusId::new(1)), Some(0));
        assert_eq!(map.component_of(BusId::new(4)), Some(1));
    }

    #[test]
    fn test_unknown_bus() {
        let network = Network::new();
        let map = connected_components(&network);
        assert_eq!(map.num_components(), 0);
        assert!(map.component_of(BusId::new(7)).is_none());
    }
}
