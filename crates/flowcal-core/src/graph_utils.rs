use crate::{BusId, Topology};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Summary statistics produced by `topology stats` (degree and connected components).
#[derive(Debug)]
pub struct TopologyStats {
    pub bus_count: usize,
    pub branch_count: usize,
    pub link_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
}

/// One AC island; `buses` is sorted by id.
#[derive(Debug, Clone)]
pub struct IslandSummary {
    pub island_id: usize,
    pub buses: Vec<BusId>,
}

/// Island analysis over lines and transformers. DC links do not connect islands.
#[derive(Debug, Clone)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    /// Index into `islands` of the island that is kept.
    pub main_island: Option<usize>,
}

impl IslandAnalysis {
    /// Buses outside the main island, in id order.
    pub fn islanded_buses(&self) -> Vec<BusId> {
        let mut out: Vec<BusId> = self
            .islands
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != self.main_island)
            .flat_map(|(_, island)| island.buses.iter().copied())
            .collect();
        out.sort();
        out
    }
}

fn build_graph(topology: &Topology) -> (UnGraph<BusId, ()>, HashMap<BusId, NodeIndex>) {
    let mut graph = UnGraph::<BusId, ()>::new_undirected();
    let mut nodes = HashMap::with_capacity(topology.buses.len());
    for bus in &topology.buses {
        nodes.insert(bus.id, graph.add_node(bus.id));
    }
    let ends = topology
        .lines
        .iter()
        .map(|l| (l.bus0, l.bus1))
        .chain(topology.transformers.iter().map(|t| (t.bus0, t.bus1)));
    for (a, b) in ends {
        if let (Some(&na), Some(&nb)) = (nodes.get(&a), nodes.get(&b)) {
            graph.add_edge(na, nb, ());
        }
    }
    (graph, nodes)
}

pub fn topology_stats(topology: &Topology) -> TopologyStats {
    let (graph, _) = build_graph(topology);
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).count())
        .collect();
    let bus_count = graph.node_count();
    let avg_degree = if bus_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / bus_count as f64
    };
    TopologyStats {
        bus_count,
        branch_count: graph.edge_count(),
        link_count: topology.links.len(),
        connected_components: connected_components(&graph),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        avg_degree,
        max_degree: degrees.iter().copied().max().unwrap_or(0),
    }
}

/// Labels connected components (breadth-first search). The main island is the
/// largest one; ties go to the island holding the lowest bus id.
pub fn find_islands(topology: &Topology) -> IslandAnalysis {
    let (graph, _) = build_graph(topology);
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(graph[node]);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort();
        islands.push(IslandSummary {
            island_id: islands.len(),
            buses: members,
        });
    }

    let main_island = islands
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.buses
                .len()
                .cmp(&b.buses.len())
                .then_with(|| b.buses.first().cmp(&a.buses.first()))
        })
        .map(|(idx, _)| idx);

    IslandAnalysis {
        islands,
        main_island,
    }
}
