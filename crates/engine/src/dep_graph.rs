//! Dependency graph between cells.
//!
//! Nodes live in an arena: each `CellId` maps to a dense index and adjacency
//! is stored as index lists. Strongly connected components, the condensation
//! DAG over them and a topological order are derived on demand and cached
//! until the next structural change.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B reads A"  (A must be evaluated before B)
//! ```
//!
//! Edges are not deduplicated. `=A1+A1` adds A1 → B1 twice, and every
//! algorithm here tolerates the repeat.

use std::cell::OnceCell;
use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashMap;

use crate::cell_id::CellId;

const UNVISITED: usize = usize::MAX;

/// Derived structure, rebuilt lazily after any mutation.
#[derive(Debug, Clone)]
struct Condensation {
    /// Members of each SCC in Tarjan pop order; index is the SCC id
    sccs: Vec<Vec<usize>>,
    /// SCC id per arena slot
    scc_of: Vec<usize>,
    /// Condensation DAG, successors ascending and unique
    dag: Vec<Vec<usize>>,
    /// SCC ids in topological order
    order: Vec<usize>,
}

#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    ids: FxHashMap<CellId, usize>,
    /// Arena slots in creation order
    nodes: Vec<CellId>,
    /// Outgoing edges: `succs[a]` holds every b that reads a
    succs: Vec<Vec<usize>>,
    cache: OnceCell<Condensation>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.ids.contains_key(cell)
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &CellId> + '_ {
        self.nodes.iter()
    }

    /// Cells that read `cell`, one entry per edge.
    pub fn successors(&self, cell: &CellId) -> Vec<&CellId> {
        match self.ids.get(cell) {
            Some(&id) => self.succs[id].iter().filter_map(|&s| self.cell_at(s)).collect(),
            None => Vec::new(),
        }
    }

    /// Add a node if absent. Returns true if it was created.
    pub fn add_node(&mut self, cell: &CellId) -> bool {
        if self.ids.contains_key(cell) {
            return false;
        }
        self.alloc(cell.clone());
        self.invalidate();
        true
    }

    /// Add the edge `from → to`, creating either endpoint if needed.
    pub fn add_edge(&mut self, from: &CellId, to: &CellId) {
        let from = self.id_or_alloc(from);
        let to = self.id_or_alloc(to);
        self.succs[from].push(to);
        self.invalidate();
    }

    /// Remove every edge pointing into `cell`.
    pub fn clear_refs(&mut self, cell: &CellId) {
        if let Some(&target) = self.ids.get(cell) {
            for list in &mut self.succs {
                list.retain(|&s| s != target);
            }
            self.invalidate();
        }
    }

    /// `clear_refs` for every node matching `predicate`.
    pub fn clear_refs_where<F>(&mut self, predicate: F)
    where
        F: Fn(&CellId) -> bool,
    {
        let targets: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(id, node)| predicate(node).then_some(id))
            .collect();
        if targets.is_empty() {
            return;
        }
        let mut is_target = vec![false; self.nodes.len()];
        for id in targets {
            is_target[id] = true;
        }
        for list in &mut self.succs {
            list.retain(|&s| !is_target[s]);
        }
        self.invalidate();
    }

    /// Move `old` to `new`: `new` takes over `old`'s outgoing edges (appended
    /// when `new` already exists) and every edge into `old` is redirected.
    ///
    /// Returns false if `old` is not in the graph. Renaming a node to itself
    /// is a no-op.
    pub fn rename_cell(&mut self, old: &CellId, new: &CellId) -> bool {
        let Some(&old_id) = self.ids.get(old) else {
            return false;
        };
        if old == new {
            return true;
        }

        let new_id = self.id_or_alloc(new);
        let moved = std::mem::take(&mut self.succs[old_id]);
        self.succs[new_id].extend(moved);

        // Drop the old slot and shift later ids down, keeping creation order
        let shift = |id: usize| if id > old_id { id - 1 } else { id };
        let new_id = shift(new_id);
        self.ids.remove(old);
        self.nodes.remove(old_id);
        self.succs.remove(old_id);
        for id in self.ids.values_mut() {
            *id = shift(*id);
        }
        for list in &mut self.succs {
            for s in list.iter_mut() {
                *s = if *s == old_id { new_id } else { shift(*s) };
            }
        }

        self.invalidate();
        true
    }

    // =========================================================================
    // Components and ordering
    // =========================================================================

    /// Number of strongly connected components.
    pub fn scc_count(&self) -> usize {
        self.condensation().sccs.len()
    }

    /// SCC id of `cell`. Ids follow Tarjan completion order.
    pub fn scc_id(&self, cell: &CellId) -> Option<usize> {
        let id = *self.ids.get(cell)?;
        Some(self.condensation().scc_of[id])
    }

    /// Members of SCC `scc`, in Tarjan pop order.
    pub fn scc_members(&self, scc: usize) -> Vec<&CellId> {
        self.condensation()
            .sccs
            .get(scc)
            .map(|members| members.iter().filter_map(|&id| self.cell_at(id)).collect())
            .unwrap_or_default()
    }

    /// Members of the SCC containing `cell` (empty if `cell` is unknown).
    pub fn component_of(&self, cell: &CellId) -> Vec<&CellId> {
        match self.scc_id(cell) {
            Some(scc) => self.scc_members(scc),
            None => Vec::new(),
        }
    }

    /// Successor SCC ids of `scc` in the condensation DAG, ascending.
    pub fn scc_successors(&self, scc: usize) -> &[usize] {
        self.condensation()
            .dag
            .get(scc)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// SCC ids in topological order.
    pub fn scc_order(&self) -> &[usize] {
        &self.condensation().order
    }

    /// Every live node, dependencies before dependents. Members of one SCC
    /// are emitted together in Tarjan pop order.
    pub fn topo_order(&self) -> Vec<&CellId> {
        let condensation = self.condensation();
        condensation
            .order
            .iter()
            .flat_map(|&scc| condensation.sccs[scc].iter())
            .filter_map(|&id| self.cell_at(id))
            .collect()
    }

    /// True if `cell` sits on a cycle: a multi-node SCC or a self-edge.
    pub fn in_cycle(&self, cell: &CellId) -> bool {
        let Some(&id) = self.ids.get(cell) else {
            return false;
        };
        let condensation = self.condensation();
        condensation.sccs[condensation.scc_of[id]].len() > 1 || self.succs[id].contains(&id)
    }

    /// Every node on a cycle, in topological order.
    pub fn cycle_members(&self) -> Vec<&CellId> {
        self.topo_order()
            .into_iter()
            .filter(|cell| self.in_cycle(cell))
            .collect()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn cell_at(&self, id: usize) -> Option<&CellId> {
        self.nodes.get(id)
    }

    fn alloc(&mut self, cell: CellId) -> usize {
        let id = self.nodes.len();
        self.ids.insert(cell.clone(), id);
        self.nodes.push(cell);
        self.succs.push(Vec::new());
        id
    }

    fn id_or_alloc(&mut self, cell: &CellId) -> usize {
        match self.ids.get(cell) {
            Some(&id) => id,
            None => self.alloc(cell.clone()),
        }
    }

    fn invalidate(&mut self) {
        self.cache.take();
    }

    fn condensation(&self) -> &Condensation {
        self.cache.get_or_init(|| {
            let condensation = self.condense();
            log::debug!(
                "dependency graph condensed: {} nodes, {} components",
                self.ids.len(),
                condensation.sccs.len()
            );
            condensation
        })
    }

    fn condense(&self) -> Condensation {
        let (sccs, scc_of) = self.tarjan();
        let dag = self.build_dag(&sccs, &scc_of);
        let order = kahn(&dag);
        Condensation {
            sccs,
            scc_of,
            dag,
            order,
        }
    }

    /// Iterative Tarjan over nodes in creation order, following edges in
    /// insertion order. An explicit frame stack keeps long chains off the call
    /// stack.
    fn tarjan(&self) -> (Vec<Vec<usize>>, Vec<usize>) {
        let n = self.nodes.len();
        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut sccs: Vec<Vec<usize>> = Vec::new();
        let mut scc_of = vec![UNVISITED; n];
        let mut counter = 0;

        // (node, index of the next outgoing edge to explore)
        let mut frames: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }

            index[root] = counter;
            lowlink[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;
            frames.push((root, 0));

            while let Some(&(v, next)) = frames.last() {
                if let Some(&w) = self.succs[v].get(next) {
                    if let Some(top) = frames.last_mut() {
                        top.1 += 1;
                    }
                    if index[w] == UNVISITED {
                        index[w] = counter;
                        lowlink[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w]);
                    }
                    continue;
                }

                // All edges explored: pop and propagate lowlink to the parent
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }

                if lowlink[v] == index[v] {
                    let scc = sccs.len();
                    let mut members = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        scc_of[w] = scc;
                        members.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(members);
                }
            }
        }

        (sccs, scc_of)
    }

    fn build_dag(&self, sccs: &[Vec<usize>], scc_of: &[usize]) -> Vec<Vec<usize>> {
        let mut dag: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sccs.len()];
        for (from, targets) in self.succs.iter().enumerate() {
            for &to in targets {
                let (a, b) = (scc_of[from], scc_of[to]);
                if a != b {
                    dag[a].insert(b);
                }
            }
        }
        dag.into_iter().map(|set| set.into_iter().collect()).collect()
    }
}

/// Kahn's algorithm over the condensation DAG. Ready components are taken in
/// FIFO order, seeded by ascending id.
fn kahn(dag: &[Vec<usize>]) -> Vec<usize> {
    let mut indegree = vec![0usize; dag.len()];
    for targets in dag {
        for &t in targets {
            indegree[t] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..dag.len()).filter(|&s| indegree[s] == 0).collect();
    let mut order = Vec::with_capacity(dag.len());
    while let Some(scc) = queue.pop_front() {
        order.push(scc);
        for &t in &dag[scc] {
            indegree[t] -= 1;
            if indegree[t] == 0 {
                queue.push_back(t);
            }
        }
    }
    order
}
