use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::Table;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Creation order for a set of tables linked by foreign keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOrder {
    pub summary: FkGraphSummary,
    /// Referenced tables before the tables referencing them.
    pub order: Vec<String>,
    /// Tables that sit on an FK cycle. Each was placed before some table it
    /// references, so its foreign keys must be added after all creates.
    pub deferred: BTreeSet<String>,
}

impl TableOrder {
    pub fn has_cycle(&self) -> bool {
        !self.deferred.is_empty()
    }
}

/// Orders `tables` so that every table follows the tables it references.
///
/// The input order is the tie-breaker: among tables that are ready at the
/// same time, the one listed first comes first. References to tables outside
/// the set, to other schemas, and self-references are ignored. When a cycle
/// blocks progress, the earliest-listed table on the cycle is placed anyway
/// and recorded in [`TableOrder::deferred`].
pub fn order_tables(tables: &[&Table]) -> TableOrder {
    let rank: BTreeMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(idx, table)| (table.name.as_str(), idx))
        .collect();

    // referenced -> referencing
    let mut graph: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut indegree: Vec<usize> = vec![0; tables.len()];
    for (idx, table) in tables.iter().enumerate() {
        graph.entry(idx).or_default();
        for referenced in table.referenced_tables() {
            let Some(&target) = rank.get(referenced) else {
                continue;
            };
            if target != idx && graph.entry(target).or_default().insert(idx) {
                indegree[idx] += 1;
            }
        }
    }
    let summary = FkGraphSummary {
        nodes: tables.len(),
        edges: graph.values().map(|targets| targets.len()).sum(),
    };

    let mut placed = vec![false; tables.len()];
    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|idx| indegree[*idx] == 0).collect();
    let mut order = Vec::with_capacity(tables.len());
    let mut deferred = BTreeSet::new();

    while order.len() < tables.len() {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => {
                let Some(breaker) = first_on_cycle(&graph, &placed) else {
                    break;
                };
                deferred.insert(tables[breaker].name.clone());
                breaker
            }
        };
        if placed[next] {
            continue;
        }
        placed[next] = true;
        order.push(tables[next].name.clone());

        if let Some(targets) = graph.get(&next) {
            for &target in targets {
                indegree[target] = indegree[target].saturating_sub(1);
                if indegree[target] == 0 && !placed[target] {
                    ready.insert(target);
                }
            }
        }
    }

    TableOrder {
        summary,
        order,
        deferred,
    }
}

/// Lowest-ranked unplaced node that can reach itself through unplaced nodes.
fn first_on_cycle(graph: &BTreeMap<usize, BTreeSet<usize>>, placed: &[bool]) -> Option<usize> {
    (0..placed.len())
        .filter(|idx| !placed[*idx])
        .find(|&start| reaches(graph, placed, start, start))
}

fn reaches(
    graph: &BTreeMap<usize, BTreeSet<usize>>,
    placed: &[bool],
    from: usize,
    goal: usize,
) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        let Some(targets) = graph.get(&node) else {
            continue;
        };
        for &target in targets {
            if placed[target] {
                continue;
            }
            if target == goal {
                return true;
            }
            if seen.insert(target) {
                stack.push(target);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ForeignKey;

    fn table(name: &str, refs: &[&str]) -> Table {
        let mut table = Table::new(name);
        for (idx, target) in refs.iter().enumerate() {
            table.foreign_keys.push(ForeignKey::new(
                format!("fk_{name}_{idx}"),
                &["ref_id"],
                *target,
                &["id"],
            ));
        }
        table
    }

    #[test]
    fn referenced_tables_come_first() {
        let orders = table("orders", &["users"]);
        let users = table("users", &[]);
        let items = table("items", &["orders", "products"]);
        let products = table("products", &[]);
        let result = order_tables(&[&orders, &users, &items, &products]);

        assert!(!result.has_cycle());
        assert_eq!(result.summary, FkGraphSummary { nodes: 4, edges: 3 });
        assert_eq!(result.order, vec!["users", "orders", "products", "items"]);
    }

    #[test]
    fn self_references_and_outside_tables_are_ignored() {
        let tree = table("tree", &["tree", "elsewhere"]);
        let result = order_tables(&[&tree]);
        assert_eq!(result.order, vec!["tree"]);
        assert!(!result.has_cycle());
    }

    #[test]
    fn cycles_are_broken_at_the_first_listed_member() {
        let a = table("a", &["b"]);
        let b = table("b", &["a"]);
        let c = table("c", &["b"]);
        let root = table("root", &[]);
        let result = order_tables(&[&c, &a, &b, &root]);

        assert_eq!(result.order, vec!["root", "a", "b", "c"]);
        assert_eq!(result.deferred, BTreeSet::from(["a".to_string()]));
    }
}
