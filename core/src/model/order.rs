//! Evaluation order for nodes.
use crate::internal::*;
use crate::model::Node;
use bit_set::BitSet;

/// Find an evaluation order for a list of nodes, so that every node comes
/// after the nodes producing its inputs.
///
/// Only the ancestors of `targets` are included. Nodes in `inputs` are
/// considered available without looking at their own inputs.
pub fn eval_order_for_nodes(
    nodes: &[Node],
    inputs: &[usize],
    targets: &[usize],
) -> GraftResult<Vec<usize>> {
    let mut done = BitSet::with_capacity(nodes.len());
    let mut pending = BitSet::with_capacity(nodes.len());
    let mut needed: Vec<usize> = vec![];
    let mut order: Vec<usize> = vec![];
    for &t in targets {
        needed.push(t);
    }
    while let Some(&node) = needed.last() {
        if done.contains(node) {
            needed.pop();
            continue;
        }
        if inputs.contains(&node) || nodes[node].inputs.iter().all(|i| done.contains(i.node)) {
            order.push(node);
            needed.pop();
            done.insert(node);
        } else {
            if !pending.insert(node) {
                bail!("Cycle detected around node {}", nodes[node]);
            }
            for input in nodes[node].inputs.iter().rev() {
                if !done.contains(input.node) {
                    needed.push(input.node);
                }
            }
        }
    }
    Ok(order)
}
