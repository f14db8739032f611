use super::*;
use crate::hash::fingerprint;
use crate::internal::*;
use crate::ops::konst::Const;
use crate::ops::source::TypedSource;

use std::fmt;

/// Main model class
///
/// Nodes are appended and never removed, so node ids stay valid for the
/// lifetime of the model.
#[derive(Clone, Debug, Default)]
pub struct TypedModel {
    /// all nodes in the model
    pub nodes: Vec<TypedNode>,
    /// model inputs
    pub inputs: Vec<OutletId>,
    /// model outputs
    pub outputs: Vec<OutletId>,
    /// nodes with inputs, indexed by the fingerprint of their op
    fingerprints: HashMap<u64, TVec<usize>>,
}

impl TypedModel {
    pub fn add_source(&mut self, name: impl Into<String>, fact: TypedFact) -> GraftResult<OutletId> {
        let id = self.add_node(name, TypedSource::new(fact.clone()), tvec!(fact))?;
        let id = OutletId::new(id, 0);
        self.inputs.push(id);
        Ok(id)
    }

    pub fn add_const(
        &mut self,
        name: impl Into<String>,
        v: impl IntoArcTensor,
    ) -> GraftResult<OutletId> {
        let v = v.into_arc_tensor();
        let fact = TypedFact::from(&*v);
        let id = self.add_node(name, Const::new(v), tvec!(fact))?;
        Ok(OutletId::new(id, 0))
    }

    /// Append a node without checking its facts. Prefer `wire_node`.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn TypedOp>>,
        output_facts: TVec<TypedFact>,
    ) -> GraftResult<usize> {
        let op = op.into();
        let name = name.into();
        let id = self.nodes.len();
        let outputs =
            output_facts.into_iter().map(|fact| Outlet { fact, successors: tvec!() }).collect();
        let node = Node { id, name, op, inputs: vec![], outputs };
        self.nodes.push(node);
        Ok(id)
    }

    /// Connect a node outlet to a node inlet.
    pub fn add_edge(&mut self, outlet: OutletId, inlet: InletId) -> GraftResult<()> {
        if let Some(previous) = self.nodes[inlet.node].inputs.get(inlet.slot).cloned() {
            self.nodes[previous.node].outputs[previous.slot]
                .successors
                .retain(|&mut succ| succ != inlet);
        }
        {
            let prec = &mut self.nodes[outlet.node];
            prec.outputs[outlet.slot].successors.push(inlet);
        }
        let succ = &mut self.nodes[inlet.node];
        #[allow(clippy::comparison_chain)]
        if inlet.slot == succ.inputs.len() {
            succ.inputs.push(outlet);
        } else if inlet.slot < succ.inputs.len() {
            succ.inputs[inlet.slot] = outlet;
        } else {
            bail!(
                "Edges must be added in order and consecutive. Trying to connect input {:?} of node {}",
                inlet.slot,
                succ
            )
        }
        Ok(())
    }

    /// Add a node computing `op` over `inputs`, and return its outlets.
    ///
    /// Output facts are inferred from the input facts, so invalid shapes or
    /// types fail here. If a node computing the same op over the same inputs
    /// already exists, its outlets are returned instead and the graph is left
    /// untouched.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn TypedOp>>,
        inputs: &[OutletId],
    ) -> GraftResult<TVec<OutletId>> {
        let op = op.into();
        let name = name.into();
        let input_facts = inputs
            .iter()
            .map(|o| self.outlet_fact(*o).cloned())
            .collect::<GraftResult<TVec<_>>>()?;
        let output_facts = {
            let refs: TVec<&TypedFact> = input_facts.iter().collect();
            op.output_facts(&refs).with_context(|| format!("wiring {} ({})", name, op.name()))?
        };
        let print = fingerprint(&*op);
        if let Some(existing) = self.find_equivalent(print, &*op, inputs) {
            debug!("Reusing {} for {}", self.nodes[existing], name);
            return Ok(self.node_outlets(existing));
        }
        let id = self.add_node(name, op, output_facts)?;
        for (ix, i) in inputs.iter().enumerate() {
            self.add_edge(*i, InletId::new(id, ix))?;
        }
        if !inputs.is_empty() {
            self.fingerprints.entry(print).or_default().push(id);
        }
        Ok(self.node_outlets(id))
    }

    fn find_equivalent(&self, print: u64, op: &dyn TypedOp, inputs: &[OutletId]) -> Option<usize> {
        if inputs.is_empty() {
            return None;
        }
        self.fingerprints.get(&print)?.iter().copied().find(|&candidate| {
            let node = &self.nodes[candidate];
            node.inputs == inputs && node.op.same_as(op.as_op())
        })
    }

    fn node_outlets(&self, id: usize) -> TVec<OutletId> {
        (0..self.nodes[id].outputs.len()).map(|slot| OutletId::new(id, slot)).collect()
    }

    /// Build a node name not used in the model yet.
    pub fn unique_name(&self, prefix: impl Into<String>) -> String {
        let prefix = prefix.into();
        if self.nodes.iter().all(|n| n.name != prefix) {
            return prefix;
        }
        for i in 1.. {
            let s = format!("{prefix}.{i}");
            if self.nodes.iter().all(|n| n.name != s) {
                return s;
            }
        }
        unreachable!();
    }

    // Inputs

    /// Get model inputs.
    pub fn input_outlets(&self) -> GraftResult<&[OutletId]> {
        Ok(&self.inputs)
    }

    /// Change model inputs.
    pub fn set_input_outlets(&mut self, inputs: &[OutletId]) -> GraftResult<()> {
        self.inputs = inputs.to_vec();
        Ok(())
    }

    // Outputs

    /// Get model outputs.
    pub fn output_outlets(&self) -> GraftResult<&[OutletId]> {
        Ok(&self.outputs)
    }

    /// Change model outputs.
    pub fn set_output_outlets(&mut self, outputs: &[OutletId]) -> GraftResult<()> {
        for o in outputs {
            self.outlet_fact(*o)?;
        }
        self.outputs = outputs.to_vec();
        Ok(())
    }

    // nodes and their facts

    /// Find a node by its name.
    pub fn node_by_name(&self, name: impl AsRef<str>) -> GraftResult<&TypedNode> {
        let name = name.as_ref();
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .with_context(|| format!("No node found for name: \"{name}\""))
    }

    /// Borrow a node by id.
    pub fn node(&self, id: usize) -> &TypedNode {
        &self.nodes[id]
    }

    /// Access the nodes table.
    pub fn nodes(&self) -> &[TypedNode] {
        &self.nodes
    }

    /// Get input facts of a node.
    pub fn node_input_facts(&self, node_id: usize) -> GraftResult<TVec<&TypedFact>> {
        self.nodes[node_id].inputs.iter().map(|o| self.outlet_fact(*o)).collect()
    }

    /// Get the fact of an outlet.
    pub fn outlet_fact(&self, outlet: OutletId) -> GraftResult<&TypedFact> {
        let outlets = &self
            .nodes
            .get(outlet.node)
            .with_context(|| format!("Invalid outlet reference: {outlet:?}"))?
            .outputs;
        outlets
            .get(outlet.slot)
            .map(|o| &o.fact)
            .with_context(|| format!("Invalid outlet reference: {outlet:?}"))
    }

    /// Computes an evalutation order for the graph inputs and outputs
    pub fn eval_order(&self) -> GraftResult<Vec<usize>> {
        let inputs = self.inputs.iter().map(|n| n.node).collect::<Vec<usize>>();
        let targets = self.outputs.iter().map(|n| n.node).collect::<Vec<usize>>();
        eval_order_for_nodes(&self.nodes, &inputs, &targets)
    }
}

impl fmt::Display for TypedModel {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for node in &self.nodes {
            write!(fmt, "{node}")?;
            for (ix, input) in node.inputs.iter().enumerate() {
                write!(fmt, "{}{input:?}", if ix == 0 { " <- " } else { ", " })?;
            }
            writeln!(fmt)?;
            for (slot, outlet) in node.outputs.iter().enumerate() {
                writeln!(fmt, "  * output #{slot}: {outlet}")?;
            }
        }
        Ok(())
    }
}
