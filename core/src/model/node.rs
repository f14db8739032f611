use crate::internal::*;
use std::fmt;

/// A node in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// node id in the model
    ///
    /// Caution: this id will not be persistent during networks transformation
    pub id: usize,
    /// name of the node
    ///
    /// This will usually come from the caller building the model, or be
    /// derived from the name of the node it was built for.
    pub name: String,
    /// A list of incoming tensors, identified by the node outlet that creates
    /// them.
    pub inputs: Vec<OutletId>,
    /// The actual operation the node performs.
    pub op: Box<dyn TypedOp>,
    /// List of ouputs, with their descendants.
    pub outputs: TVec<Outlet>,
}

pub type TypedNode = Node;

impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{} \"{}\" {}", self.id, self.name, self.op.name())
    }
}

impl Node {
    /// Access the op of the node
    pub fn op(&self) -> &dyn TypedOp {
        &*self.op
    }

    /// Try to downcast the node operation to O.
    pub fn op_as<O: TypedOp>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    /// Check if the node operation is of type O.
    pub fn op_is<O: TypedOp>(&self) -> bool {
        self.op_as::<O>().is_some()
    }

    pub fn same_as(&self, other: &Node) -> bool {
        self.inputs == other.inputs && self.op.same_as(other.op.as_op())
    }
}

/// Information for each outlet of a node
#[derive(Clone, Debug)]
pub struct Outlet {
    /// the tensor type information
    pub fact: TypedFact,
    /// where this outlet is used.
    pub successors: TVec<InletId>,
}

impl fmt::Display for Outlet {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{:?} {}",
            self.fact,
            self.successors.iter().map(|o| format!("{o:?}")).collect::<Vec<_>>().join(" ")
        )
    }
}

/// Identifier for a node output in the graph.
///
/// This happens to be a unique identifier of any variable tensor in the graph
/// (as the graph typically connect one single node output to one or several
/// inputs slots)
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Default, PartialOrd, Ord)]
pub struct OutletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the input in the node
    pub slot: usize,
}

impl fmt::Debug for OutletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}/{}", self.node, self.slot)
    }
}

impl From<usize> for OutletId {
    fn from(node: usize) -> OutletId {
        OutletId::new(node, 0)
    }
}

/// Identifier for a node input in the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Ord, PartialOrd)]
pub struct InletId {
    /// node identifier in the graph
    pub node: usize,
    /// rank of the input in the node
    pub slot: usize,
}

impl fmt::Debug for InletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, ">{}/{}", self.node, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_in_messages() {
        assert_eq!(format!("{:?}", OutletId::new(1, 0)), "1/0");
        assert_eq!(format!("{:?}", InletId::new(2, 1)), ">2/1");
        let err = TypedModel::default().outlet_fact(OutletId::new(1, 0)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid outlet reference: 1/0");
    }
}
