use crate::transport::TransportNode;
use delve_core::machine::Machine;
use delve_core::registry::StructureKind;

/// Anything placed in the object map.
#[derive(Debug, Clone, PartialEq)]
pub enum Structure {
    Machine(Machine),
    Node(TransportNode),
}

impl Structure {
    pub fn as_machine(&self) -> Option<&Machine> {
        match self {
            Structure::Machine(m) => Some(m),
            Structure::Node(_) => None,
        }
    }

    pub fn as_machine_mut(&mut self) -> Option<&mut Machine> {
        match self {
            Structure::Machine(m) => Some(m),
            Structure::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&TransportNode> {
        match self {
            Structure::Node(n) => Some(n),
            Structure::Machine(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut TransportNode> {
        match self {
            Structure::Node(n) => Some(n),
            Structure::Machine(_) => None,
        }
    }

    /// Registry key used to find the item this structure came from.
    pub fn kind(&self) -> StructureKind {
        match self {
            Structure::Machine(m) => StructureKind::Machine(m.kind()),
            Structure::Node(n) => n.kind().structure_kind(),
        }
    }
}
