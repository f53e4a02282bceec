//! Compilador de flujos: traduce la definición anidada en un DAG plano e
//! inmutable con índices de padre/hijos precalculados.
//!
//! `compile` es puro y determinista: la misma definición produce siempre el
//! mismo `Dag`, y el resultado puede compartirse (vía `Arc`) entre múltiples
//! transacciones sin mutación.

use indexmap::IndexSet;

use crate::definition::{FlowDefinition, FlowNode, Next};
use crate::error::InvalidFlow;
use crate::flags::StepFlags;

/// Un nodo ya compilado del DAG. El índice dentro de `Dag::nodes` es su
/// identidad estable (`NodeId`).
#[derive(Debug, Clone)]
pub struct DagNode {
    pub index: usize,
    pub action: String,
    pub depth: usize,
    /// Único padre (reservado para futuros joins; hoy siempre 0 o 1 padres).
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Otros nodos que comparten el mismo padre en un fan-out paralelo.
    pub siblings: Vec<usize>,
    pub flags: StepFlags,
}

pub type NodeId = usize;

/// DAG compilado: inmutable, reutilizable entre transacciones.
#[derive(Debug, Clone)]
pub struct Dag {
    nodes: Vec<DagNode>,
    /// Nodos de profundidad 0 (los steps iniciales del flujo), en el orden en
    /// que aparecen en la definición.
    roots: Vec<usize>,
}

impl Dag {
    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Todos los nodos en orden de definición (profundidad, luego orden de
    /// declaración dentro de cada nivel de fan-out). Este es el orden que el
    /// runtime usa al construir cada pase de scheduling.
    pub fn nodes_in_definition_order(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.iter()
    }

    pub fn node_index_for_action(&self, action: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.action == action).map(|n| n.index)
    }
}

/// Compila una `FlowDefinition` en un `Dag`. Rechaza identificadores de
/// acción duplicados y definiciones sin ningún step inicial.
pub fn compile(definition: &FlowDefinition) -> Result<Dag, InvalidFlow> {
    let roots_src: Vec<&FlowNode> = match &definition.next {
        Next::None => Vec::new(),
        Next::Single(n) => vec![n.as_ref()],
        Next::Parallel(ns) => ns.iter().collect(),
    };

    if roots_src.is_empty() {
        return Err(InvalidFlow::MissingRoot);
    }

    let mut nodes: Vec<DagNode> = Vec::new();
    let mut seen_actions: IndexSet<String> = IndexSet::new();

    // Cola de trabajo: (nodo fuente, depth, parent, posición dentro de su
    // grupo de hermanos). Se procesa en anchura (BFS) para que el orden final
    // de `nodes` sea profundidad-a-profundidad, que es exactamente el orden
    // de scheduling que necesita el runtime.
    struct Pending<'a> {
        node: &'a FlowNode,
        depth: usize,
        parent: Option<usize>,
    }

    let mut queue: Vec<Pending> = roots_src.into_iter()
                                           .map(|n| Pending { node: n, depth: 0, parent: None })
                                           .collect();

    // group_of[parent_depth_index] agrupa, por nivel, los índices recién
    // creados bajo un mismo padre para poblar `siblings` tras insertarlos.
    let mut sibling_groups: std::collections::HashMap<Option<usize>, Vec<usize>> = std::collections::HashMap::new();

    while !queue.is_empty() {
        let mut next_queue: Vec<Pending> = Vec::new();
        for pending in queue {
            if !seen_actions.insert(pending.node.action.clone()) {
                return Err(InvalidFlow::DuplicateAction(pending.node.action.clone()));
            }

            let index = nodes.len();
            nodes.push(DagNode { index,
                                  action: pending.node.action.clone(),
                                  depth: pending.depth,
                                  parent: pending.parent,
                                  children: Vec::new(),
                                  siblings: Vec::new(),
                                  flags: pending.node.flags });

            if let Some(parent) = pending.parent {
                nodes[parent].children.push(index);
            }
            sibling_groups.entry(pending.parent).or_default().push(index);

            let children: Vec<&FlowNode> = match &pending.node.next {
                Next::None => Vec::new(),
                Next::Single(n) => vec![n.as_ref()],
                Next::Parallel(ns) => ns.iter().collect(),
            };
            for child in children {
                next_queue.push(Pending { node: child,
                                          depth: pending.depth + 1,
                                          parent: Some(index) });
            }
        }
        queue = next_queue;
    }

    for group in sibling_groups.values() {
        if group.len() < 2 {
            continue;
        }
        for &idx in group {
            nodes[idx].siblings = group.iter().copied().filter(|&i| i != idx).collect();
        }
    }

    let roots = sibling_groups.get(&None).cloned().unwrap_or_default();

    Ok(Dag { nodes, roots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FlowNode;

    #[test]
    fn compiles_linear_flow() {
        let def = FlowDefinition::linear(&["a", "b", "c"]);
        let dag = compile(&def).unwrap();
        assert_eq!(dag.len(), 3);
        assert_eq!(dag.roots(), &[0]);
        assert_eq!(dag.node(0).action, "a");
        assert_eq!(dag.node(0).children, vec![1]);
        assert_eq!(dag.node(1).parent, Some(0));
        assert!(dag.node(0).siblings.is_empty());
    }

    #[test]
    fn compiles_parallel_fan_out_with_siblings() {
        let def = FlowDefinition::parallel(vec![FlowNode::leaf("one"),
                                                 FlowNode::leaf("two"),
                                                 FlowNode::leaf("three")]);
        let dag = compile(&def).unwrap();
        assert_eq!(dag.roots().len(), 3);
        let one = dag.node_index_for_action("one").unwrap();
        assert_eq!(dag.node(one).siblings.len(), 2);
    }

    #[test]
    fn rejects_duplicate_actions() {
        let def = FlowDefinition::single(FlowNode::then("a", FlowNode::leaf("a")));
        let err = compile(&def).unwrap_err();
        assert_eq!(err, InvalidFlow::DuplicateAction("a".to_string()));
    }

    #[test]
    fn rejects_missing_root() {
        let def = FlowDefinition { next: Next::None };
        assert_eq!(compile(&def).unwrap_err(), InvalidFlow::MissingRoot);
    }

    #[test]
    fn definition_order_is_breadth_first() {
        let def = FlowDefinition::parallel(vec![FlowNode::then("one", FlowNode::leaf("four")),
                                                 FlowNode::leaf("two"),]);
        let dag = compile(&def).unwrap();
        let order: Vec<&str> = dag.nodes_in_definition_order().map(|n| n.action.as_str()).collect();
        assert_eq!(order, vec!["one", "two", "four"]);
    }
}
