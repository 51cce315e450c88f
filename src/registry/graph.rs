//! Dependency graph and initialization order

use crate::error::{ContainerError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct GraphNode {
    name: String,
    priority: i32,
    dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Directed graph of services, keyed by name, with edges pointing at dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Re-adding a name replaces its edges but keeps its position.
    pub fn add_node<I, N>(&mut self, name: impl Into<String>, priority: i32, dependencies: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let node = GraphNode {
            name: name.into(),
            priority,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        };
        match self.index.get(&node.name) {
            Some(&i) => self.nodes[i] = node,
            None => {
                self.index.insert(node.name.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.node(name).map(|n| n.dependencies.as_slice())
    }

    /// Names that declare a direct dependency on `name`, in insertion order.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.dependencies.iter().any(|d| d == name))
            .map(|n| n.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, name: &str) -> Option<&GraphNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Compute an initialization order covering every node.
    ///
    /// Depth-first traversal seeded by descending priority (insertion order
    /// breaks ties), so dependencies always precede their dependents and
    /// unrelated high-priority chains surface first.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let mut seeds: Vec<&GraphNode> = self.nodes.iter().collect();
        seeds.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut walk = Walk::new(self);
        for node in seeds {
            walk.visit(&node.name)?;
        }
        Ok(walk.order)
    }

    /// Compute the initialization order of `root` and its transitive dependencies.
    pub fn resolve_from(&self, root: &str) -> Result<Vec<String>> {
        if !self.contains(root) {
            return Err(ContainerError::not_found(root));
        }
        let mut walk = Walk::new(self);
        walk.visit(root)?;
        Ok(walk.order)
    }
}

struct Walk<'g> {
    graph: &'g DependencyGraph,
    marks: HashMap<&'g str, Mark>,
    path: Vec<&'g str>,
    order: Vec<String>,
}

impl<'g> Walk<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            marks: HashMap::with_capacity(graph.len()),
            path: Vec::new(),
            order: Vec::with_capacity(graph.len()),
        }
    }

    fn visit(&mut self, name: &'g str) -> Result<()> {
        match self.marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(ContainerError::CircularDependency {
                    service: name.to_string(),
                    cycle,
                });
            }
            None => {}
        }

        let graph = self.graph;
        let node = graph
            .node(name)
            .ok_or_else(|| ContainerError::not_found(name))?;

        self.marks.insert(&node.name, Mark::Visiting);
        self.path.push(&node.name);

        for dependency in &node.dependencies {
            if !graph.contains(dependency) {
                return Err(ContainerError::missing_dependency(&node.name, dependency));
            }
            self.visit(dependency)?;
        }

        self.path.pop();
        self.marks.insert(&node.name, Mark::Visited);
        self.order.push(node.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_priority_breaks_ties_among_dependents() {
        let mut graph = DependencyGraph::new();
        graph.add_node("A", 1, Vec::<String>::new());
        graph.add_node("B", 0, ["A"]);
        graph.add_node("C", 5, ["A"]);

        assert_eq!(graph.resolve().unwrap(), ["A", "C", "B"]);
    }

    #[test]
    fn test_every_dependency_precedes_its_dependent() {
        let mut graph = DependencyGraph::new();
        graph.add_node("ui", 10, ["annotator", "toast_manager"]);
        graph.add_node("annotator", 0, ["ai_client", "storage", "metadata"]);
        graph.add_node("ai_client", 3, ["storage", "error_handler"]);
        graph.add_node("metadata", 7, ["storage"]);
        graph.add_node("storage", -1, Vec::<String>::new());
        graph.add_node("error_handler", 100, Vec::<String>::new());
        graph.add_node("toast_manager", 50, ["error_handler"]);

        let order = graph.resolve().unwrap();
        assert_eq!(order.len(), graph.len());
        for name in &order {
            for dependency in graph.dependencies(name).unwrap() {
                assert!(
                    position(&order, dependency) < position(&order, name),
                    "{} must come before {} in {:?}",
                    dependency,
                    name,
                    order
                );
            }
        }
        assert_eq!(order[0], "error_handler");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut graph = DependencyGraph::new();
        for name in ["d", "c", "b", "a"] {
            graph.add_node(name, 0, Vec::<String>::new());
        }
        graph.add_node("e", 0, ["a", "d"]);

        let first = graph.resolve().unwrap();
        assert_eq!(first, ["d", "c", "b", "a", "e"]);
        assert_eq!(graph.resolve().unwrap(), first);
    }

    #[test]
    fn test_two_node_cycle_names_both() {
        let mut graph = DependencyGraph::new();
        graph.add_node("A", 0, ["B"]);
        graph.add_node("B", 0, ["A"]);

        match graph.resolve() {
            Err(ContainerError::CircularDependency { service, cycle }) => {
                assert_eq!(service, "A");
                assert_eq!(cycle, ["A", "B", "A"]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node("loop", 0, ["loop"]);
        assert!(matches!(
            graph.resolve(),
            Err(ContainerError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_missing_dependency_names_it() {
        let mut graph = DependencyGraph::new();
        graph.add_node("B", 0, ["C"]);

        match graph.resolve() {
            Err(ContainerError::MissingDependency {
                service,
                dependency,
            }) => {
                assert_eq!(service, "B");
                assert_eq!(dependency, "C");
            }
            other => panic!("expected a missing dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_from_only_walks_the_closure() {
        let mut graph = DependencyGraph::new();
        graph.add_node("storage", 0, Vec::<String>::new());
        graph.add_node("metadata", 0, ["storage"]);
        graph.add_node("unrelated", 9, ["missing"]);

        assert_eq!(graph.resolve_from("metadata").unwrap(), ["storage", "metadata"]);
        assert!(matches!(
            graph.resolve_from("nope"),
            Err(ContainerError::ServiceNotFound { .. })
        ));
        assert!(graph.resolve().is_err());
    }

    #[test]
    fn test_re_adding_keeps_position() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", 0, Vec::<String>::new());
        graph.add_node("b", 0, Vec::<String>::new());
        graph.add_node("a", 0, ["b"]);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.resolve().unwrap(), ["b", "a"]);
        assert_eq!(graph.dependents("b"), ["a"]);
    }
}
