use std::fmt::Write;

use super::Component;

impl Component {
    /// Renders the component and its descendants, one per line, indented two
    /// spaces per level.
    ///
    /// A component shared by several parents is rendered under each of them.
    /// A component reached again through its own descendants is marked
    /// `(cycle)` and not descended into.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        self.dump_into(&mut out, &mut path);
        out
    }

    fn dump_into(&self, out: &mut String, path: &mut Vec<Component>) {
        let indent = path.len() * 2;
        if path.iter().any(|c| c.ptr_eq(self)) {
            let _ = writeln!(out, "{:indent$}{} (cycle)", "", self, indent = indent);
            return;
        }
        let _ = writeln!(out, "{:indent$}{}", "", self, indent = indent);
        path.push(self.clone());
        for child in self.children() {
            child.dump_into(out, path);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptors::TypeDef;
    use crate::graph;
    use crate::registration::Registry;
    use serde_json::json;

    #[test]
    fn renders_shared_children_under_each_parent() {
        let registry = Registry::new();
        let ty = registry.define(TypeDef::new("Node")).unwrap();
        let root = registry.instantiate(ty, json!({})).unwrap();
        let a = registry.instantiate(ty, json!({})).unwrap();
        let b = registry.instantiate(ty, json!({})).unwrap();
        let leaf = registry.instantiate(ty, json!({})).unwrap();
        graph::link(&root, &a);
        graph::link(&root, &b);
        graph::link(&a, &leaf);
        graph::link(&b, &leaf);

        let expected = "Node:1(D)\n  Node:2(D)\n    Node:4(D)\n  Node:3(D)\n    Node:4(D)\n";
        assert_eq!(root.dump(), expected);
    }

    #[test]
    fn marks_cycles() {
        let registry = Registry::new();
        let ty = registry.define(TypeDef::new("Node")).unwrap();
        let a = registry.instantiate(ty, json!({})).unwrap();
        let b = registry.instantiate(ty, json!({})).unwrap();
        graph::link(&a, &b);
        graph::link(&b, &a);
        assert_eq!(a.dump(), "Node:1(D)\n  Node:2(D)\n    Node:1(D) (cycle)\n");
    }
}
