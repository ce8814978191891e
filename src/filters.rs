//! Named content filters (`:name` blocks).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{Element, Node};

/// Turns a raw text block (lines joined with `\n`) into a replacement node.
pub type FilterFn = dyn Fn(&str) -> Node + Send + Sync;

#[derive(Clone)]
pub struct Filters {
    filters: HashMap<String, Arc<FilterFn>>,
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("Filters").field("names", &names).finish()
    }
}

impl Default for Filters {
    /// The built-in set: `javascript`.
    fn default() -> Self {
        let mut filters = Self::empty();
        filters.register("javascript", javascript);
        filters
    }
}

impl Filters {
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Register (or replace) a filter.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&str) -> Node + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FilterFn>> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }
}

/// Wraps the block in `<script type="text/javascript">`, one literal line per
/// child so the element lays out one source line per output line.
pub fn javascript(block: &str) -> Node {
    let script = Element::new("script").with_attr("type", "text/javascript");
    block
        .lines()
        .fold(Node::element(script), |node, line| node.with_child(Node::text(line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    #[test]
    fn javascript_wraps_lines_in_script() {
        let node = javascript("var a = 1;\nalert(a);");
        let el = node.as_element().unwrap();
        assert_eq!(el.tag, "script");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].kind, NodeKind::Text("alert(a);".into()));
    }

    #[test]
    fn custom_filters_replace_builtins() {
        let mut filters = Filters::default();
        assert!(filters.contains("javascript"));
        filters.register("javascript", |_| Node::text("nope"));
        let node = (filters.get("javascript").unwrap())("x");
        assert_eq!(node.kind, NodeKind::Text("nope".into()));
        assert!(Filters::empty().get("javascript").is_none());
    }
}
