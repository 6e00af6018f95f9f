//! Node tree
//!
//! Core data structure for a normalized report: an ownership tree of
//! module → package → file/class → method nodes. Every node owns its children
//! in discovery order and carries at most one value per metric.

use serde::{Serialize, Serializer};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{CoverageError, Result};
use crate::metric::Metric;
use crate::value::Value;

/// Level of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Module,
    Package,
    File,
    Class,
    Method,
}

impl NodeKind {
    pub fn metric(&self) -> Metric {
        Metric::from(*self)
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// A single executed test, owned by a class node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub class_name: String,
    pub result: TestResult,
    /// Failure message or other description, empty if none
    pub description: String,
}

impl TestCase {
    pub fn new(name: &str, class_name: &str, result: TestResult) -> Self {
        Self {
            name: name.to_string(),
            class_name: class_name.to_string(),
            result,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// One element of the report tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    kind: NodeKind,
    name: String,
    /// Interned project-relative path (files and packages)
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<Arc<str>>,
    /// Path of the file a class is defined in; a lookup key, not ownership
    #[serde(skip_serializing_if = "Option::is_none")]
    source_path: Option<Arc<str>>,
    #[serde(serialize_with = "serialize_values")]
    values: BTreeMap<Metric, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    test_cases: Vec<TestCase>,
    children: Vec<Node>,
}

fn serialize_values<S: Serializer>(
    values: &BTreeMap<Metric, Value>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(values.values())
}

impl Node {
    pub fn new(kind: NodeKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            path: None,
            source_path: None,
            values: BTreeMap::new(),
            test_cases: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a new root module node
    pub fn module(name: &str) -> Self {
        Self::new(NodeKind::Module, name)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The shared path storage, for identity comparisons
    pub fn path_storage(&self) -> Option<&Arc<str>> {
        self.path.as_ref()
    }

    pub fn set_path(&mut self, path: Arc<str>) {
        self.path = Some(path);
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn source_path_storage(&self) -> Option<&Arc<str>> {
        self.source_path.as_ref()
    }

    pub fn set_source_path(&mut self, path: Arc<str>) {
        self.source_path = Some(path);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// A node without children, values or test cases
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.values.is_empty() && self.test_cases.is_empty()
    }

    /// Find or create a child node of the given kind and name
    pub fn find_or_create_child(&mut self, kind: NodeKind, name: &str) -> &mut Node {
        let index = match self
            .children
            .iter()
            .position(|c| c.kind == kind && c.name == name)
        {
            Some(index) => index,
            None => {
                self.children.push(Node::new(kind, name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Find or create a file child; files are identified by their path
    pub fn find_or_create_file(&mut self, name: &str, path: Arc<str>) -> &mut Node {
        let index = match self
            .children
            .iter()
            .position(|c| c.kind == NodeKind::File && c.path.as_deref() == Some(&*path))
        {
            Some(index) => index,
            None => {
                let mut file = Node::new(NodeKind::File, name);
                file.path = Some(path);
                self.children.push(file);
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Stores a value, replacing any previous value of the same metric
    pub fn set_value(&mut self, value: Value) {
        self.values.insert(value.metric(), value);
    }

    pub fn get_value(&self, metric: Metric) -> Option<&Value> {
        self.values.get(&metric)
    }

    /// Own values in metric order
    pub fn values(&self) -> Vec<Value> {
        self.values.values().copied().collect()
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Adds a test case and updates this node's test count
    pub fn add_test_case(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
        self.set_value(Value::TestCount(self.test_cases.len() as u64));
    }

    /// Per-metric totals over the whole subtree, including this node.
    /// Fails with `Overflow` if a total leaves the `u64` range.
    pub fn aggregate_values(&self) -> Result<Vec<Value>> {
        let mut totals = self.values.clone();
        for child in &self.children {
            for value in child.aggregate_values()? {
                accumulate(&mut totals, value)?;
            }
        }
        Ok(totals.into_values().collect())
    }

    pub fn aggregate_value(&self, metric: Metric) -> Result<Option<Value>> {
        Ok(self
            .aggregate_values()?
            .into_iter()
            .find(|v| v.metric() == metric))
    }

    /// Merges `other` into this node
    ///
    /// Children present on both sides are merged recursively, children only in
    /// `other` are appended in its order. Values present on both sides are
    /// summed, so merging a tree with itself doubles every count.
    pub fn merge(&mut self, other: Node) -> Result<()> {
        if self.kind != other.kind || self.name != other.name {
            return Err(CoverageError::NodeMismatch {
                left_kind: self.kind,
                left_name: self.name.clone(),
                right_kind: other.kind,
                right_name: other.name,
            });
        }

        for value in other.values.into_values() {
            let combined = match self.values.get(&value.metric()) {
                Some(existing) => existing.combine(&value)?,
                None => value,
            };
            self.set_value(combined);
        }

        self.test_cases.extend(other.test_cases);
        if self.path.is_none() {
            self.path = other.path;
        }
        if self.source_path.is_none() {
            self.source_path = other.source_path;
        }

        for child in other.children {
            match self.children.iter().position(|c| c.same_identity(&child)) {
                Some(index) => self.children[index].merge(child)?,
                None => self.children.push(child),
            }
        }

        Ok(())
    }

    /// Merges several trees with the same root into one
    pub fn merge_all(nodes: Vec<Node>) -> Result<Node> {
        let mut nodes = nodes.into_iter();
        let mut merged = nodes.next().ok_or(CoverageError::NoCoverageData)?;
        for node in nodes {
            merged.merge(node)?;
        }
        Ok(merged)
    }

    /// Files are identified by path, every other node by kind and name
    fn same_identity(&self, other: &Node) -> bool {
        match self.kind {
            NodeKind::File => other.kind == NodeKind::File && self.path == other.path,
            _ => self.kind == other.kind && self.name == other.name,
        }
    }

    /// Depth-first search for a node of the given kind and name
    pub fn find(&self, kind: NodeKind, name: &str) -> Option<&Node> {
        if self.kind == kind && self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(kind, name))
    }

    /// All nodes of a kind in the subtree, in pre-order
    pub fn get_all(&self, kind: NodeKind) -> Vec<&Node> {
        let mut nodes = Vec::new();
        self.collect(kind, &mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, kind: NodeKind, nodes: &mut Vec<&'a Node>) {
        if self.kind == kind {
            nodes.push(self);
        }
        for child in &self.children {
            child.collect(kind, nodes);
        }
    }

    /// Index of file nodes by path
    pub fn file_index(&self) -> HashMap<&str, &Node> {
        self.get_all(NodeKind::File)
            .into_iter()
            .filter_map(|file| file.path().map(|path| (path, file)))
            .collect()
    }

    /// Totals for one source file: the file node's own subtree plus every
    /// class that names the file as its source
    pub fn values_for_file(&self, path: &str) -> Result<Vec<Value>> {
        let mut totals = BTreeMap::new();

        if let Some(file) = self.file_index().get(path) {
            for value in file.aggregate_values()? {
                accumulate(&mut totals, value)?;
            }
        }
        for class in self.get_all(NodeKind::Class) {
            if class.source_path() == Some(path) {
                for value in class.aggregate_values()? {
                    accumulate(&mut totals, value)?;
                }
            }
        }

        Ok(totals.into_values().collect())
    }

    /// All test cases in the subtree
    pub fn all_test_cases(&self) -> Vec<&TestCase> {
        let mut tests: Vec<&TestCase> = self.test_cases.iter().collect();
        for child in &self.children {
            tests.extend(child.all_test_cases());
        }
        tests
    }
}

fn accumulate(totals: &mut BTreeMap<Metric, Value>, value: Value) -> Result<()> {
    match totals.entry(value.metric()) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => {
            let combined = entry.get().combine(&value)?;
            entry.insert(combined);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::PathInterner;

    fn line(covered: u64, missed: u64) -> Value {
        Value::coverage(Metric::Line, covered, missed).unwrap()
    }

    fn branch(covered: u64, missed: u64) -> Value {
        Value::coverage(Metric::Branch, covered, missed).unwrap()
    }

    /// module → package "p" → class "A" (2 methods), class "B" (1 method)
    fn sample_tree() -> Node {
        let mut root = Node::module("-");
        let package = root.find_or_create_child(NodeKind::Package, "p");

        let a = package.find_or_create_child(NodeKind::Class, "A");
        let m1 = a.find_or_create_child(NodeKind::Method, "m1");
        m1.set_value(line(3, 1));
        m1.set_value(Value::Complexity(2));
        let m2 = a.find_or_create_child(NodeKind::Method, "m2");
        m2.set_value(line(0, 4));
        m2.set_value(branch(1, 1));

        let b = package.find_or_create_child(NodeKind::Class, "B");
        b.add_test_case(TestCase::new("t1", "B", TestResult::Passed));
        let m3 = b.find_or_create_child(NodeKind::Method, "m3");
        m3.set_value(line(5, 0));
        m3.set_value(Value::Complexity(1));

        root
    }

    #[test]
    fn test_find_or_create_reuses_siblings() {
        let mut root = Node::module("-");
        root.find_or_create_child(NodeKind::Package, "p");
        root.find_or_create_child(NodeKind::Package, "q");
        root.find_or_create_child(NodeKind::Package, "p");
        root.find_or_create_child(NodeKind::Class, "p");

        let names: Vec<_> = root.children().iter().map(|c| (c.kind(), c.name())).collect();
        assert_eq!(
            names,
            vec![
                (NodeKind::Package, "p"),
                (NodeKind::Package, "q"),
                (NodeKind::Class, "p")
            ]
        );
    }

    #[test]
    fn test_find_or_create_finds_nodes_with_a_path() {
        let mut interner = PathInterner::new();
        let mut root = Node::module("-");
        root.find_or_create_child(NodeKind::Package, "p")
            .set_path(interner.intern("src/p"));
        root.find_or_create_child(NodeKind::Package, "p")
            .set_value(Value::Complexity(1));

        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].path(), Some("src/p"));
        assert_eq!(
            root.children()[0].get_value(Metric::Complexity),
            Some(&Value::Complexity(1))
        );
    }

    #[test]
    fn test_merge_matches_packages_regardless_of_path() {
        let mut interner = PathInterner::new();
        let mut left = Node::module("-");
        left.find_or_create_child(NodeKind::Package, "p")
            .set_value(Value::Complexity(1));

        let mut right = Node::module("-");
        let package = right.find_or_create_child(NodeKind::Package, "p");
        package.set_path(interner.intern("src/p"));
        package.set_value(Value::Complexity(2));

        left.merge(right).unwrap();
        assert_eq!(left.children().len(), 1);
        assert_eq!(left.children()[0].path(), Some("src/p"));
        assert_eq!(
            left.children()[0].get_value(Metric::Complexity),
            Some(&Value::Complexity(3))
        );
    }

    #[test]
    fn test_find_or_create_is_case_sensitive() {
        let mut root = Node::module("-");
        root.find_or_create_child(NodeKind::Package, "p");
        root.find_or_create_child(NodeKind::Package, "P");
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn test_set_value_overwrites() {
        let mut node = Node::new(NodeKind::Method, "m");
        node.set_value(line(1, 1));
        node.set_value(line(2, 0));
        assert_eq!(node.get_value(Metric::Line), Some(&line(2, 0)));
        assert_eq!(node.values().len(), 1);
    }

    #[test]
    fn test_aggregate_values() {
        let root = sample_tree();
        let totals = root.aggregate_values().unwrap();

        assert_eq!(Value::get_value(Metric::Line, &totals).unwrap(), &line(8, 5));
        assert_eq!(Value::get_value(Metric::Branch, &totals).unwrap(), &branch(1, 1));
        assert_eq!(
            Value::get_value(Metric::Complexity, &totals).unwrap(),
            &Value::Complexity(3)
        );
        assert_eq!(
            Value::get_value(Metric::Tests, &totals).unwrap(),
            &Value::TestCount(1)
        );

        let metrics: Vec<_> = totals.iter().map(|v| v.metric()).collect();
        let mut sorted = metrics.clone();
        sorted.sort();
        assert_eq!(metrics, sorted);
    }

    #[test]
    fn test_aggregation_is_conserved_at_every_node() {
        fn check(node: &Node) {
            let totals = node.aggregate_values().unwrap();
            for metric in Metric::ALL {
                let mut expected = node.get_value(metric).copied();
                for child in node.children() {
                    if let Some(value) = child.aggregate_value(metric).unwrap() {
                        expected = Some(match expected {
                            Some(e) => e.combine(&value).unwrap(),
                            None => value,
                        });
                    }
                }
                assert_eq!(
                    Value::get_value(metric, &totals).ok().copied(),
                    expected,
                    "{} at {}",
                    metric,
                    node.name()
                );
            }
            node.children().iter().for_each(check);
        }

        let mut root = sample_tree();
        root.set_value(line(1, 0));
        check(&root);
    }

    #[test]
    fn test_merge_with_empty_tree_is_identity() {
        let mut tree = sample_tree();
        tree.merge(Node::module("-")).unwrap();
        assert_eq!(tree, sample_tree());
    }

    #[test]
    fn test_merge_with_itself_doubles_counts() {
        fn check(merged: &Node, original: &Node) {
            assert_eq!(merged.kind(), original.kind());
            assert_eq!(merged.name(), original.name());
            assert_eq!(merged.children().len(), original.children().len());

            let doubled: Vec<_> = original
                .values()
                .iter()
                .map(|v| v.combine(v).unwrap())
                .collect();
            assert_eq!(merged.values(), doubled, "values at {}", original.name());

            let totals: Vec<_> = original
                .aggregate_values()
                .unwrap()
                .iter()
                .map(|v| v.combine(v).unwrap())
                .collect();
            assert_eq!(
                merged.aggregate_values().unwrap(),
                totals,
                "totals at {}",
                original.name()
            );
            assert_eq!(merged.test_cases().len(), original.test_cases().len() * 2);

            for (m, o) in merged.children().iter().zip(original.children()) {
                check(m, o);
            }
        }

        let original = sample_tree();
        let mut tree = sample_tree();
        tree.merge(sample_tree()).unwrap();

        check(&tree, &original);
        assert_eq!(tree.aggregate_value(Metric::Line).unwrap(), Some(line(16, 10)));
        assert_eq!(tree.get_all(NodeKind::Method).len(), 3);
    }

    #[test]
    fn test_aggregation_overflow_is_an_error() {
        let mut root = Node::module("-");
        root.find_or_create_child(NodeKind::Package, "p")
            .set_value(Value::Complexity(u64::MAX));
        root.find_or_create_child(NodeKind::Package, "q")
            .set_value(Value::Complexity(1));

        assert!(matches!(
            root.aggregate_values(),
            Err(CoverageError::Overflow(Metric::Complexity))
        ));
        assert!(root.aggregate_value(Metric::Complexity).is_err());
    }

    #[test]
    fn test_merge_orders_children() {
        let mut left = Node::module("-");
        left.find_or_create_child(NodeKind::Package, "b");
        left.find_or_create_child(NodeKind::Package, "a");

        let mut right = Node::module("-");
        right.find_or_create_child(NodeKind::Package, "c");
        right.find_or_create_child(NodeKind::Package, "a");
        right.find_or_create_child(NodeKind::Package, "d");

        left.merge(right).unwrap();
        let names: Vec<_> = left.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_merge_is_associative() {
        let mut b = Node::module("-");
        let class = b
            .find_or_create_child(NodeKind::Package, "p")
            .find_or_create_child(NodeKind::Class, "A");
        class.set_value(line(1, 1));
        class.add_test_case(TestCase::new("t2", "A", TestResult::Failed));

        let mut c = Node::module("-");
        c.find_or_create_child(NodeKind::Package, "other")
            .find_or_create_child(NodeKind::Class, "C")
            .set_value(branch(0, 3));

        let mut left = sample_tree();
        left.merge(b.clone()).unwrap();
        left.merge(c.clone()).unwrap();

        let mut bc = b;
        bc.merge(c).unwrap();
        let mut right = sample_tree();
        right.merge(bc).unwrap();

        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_rejects_mismatched_roots() {
        let mut left = Node::module("a");
        let error = left.merge(Node::module("b")).unwrap_err();
        assert!(matches!(error, CoverageError::NodeMismatch { .. }));

        let mut package = Node::new(NodeKind::Package, "a");
        assert!(package.merge(Node::module("a")).is_err());
    }

    #[test]
    fn test_merge_all() {
        let merged = Node::merge_all(vec![sample_tree(), sample_tree(), sample_tree()]).unwrap();
        assert_eq!(merged.aggregate_value(Metric::Line).unwrap(), Some(line(24, 15)));
        assert!(Node::merge_all(Vec::new()).is_err());
    }

    #[test]
    fn test_files_share_interned_paths() {
        let mut interner = PathInterner::new();
        let mut root = Node::module("-");
        let package = root.find_or_create_child(NodeKind::Package, "p");
        package.find_or_create_file("Calc.cs", interner.intern("src/Calc.cs"));
        let other = root.find_or_create_child(NodeKind::Package, "q");
        other.find_or_create_file("Calc.cs", interner.intern("src/Calc.cs"));

        let files = root.get_all(NodeKind::File);
        assert_eq!(files.len(), 2);
        assert!(Arc::ptr_eq(
            files[0].path_storage().unwrap(),
            files[1].path_storage().unwrap()
        ));
    }

    #[test]
    fn test_files_are_identified_by_path() {
        let mut interner = PathInterner::new();
        let mut package = Node::new(NodeKind::Package, "p");
        package.find_or_create_file("Util.cs", interner.intern("a/Util.cs"));
        package.find_or_create_file("Util.cs", interner.intern("b/Util.cs"));
        package.find_or_create_file("Util.cs", interner.intern("a/Util.cs"));
        assert_eq!(package.children().len(), 2);
    }

    #[test]
    fn test_values_for_file() {
        let mut interner = PathInterner::new();
        let mut root = sample_tree();
        let path = interner.intern("src/A.cs");
        let package = root.find_or_create_child(NodeKind::Package, "p");
        package.find_or_create_file("A.cs", Arc::clone(&path));
        package
            .find_or_create_child(NodeKind::Class, "A")
            .set_source_path(Arc::clone(&path));

        assert!(root.file_index().contains_key("src/A.cs"));
        let values = root.values_for_file("src/A.cs").unwrap();
        assert_eq!(Value::get_value(Metric::Line, &values).unwrap(), &line(3, 5));
        assert!(root.values_for_file("src/missing.cs").unwrap().is_empty());
    }

    #[test]
    fn test_test_cases_are_collected() {
        let tree = sample_tree();
        let tests = tree.all_test_cases();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "t1");
    }
}
