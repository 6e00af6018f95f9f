//! Cobertura XML format parser
//!
//! Classes are grouped under the file named by their `filename` attribute.
//! Line and branch counts come from the class's own `<lines>`; the method
//! level only carries complexity and whether any of its lines ran.

use std::sync::Arc;

use super::{read_count, structural, CoverageParser, Events, ParserOptions, EMPTY};
use crate::error::{CoverageError, Result};
use crate::events::{Element, XmlEvent};
use crate::intern::PathInterner;
use crate::metric::Metric;
use crate::node::{Node, NodeKind};
use crate::paths::{file_name, relative_path};
use crate::value::Value;
use crate::warnings::Warnings;

const SOURCE: &str = "source";
const PACKAGE: &str = "package";
const CLASS: &str = "class";
const METHOD: &str = "method";
const LINE: &str = "line";

const NAME: &str = "name";
const FILE_NAME: &str = "filename";
const SIGNATURE: &str = "signature";
const COMPLEXITY: &str = "complexity";
const HITS: &str = "hits";
const BRANCH: &str = "branch";
const CONDITION_COVERAGE: &str = "condition-coverage";

pub struct CoberturaParser {
    options: ParserOptions,
}

#[derive(Debug, Default)]
struct LineCounts {
    covered: u64,
    missed: u64,
    branches_covered: u64,
    branches_missed: u64,
}

impl LineCounts {
    fn record(&mut self, line: &Element, warnings: &mut Warnings) {
        if read_count(line, HITS, warnings) > 0 {
            self.covered += 1;
        } else {
            self.missed += 1;
        }

        if line.attribute(BRANCH) != Some("true") {
            return;
        }
        match line.attribute(CONDITION_COVERAGE).and_then(parse_condition_coverage) {
            Some((covered, total)) => {
                self.branches_covered = self.branches_covered.saturating_add(covered);
                self.branches_missed = self.branches_missed.saturating_add(total - covered);
            }
            None => warnings.log_error(format!(
                "Invalid condition coverage '{}' on line {}",
                line.attribute(CONDITION_COVERAGE).unwrap_or_default(),
                line.attribute("number").unwrap_or(EMPTY)
            )),
        }
    }

    fn lines(&self) -> u64 {
        self.covered + self.missed
    }
}

#[derive(Debug)]
struct ClassRecord {
    name: String,
    path: String,
    lines: LineCounts,
    methods: Vec<MethodRecord>,
}

#[derive(Debug)]
struct MethodRecord {
    name: String,
    complexity: u64,
    covered: bool,
}

impl CoberturaParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    fn read_class(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        prefixes: &[String],
        warnings: &mut Warnings,
    ) -> Result<ClassRecord> {
        let scope_depth = events.depth();
        let identity = element
            .required_attribute(NAME)
            .and_then(|name| element.required_attribute(FILE_NAME).map(|file| (name, file)));
        let mut lines = LineCounts::default();
        let mut methods = Vec::new();

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    METHOD => match self.read_method(events, &child, warnings) {
                        Ok(method) => methods.push(method),
                        Err(e) => self.options.handle_local_error(e, warnings)?,
                    },
                    LINE => lines.record(&child, warnings),
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        let (name, file) = identity?;
        Ok(ClassRecord {
            name: name.to_string(),
            path: relative_path(file, prefixes),
            lines,
            methods,
        })
    }

    fn read_method(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        warnings: &mut Warnings,
    ) -> Result<MethodRecord> {
        let scope_depth = events.depth();
        let complexity = read_count(element, COMPLEXITY, warnings);
        let mut covered = false;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) if child.name() == LINE => {
                    covered |= read_count(&child, HITS, warnings) > 0;
                }
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        let name = element.required_attribute(NAME)?;
        let name = match element.attribute(SIGNATURE) {
            Some(signature) if !signature.is_empty() => format!("{}{}", name, signature),
            _ => name.to_string(),
        };
        Ok(MethodRecord {
            name,
            complexity,
            covered,
        })
    }
}

fn attach(class: ClassRecord, package: &mut Node, interner: &mut PathInterner) -> Result<()> {
    let path: Arc<str> = interner.intern(&class.path);
    let file = package.find_or_create_file(file_name(&path), Arc::clone(&path));
    let class_node = file.find_or_create_child(NodeKind::Class, &class.name);

    let covered = class.lines.covered > 0 || class.methods.iter().any(|m| m.covered);
    class_node.set_value(structural(Metric::Class, covered)?);
    if class.lines.lines() > 0 {
        class_node.set_value(Value::coverage(Metric::Line, class.lines.covered, class.lines.missed)?);
        class_node.set_value(Value::LinesOfCode(class.lines.lines()));
    }
    if class.lines.branches_covered + class.lines.branches_missed > 0 {
        class_node.set_value(Value::coverage(
            Metric::Branch,
            class.lines.branches_covered,
            class.lines.branches_missed,
        )?);
    }

    for method in class.methods {
        let method_node = class_node.find_or_create_child(NodeKind::Method, &method.name);
        method_node.set_value(structural(Metric::Method, method.covered)?);
        method_node.set_value(Value::Complexity(method.complexity));
    }

    Ok(())
}

/// Parses `"50% (1/2)"` into `(covered, total)`
fn parse_condition_coverage(text: &str) -> Option<(u64, u64)> {
    let start = text.find('(')?;
    let end = text[start..].find(')')? + start;
    let (covered, total) = text[start + 1..end].split_once('/')?;
    let covered: u64 = covered.trim().parse().ok()?;
    let total: u64 = total.trim().parse().ok()?;
    (covered <= total).then_some((covered, total))
}

impl CoverageParser for CoberturaParser {
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node> {
        let mut root = Node::module(EMPTY);
        let mut interner = PathInterner::new();
        let mut prefixes = self.options.strip_prefixes.clone();
        let mut package_name = EMPTY.to_string();
        let mut is_empty = true;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(element) => match element.name() {
                    SOURCE => {
                        let source = events.read_text()?;
                        let source = source.trim();
                        if !source.is_empty() {
                            prefixes.push(source.to_string());
                        }
                    }
                    PACKAGE => {
                        package_name = element
                            .attribute(NAME)
                            .filter(|n| !n.is_empty())
                            .unwrap_or(EMPTY)
                            .to_string();
                    }
                    CLASS => match self.read_class(events, &element, &prefixes, warnings) {
                        Ok(class) => {
                            let package = root.find_or_create_child(NodeKind::Package, &package_name);
                            attach(class, package, &mut interner)?;
                            is_empty = false;
                        }
                        Err(e) => self.options.handle_local_error(e, warnings)?,
                    },
                    _ => {}
                },
                XmlEvent::End(name) if name == PACKAGE => package_name = EMPTY.to_string(),
                _ => {}
            }
        }

        if is_empty {
            return Err(CoverageError::NoCoverageData);
        }
        Ok(root)
    }
}
