//! OpenCover XML format parser
//!
//! Every `<Module>` becomes a package named after its `<ModuleName>`. The
//! `<Files>` table is buffered per module and materialized as file nodes once
//! the module ends; classes reference their file by path only.

use log::debug;
use std::sync::Arc;

use super::{parse_number, read_count, structural, CoverageParser, Events, ParserOptions, EMPTY};
use crate::error::{CoverageError, Result};
use crate::events::{Element, XmlEvent};
use crate::intern::PathInterner;
use crate::metric::Metric;
use crate::node::{Node, NodeKind};
use crate::paths::{file_name, relative_path};
use crate::value::Value;
use crate::warnings::Warnings;

const MODULE: &str = "Module";
const MODULE_NAME: &str = "ModuleName";
const MODULE_PATH: &str = "ModulePath";
const FILE: &str = "File";
const CLASS: &str = "Class";
const CLASS_NAME: &str = "FullName";
const METHOD: &str = "Method";
const METHOD_NAME: &str = "Name";
const FILE_REF: &str = "FileRef";
const SEQUENCE_POINT: &str = "SequencePoint";
const BRANCH_POINT: &str = "BranchPoint";

const UID: &str = "uid";
const FULL_PATH: &str = "fullPath";
const VISIT_COUNT: &str = "vc";
const VISITED: &str = "visited";
const METHOD_COMPLEXITY: &str = "cyclomaticComplexity";
const SKIPPED: &str = "skippedDueTo";

pub struct OpenCoverParser {
    options: ParserOptions,
}

/// Everything read from one `<Module>` before it is attached to the tree
#[derive(Debug, Default)]
struct ModuleScope {
    package_name: Option<String>,
    /// Relative path of the module binary
    module_path: Option<String>,
    /// uid → relative path, in first-seen order; a repeated uid keeps the last path
    files: Vec<(String, String)>,
    classes: Vec<ClassRecord>,
}

impl ModuleScope {
    fn record_file(&mut self, uid: &str, path: String) {
        match self.files.iter_mut().find(|(id, _)| id == uid) {
            Some(entry) => entry.1 = path,
            None => self.files.push((uid.to_string(), path)),
        }
    }

    fn path_of(&self, uid: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(id, _)| id == uid)
            .map(|(_, path)| path.as_str())
    }

    fn has_content(&self) -> bool {
        !self.files.is_empty() || !self.classes.is_empty()
    }
}

#[derive(Debug)]
struct ClassRecord {
    name: String,
    methods: Vec<MethodRecord>,
}

#[derive(Debug, Default)]
struct MethodRecord {
    name: String,
    complexity: u64,
    visited: bool,
    file_uid: Option<String>,
    lines_covered: u64,
    lines_missed: u64,
    branches_covered: u64,
    branches_missed: u64,
}

impl MethodRecord {
    fn is_covered(&self) -> bool {
        self.visited || self.lines_covered > 0
    }
}

impl OpenCoverParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    fn read_module(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<ModuleScope> {
        let scope_depth = events.depth();
        let mut scope = ModuleScope::default();

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(element) => match element.name() {
                    MODULE_NAME => {
                        scope.package_name = Some(events.read_text()?.trim().to_string());
                    }
                    MODULE_PATH => {
                        let path = events.read_text()?;
                        let path = relative_path(&path, &self.options.strip_prefixes);
                        if !path.is_empty() {
                            scope.module_path = Some(path);
                        }
                    }
                    FILE => {
                        let file = element.required_attribute(UID).and_then(|uid| {
                            element.required_attribute(FULL_PATH).map(|path| (uid, path))
                        });
                        match file {
                            Ok((uid, full_path)) => {
                                let path = relative_path(full_path, &self.options.strip_prefixes);
                                scope.record_file(uid, path);
                            }
                            Err(e) => self.options.handle_local_error(e, warnings)?,
                        }
                    }
                    CLASS => match self.read_class(events, &element, warnings) {
                        Ok(Some(class)) => scope.classes.push(class),
                        Ok(None) => {}
                        Err(e) => self.options.handle_local_error(e, warnings)?,
                    },
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        Ok(scope)
    }

    /// Reads a whole `<Class>`; `Ok(None)` for classes the tool skipped
    fn read_class(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        warnings: &mut Warnings,
    ) -> Result<Option<ClassRecord>> {
        let scope_depth = events.depth();
        let mut name = None;
        let mut methods = Vec::new();

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    CLASS_NAME => name = Some(events.read_text()?.trim().to_string()),
                    METHOD => match self.read_method(events, &child, warnings) {
                        Ok(method) => methods.push(method),
                        Err(e) => self.options.handle_local_error(e, warnings)?,
                    },
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoverageError::missing_attribute(CLASS, CLASS_NAME))?;

        if let Some(reason) = element.attribute(SKIPPED) {
            debug!("Skipping class {} ({})", name, reason);
            return Ok(None);
        }

        Ok(Some(ClassRecord { name, methods }))
    }

    fn read_method(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        warnings: &mut Warnings,
    ) -> Result<MethodRecord> {
        let scope_depth = events.depth();
        let mut method = MethodRecord {
            complexity: read_count(element, METHOD_COMPLEXITY, warnings),
            visited: element.attribute(VISITED) == Some("true"),
            ..Default::default()
        };
        let mut name = None;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    METHOD_NAME => name = Some(events.read_text()?.trim().to_string()),
                    FILE_REF => method.file_uid = child.attribute(UID).map(str::to_string),
                    SEQUENCE_POINT => {
                        if read_visits(&child, warnings) > 0 {
                            method.lines_covered += 1;
                        } else {
                            method.lines_missed += 1;
                        }
                    }
                    BRANCH_POINT => {
                        if read_visits(&child, warnings) > 0 {
                            method.branches_covered += 1;
                        } else {
                            method.branches_missed += 1;
                        }
                    }
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        method.name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoverageError::missing_attribute(METHOD, METHOD_NAME))?;
        Ok(method)
    }

    fn attach(&self, scope: ModuleScope, root: &mut Node, interner: &mut PathInterner) -> Result<()> {
        let package_name = scope.package_name.as_deref().unwrap_or(EMPTY);
        let package = root.find_or_create_child(NodeKind::Package, package_name);
        if package.path().is_none() {
            if let Some(path) = scope.module_path.as_deref() {
                package.set_path(interner.intern(path));
            }
        }

        for class in &scope.classes {
            let class_node = package.find_or_create_child(NodeKind::Class, &class.name);

            let source = class
                .methods
                .iter()
                .filter_map(|m| m.file_uid.as_deref())
                .find_map(|uid| scope.path_of(uid));
            if let Some(path) = source {
                class_node.set_source_path(interner.intern(path));
            }

            let covered = class.methods.iter().any(MethodRecord::is_covered);
            class_node.set_value(structural(Metric::Class, covered)?);

            for method in &class.methods {
                let method_node = class_node.find_or_create_child(NodeKind::Method, &method.name);
                method_node.set_value(structural(Metric::Method, method.is_covered())?);
                method_node.set_value(Value::Complexity(method.complexity));
                if method.lines_covered + method.lines_missed > 0 {
                    method_node.set_value(Value::coverage(
                        Metric::Line,
                        method.lines_covered,
                        method.lines_missed,
                    )?);
                }
                if method.branches_covered + method.branches_missed > 0 {
                    method_node.set_value(Value::coverage(
                        Metric::Branch,
                        method.branches_covered,
                        method.branches_missed,
                    )?);
                }
            }
        }

        for (_, path) in &scope.files {
            let path: Arc<str> = interner.intern(path);
            package.find_or_create_file(file_name(&path), Arc::clone(&path));
        }

        Ok(())
    }
}

fn read_visits(element: &Element, warnings: &mut Warnings) -> u64 {
    element
        .attribute(VISIT_COUNT)
        .map(|vc| parse_number(element.name(), vc, warnings))
        .unwrap_or(0)
}

impl CoverageParser for OpenCoverParser {
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node> {
        let mut root = Node::module(EMPTY);
        let mut interner = PathInterner::new();
        let mut is_empty = true;

        while let Some(event) = events.next_event()? {
            if let XmlEvent::Start(element) = event {
                if element.name() == MODULE {
                    let scope = self.read_module(events, warnings)?;
                    if scope.has_content() {
                        self.attach(scope, &mut root, &mut interner)?;
                        is_empty = false;
                    } else {
                        debug!("Module without classes or files ignored");
                    }
                }
            }
        }

        if is_empty {
            return Err(CoverageError::NoCoverageData);
        }
        Ok(root)
    }
}
