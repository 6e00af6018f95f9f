//! NUnit XML format parser (NUnit 2 and NUnit 3 result files)

use super::{CoverageParser, Events, ParserOptions, EMPTY};
use crate::error::{CoverageError, Result};
use crate::events::{Element, XmlEvent};
use crate::node::{Node, NodeKind, TestCase, TestResult};
use crate::warnings::Warnings;

const TEST_SUITE: &str = "test-suite";
const TEST_CASE: &str = "test-case";
const FAILURE: &str = "failure";
const REASON: &str = "reason";
const MESSAGE: &str = "message";

const TYPE: &str = "type";
const NAME: &str = "name";
const CLASS_NAME: &str = "classname";
const RESULT: &str = "result";
const FIXTURE: &str = "TestFixture";

pub struct NunitParser {
    options: ParserOptions,
}

impl NunitParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Reads the rest of a `<test-case>` element
    fn read_test_case(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        class_name: &str,
        warnings: &mut Warnings,
    ) -> Result<TestCase> {
        let scope_depth = events.depth();
        let name = element.required_attribute(NAME).map(str::to_string);
        let result = element
            .attribute(RESULT)
            .map(|r| map_result(r, warnings))
            .unwrap_or(TestResult::Passed);

        let mut description = String::new();
        let mut in_message_block = false;
        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    FAILURE | REASON => in_message_block = true,
                    MESSAGE if in_message_block => description = events.read_text()?,
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        Ok(TestCase::new(&name?, class_name, result).with_description(description.trim()))
    }
}

fn map_result(result: &str, warnings: &mut Warnings) -> TestResult {
    match result {
        "Passed" | "Success" => TestResult::Passed,
        "Failed" | "Failure" | "Error" => TestResult::Failed,
        "Skipped" | "Ignored" | "Inconclusive" | "NotRunnable" => TestResult::Skipped,
        other => {
            warnings.log_error(format!("Unknown test result '{}', counting as passed", other));
            TestResult::Passed
        }
    }
}

impl CoverageParser for NunitParser {
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node> {
        let mut root = Node::module(EMPTY);
        // (type, name) of every open test-suite
        let mut suites: Vec<(String, String)> = Vec::new();
        let mut is_empty = true;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(element) if element.name() == TEST_SUITE => {
                    suites.push((
                        element.attribute(TYPE).unwrap_or_default().to_string(),
                        element.attribute(NAME).unwrap_or(EMPTY).to_string(),
                    ));
                }
                XmlEvent::Start(element) if element.name() == TEST_CASE => {
                    let class_name = suites
                        .iter()
                        .rev()
                        .find(|(kind, _)| kind == FIXTURE)
                        .map(|(_, name)| name.as_str())
                        .or_else(|| element.attribute(CLASS_NAME))
                        .unwrap_or(EMPTY)
                        .to_string();

                    match self.read_test_case(events, &element, &class_name, warnings) {
                        Ok(test_case) => {
                            root.find_or_create_child(NodeKind::Package, EMPTY)
                                .find_or_create_child(NodeKind::Class, &class_name)
                                .add_test_case(test_case);
                            is_empty = false;
                        }
                        Err(e) => self.options.handle_local_error(e, warnings)?,
                    }
                }
                XmlEvent::End(name) if name == TEST_SUITE => {
                    suites.pop();
                }
                _ => {}
            }
        }

        if is_empty {
            return Err(CoverageError::NoCoverageData);
        }
        Ok(root)
    }
}
