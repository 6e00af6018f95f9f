//! JUnit XML format parser

use super::{CoverageParser, Events, ParserOptions, EMPTY};
use crate::error::{CoverageError, Result};
use crate::events::{Element, XmlEvent};
use crate::node::{Node, NodeKind, TestCase, TestResult};
use crate::warnings::Warnings;

const TEST_SUITE: &str = "testsuite";
const TEST_CASE: &str = "testcase";
const FAILURE: &str = "failure";
const ERROR: &str = "error";
const SKIPPED: &str = "skipped";

const NAME: &str = "name";
const CLASS_NAME: &str = "classname";
const MESSAGE: &str = "message";

pub struct JunitParser {
    options: ParserOptions,
}

impl JunitParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    fn read_test_case(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        class_name: &str,
    ) -> Result<TestCase> {
        let scope_depth = events.depth();
        let name = element.required_attribute(NAME).map(str::to_string);
        let mut result = TestResult::Passed;
        let mut description = String::new();

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    FAILURE | ERROR => {
                        result = TestResult::Failed;
                        description = match child.attribute(MESSAGE) {
                            Some(message) => {
                                events.skip_element()?;
                                message.to_string()
                            }
                            None => events.read_text()?,
                        };
                    }
                    SKIPPED => {
                        result = TestResult::Skipped;
                        description = child.attribute(MESSAGE).unwrap_or_default().to_string();
                        events.skip_element()?;
                    }
                    _ => {}
                },
                XmlEvent::End(_) if events.depth() < scope_depth => break,
                _ => {}
            }
        }

        Ok(TestCase::new(&name?, class_name, result).with_description(description.trim()))
    }
}

impl CoverageParser for JunitParser {
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node> {
        let mut root = Node::module(EMPTY);
        let mut suites: Vec<String> = Vec::new();
        let mut is_empty = true;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(element) if element.name() == TEST_SUITE => {
                    suites.push(element.attribute(NAME).unwrap_or(EMPTY).to_string());
                }
                XmlEvent::Start(element) if element.name() == TEST_CASE => {
                    let class_name = element
                        .attribute(CLASS_NAME)
                        .filter(|c| !c.is_empty())
                        .or_else(|| suites.last().map(String::as_str))
                        .unwrap_or(EMPTY)
                        .to_string();

                    match self.read_test_case(events, &element, &class_name) {
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
