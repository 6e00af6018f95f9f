//! xUnit.net v2 XML format parser

use super::{CoverageParser, Events, ParserOptions, EMPTY};
use crate::error::{CoverageError, Result};
use crate::events::{Element, XmlEvent};
use crate::node::{Node, NodeKind, TestCase, TestResult};
use crate::warnings::Warnings;

const TEST: &str = "test";
const FAILURE: &str = "failure";
const MESSAGE: &str = "message";
const REASON: &str = "reason";

const NAME: &str = "name";
const TYPE: &str = "type";
const RESULT: &str = "result";

pub struct XunitParser {
    options: ParserOptions,
}

impl XunitParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    fn read_test(
        &self,
        events: &mut Events<'_>,
        element: &Element,
        warnings: &mut Warnings,
    ) -> Result<TestCase> {
        let scope_depth = events.depth();
        let name = element.required_attribute(NAME).map(str::to_string);
        let class_name = element.attribute(TYPE).filter(|t| !t.is_empty()).unwrap_or(EMPTY);
        let result = element
            .attribute(RESULT)
            .map(|r| map_result(r, warnings))
            .unwrap_or(TestResult::Passed);

        let mut description = String::new();
        let mut in_failure = false;
        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start(child) => match child.name() {
                    FAILURE => in_failure = true,
                    MESSAGE if in_failure => description = events.read_text()?,
                    REASON => description = events.read_text()?,
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
        "Pass" => TestResult::Passed,
        "Fail" => TestResult::Failed,
        "Skip" | "NotRun" => TestResult::Skipped,
        other => {
            warnings.log_error(format!("Unknown test result '{}', counting as passed", other));
            TestResult::Passed
        }
    }
}

impl CoverageParser for XunitParser {
    fn parse_report(&self, events: &mut Events<'_>, warnings: &mut Warnings) -> Result<Node> {
        let mut root = Node::module(EMPTY);
        let mut is_empty = true;

        while let Some(event) = events.next_event()? {
            if let XmlEvent::Start(element) = event {
                if element.name() == TEST {
                    match self.read_test(events, &element, warnings) {
                        Ok(test_case) => {
                            let class_name = test_case.class_name.clone();
                            root.find_or_create_child(NodeKind::Package, EMPTY)
                                .find_or_create_child(NodeKind::Class, &class_name)
                                .add_test_case(test_case);
                            is_empty = false;
                        }
                        Err(e) => self.options.handle_local_error(e, warnings)?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use crate::parser::ProcessingMode;
    use crate::value::Value;

    const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<assemblies timestamp="07/31/2018 19:56:20">
  <assembly name="/home/runner/work/test/bin/Debug/net6.0/test.dll" environment="64-bit .NET 6.0.8" test-framework="xUnit.net 2.4.1.0" total="3" passed="1" failed="1" skipped="1" time="0.112" errors="0">
    <errors />
    <collection total="3" passed="1" failed="1" skipped="1" name="Test collection for test.Tests2" time="0.031">
      <test name="test.Tests2.Test2" type="test.Tests2" method="Test2" time="0.0220000" result="Fail">
        <failure exception-type="Xunit.Sdk.EqualException">
          <message><![CDATA[Assert.Equal() Failure
Expected: 1
Actual:   2]]></message>
          <stack-trace><![CDATA[   at test.Tests2.Test2() in /home/runner/work/test/Tests2.cs:line 17]]></stack-trace>
        </failure>
      </test>
      <test name="test.Tests2.Test1" type="test.Tests2" method="Test1" time="0.0010000" result="Pass" />
      <test name="test.Tests2.Test3" type="test.Tests2" method="Test3" time="0" result="Skip">
        <reason><![CDATA[Not implemented yet]]></reason>
      </test>
    </collection>
  </assembly>
</assemblies>"#;

    fn parse(xml: &str, warnings: &mut Warnings) -> Result<Node> {
        XunitParser::new(ParserOptions::default()).parse_str(xml, warnings)
    }

    fn first_failure(tree: &Node) -> TestCase {
        tree.all_test_cases()
            .into_iter()
            .find(|t| t.result == TestResult::Failed)
            .cloned()
            .unwrap()
    }

    fn assert_shape(tree: &Node) {
        assert_eq!(tree.name(), "-");
        assert_eq!(tree.children().len(), 1);
        let package = &tree.children()[0];
        assert_eq!(package.kind(), NodeKind::Package);
        assert_eq!(package.name(), "-");
        assert_eq!(package.children()[0].kind(), NodeKind::Class);
        assert_eq!(package.children()[0].name(), "test.Tests2");
        assert_eq!(tree.aggregate_value(Metric::Tests).unwrap(), Some(Value::TestCount(3)));
    }

    #[test]
    fn test_parse_xunit() {
        let tree = parse(REPORT, &mut Warnings::new("xunit.xml")).unwrap();

        assert_shape(&tree);
        assert!(first_failure(&tree).description.contains("Assert.Equal() Failure"));

        let tests = tree.all_test_cases();
        let results: Vec<_> = tests.iter().map(|t| t.result).collect();
        assert_eq!(
            results,
            vec![TestResult::Failed, TestResult::Passed, TestResult::Skipped]
        );
        assert_eq!(tests[2].description, "Not implemented yet");
    }

    #[test]
    fn test_failure_without_failure_block() {
        let start = REPORT.find("<failure").unwrap();
        let end = REPORT.find("</failure>").unwrap() + "</failure>".len();
        let xml = format!("{}{}", &REPORT[..start], &REPORT[end..]);

        let tree = parse(&xml, &mut Warnings::new("xunit.xml")).unwrap();
        assert_shape(&tree);
        assert_eq!(first_failure(&tree).description, "");
    }

    #[test]
    fn test_invalid_status_is_counted() {
        let xml = REPORT.replace(r#"result="Pass""#, r#"result="Exploded""#);
        let mut warnings = Warnings::new("xunit.xml");
        let tree = parse(&xml, &mut warnings).unwrap();

        assert_shape(&tree);
        assert!(warnings.messages()[0].contains("Exploded"));
    }

    #[test]
    fn test_failure_without_message() {
        let start = REPORT.find("<message>").unwrap();
        let end = REPORT.find("</message>").unwrap() + "</message>".len();
        let xml = format!("{}{}", &REPORT[..start], &REPORT[end..]);

        let tree = parse(&xml, &mut Warnings::new("xunit.xml")).unwrap();
        assert_shape(&tree);
        assert_eq!(first_failure(&tree).description, "");
    }

    #[test]
    fn test_missing_name_follows_mode() {
        let xml = REPORT.replace(r#"name="test.Tests2.Test1" "#, "");

        let error = parse(&xml, &mut Warnings::new("xunit.xml")).unwrap_err();
        assert!(matches!(error, CoverageError::MissingAttribute { .. }));

        let mut warnings = Warnings::new("xunit.xml");
        let tree = XunitParser::new(ParserOptions::new(ProcessingMode::IgnoreErrors))
            .parse_str(&xml, &mut warnings)
            .unwrap();
        assert_eq!(tree.aggregate_value(Metric::Tests).unwrap(), Some(Value::TestCount(2)));
        assert!(warnings.has_errors());
    }

    #[test]
    fn test_report_without_tests_fails() {
        let xml = r#"<assemblies><assembly name="x.dll"><collection name="c"/></assembly></assemblies>"#;
        let error = parse(xml, &mut Warnings::new("xunit.xml")).unwrap_err();
        assert!(matches!(error, CoverageError::NoCoverageData));
    }
}
