use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::ReportJob;
use crate::parser::{ParserKind, ParserOptions, ProcessingMode};
use crate::warnings::DEFAULT_MAX_LINES;

pub const CONFIG_FILE: &str = "covtree.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserSettings,
    #[serde(default)]
    pub reports: Vec<ReportSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserSettings {
    #[serde(default)]
    pub mode: ProcessingMode,
    /// Removed from report paths, e.g. the CI checkout directory
    #[serde(default)]
    pub strip_prefixes: Vec<String>,
    /// Warnings kept per report (default: 20)
    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,
    /// Reports parsed concurrently (default: number of CPUs)
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::default(),
            strip_prefixes: Vec::new(),
            max_warnings: default_max_warnings(),
            jobs: default_jobs(),
        }
    }
}

fn default_max_warnings() -> usize {
    DEFAULT_MAX_LINES
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A glob of report files in one format
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSource {
    pub format: String,
    pub pattern: String,
}

impl ReportSource {
    pub fn kind(&self) -> Result<ParserKind> {
        self.format.parse::<ParserKind>().map_err(anyhow::Error::msg)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", CONFIG_FILE))?;

        config.validate()?;

        Ok(config)
    }

    /// Loads `covtree.toml` from `dir` if present, defaults otherwise
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        for report in &self.reports {
            report.kind()?;
            if report.pattern.trim().is_empty() {
                anyhow::bail!("Report source for format '{}' has an empty pattern", report.format);
            }
        }

        if self.parser.jobs == 0 {
            anyhow::bail!("parser.jobs must be at least 1");
        }

        Ok(())
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions::new(self.parser.mode).with_strip_prefixes(self.parser.strip_prefixes.clone())
    }

    /// Expands every `[[reports]]` pattern relative to `base`
    pub fn report_jobs(&self, base: &Path) -> Result<Vec<ReportJob>> {
        let mut jobs = Vec::new();
        for report in &self.reports {
            let kind = report.kind()?;
            for path in expand_pattern(base, &report.pattern)? {
                jobs.push(ReportJob::new(path, kind));
            }
        }
        Ok(jobs)
    }
}

/// Files matching a glob pattern, sorted; relative patterns start at `base`
pub fn expand_pattern(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        base.join(pattern).to_string_lossy().to_string()
    };

    let mut paths = Vec::new();
    for entry in glob::glob(&full).with_context(|| format!("Invalid pattern: {}", pattern))? {
        let path = entry.with_context(|| format!("Cannot read match of {}", pattern))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[parser]
mode = "ignore-errors"
strip_prefixes = ["/home/ci/work"]
jobs = 2

[[reports]]
format = "opencover"
pattern = "coverage/*.xml"

[[reports]]
format = "NUnit"
pattern = "results/**/*.xml"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.parser.mode, ProcessingMode::IgnoreErrors);
        assert_eq!(config.parser.max_warnings, DEFAULT_MAX_LINES);
        assert_eq!(config.parser.jobs, 2);
        assert_eq!(config.reports.len(), 2);
        assert_eq!(config.reports[1].kind().unwrap(), ParserKind::Nunit);

        let options = config.parser_options();
        assert_eq!(options.strip_prefixes, vec!["/home/ci/work".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.parser.mode, ProcessingMode::FailFast);
        assert!(config.parser.jobs >= 1);
        assert!(config.reports.is_empty());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let config: Config = toml::from_str(
            r#"
[[reports]]
format = "lcov"
pattern = "lcov.info"
"#,
        )
        .unwrap();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("Unknown report format"));
    }

    #[test]
    fn test_rejects_empty_pattern() {
        let config: Config = toml::from_str(
            r#"
[[reports]]
format = "junit"
pattern = " "
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let result: std::result::Result<Config, _> = toml::from_str("[parser]\nmode = \"strict\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_and_expand_reports() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("results")).unwrap();
        fs::write(dir.path().join("results/b.xml"), "<testsuite/>").unwrap();
        fs::write(dir.path().join("results/a.xml"), "<testsuite/>").unwrap();
        fs::write(dir.path().join("results/notes.txt"), "").unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[[reports]]\nformat = \"junit\"\npattern = \"results/*.xml\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(dir.path()).unwrap();
        let jobs = config.report_jobs(dir.path()).unwrap();

        let names: Vec<_> = jobs
            .iter()
            .map(|j| j.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml"]);
        assert!(jobs.iter().all(|j| j.kind == ParserKind::Junit));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert!(config.reports.is_empty());
    }
}
