//! Normalization of report paths to a project-relative form

/// Converts a path taken from a report to a project-relative, `/`-separated
/// form. The first matching prefix of `strip_prefixes` is removed.
pub fn relative_path(raw: &str, strip_prefixes: &[String]) -> String {
    let mut path = raw.trim().replace('\\', "/");

    for prefix in strip_prefixes {
        let prefix = prefix.replace('\\', "/");
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            continue;
        }
        if let Some(rest) = path.strip_prefix(prefix) {
            if rest.starts_with('/') {
                path = rest.trim_start_matches('/').to_string();
                break;
            }
        }
    }

    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }

    path
}

/// The last segment of a normalized path
pub fn file_name(relative: &str) -> &str {
    relative
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backslashes_are_normalized() {
        assert_eq!(
            relative_path(r"C:\build\MyLib\Calc.cs", &[]),
            "C:/build/MyLib/Calc.cs"
        );
    }

    #[test]
    fn test_prefix_is_stripped() {
        let prefixes = vec![r"C:\build".to_string()];
        assert_eq!(relative_path(r"C:\build\MyLib\Calc.cs", &prefixes), "MyLib/Calc.cs");
        assert_eq!(relative_path(r"C:\buildx\Calc.cs", &prefixes), "C:/buildx/Calc.cs");
    }

    #[test]
    fn test_leading_dot_segments_removed() {
        assert_eq!(relative_path("./src/main.rs", &[]), "src/main.rs");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("MyLib/Calc.cs"), "Calc.cs");
        assert_eq!(file_name("Calc.cs"), "Calc.cs");
    }
}
