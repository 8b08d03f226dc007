//! `grep` tool subprocess: regex search over every regular file matched by
//! a non-recursive glob under one directory. Grounded on
//! `tools/grep/grep.c`'s params (`pattern`, `glob`, `path`), its
//! silently-empty-on-glob-error behavior, and its
//! `"filename:line_number: line_content"` output format.

use std::io::{Read, Write};

use glob::glob;
use regex::Regex;
use serde_json::{Value, json};

struct ToolError {
    message: String,
    code: &'static str,
}

impl ToolError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    fn into_json(self) -> Value {
        json!({ "error": self.message, "error_code": self.code })
    }
}

fn schema() -> Value {
    json!({
        "name": "grep",
        "description": "Search files in a directory for lines matching a regular expression.",
        "parameters": {
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "POSIX extended regular expression to search for." },
                "path": { "type": "string", "description": "Directory to search. Defaults to the current directory." },
                "glob": { "type": "string", "description": "Filename glob, applied one directory level deep. Defaults to '*'." },
            },
            "required": ["pattern"],
        },
    })
}

fn search(pattern: &Regex, path: &str, glob_pattern: &str) -> String {
    let combined = format!("{path}/{glob_pattern}");
    let Ok(paths) = glob(&combined) else {
        return String::new();
    };

    let mut matches = Vec::new();
    for entry in paths.flatten() {
        if !entry.is_file() {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(&entry) else {
            continue;
        };
        let filename = entry.display().to_string();
        for (idx, line) in contents.lines().enumerate() {
            if pattern.is_match(line) {
                matches.push(format!("{}:{}: {}", filename, idx + 1, line));
            }
        }
    }
    matches.join("\n")
}

fn run(args: &Value) -> Value {
    let Some(pattern) = args.get("pattern").and_then(Value::as_str) else {
        return ToolError::new("INVALID_PATTERN", "missing required parameter 'pattern'").into_json();
    };
    let path = args.get("path").and_then(Value::as_str).filter(|p| !p.is_empty()).unwrap_or(".");
    let glob_pattern = args.get("glob").and_then(Value::as_str).filter(|g| !g.is_empty()).unwrap_or("*");

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => return ToolError::new("INVALID_PATTERN", format!("invalid pattern '{pattern}': {err}")).into_json(),
    };

    json!({ "output": search(&regex, path, glob_pattern) })
}

fn main() {
    let mut args = std::env::args();
    if args.any(|arg| arg == "--schema") {
        println!("{}", schema());
        return;
    }

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        println!("{}", ToolError::new("INVALID_PATTERN", "failed to read stdin").into_json());
        return;
    }

    let parsed: Value = match serde_json::from_str(&input) {
        Ok(value) => value,
        Err(err) => {
            println!("{}", ToolError::new("INVALID_PATTERN", format!("invalid input JSON: {err}")).into_json());
            return;
        }
    };

    let result = run(&parsed);
    let _ = std::io::stdout().write_all(result.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn finds_matching_lines_across_globbed_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a.txt", "hello world\nno match here\n");
        write(&dir, "b.txt", "another hello\n");

        let result = run(&json!({ "pattern": "hello", "path": dir.path().to_str().unwrap() }));
        let output = result["output"].as_str().unwrap();
        assert!(output.contains("a.txt:1: hello world"));
        assert!(output.contains("b.txt:1: another hello"));
    }

    #[test]
    fn glob_restricts_to_matching_filenames() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a.rs", "fn main() {}\n");
        write(&dir, "a.txt", "fn main() {}\n");

        let result = run(&json!({ "pattern": "fn main", "path": dir.path().to_str().unwrap(), "glob": "*.rs" }));
        let output = result["output"].as_str().unwrap();
        assert!(output.contains("a.rs"));
        assert!(!output.contains("a.txt"));
    }

    #[test]
    fn no_matches_yields_empty_output_not_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a.txt", "nothing interesting\n");

        let result = run(&json!({ "pattern": "zzz_no_match", "path": dir.path().to_str().unwrap() }));
        assert_eq!(result["output"], "");
        assert!(result.get("error").is_none());
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let result = run(&json!({ "pattern": "(unclosed" }));
        assert_eq!(result["error_code"], "INVALID_PATTERN");
    }

    #[test]
    fn does_not_recurse_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "top.txt", "needle\n");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("nested.txt"), "needle\n").unwrap();

        let result = run(&json!({ "pattern": "needle", "path": dir.path().to_str().unwrap() }));
        let output = result["output"].as_str().unwrap();
        assert!(output.contains("top.txt"));
        assert!(!output.contains("nested.txt"));
    }
}
