//! `file_read` tool subprocess: reads a file whole, or by 1-indexed line
//! range when `offset`/`limit` are given. Grounded on
//! `tools/file_read/file_read.c`'s error categorization and offset/limit
//! semantics; speaks the registry's `--schema` / stdin-JSON / stdout-JSON
//! protocol instead of the original's direct C call.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

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
        "name": "file_read",
        "description": "Read a file's contents, optionally restricted to a 1-indexed line range.",
        "parameters": {
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to read." },
                "offset": { "type": "integer", "description": "1-indexed line number to start reading from." },
                "limit": { "type": "integer", "description": "Maximum number of lines to read." },
            },
            "required": ["path"],
        },
    })
}

fn open_file(path: &Path) -> Result<std::fs::File, ToolError> {
    std::fs::File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ToolError::new("FILE_NOT_FOUND", format!("File not found: {}", path.display())),
        std::io::ErrorKind::PermissionDenied => {
            ToolError::new("PERMISSION_DENIED", format!("Permission denied: {}", path.display()))
        }
        _ => ToolError::new("OPEN_FAILED", format!("Cannot open file: {}", path.display())),
    })
}

fn read_whole_file(path: &Path, mut file: std::fs::File) -> Result<String, ToolError> {
    let size = file
        .metadata()
        .map_err(|_| ToolError::new("SIZE_FAILED", format!("Cannot get file size: {}", path.display())))?
        .len() as usize;

    let mut buf = Vec::with_capacity(size);
    file.read_to_end(&mut buf)
        .map_err(|_| ToolError::new("READ_FAILED", format!("Failed to read file: {}", path.display())))?;
    if buf.len() != size {
        return Err(ToolError::new("READ_FAILED", format!("Failed to read file: {}", path.display())));
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_line_range(file: std::fs::File, offset: Option<i64>, limit: Option<i64>) -> String {
    let mut content = String::new();
    let mut lines_read: i64 = 0;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let Ok(line) = line else { break };
        let current_line = idx as i64 + 1;
        if let Some(offset) = offset {
            if current_line < offset {
                continue;
            }
        }
        if let Some(limit) = limit {
            if lines_read >= limit {
                break;
            }
        }
        content.push_str(&line);
        content.push('\n');
        lines_read += 1;
    }
    content
}

fn read_int_field(args: &Value, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

fn run(args: &Value) -> Value {
    let Some(path) = args.get("path").and_then(Value::as_str) else {
        return ToolError::new("OPEN_FAILED", "missing required parameter 'path'").into_json();
    };
    let path = Path::new(path);

    let offset = read_int_field(args, "offset");
    let limit = read_int_field(args, "limit");

    let file = match open_file(path) {
        Ok(file) => file,
        Err(err) => return err.into_json(),
    };

    let content = if offset.is_none() && limit.is_none() {
        match read_whole_file(path, file) {
            Ok(content) => content,
            Err(err) => return err.into_json(),
        }
    } else {
        read_line_range(file, offset, limit)
    };

    json!({ "output": content })
}

fn main() {
    let mut args = std::env::args();
    if args.any(|arg| arg == "--schema") {
        println!("{}", schema());
        return;
    }

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        println!("{}", ToolError::new("READ_FAILED", "failed to read stdin").into_json());
        return;
    }

    let parsed: Value = match serde_json::from_str(&input) {
        Ok(value) => value,
        Err(err) => {
            println!("{}", ToolError::new("OPEN_FAILED", format!("invalid input JSON: {err}")).into_json());
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

    #[test]
    fn reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello world").unwrap();

        let result = run(&json!({ "path": path.to_str().unwrap() }));
        assert_eq!(result["output"], "hello world");
    }

    #[test]
    fn reports_file_not_found() {
        let result = run(&json!({ "path": "/tmp/ikigai_test_definitely_missing_xyz" }));
        assert_eq!(result["error_code"], "FILE_NOT_FOUND");
    }

    #[test]
    fn offset_and_limit_restrict_to_a_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        let result = run(&json!({ "path": path.to_str().unwrap(), "offset": 2, "limit": 2 }));
        assert_eq!(result["output"], "two\nthree\n");
    }

    #[test]
    fn offset_without_limit_reads_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let result = run(&json!({ "path": path.to_str().unwrap(), "offset": 2 }));
        assert_eq!(result["output"], "two\nthree\n");
    }

    #[test]
    fn missing_path_is_an_error() {
        let result = run(&json!({}));
        assert!(result.get("error").is_some());
    }

    #[test]
    fn schema_has_expected_shape() {
        let schema = schema();
        assert_eq!(schema["name"], "file_read");
        assert_eq!(schema["parameters"]["required"][0], "path");
    }
}
