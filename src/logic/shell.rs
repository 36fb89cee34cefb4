//! Shell-outs - PowerShell / CIM queries and system commands

use std::process::Command;
use serde::de::DeserializeOwned;

use super::error::{MonitorError, MonitorResult};

/// Run a program and return trimmed stdout; non-zero exit is `CommandFailed`
pub fn run_command(program: &str, args: &[&str]) -> MonitorResult<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| MonitorError::from_io(program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Err(MonitorError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: if stderr.is_empty() { stdout } else { stderr },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a PowerShell snippet without profile
pub fn run_powershell(script: &str) -> MonitorResult<String> {
    run_command(
        "powershell",
        &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script],
    )
}

/// Parse `ConvertTo-Json` output, which is an object for one row and an array otherwise
pub fn parse_json_rows<T: DeserializeOwned>(text: &str) -> MonitorResult<Vec<T>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(text)?;
    let rows = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    };

    rows.into_iter()
        .map(|v| serde_json::from_value(v).map_err(MonitorError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
    }

    #[test]
    fn test_single_object_and_array() {
        let one: Vec<Row> = parse_json_rows(r#"{"Name":"a"}"#).unwrap();
        assert_eq!(one, vec![Row { name: "a".into() }]);

        let many: Vec<Row> = parse_json_rows(r#"[{"Name":"a"},{"Name":"b"}]"#).unwrap();
        assert_eq!(many.len(), 2);

        let none: Vec<Row> = parse_json_rows("  ").unwrap();
        assert!(none.is_empty());
    }
}
