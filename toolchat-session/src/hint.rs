//! Remediation hints for backends that fail to start.

use std::path::Path;

/// Suggests a fix for a launch failure of `program`, given its stderr.
pub(crate) fn remediation(program: &str, stderr: &str) -> String {
    if let Some(module) = missing_python_module(stderr) {
        return format!(
            "the Python interpreter cannot import `{module}`; install it with `pip install {}`",
            module.replace('_', "-")
        );
    }

    let name = Path::new(program)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(program)
        .to_ascii_lowercase();

    match name.as_str() {
        "npx" | "node" | "npm" => {
            "install Node.js (it provides `npx`) and make sure it is on PATH".to_owned()
        }
        "uvx" | "uv" => {
            "install uv (https://docs.astral.sh/uv/) so that `uvx` is on PATH".to_owned()
        }
        "python" | "python3" | "py" => {
            "install a Python 3 interpreter or point the backend at one that is on PATH".to_owned()
        }
        _ => format!("check that `{program}` is installed and on PATH"),
    }
}

/// Combines per-attempt hints, dropping repeats.
pub(crate) fn combine<I>(hints: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut unique: Vec<String> = Vec::new();
    for hint in hints {
        if !unique.contains(&hint) {
            unique.push(hint);
        }
    }
    unique.join("; or ")
}

fn missing_python_module(stderr: &str) -> Option<&str> {
    let rest = stderr.split("No module named").nth(1)?;
    let module = rest
        .trim_start()
        .trim_start_matches(['\'', '"'])
        .split(['\'', '"', '\n', ' '])
        .next()?
        .trim();
    (!module.is_empty()).then_some(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_node_and_uv() {
        assert!(remediation("npx", "").contains("Node.js"));
        assert!(remediation("/usr/local/bin/uvx", "").contains("uv"));
        assert!(remediation("python3", "").contains("Python 3"));
        assert!(remediation("weather-mcp", "").contains("`weather-mcp`"));
    }

    #[test]
    fn detects_missing_python_package() {
        let stderr = "Traceback (most recent call last):\nModuleNotFoundError: No module named 'mcp_server_git'\n";
        let hint = remediation("python", stderr);
        assert!(hint.contains("`mcp_server_git`"));
        assert!(hint.contains("pip install mcp-server-git"));
    }

    #[test]
    fn combine_drops_duplicates() {
        let hint = combine(["a".to_owned(), "b".to_owned(), "a".to_owned()]);
        assert_eq!(hint, "a; or b");
    }
}
