//! Content Reader (spec §4.5, component C5).
//!
//! Classifies a file node and returns its textual representation, never
//! propagating I/O failure upward as a job failure — a `read_error`
//! placeholder per spec §7 "Propagation policy". Grounded on the teacher's
//! `filter.rs` (`is_binary` via `content_inspector`) for the binary probe,
//! and the Python original's `schemas/filesystem.py` (`get_content`) for
//! the empty/binary placeholder contract.

use std::path::Path;

use crate::types::Node;

const PROBE_BYTES: usize = 1024;

pub const BINARY_PLACEHOLDER: &str = "[Binary file]";
pub const EMPTY_PLACEHOLDER: &str = "[Empty file]";

#[derive(Debug, Clone)]
pub enum FileContent {
    Text(String),
    BinaryPlaceholder,
    EmptyPlaceholder,
    NotebookText(String),
    ReadError(String),
}

impl FileContent {
    /// The text that lands in the content blob's body for this file (spec
    /// §4.6).
    pub fn as_body(&self) -> &str {
        match self {
            FileContent::Text(s) | FileContent::NotebookText(s) => s,
            FileContent::BinaryPlaceholder => BINARY_PLACEHOLDER,
            FileContent::EmptyPlaceholder => EMPTY_PLACEHOLDER,
            FileContent::ReadError(reason) => reason,
        }
    }
}

/// Reads and classifies the file at `node`'s `abs_path`. Only meaningful
/// for [`Node::File`]; other variants return [`FileContent::ReadError`].
pub async fn read_content(node: &Node) -> FileContent {
    let Node::File { abs_path, .. } = node else {
        return FileContent::ReadError("not a file node".to_string());
    };

    let bytes = match tokio::fs::read(abs_path).await {
        Ok(b) => b,
        Err(e) => return FileContent::ReadError(e.to_string()),
    };

    if bytes.is_empty() {
        return FileContent::EmptyPlaceholder;
    }

    if abs_path.extension().and_then(|e| e.to_str()) == Some("ipynb") {
        return match render_notebook(&bytes) {
            Ok(rendered) => FileContent::NotebookText(rendered),
            Err(reason) => FileContent::ReadError(reason),
        };
    }

    classify_text(&bytes)
}

fn classify_text(bytes: &[u8]) -> FileContent {
    let probe = &bytes[..bytes.len().min(PROBE_BYTES)];

    if content_inspector::inspect(probe).is_binary() {
        return FileContent::BinaryPlaceholder;
    }

    if std::str::from_utf8(probe).is_ok() {
        return match String::from_utf8(bytes.to_vec()) {
            Ok(text) => FileContent::Text(text),
            Err(_) => FileContent::BinaryPlaceholder,
        };
    }

    let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(probe);
    if !had_errors {
        let (full, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        return FileContent::Text(full.into_owned());
    }

    // ISO-8859-1 (Latin-1): every byte value maps directly to the
    // identical Unicode scalar value, so this can never fail to decode.
    FileContent::Text(bytes.iter().map(|&b| b as char).collect())
}

fn render_notebook(bytes: &[u8]) -> Result<String, String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let cells = json
        .get("cells")
        .and_then(|c| c.as_array())
        .ok_or_else(|| "notebook missing 'cells' array".to_string())?;

    let mut out = String::new();
    for cell in cells {
        let cell_type = cell.get("cell_type").and_then(|v| v.as_str()).unwrap_or("raw");
        let source = join_lines(cell.get("source"));
        out.push_str(&format!("```{cell_type}\n{source}\n```\n\n"));

        if let Some(outputs) = cell.get("outputs").and_then(|o| o.as_array()) {
            for output in outputs {
                let text = join_lines(output.get("text"));
                if !text.is_empty() {
                    out.push_str(&text);
                    out.push('\n');
                }
            }
        }
    }
    Ok(out)
}

/// Notebook `source`/`text` fields are either a single string or an array
/// of lines (each already newline-terminated except the last).
fn join_lines(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Array(lines)) => lines
            .iter()
            .filter_map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(""),
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

pub fn is_notebook(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("ipynb")
}
