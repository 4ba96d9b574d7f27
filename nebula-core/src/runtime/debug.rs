//! Debug-symbol lookup for fatal error reports
//!
//! The interpreter only sees the [`DebugSymbols`] trait; `JsonDebugSymbols`
//! reads the `.ndbg` files emitted next to compiled scripts.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Maps an instruction back to a source line
pub trait DebugSymbols: Send + Sync {
    fn line_for(&self, source: &str, function: &str, instruction: usize) -> Option<usize>;
}

#[derive(Error, Debug)]
pub enum DebugSymbolsError {
    #[error("cannot read debug symbols '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed debug symbols: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineDebugInfo {
    pub line_number: usize,
    pub start_opcode_of_line: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionDebugInfo {
    pub name: String,
    pub line_number: usize,
    pub end_line_number: usize,
    pub instruction_count: usize,
    #[serde(default)]
    pub lines: Vec<LineDebugInfo>,
}

impl FunctionDebugInfo {
    /// Line of the last source line starting at or before `instruction`
    pub fn line_for(&self, instruction: usize) -> usize {
        self.lines
            .iter()
            .filter(|l| l.start_opcode_of_line <= instruction)
            .max_by_key(|l| l.start_opcode_of_line)
            .map(|l| l.line_number)
            .unwrap_or(self.line_number)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptDebugInfo {
    pub original_file_name: String,
    #[serde(default)]
    pub original_file_full_name: Option<String>,
    pub functions: Vec<FunctionDebugInfo>,
}

/// Symbols keyed by source file name
#[derive(Debug, Default)]
pub struct JsonDebugSymbols {
    scripts: HashMap<String, ScriptDebugInfo>,
}

impl JsonDebugSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), DebugSymbolsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DebugSymbolsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.add_json(&text)
    }

    pub fn add_json(&mut self, text: &str) -> Result<(), DebugSymbolsError> {
        let info: ScriptDebugInfo = serde_json::from_str(text)?;
        self.insert(info);
        Ok(())
    }

    pub fn insert(&mut self, info: ScriptDebugInfo) {
        self.scripts.insert(file_key(&info.original_file_name), info);
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl DebugSymbols for JsonDebugSymbols {
    fn line_for(&self, source: &str, function: &str, instruction: usize) -> Option<usize> {
        self.scripts
            .get(&file_key(source))?
            .functions
            .iter()
            .find(|f| f.name == function)
            .map(|f| f.line_for(instruction))
    }
}

/// `dir/game.neb` and `game.neb` resolve to the same entry
fn file_key(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    stem.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "OriginalFileName": "game.nebula",
        "OriginalFileFullName": "/src/game.nebula",
        "Functions": [
            {
                "Name": "Main",
                "LineNumber": 3,
                "EndLineNumber": 9,
                "InstructionCount": 6,
                "Lines": [
                    { "LineNumber": 4, "StartOpcodeOfLine": 0 },
                    { "LineNumber": 5, "StartOpcodeOfLine": 2 },
                    { "LineNumber": 7, "StartOpcodeOfLine": 5 }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_lookup_by_instruction() {
        let mut symbols = JsonDebugSymbols::new();
        symbols.add_json(SAMPLE).unwrap();
        assert_eq!(symbols.line_for("game.nebula", "Main", 0), Some(4));
        assert_eq!(symbols.line_for("game.nebula", "Main", 3), Some(5));
        assert_eq!(symbols.line_for("out/game.nasm", "Main", 5), Some(7));
        assert_eq!(symbols.line_for("game.nebula", "Other", 0), None);
        assert_eq!(symbols.line_for("other.nebula", "Main", 0), None);
    }

    #[test]
    fn test_malformed_json() {
        let mut symbols = JsonDebugSymbols::new();
        assert!(matches!(
            symbols.add_json("{ \"Functions\": 3 }"),
            Err(DebugSymbolsError::Json(_))
        ));
        assert!(symbols.is_empty());
    }
}
