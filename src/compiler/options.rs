use serde::{Deserialize, Serialize};

/// Per-unit compilation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Source path used in diagnostics and recorded on the emitted chunk.
    pub file_path: Option<String>,
    /// Mark a sequence point before every statement.
    pub sequence_points: bool,
    /// Emit handler-less `try` blocks without an exception region.
    pub elide_empty_try: bool,
    /// Fold operators and select constant branches during analysis.
    pub fold_constants: bool,
    pub report_unreachable: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_path: None,
            sequence_points: true,
            elide_empty_try: true,
            fold_constants: true,
            report_unreachable: true,
        }
    }
}

impl CompileOptions {
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_sequence_points(mut self, enabled: bool) -> Self {
        self.sequence_points = enabled;
        self
    }

    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.fold_constants = enabled;
        self
    }
}
