use std::fmt;

/// The branch of the workflow a prompt is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Chat,
    CodeGeneration,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::CodeGeneration => "code_generation",
        }
    }

    /// Parse a raw classifier reply. Surrounding whitespace, case and quote
    /// characters are ignored; any other text is not a label.
    #[must_use]
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "chat" => Some(Self::Chat),
            "code_generation" => Some(Self::CodeGeneration),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['\'', '"'], "")
}
