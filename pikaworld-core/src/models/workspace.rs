use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabet for the random part of workspace ids.
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// A named note-taking session holding a text layout and a drawing.
///
/// `text_content` and `drawing_data` are opaque payloads produced by the
/// text and drawing widgets; they are stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub drawing_data: Option<String>,
}

impl Workspace {
    /// Creates an empty workspace with a freshly generated id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_workspace_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            text_content: String::new(),
            drawing_data: None,
        }
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.chars().count()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Created: {}", self.created_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "Updated: {}", self.updated_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "Text: {} bytes", self.text_content.len())?;
        match &self.drawing_data {
            Some(drawing) => writeln!(f, "Drawing: {} bytes", drawing.len()),
            None => writeln!(f, "Drawing: none"),
        }
    }
}

/// A partial update to a workspace.
///
/// Only fields that are `Some` are written. `drawing_data` is doubly
/// optional so a patch can clear the drawing (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub text_content: Option<String>,
    pub drawing_data: Option<Option<String>>,
}

impl WorkspacePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    pub fn with_drawing(mut self, drawing: Option<String>) -> Self {
        self.drawing_data = Some(drawing);
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.text_content.is_none() && self.drawing_data.is_none()
    }

    /// Writes every present field into `workspace`.
    ///
    /// Timestamps are left alone; the store owns `updated_at`.
    pub fn apply(&self, workspace: &mut Workspace) {
        if let Some(name) = &self.name {
            workspace.name = name.clone();
        }
        if let Some(text) = &self.text_content {
            workspace.text_content = text.clone();
        }
        if let Some(drawing) = &self.drawing_data {
            workspace.drawing_data = drawing.clone();
        }
    }
}

/// Generates `workspace_<unix-millis>_<9 base36 chars>`.
pub fn generate_workspace_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();

    format!("workspace_{}_{}", Utc::now().timestamp_millis(), suffix)
}
