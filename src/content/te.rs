//! Translation-exchange contents
//!
//! The flat, ordered list of `{id, texts}` groups that every translatable
//! shape projects to. Jarvis reads and writes this format only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TEContent {
    pub id: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TEContents(pub Vec<TEContent>);

impl TEContents {
    pub fn push(&mut self, id: impl Into<String>, texts: Vec<String>) {
        self.0.push(TEContent {
            id: id.into(),
            texts,
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TEContent> {
        self.0.iter()
    }

    pub fn get(&self, id: &str) -> Option<&TEContent> {
        self.0.iter().find(|c| c.id == id)
    }

    /// Drop groups with nothing to translate
    pub fn without_blank(mut self) -> Self {
        self.0
            .retain(|c| c.texts.iter().any(|t| !t.trim().is_empty()));
        self
    }

    /// All texts joined by newlines, the input of token counting
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        for content in &self.0 {
            for text in &content.texts {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(data: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(data)
    }
}
