//! Rich document trees (creations, publications)
//!
//! A node with an `attrs.id` is a translation unit. Its group holds the text
//! leaves below it in document order, not counting leaves under a
//! descendant that has its own id. Text outside every unit is never
//! translated.

use serde::{Deserialize, Serialize};
use serde_cbor::Value;
use std::collections::{BTreeMap, HashMap};

use super::te::TEContents;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<DocumentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<DocumentNode>>,
}

impl DocumentNode {
    fn unit_id(&self) -> Option<&str> {
        match self.attrs.as_ref()?.get("id")? {
            Value::Text(id) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn to_te(&self) -> TEContents {
        let mut te = TEContents::default();
        self.collect_units(&mut te);
        te
    }

    fn collect_units(&self, te: &mut TEContents) {
        if let Some(id) = self.unit_id() {
            let mut texts = Vec::new();
            self.collect_texts(&mut texts);
            te.push(id, texts);
        }
        for child in self.content.iter().flatten() {
            child.collect_units(te);
        }
    }

    fn collect_texts(&self, texts: &mut Vec<String>) {
        if let Some(text) = &self.text {
            texts.push(text.clone());
        }
        for child in self.content.iter().flatten() {
            if child.unit_id().is_none() {
                child.collect_texts(texts);
            }
        }
    }

    /// Write translated texts back, leaf by leaf. Units missing from `te`
    /// and surplus texts are left alone.
    pub fn from_te(&mut self, te: &TEContents) {
        let groups: HashMap<&str, &Vec<String>> =
            te.iter().map(|c| (c.id.as_str(), &c.texts)).collect();
        self.apply_units(&groups);
    }

    fn apply_units(&mut self, groups: &HashMap<&str, &Vec<String>>) {
        if let Some(texts) = self.unit_id().and_then(|id| groups.get(id).copied()) {
            let mut next = texts.iter();
            self.apply_texts(&mut next);
        }
        for child in self.content.iter_mut().flatten() {
            child.apply_units(groups);
        }
    }

    fn apply_texts<'a>(&mut self, next: &mut impl Iterator<Item = &'a String>) {
        if let Some(text) = self.text.as_mut() {
            if let Some(t) = next.next() {
                *text = t.clone();
            }
        }
        for child in self.content.iter_mut().flatten() {
            if child.unit_id().is_none() {
                child.apply_texts(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(t: &str) -> DocumentNode {
        DocumentNode {
            kind: "text".into(),
            text: Some(t.into()),
            ..Default::default()
        }
    }

    fn block(kind: &str, id: Option<&str>, content: Vec<DocumentNode>) -> DocumentNode {
        DocumentNode {
            kind: kind.into(),
            attrs: id.map(|id| BTreeMap::from([("id".to_string(), Value::Text(id.into()))])),
            content: Some(content),
            ..Default::default()
        }
    }

    fn sample() -> DocumentNode {
        block(
            "doc",
            None,
            vec![
                block("heading", Some("h1"), vec![text("Title")]),
                block(
                    "paragraph",
                    Some("p1"),
                    vec![
                        text("Hello "),
                        block("bold", None, vec![text("brave")]),
                        text(" world"),
                    ],
                ),
                block(
                    "blockquote",
                    Some("q1"),
                    vec![block("paragraph", Some("q1p"), vec![text("quoted")])],
                ),
            ],
        )
    }

    #[test]
    fn test_to_te_groups_by_unit() {
        let te = sample().to_te();
        let ids: Vec<&str> = te.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "p1", "q1", "q1p"]);
        assert_eq!(te.get("p1").unwrap().texts, vec!["Hello ", "brave", " world"]);
        // nested unit texts belong to the nested unit only
        assert!(te.get("q1").unwrap().texts.is_empty());
        assert_eq!(te.get("q1p").unwrap().texts, vec!["quoted"]);
    }

    #[test]
    fn test_from_te_applies_translation() {
        let mut doc = sample();
        let mut te = TEContents::default();
        te.push("p1", vec!["你好".into(), "勇敢的".into(), "世界".into()]);
        doc.from_te(&te);
        let out = doc.to_te();
        assert_eq!(out.get("p1").unwrap().texts, vec!["你好", "勇敢的", "世界"]);
        assert_eq!(out.get("h1").unwrap().texts, vec!["Title"]);
    }

    #[test]
    fn test_text_outside_units_is_not_translated() {
        let mut doc = block(
            "doc",
            None,
            vec![text("loose"), block("paragraph", Some("p1"), vec![text("kept")])],
        );
        let te = doc.to_te();
        assert_eq!(te.len(), 1);
        assert_eq!(te.get("p1").unwrap().texts, vec!["kept"]);

        let mut translated = TEContents::default();
        translated.push("p1", vec!["保留".into()]);
        doc.from_te(&translated);
        let content = doc.content.as_ref().unwrap();
        assert_eq!(content[0].text.as_deref(), Some("loose"));
        assert_eq!(doc.to_te().get("p1").unwrap().texts, vec!["保留"]);

        // a bare leaf is no unit at all
        assert!(text("alone").to_te().is_empty());
    }

    #[test]
    fn test_cbor_round_trip_keeps_attrs() {
        let doc = sample();
        let data = serde_cbor::to_vec(&doc).unwrap();
        let back: DocumentNode = serde_cbor::from_slice(&data).unwrap();
        assert_eq!(back, doc);
    }

    fn arb_leaf() -> impl Strategy<Value = DocumentNode> {
        ".{0,8}".prop_map(|t| text(&t))
    }

    /// Always rooted in a block, so every leaf sits under some unit once
    /// numbered
    fn arb_doc() -> impl Strategy<Value = DocumentNode> {
        arb_leaf()
            .prop_recursive(3, 24, 4, |inner| {
                prop::collection::vec(inner, 0..4)
                    .prop_map(|children| block("paragraph", None, children))
            })
            .prop_map(|tree| block("doc", None, vec![tree]))
    }

    /// Assign unique ids to every non-leaf node so the tree is well formed
    fn number_units(node: &mut DocumentNode, next: &mut usize) {
        if node.text.is_none() {
            *next += 1;
            node.attrs = Some(BTreeMap::from([(
                "id".to_string(),
                Value::Text(format!("n{}", next)),
            )]));
        }
        for child in node.content.iter_mut().flatten() {
            number_units(child, next);
        }
    }

    fn blank_texts(node: &mut DocumentNode) {
        if let Some(text) = node.text.as_mut() {
            text.clear();
        }
        for child in node.content.iter_mut().flatten() {
            blank_texts(child);
        }
    }

    proptest! {
        #[test]
        fn prop_document_round_trip(mut doc in arb_doc()) {
            number_units(&mut doc, &mut 0);
            let te = doc.to_te();
            let mut blank = doc.clone();
            blank_texts(&mut blank);
            blank.from_te(&te);
            prop_assert_eq!(blank, doc);
        }
    }
}
