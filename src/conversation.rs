use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Binary content sent inline with a turn. Never carries the file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn: the text part always comes first, the attachment after it.
    pub fn user(text: impl Into<String>, inline: Option<InlineData>) -> Self {
        let mut parts = vec![Part::Text { text: text.into() }];
        if let Some(inline_data) = inline {
            parts.push(Part::InlineData { inline_data });
        }
        Turn {
            role: Role::User,
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Turn {
            role: Role::Model,
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

/// Chronological log of turns, resent in full with every request.
///
/// History is never truncated, so request payloads grow with the session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
impl Turn {
    /// Text of the first part, if it is a text part.
    pub fn text(&self) -> Option<&str> {
        match self.parts.first()? {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

#[cfg(test)]
impl Conversation {
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_turn_wire_format() {
        let turn = Turn::user(
            "What is wrong here?",
            Some(InlineData {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }),
        );

        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "parts": [
                    { "text": "What is wrong here?" },
                    { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
                ]
            })
        );
    }

    #[test]
    fn test_text_part_comes_first() {
        let turn = Turn::user("hi", None);
        assert_eq!(turn.parts.len(), 1);
        assert_eq!(turn.text(), Some("hi"));
        assert_eq!(Turn::model("ok").role, Role::Model);
    }

    #[test]
    fn test_snapshot_keeps_order_and_clear_empties() {
        let mut conversation = Conversation::new();
        conversation.append(Turn::user("one", None));
        conversation.append(Turn::model("two"));
        conversation.append(Turn::user("three", None));

        let texts: Vec<_> = conversation
            .snapshot()
            .iter()
            .map(|t| t.text().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        conversation.clear();
        assert!(conversation.is_empty());
        assert!(conversation.snapshot().is_empty());
    }
}
