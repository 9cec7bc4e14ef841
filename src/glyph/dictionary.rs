//! Instruction dictionary and its JSON document form

use super::{DICTIONARY_TYPE, MAX_TOKENS};
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Dictionary document as stored next to a glyph image.
///
/// `kind` is optional at the serde level so a missing marker surfaces as
/// [`DecodeError::MissingTypeMarker`] instead of a generic parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub dictionary: DictionaryBody,
}

/// `dictionary` object of a [`DictionaryDocument`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DictionaryBody {
    /// Instruction per TokenID; `null` marks an absent entry
    #[serde(default)]
    pub instructions: Vec<Option<u32>>,
}

impl DictionaryDocument {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(|e| DecodeError::Dictionary(e.to_string()))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, DecodeError> {
        serde_json::to_string_pretty(self).map_err(|e| DecodeError::Dictionary(e.to_string()))
    }

    /// Validate the document and build the immutable dictionary
    pub fn into_dictionary(self) -> Result<InstructionDictionary, DecodeError> {
        match self.kind.as_deref() {
            None => return Err(DecodeError::MissingTypeMarker),
            Some(DICTIONARY_TYPE) => {}
            Some(other) => return Err(DecodeError::UnsupportedType(other.to_string())),
        }
        InstructionDictionary::new(self.dictionary.instructions)
    }
}

impl From<&InstructionDictionary> for DictionaryDocument {
    fn from(dict: &InstructionDictionary) -> Self {
        Self {
            kind: Some(DICTIONARY_TYPE.to_string()),
            dictionary: DictionaryBody {
                instructions: dict.entries.clone(),
            },
        }
    }
}

/// TokenID → instruction table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDictionary {
    entries: Vec<Option<u32>>,
}

impl InstructionDictionary {
    /// Build from a (possibly sparse) entry list.
    ///
    /// Entries past 65536 cannot be named by a 16-bit token; they are
    /// dropped with a warning.
    ///
    /// # Errors
    /// `EmptyDictionary` for an empty list.
    pub fn new(mut entries: Vec<Option<u32>>) -> Result<Self, DecodeError> {
        if entries.is_empty() {
            return Err(DecodeError::EmptyDictionary);
        }
        if entries.len() > MAX_TOKENS {
            log::warn!(
                "dictionary has {} entries; {} past token 0xFFFF are unreachable",
                entries.len(),
                entries.len() - MAX_TOKENS
            );
            entries.truncate(MAX_TOKENS);
        }
        Ok(Self { entries })
    }

    /// Build from a dense instruction list
    pub fn from_instructions(instructions: &[u32]) -> Result<Self, DecodeError> {
        Self::new(instructions.iter().copied().map(Some).collect())
    }

    /// Entry for `token`, `None` when out of range or absent
    pub fn get(&self, token: u16) -> Option<u32> {
        self.entries.get(token as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of present (non-null) entries
    pub fn present(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn entries(&self) -> &[Option<u32>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let doc = DictionaryDocument::from_json(
            r#"{ "type": "riscv-morphological", "dictionary": { "instructions": [19, null, 115] } }"#,
        )
        .unwrap();
        let dict = doc.into_dictionary().unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.present(), 2);
        assert_eq!(dict.get(0), Some(0x13));
        assert_eq!(dict.get(1), None);
        assert_eq!(dict.get(2), Some(0x73));
        assert_eq!(dict.get(3), None);
    }

    #[test]
    fn test_missing_type_marker() {
        let doc =
            DictionaryDocument::from_json(r#"{ "dictionary": { "instructions": [19] } }"#).unwrap();
        assert!(matches!(doc.into_dictionary(), Err(DecodeError::MissingTypeMarker)));
    }

    #[test]
    fn test_wrong_type_marker() {
        let doc = DictionaryDocument::from_json(
            r#"{ "type": "rgb-sprite", "dictionary": { "instructions": [19] } }"#,
        )
        .unwrap();
        assert!(matches!(doc.into_dictionary(), Err(DecodeError::UnsupportedType(t)) if t == "rgb-sprite"));
    }

    #[test]
    fn test_empty_instruction_list() {
        let doc = DictionaryDocument::from_json(
            r#"{ "type": "riscv-morphological", "dictionary": { "instructions": [] } }"#,
        )
        .unwrap();
        assert!(matches!(doc.into_dictionary(), Err(DecodeError::EmptyDictionary)));

        let doc = DictionaryDocument::from_json(r#"{ "type": "riscv-morphological" }"#).unwrap();
        assert!(matches!(doc.into_dictionary(), Err(DecodeError::EmptyDictionary)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DictionaryDocument::from_json("{ not json"),
            Err(DecodeError::Dictionary(_))
        ));
    }

    #[test]
    fn test_oversized_dictionary_loads() {
        let mut entries = vec![Some(0x13u32); MAX_TOKENS + 3];
        entries[0xFFFF] = Some(0x73);
        let dict = InstructionDictionary::new(entries).unwrap();
        assert_eq!(dict.len(), MAX_TOKENS);
        assert_eq!(dict.get(0xFFFF), Some(0x73));

        let json = format!(
            r#"{{ "type": "riscv-morphological", "dictionary": {{ "instructions": {:?} }} }}"#,
            vec![19u32; MAX_TOKENS + 1]
        );
        let dict = DictionaryDocument::from_json(&json).unwrap().into_dictionary().unwrap();
        assert_eq!(dict.len(), MAX_TOKENS);
    }

    #[test]
    fn test_document_from_dictionary() {
        let dict = InstructionDictionary::from_instructions(&[0x13, 0x73]).unwrap();
        let json = DictionaryDocument::from(&dict).to_json().unwrap();
        assert!(json.contains("riscv-morphological"));
        let back = DictionaryDocument::from_json(&json).unwrap().into_dictionary().unwrap();
        assert_eq!(back, dict);
    }
}
