//! The structured knowledge schema.
//!
//! Every ingested item is normalized into a `KnowledgeRecord` before it
//! is embedded and stored. Enum fields are closed vocabularies: the
//! structuring model may only pick from them, and deserialization of
//! anything else fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::EmbeddingInput;
use crate::error::{Error, Result};

/// One structured unit of knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub core_content: CoreContent,
    pub source_and_context: SourceAndContext,
    pub categorization: Categorization,
    pub actionability: Actionability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreContent {
    pub title: String,
    pub summary: String,
    pub original_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAndContext {
    pub source_type: SourceType,
    pub source_name: Option<String>,
    pub source_author_or_creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorization {
    pub primary_domain: PrimaryDomain,
    pub tags_and_keywords: Vec<String>,
    pub entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actionability {
    pub actionability_type: ActionabilityType,
    pub action_item_description: Option<String>,
}

/// Where a piece of knowledge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Book,
    Podcast,
    Article,
    Video,
    Conversation,
    #[serde(rename = "Personal Thought")]
    PersonalThought,
    Screenshot,
    #[serde(rename = "Voice Note")]
    VoiceNote,
    #[serde(rename = "Telegram Text Message")]
    TelegramTextMessage,
    #[serde(rename = "Audio File")]
    AudioFile,
    #[serde(rename = "Text File")]
    TextFile,
}

impl SourceType {
    pub const ALL: &'static [SourceType] = &[
        SourceType::Book,
        SourceType::Podcast,
        SourceType::Article,
        SourceType::Video,
        SourceType::Conversation,
        SourceType::PersonalThought,
        SourceType::Screenshot,
        SourceType::VoiceNote,
        SourceType::TelegramTextMessage,
        SourceType::AudioFile,
        SourceType::TextFile,
    ];

    /// Canonical label, as it appears in prompts and stored metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Book => "Book",
            SourceType::Podcast => "Podcast",
            SourceType::Article => "Article",
            SourceType::Video => "Video",
            SourceType::Conversation => "Conversation",
            SourceType::PersonalThought => "Personal Thought",
            SourceType::Screenshot => "Screenshot",
            SourceType::VoiceNote => "Voice Note",
            SourceType::TelegramTextMessage => "Telegram Text Message",
            SourceType::AudioFile => "Audio File",
            SourceType::TextFile => "Text File",
        }
    }

    /// Parse a caller-supplied label. Unknown labels are rejected.
    pub fn from_label(label: &str) -> Option<SourceType> {
        SourceType::ALL
            .iter()
            .copied()
            .find(|s| s.as_str() == label)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level subject area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimaryDomain {
    Technology,
    Science,
    Business,
    Finance,
    Health,
    Productivity,
    Relationships,
    #[serde(rename = "Arts & Culture")]
    ArtsCulture,
    Education,
    #[serde(rename = "Personal Growth")]
    PersonalGrowth,
    #[serde(rename = "Daily Life")]
    DailyLife,
    Other,
}

impl PrimaryDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryDomain::Technology => "Technology",
            PrimaryDomain::Science => "Science",
            PrimaryDomain::Business => "Business",
            PrimaryDomain::Finance => "Finance",
            PrimaryDomain::Health => "Health",
            PrimaryDomain::Productivity => "Productivity",
            PrimaryDomain::Relationships => "Relationships",
            PrimaryDomain::ArtsCulture => "Arts & Culture",
            PrimaryDomain::Education => "Education",
            PrimaryDomain::PersonalGrowth => "Personal Growth",
            PrimaryDomain::DailyLife => "Daily Life",
            PrimaryDomain::Other => "Other",
        }
    }
}

impl std::fmt::Display for PrimaryDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the item calls for follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionabilityType {
    #[serde(rename = "Actionable Task")]
    ActionableTask,
    Idea,
    Reference,
    Habit,
    None,
}

impl ActionabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionabilityType::ActionableTask => "Actionable Task",
            ActionabilityType::Idea => "Idea",
            ActionabilityType::Reference => "Reference",
            ActionabilityType::Habit => "Habit",
            ActionabilityType::None => "None",
        }
    }
}

impl std::fmt::Display for ActionabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KnowledgeRecord {
    /// Check the mandatory-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.core_content.title.trim().is_empty() {
            return Err(Error::MalformedResponse("record has empty title".to_string()));
        }
        if self.core_content.summary.trim().is_empty() {
            return Err(Error::MalformedResponse(
                "record has empty summary".to_string(),
            ));
        }
        if self.core_content.original_text.trim().is_empty() {
            return Err(Error::MalformedResponse(
                "record has empty original_text".to_string(),
            ));
        }
        Ok(())
    }

    /// Compose the text that gets embedded for this record.
    pub fn embedding_text(&self, input: EmbeddingInput) -> String {
        let mut text = format!("{}\n{}", self.core_content.title, self.core_content.summary);
        if input == EmbeddingInput::TitleSummaryTags
            && !self.categorization.tags_and_keywords.is_empty()
        {
            text.push('\n');
            text.push_str(&self.categorization.tags_and_keywords.join(", "));
        }
        text
    }

    /// Flatten to the stored metadata form: a flat string-keyed map with
    /// primitive or JSON-encoded-string values. Lists become JSON strings
    /// because the backing store payload is kept flat.
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();

        map.insert(
            "title".to_string(),
            Value::String(self.core_content.title.clone()),
        );
        map.insert(
            "summary".to_string(),
            Value::String(self.core_content.summary.clone()),
        );
        map.insert(
            "original_text".to_string(),
            Value::String(self.core_content.original_text.clone()),
        );
        map.insert(
            "source_type".to_string(),
            Value::String(self.source_and_context.source_type.as_str().to_string()),
        );
        map.insert(
            "source_name".to_string(),
            opt_value(&self.source_and_context.source_name),
        );
        map.insert(
            "source_author_or_creator".to_string(),
            opt_value(&self.source_and_context.source_author_or_creator),
        );
        map.insert(
            "primary_domain".to_string(),
            Value::String(self.categorization.primary_domain.as_str().to_string()),
        );
        map.insert(
            "tags_and_keywords".to_string(),
            Value::String(Value::from(self.categorization.tags_and_keywords.clone()).to_string()),
        );
        map.insert(
            "entities".to_string(),
            Value::String(Value::from(self.categorization.entities.clone()).to_string()),
        );
        map.insert(
            "actionability_type".to_string(),
            Value::String(self.actionability.actionability_type.as_str().to_string()),
        );
        map.insert(
            "action_item_description".to_string(),
            opt_value(&self.actionability.action_item_description),
        );

        map
    }

    /// Rebuild a record from its flat metadata form. Inverse of
    /// [`KnowledgeRecord::to_metadata`] for well-formed maps.
    pub fn from_metadata(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            core_content: CoreContent {
                title: req_str(map, "title")?,
                summary: req_str(map, "summary")?,
                original_text: req_str(map, "original_text")?,
            },
            source_and_context: SourceAndContext {
                source_type: parse_enum(&req_str(map, "source_type")?)?,
                source_name: opt_str(map, "source_name"),
                source_author_or_creator: opt_str(map, "source_author_or_creator"),
            },
            categorization: Categorization {
                primary_domain: parse_enum(&req_str(map, "primary_domain")?)?,
                tags_and_keywords: str_list(map, "tags_and_keywords")?,
                entities: str_list(map, "entities")?,
            },
            actionability: Actionability {
                actionability_type: parse_enum(&req_str(map, "actionability_type")?)?,
                action_item_description: opt_str(map, "action_item_description"),
            },
        })
    }
}

fn opt_value(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn req_str(map: &Map<String, Value>, key: &str) -> Result<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::SerializationError(format!("metadata missing field: {}", key)))
}

fn opt_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn str_list(map: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let raw = req_str(map, key)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::SerializationError(format!("metadata field {} is not a list: {}", key, e)))
}

fn parse_enum<T: serde::de::DeserializeOwned>(label: &str) -> Result<T> {
    serde_json::from_value(Value::String(label.to_string()))
        .map_err(|e| Error::SerializationError(format!("unknown vocabulary value: {}", e)))
}

/// Canned record for unit tests across the crate.
#[cfg(test)]
pub(crate) fn sample_record() -> KnowledgeRecord {
    KnowledgeRecord {
        core_content: CoreContent {
            title: "Weekly report reminder".to_string(),
            summary: "The weekly report has to be sent tomorrow.".to_string(),
            original_text: "یادداشت: باید گزارش هفتگی را فردا ارسال کنم".to_string(),
        },
        source_and_context: SourceAndContext {
            source_type: SourceType::TelegramTextMessage,
            source_name: None,
            source_author_or_creator: None,
        },
        categorization: Categorization {
            primary_domain: PrimaryDomain::Productivity,
            tags_and_keywords: vec!["report".to_string(), "deadline".to_string()],
            entities: vec![],
        },
        actionability: Actionability {
            actionability_type: ActionabilityType::ActionableTask,
            action_item_description: Some("Send the weekly report tomorrow.".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_from_model_json() {
        let json = r#"{
            "core_content": {
                "title": "Atomic Habits",
                "summary": "Small habits compound into large results.",
                "original_text": "Reading Atomic Habits by James Clear."
            },
            "source_and_context": {
                "source_type": "Book",
                "source_name": "Atomic Habits",
                "source_author_or_creator": "James Clear"
            },
            "categorization": {
                "primary_domain": "Personal Growth",
                "tags_and_keywords": ["habits", "productivity"],
                "entities": ["James Clear"]
            },
            "actionability": {
                "actionability_type": "Reference",
                "action_item_description": null
            }
        }"#;

        let record: KnowledgeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_and_context.source_type, SourceType::Book);
        assert_eq!(
            record.categorization.primary_domain,
            PrimaryDomain::PersonalGrowth
        );
        assert!(record.actionability.action_item_description.is_none());
    }

    #[test]
    fn test_out_of_vocabulary_source_type_is_rejected() {
        let json = r#"{ "source_type": "Carrier Pigeon", "source_name": null, "source_author_or_creator": null }"#;
        let result: std::result::Result<SourceAndContext, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_vocabulary_domain_is_rejected() {
        let result: std::result::Result<PrimaryDomain, _> =
            serde_json::from_str("\"Astrology\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_source_type_from_label() {
        assert_eq!(
            SourceType::from_label("Telegram Text Message"),
            Some(SourceType::TelegramTextMessage)
        );
        assert_eq!(SourceType::from_label("Voice Note"), Some(SourceType::VoiceNote));
        assert_eq!(SourceType::from_label("Fax"), None);
    }

    #[test]
    fn test_source_type_labels_round_trip_through_serde() {
        for source in SourceType::ALL {
            let json = serde_json::to_string(source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
            let back: SourceType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *source);
        }
    }

    #[test]
    fn test_validate_rejects_blank_mandatory_fields() {
        let mut record = sample_record();
        assert!(record.validate().is_ok());

        record.core_content.title = "  ".to_string();
        assert!(record.validate().is_err());

        let mut record = sample_record();
        record.core_content.summary = String::new();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_metadata_round_trip() {
        let record = sample_record();
        let metadata = record.to_metadata();
        let restored = KnowledgeRecord::from_metadata(&metadata).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_metadata_round_trip_with_all_optionals_set() {
        let mut record = sample_record();
        record.source_and_context.source_name = Some("Telegram".to_string());
        record.source_and_context.source_author_or_creator = Some("me".to_string());
        record.categorization.entities =
            vec!["گزارش هفتگی".to_string(), "Tehran".to_string()];

        let restored = KnowledgeRecord::from_metadata(&record.to_metadata()).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_metadata_absent_info_is_explicit_null() {
        let record = sample_record();
        let metadata = record.to_metadata();
        assert_eq!(metadata.get("source_name"), Some(&Value::Null));
        assert_eq!(metadata.get("source_author_or_creator"), Some(&Value::Null));
    }

    #[test]
    fn test_metadata_lists_are_json_strings() {
        let record = sample_record();
        let metadata = record.to_metadata();
        let tags = metadata.get("tags_and_keywords").unwrap().as_str().unwrap();
        assert_eq!(tags, r#"["report","deadline"]"#);
    }

    #[test]
    fn test_from_metadata_missing_field_fails() {
        let record = sample_record();
        let mut metadata = record.to_metadata();
        metadata.remove("title");
        assert!(KnowledgeRecord::from_metadata(&metadata).is_err());
    }

    #[test]
    fn test_from_metadata_unknown_vocabulary_fails() {
        let record = sample_record();
        let mut metadata = record.to_metadata();
        metadata.insert(
            "primary_domain".to_string(),
            Value::String("Astrology".to_string()),
        );
        assert!(KnowledgeRecord::from_metadata(&metadata).is_err());
    }

    #[test]
    fn test_embedding_text_composition() {
        let record = sample_record();

        let with_tags = record.embedding_text(EmbeddingInput::TitleSummaryTags);
        assert!(with_tags.contains("Weekly report reminder"));
        assert!(with_tags.contains("report, deadline"));

        let without_tags = record.embedding_text(EmbeddingInput::TitleSummary);
        assert!(without_tags.contains("Weekly report reminder"));
        assert!(!without_tags.contains("report, deadline"));
    }

    #[test]
    fn test_embedding_text_skips_empty_tag_list() {
        let mut record = sample_record();
        record.categorization.tags_and_keywords.clear();
        let text = record.embedding_text(EmbeddingInput::TitleSummaryTags);
        assert!(!text.ends_with('\n'));
        assert_eq!(text.lines().count(), 2);
    }
}
