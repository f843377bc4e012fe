use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{Field, FieldKind};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine knobs: merge threshold and template field defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Similarity floor for name-based merge resolution.
    #[serde(default = "default_merge_floor")]
    pub merge_floor: u8,
    #[serde(default)]
    pub template: TemplateDefaults,
    #[serde(default)]
    pub new_seat: NewSeatDefaults,
}

fn default_merge_floor() -> u8 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merge_floor: default_merge_floor(),
            template: TemplateDefaults::default(),
            new_seat: NewSeatDefaults::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Template defaults
// ---------------------------------------------------------------------------

/// How a peer document is turned into a template before its fields are
/// copied onto new records.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateDefaults {
    /// Never copied from the template.
    pub strip: Vec<Field>,
    /// Set to the time of the run.
    pub stamp: Vec<Field>,
    /// Reset to the empty string.
    pub empty: Vec<Field>,
    /// Reset to an empty list.
    pub empty_list: Vec<Field>,
    pub set_true: Vec<Field>,
    pub set_false: Vec<Field>,
}

impl Default for TemplateDefaults {
    fn default() -> Self {
        Self {
            strip: Vec::new(),
            stamp: vec![Field::DateAdded, Field::DateModified],
            empty: vec![
                Field::AudioPath,
                Field::PendingAudioPath,
                Field::PendingFilename,
                Field::Pronunciation,
            ],
            empty_list: vec![Field::Emails, Field::Phones, Field::Networks],
            set_true: vec![Field::Active],
            set_false: vec![Field::NeedsAudio, Field::NeedsReview],
        }
    }
}

impl TemplateDefaults {
    /// Fields copied from a prepared template: everything fillable that is
    /// not stripped.
    pub fn overlay_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| f.is_fillable() && !self.strip.contains(f))
            .collect()
    }

    fn groups(&self) -> [(&'static str, &[Field], FieldKind); 5] {
        [
            ("stamp", self.stamp.as_slice(), FieldKind::Timestamp),
            ("empty", self.empty.as_slice(), FieldKind::Text),
            ("empty_list", self.empty_list.as_slice(), FieldKind::List),
            ("set_true", self.set_true.as_slice(), FieldKind::Flag),
            ("set_false", self.set_false.as_slice(), FieldKind::Flag),
        ]
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let mut seen: HashSet<Field> = HashSet::new();
        for (group, fields, kind) in self.groups() {
            for field in fields {
                if field.kind() != kind {
                    return Err(ReconError::ConfigValidation(format!(
                        "template.{group}: field '{field}' cannot be reset this way"
                    )));
                }
                if !seen.insert(*field) {
                    return Err(ReconError::ConfigValidation(format!(
                        "template: field '{field}' listed in more than one reset group"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// New seat defaults
// ---------------------------------------------------------------------------

/// Values for records created to fill an empty seat during repair.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NewSeatDefaults {
    pub country: String,
    pub active: bool,
    pub needs_audio: bool,
    pub needs_review: bool,
}

impl Default for NewSeatDefaults {
    fn default() -> Self {
        Self {
            country: "us".into(),
            active: true,
            needs_audio: false,
            needs_review: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.merge_floor > 100 {
            return Err(ReconError::ConfigValidation(format!(
                "merge_floor must be between 0 and 100, got {}",
                self.merge_floor
            )));
        }
        self.template.validate()
    }
}
