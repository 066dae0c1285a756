//! Clinical drawing attached to a consultation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawingCategory {
    RightEye,
    LeftEye,
    BothEyes,
    #[default]
    Other,
}

impl DrawingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawingCategory::RightEye => "right_eye",
            DrawingCategory::LeftEye => "left_eye",
            DrawingCategory::BothEyes => "both_eyes",
            DrawingCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "right_eye" => Some(DrawingCategory::RightEye),
            "left_eye" => Some(DrawingCategory::LeftEye),
            "both_eyes" => Some(DrawingCategory::BothEyes),
            "other" => Some(DrawingCategory::Other),
            _ => None,
        }
    }
}

/// An image plus note owned by exactly one consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalDrawing {
    pub drawing_id: String,
    pub consultation_id: String,
    pub name: String,
    pub category: DrawingCategory,
    /// Raw image bytes (PNG/JPEG as uploaded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    pub description: Option<String>,
    pub created_at: String,
}

impl ClinicalDrawing {
    pub fn new(consultation_id: String, name: String) -> Self {
        Self {
            drawing_id: uuid::Uuid::new_v4().to_string(),
            consultation_id,
            name,
            category: DrawingCategory::default(),
            image: None,
            description: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
