//! Consultation (visual exam) models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Visual acuity per eye (OD = right, OI = left).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AcuityPair {
    pub right: Option<String>,
    pub left: Option<String>,
}

/// Visual acuity without and with lenses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualAcuity {
    pub without_lenses: AcuityPair,
    pub with_lenses: AcuityPair,
}

/// Refraction values for one eye.
///
/// Values are kept as written by the optometrist ("-1.25", "180", "20/40").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EyeRefraction {
    pub sphere: Option<String>,
    pub cylinder: Option<String>,
    pub axis: Option<String>,
    pub addition: Option<String>,
    pub acuity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefractionPair {
    pub right: EyeRefraction,
    pub left: EyeRefraction,
}

/// Measured distances and pressures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurements {
    /// Interpupillary distance, right eye (mm)
    pub ipd_right: Option<f64>,
    /// Interpupillary distance, left eye (mm)
    pub ipd_left: Option<f64>,
    pub ipd_total: Option<f64>,
    /// Intraocular pressure, right eye (mmHg)
    pub iop_right: Option<f64>,
    /// Intraocular pressure, left eye (mmHg)
    pub iop_left: Option<f64>,
}

/// Free-text clinical findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClinicalFindings {
    pub ocular_adnexa: Option<String>,
    pub fundus: Option<String>,
    pub diagnosis: Option<String>,
    pub observations: Option<String>,
    pub recommendations: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LensType {
    SingleVision,
    Bifocal,
    Progressive,
    Occupational,
    Contact,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LensMaterial {
    Cr39,
    Polycarbonate,
    HighIndex,
    Trivex,
    Glass,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LensTreatment {
    AntiReflective,
    Photochromic,
    BlueBlock,
    Transitions,
    Polarized,
}

/// Lens and frame ordered at the end of the visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LensOrder {
    pub lens_type: Option<LensType>,
    pub material: Option<LensMaterial>,
    pub treatment: Option<LensTreatment>,
    pub frame_brand: Option<String>,
    pub frame_model: Option<String>,
    pub frame_color: Option<String>,
}

/// One visual exam for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub consultation_id: String,
    pub patient_id: String,
    /// Age at the time of the visit (prefilled, editable)
    pub age_at_visit: Option<u32>,
    pub date: NaiveDate,
    pub optometrist_id: Option<String>,
    pub reason: Option<String>,
    pub acuity: VisualAcuity,
    pub lensometry: RefractionPair,
    pub retinoscopy: RefractionPair,
    /// Final prescription
    pub prescription: RefractionPair,
    pub prescription_remarks: Option<String>,
    pub measurements: Measurements,
    pub findings: ClinicalFindings,
    pub lens_order: LensOrder,
    pub suggested_next_visit: Option<NaiveDate>,
    pub grading_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Consultation {
    /// Create a consultation for a patient on a date.
    pub fn new(patient_id: String, date: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            consultation_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            age_at_visit: None,
            date,
            optometrist_id: None,
            reason: None,
            acuity: VisualAcuity::default(),
            lensometry: RefractionPair::default(),
            retinoscopy: RefractionPair::default(),
            prescription: RefractionPair::default(),
            prescription_remarks: None,
            measurements: Measurements::default(),
            findings: ClinicalFindings::default(),
            lens_order: LensOrder::default(),
            suggested_next_visit: None,
            grading_notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Label shown in lists: `"<patient name> - <YYYY-MM-DD>"`.
    pub fn display_label(&self, patient_name: &str) -> String {
        format!("{} - {}", patient_name, self.date.format("%Y-%m-%d"))
    }

    /// Visit date as `DD/MM/YYYY`.
    pub fn formatted_date(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
