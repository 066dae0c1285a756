//! Patient models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Yes/no answer on the intake questionnaire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    #[default]
    No,
}

/// Whether the patient has worn corrective lenses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LensHistory {
    Yes,
    #[default]
    No,
    Previously,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pregnancy {
    Yes,
    No,
    #[default]
    NotApplicable,
}

/// Intake questionnaire answered on the first visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeQuestionnaire {
    pub prior_visual_exam: YesNo,
    pub last_exam_date: Option<NaiveDate>,
    pub has_disease: YesNo,
    /// Free text, filled when `has_disease` is yes
    pub diseases: Option<String>,
    pub uses_computer: YesNo,
    pub family_history: YesNo,
    /// Glaucoma, cataracts, macular degeneration, ...
    pub family_history_detail: Option<String>,
    pub lens_history: LensHistory,
    pub previous_lens_type: Option<String>,
    pub pregnancy: Pregnancy,
    pub diabetes: bool,
    pub hypertension: bool,
    pub prior_eye_surgery: bool,
}

/// Symptom checklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Symptoms {
    pub headache: bool,
    pub burning: bool,
    pub pain: bool,
    pub red_eye: bool,
    pub photophobia: bool,
    pub glaucoma: bool,
    pub blurred_vision: bool,
    pub discharge: bool,
    pub fatigue: bool,
    pub floaters: bool,
    pub other: bool,
    pub other_description: Option<String>,
}

impl Symptoms {
    /// Number of checked symptoms.
    pub fn count(&self) -> usize {
        [
            self.headache,
            self.burning,
            self.pain,
            self.red_eye,
            self.photophobia,
            self.glaucoma,
            self.blurred_vision,
            self.discharge,
            self.fatigue,
            self.floaters,
            self.other,
        ]
        .iter()
        .filter(|checked| **checked)
        .count()
    }
}

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID
    pub local_id: String,
    /// Clinic file number, assigned from the sequence on registration
    pub file_number: Option<String>,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub occupation: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// How the patient heard about the clinic
    pub referral_source: Option<String>,
    pub intake: IntakeQuestionnaire,
    pub symptoms: Symptoms,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub blacklisted_on: Option<NaiveDate>,
    /// False once archived
    pub active: bool,
    /// Registration timestamp
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            file_number: None,
            name,
            date_of_birth: None,
            occupation: None,
            phone: None,
            email: None,
            address: None,
            referral_source: None,
            intake: IntakeQuestionnaire::default(),
            symptoms: Symptoms::default(),
            allergies: None,
            medical_notes: None,
            blacklisted: false,
            blacklist_reason: None,
            blacklisted_on: None,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Age in completed years on `today`, or 0 without a birth date.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let Some(born) = self.date_of_birth else {
            return 0;
        };
        if today < born {
            return 0;
        }

        let mut years = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }

    /// Set the blacklist flag, dating it `today` unless a date is already set.
    pub fn flag_blacklisted(&mut self, today: NaiveDate) {
        self.blacklisted = true;
        if self.blacklisted_on.is_none() {
            self.blacklisted_on = Some(today);
        }
    }

    /// Clear flag, reason and date.
    pub fn clear_blacklist(&mut self) {
        self.blacklisted = false;
        self.blacklist_reason = None;
        self.blacklisted_on = None;
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Ana López".into());
        assert_eq!(patient.name, "Ana López");
        assert!(patient.active);
        assert!(!patient.is_blacklisted());
        assert!(patient.file_number.is_none());
        assert_eq!(patient.local_id.len(), 36); // UUID format
    }

    #[test]
    fn test_age_on_birthday() {
        let mut patient = Patient::new("Ana".into());
        patient.date_of_birth = Some(date(2000, 5, 1));

        assert_eq!(patient.age_on(date(2024, 5, 1)), 24);
        assert_eq!(patient.age_on(date(2024, 4, 30)), 23);
    }

    #[test]
    fn test_age_leap_day_birth() {
        let mut patient = Patient::new("Leo".into());
        patient.date_of_birth = Some(date(2004, 2, 29));

        assert_eq!(patient.age_on(date(2023, 2, 28)), 18);
        assert_eq!(patient.age_on(date(2023, 3, 1)), 19);
    }

    #[test]
    fn test_age_without_birth_date() {
        let patient = Patient::new("Ana".into());
        assert_eq!(patient.age_on(date(2024, 5, 1)), 0);
    }

    #[test]
    fn test_flag_blacklisted_keeps_existing_date() {
        let mut patient = Patient::new("Ana".into());
        patient.blacklisted_on = Some(date(2024, 1, 10));
        patient.flag_blacklisted(date(2024, 3, 1));
        assert!(patient.is_blacklisted());
        assert_eq!(patient.blacklisted_on, Some(date(2024, 1, 10)));

        patient.clear_blacklist();
        patient.flag_blacklisted(date(2024, 3, 1));
        assert_eq!(patient.blacklisted_on, Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_symptom_count() {
        let symptoms = Symptoms {
            headache: true,
            floaters: true,
            ..Default::default()
        };
        assert_eq!(symptoms.count(), 2);
    }
}
