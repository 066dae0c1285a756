//! Navigation directives returned by named actions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Record kind a directive navigates to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Patient,
    Consultation,
    Appointment,
    Drawing,
    /// Patient form restricted to the blacklist fields
    BlacklistForm,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Patient => "patient",
            Entity::Consultation => "consultation",
            Entity::Appointment => "appointment",
            Entity::Drawing => "drawing",
            Entity::BlacklistForm => "blacklist_form",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Form,
    /// Form shown in a dialog over the current view
    Dialog,
    List,
    /// List with a calendar view available
    Calendar,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Form => "form",
            ViewMode::Dialog => "dialog",
            ViewMode::List => "list",
            ViewMode::Calendar => "calendar",
        }
    }
}

/// What the host UI should do after an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDirective {
    /// Close the current dialog
    Close,
    /// Open a view
    Open {
        title: String,
        target: Entity,
        view: ViewMode,
        /// Existing record to open
        record_id: Option<String>,
        /// Restrict a list to one patient
        filter_patient_id: Option<String>,
        /// Default field values for a new record
        defaults: BTreeMap<String, String>,
    },
}

impl ActionDirective {
    /// Open a blank form for `target` with default values.
    pub fn new_record<I, K, V>(title: impl Into<String>, target: Entity, view: ViewMode, defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ActionDirective::Open {
            title: title.into(),
            target,
            view,
            record_id: None,
            filter_patient_id: None,
            defaults: defaults
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Open a list of `target` records belonging to a patient.
    pub fn patient_list(title: impl Into<String>, target: Entity, view: ViewMode, patient_id: &str) -> Self {
        ActionDirective::Open {
            title: title.into(),
            target,
            view,
            record_id: None,
            filter_patient_id: Some(patient_id.to_string()),
            defaults: BTreeMap::from([("patient_id".to_string(), patient_id.to_string())]),
        }
    }

    /// Default value for `field`, if this directive opens a view.
    pub fn default_value(&self, field: &str) -> Option<&str> {
        match self {
            ActionDirective::Close => None,
            ActionDirective::Open { defaults, .. } => defaults.get(field).map(String::as_str),
        }
    }
}
