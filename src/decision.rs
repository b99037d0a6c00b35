//! The routing decision and its normalizer.
//!
//! `normalize_decision` is total: whatever object the model produced, every
//! field of [`Decision`] comes out present and within its domain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{as_object, positive_number, safe_string, string_list, to_number};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Main,
    Tour,
    #[default]
    Clarify,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Main => "main",
            Mode::Tour => "tour",
            Mode::Clarify => "clarify",
        }
    }

    fn parse(value: Option<&Value>) -> Self {
        match safe_string(value).map(|s| s.to_lowercase()).as_deref() {
            Some("main") => Mode::Main,
            Some("tour") => Mode::Tour,
            _ => Mode::Clarify,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Income,
    Expense,
}

impl TxType {
    fn parse(value: Option<&Value>) -> Option<Self> {
        match safe_string(value)?.to_lowercase().as_str() {
            "income" => Some(TxType::Income),
            "expense" => Some(TxType::Expense),
            _ => None,
        }
    }
}

/// Fields for an entry in the personal ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainDraft {
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub tx_type: Option<TxType>,
    pub account_name: Option<String>,
    pub category_name: Option<String>,
    pub date_iso: Option<String>,
    pub note: Option<String>,
}

/// Fields for an entry in a shared tour ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDraft {
    pub amount: Option<f64>,
    pub tour_id: Option<String>,
    pub tour_name: Option<String>,
    pub contributor_name: Option<String>,
    pub sharer_names: Vec<String>,
    pub date_iso: Option<String>,
    pub note: Option<String>,
}

/// Response contract. Serialized with every key present; absent values are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub mode: Mode,
    pub confidence: f64,
    pub missing_fields: Vec<String>,
    pub clarification_question: Option<String>,
    pub assistant_message: Option<String>,
    pub main: MainDraft,
    pub tour: TourDraft,
}

/// Coerce a recovered model object into a [`Decision`]. Never fails.
pub fn normalize_decision(parsed: &Map<String, Value>) -> Decision {
    let empty = Map::new();
    let main = as_object(parsed.get("main")).unwrap_or(&empty);
    let tour = as_object(parsed.get("tour")).unwrap_or(&empty);

    Decision {
        mode: Mode::parse(parsed.get("mode")),
        confidence: to_number(parsed.get("confidence"))
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        missing_fields: string_list(parsed.get("missingFields")),
        clarification_question: safe_string(parsed.get("clarificationQuestion")),
        assistant_message: safe_string(parsed.get("assistantMessage")),
        main: MainDraft {
            amount: positive_number(main.get("amount")),
            tx_type: TxType::parse(main.get("type")),
            account_name: safe_string(main.get("accountName")),
            category_name: safe_string(main.get("categoryName")),
            date_iso: safe_string(main.get("dateIso")),
            note: safe_string(main.get("note")),
        },
        tour: TourDraft {
            amount: positive_number(tour.get("amount")),
            tour_id: safe_string(tour.get("tourId")),
            tour_name: safe_string(tour.get("tourName")),
            contributor_name: safe_string(tour.get("contributorName")),
            sharer_names: string_list(tour.get("sharerNames")),
            date_iso: safe_string(tour.get("dateIso")),
            note: safe_string(tour.get("note")),
        },
    }
}
