//! Input normalization: raw request body → bounded, typed pipeline input.
//!
//! Only `text` is mandatory. Everything else degrades to defaults field by
//! field, so a malformed `context` or `history` never fails a request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{as_object, safe_string};

pub const DEFAULT_ENTRY_POINT: &str = "mainDashboard";
pub const TOUR_ENTRY_POINT: &str = "tourDashboard";
pub const DEFAULT_ROLE: &str = "user";

/// Account, category, or tour reference supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    pub expense: Vec<NamedEntity>,
    pub income: Vec<NamedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub entry_point: String,
    pub current_tour_id: Option<String>,
    pub accounts: Vec<NamedEntity>,
    pub categories: Categories,
    pub tours: Vec<NamedEntity>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            current_tour_id: None,
            accounts: Vec::new(),
            categories: Categories::default(),
            tours: Vec::new(),
        }
    }
}

impl Context {
    /// Whether the caller is on a tour dashboard with an active tour.
    pub fn prefers_current_tour(&self) -> bool {
        self.entry_point == TOUR_ENTRY_POINT && self.current_tour_id.is_some()
    }
}

/// Prior conversation line, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub text: String,
}

/// Upper bounds applied before anything is serialized into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    /// Entries kept per named list (accounts, each category list, tours).
    pub max_list_items: usize,
    /// Most recent history turns kept.
    pub max_history_turns: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_list_items: 200,
            max_history_turns: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInput {
    pub text: String,
    pub context: Context,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Missing text")]
    MissingText,
}

/// Normalize a request body. Non-object bodies behave like `{}`.
pub fn normalize_request(body: &Value, limits: &InputLimits) -> Result<NormalizedInput, InputError> {
    let empty = Map::new();
    let body = body.as_object().unwrap_or(&empty);

    let text = safe_string(body.get("text")).ok_or(InputError::MissingText)?;

    Ok(NormalizedInput {
        text,
        context: normalize_context(body.get("context"), limits),
        history: normalize_history(body.get("history"), limits),
    })
}

pub fn normalize_context(value: Option<&Value>, limits: &InputLimits) -> Context {
    let Some(ctx) = as_object(value) else {
        return Context::default();
    };
    let categories = as_object(ctx.get("categories"));

    Context {
        entry_point: safe_string(ctx.get("entryPoint"))
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string()),
        current_tour_id: safe_string(ctx.get("currentTourId")),
        accounts: normalize_named_list(ctx.get("accounts"), limits),
        categories: Categories {
            expense: normalize_named_list(categories.and_then(|c| c.get("expense")), limits),
            income: normalize_named_list(categories.and_then(|c| c.get("income")), limits),
        },
        tours: normalize_named_list(ctx.get("tours"), limits),
    }
}

pub fn normalize_named_list(value: Option<&Value>, limits: &InputLimits) -> Vec<NamedEntity> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| NamedEntity {
            id: safe_string(item.get("id")).unwrap_or_default(),
            name: safe_string(item.get("name")).unwrap_or_default(),
        })
        .filter(|item| !item.id.is_empty() || !item.name.is_empty())
        .take(limits.max_list_items)
        .collect()
}

pub fn normalize_history(value: Option<&Value>, limits: &InputLimits) -> Vec<HistoryTurn> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let turns: Vec<HistoryTurn> = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let text = safe_string(item.get("text"))?;
            Some(HistoryTurn {
                role: safe_string(item.get("role")).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
                text,
            })
        })
        .collect();

    let skip = turns.len().saturating_sub(limits.max_history_turns);
    turns.into_iter().skip(skip).collect()
}
