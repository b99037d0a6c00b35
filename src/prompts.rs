//! Prompt templates for transaction intent routing.
//!
//! Domain logic for rendering the routing prompt. Provider-agnostic and
//! deterministic: the same input always renders the same text.

use crate::normalize::NormalizedInput;

// =============================================================================
// Output schema
// =============================================================================

/// Shape hint for the model. Not used for validation.
pub const OUTPUT_SCHEMA: &str = concat!(
    r#"{"mode":"main | tour | clarify","confidence":"number 0..1","missingFields":["string"],"#,
    r#""clarificationQuestion":"string | null","assistantMessage":"string | null","#,
    r#""main":{"amount":"number | null","type":"income | expense | null","#,
    r#""accountName":"string | null","categoryName":"string | null","#,
    r#""dateIso":"ISO-8601 date/time string | null","note":"string | null"},"#,
    r#""tour":{"amount":"number | null","tourId":"string | null","tourName":"string | null","#,
    r#""contributorName":"string | null","sharerNames":["string"],"#,
    r#""dateIso":"ISO-8601 date/time string | null","note":"string | null"}}"#
);

// =============================================================================
// Prompt templates
// =============================================================================

/// Headings placed before each serialized section.
#[derive(Debug, Clone, Copy)]
pub struct SectionLabels {
    pub schema: &'static str,
    pub context: &'static str,
    pub history: &'static str,
    pub utterance: &'static str,
}

/// A routing prompt: fixed instructions followed by labelled data sections.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub instructions: &'static [&'static str],
    pub labels: SectionLabels,
}

impl PromptTemplate {
    /// Render the prompt for one request.
    pub fn render(&self, input: &NormalizedInput) -> String {
        // Serializing plain structs of strings and vectors cannot fail.
        let context = serde_json::to_string(&input.context).unwrap_or_else(|_| "{}".into());
        let history = serde_json::to_string(&input.history).unwrap_or_else(|_| "[]".into());

        let mut lines: Vec<&str> = self.instructions.to_vec();
        lines.extend([
            "",
            self.labels.schema,
            OUTPUT_SCHEMA,
            "",
            self.labels.context,
            context.as_str(),
            "",
            self.labels.history,
            history.as_str(),
            "",
            self.labels.utterance,
            input.text.as_str(),
        ]);
        lines.join("\n")
    }
}

pub const ROUTER_DETAILED: PromptTemplate = PromptTemplate {
    slug: "router_detailed",
    instructions: &[
        "You are CashFlow's transaction intent router.",
        "Goal: classify one user utterance into MAIN personal transaction or TOUR transaction.",
        "If ambiguous, respond with mode=clarify and ask exactly one short question.",
        "Return only JSON. No markdown. No prose outside JSON.",
        "Use only entity names that are present in context lists.",
        "If user says a close misspelling, map it to the nearest available name.",
        "If amount/date missing, include them in missingFields and ask concise clarification.",
        "When entryPoint is tourDashboard and context.currentTourId is present, prefer that tour unless text clearly points to another tour.",
    ],
    labels: SectionLabels {
        schema: "Output JSON schema:",
        context: "Context JSON:",
        history: "Conversation history JSON:",
        utterance: "Latest user utterance:",
    },
};

pub const ROUTER_COMPACT: PromptTemplate = PromptTemplate {
    slug: "router_compact",
    instructions: &[
        "You are CashFlow transaction intent router.",
        "Classify into main, tour, or clarify.",
        "If unclear, ask one short clarification question.",
        "Return only JSON, no markdown.",
        "Use only names from context when possible; map close misspellings to the nearest name.",
        "On tourDashboard with currentTourId set, prefer that tour unless text names another.",
    ],
    labels: SectionLabels {
        schema: "Schema:",
        context: "Context:",
        history: "History:",
        utterance: "User text:",
    },
};

pub const DEFAULT_PROMPT: PromptTemplate = ROUTER_DETAILED;

pub const ALL_PROMPTS: [PromptTemplate; 2] = [ROUTER_DETAILED, ROUTER_COMPACT];

pub fn prompt_by_slug(slug: &str) -> Option<PromptTemplate> {
    ALL_PROMPTS.iter().copied().find(|p| p.slug == slug)
}

pub fn available_prompt_slugs() -> Vec<&'static str> {
    ALL_PROMPTS.iter().map(|p| p.slug).collect()
}
