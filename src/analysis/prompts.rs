//! Prompt construction.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::summary::DatasetSummary;

/// Response language used when none is configured.
pub const DEFAULT_RESPONSE_LANGUAGE: &str = "Brazilian Portuguese";

const TEXT_PROMPT: &str = "\
You are an assistant specialized in data analysis, helping users extract valuable insights from datasets.

Guidelines:
1. Use clear, accessible language.
2. Prioritize practical, actionable insights about the data.
3. When asked for a visualization, pick the chart type that best fits the data.
4. Explain statistical concepts simply.
5. When unsure about something, state the limits of your analysis clearly.
6. Organize answers with headings and subheadings where appropriate.
7. For formulas use LaTeX: $$...$$ for display blocks and $...$ inline; never wrap formulas in brackets.

When analyzing the data, consider:
- notable trends and patterns
- outliers and anomalies
- correlations between variables
- relevant descriptive statistics
- possible business insights";

const MARKDOWN_PROMPT: &str = "\
You are a data analysis expert focused on clear, informative reports.

When writing Markdown reports:
1. Use a clear structure with headings, subheadings and lists.
2. Open with an executive summary.
3. Order insights by relevance.
4. Use Markdown tables for numeric data where appropriate.
5. Suggest next steps or further analyses at the end.
6. Keep a professional but accessible tone.
7. Do not use LaTeX outside of mathematical formulas.

Structure the report as follows:
# Report title
## Executive Summary
## Data Analysis
## Key Insights
## Conclusions and Recommendations";

const JSON_PROMPT: &str = "\
You are a data analysis assistant that produces structured JSON output.

When analyzing the data and producing JSON:
1. Keep a consistent, well organized structure.
2. Group related information in nested objects.
3. Give precise numeric values without unnecessary rounding.
4. Use JSON arrays for lists of insights.
5. Reply with the JSON document only.

The document must have exactly these top-level keys:
{
  \"resumo\": \"short description of the analysis\",
  \"dados_analisados\": {
    \"num_registros\": 0,
    \"num_colunas\": 0,
    \"colunas_analisadas\": []
  },
  \"estatisticas\": {},
  \"insights\": [],
  \"recomendacoes\": []
}";

const SPEC_INSTRUCTIONS: &str = "\
Never reply with executable code. Instead:
- If a chart answers the question, include one fenced block tagged `chart` containing JSON
  {\"kind\": \"line\" | \"bar\" | \"scatter\", \"x\": \"<column>\", \"y\": \"<numeric column>\", \"title\": \"...\"}.
- If a derived table answers the question, include one fenced block tagged `table` containing JSON
  {\"columns\": [\"...\"], \"filter\": [{\"column\": \"...\", \"op\": \"eq|ne|gt|ge|lt|le|contains\", \"value\": ...}],
   \"sort_by\": \"...\", \"descending\": false, \"limit\": 10}. Every key is optional.";

const LOOKUP_INSTRUCTIONS: &str = "\
This question asks to list or filter records. Search the `data` field (the complete rows), not
`sample` or `random_sample`. List every matching record; do not truncate, abbreviate or summarize
the matches.";

const GENERAL_INSTRUCTIONS: &str = "\
Use `statistics`, `unique_values` and `value_counts` for aggregate questions, and `data` when
specific records matter.";

/// Shape of the model's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Free text; may carry a chart or table spec.
    #[default]
    Text,
    /// A Markdown report.
    Markdown,
    /// A JSON document with a fixed set of top-level keys.
    Json,
}

impl OutputFormat {
    /// The built-in system prompt for this format.
    pub fn system_prompt(self) -> &'static str {
        match self {
            OutputFormat::Text => TEXT_PROMPT,
            OutputFormat::Markdown => MARKDOWN_PROMPT,
            OutputFormat::Json => JSON_PROMPT,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "texto" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                key: "output format",
                value: other.to_string(),
                message: "expected text, markdown or json".to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        })
    }
}

/// Whether a question targets specific records or the dataset as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// List/filter questions; answered from the full rows.
    Lookup,
    General,
}

const LOOKUP_KEYWORDS: &[&str] = &[
    "list",
    "filter",
    "show all",
    "show me all",
    "find all",
    "all rows",
    "all records",
    "every row",
    "look up",
    "lookup",
    "which rows",
    "which records",
    "where ",
    "listar",
    "liste",
    "filtrar",
    "filtre",
    "mostre todos",
    "mostre todas",
    "encontre",
    "quais",
    "onde ",
    "todos os registros",
];

impl QueryKind {
    /// Keyword heuristic over the lowercased question (English and Portuguese).
    pub fn detect(question: &str) -> Self {
        let q = question.to_lowercase();
        if LOOKUP_KEYWORDS.iter().any(|k| q.contains(k)) {
            QueryKind::Lookup
        } else {
            QueryKind::General
        }
    }
}

/// System and user messages sent to a chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Assemble the prompt for `question` about the dataset described by `summary`.
///
/// `system_override` replaces the format's built-in system prompt. The response language is
/// appended to the system message in both cases.
pub fn build_prompt(
    summary: &DatasetSummary,
    question: &str,
    format: OutputFormat,
    system_override: Option<&str>,
    language: &str,
) -> ChatPrompt {
    let base = system_override.unwrap_or_else(|| format.system_prompt());
    let system = format!("{}\n\nAlways respond in {language}.", base.trim_end());

    let kind = QueryKind::detect(question);
    let mut user = String::new();
    user.push_str("Dataset information (JSON):\n");
    user.push_str(&summary.to_json_pretty());
    user.push_str("\n\n");
    match kind {
        QueryKind::Lookup => {
            user.push_str(LOOKUP_INSTRUCTIONS);
            if summary.data_truncated {
                user.push_str(&format!(
                    "\nNote: `data` holds the first {} of {} rows.",
                    summary.data.len(),
                    summary.shape[0]
                ));
            }
        }
        QueryKind::General => user.push_str(GENERAL_INSTRUCTIONS),
    }
    if format == OutputFormat::Text {
        user.push_str("\n\n");
        user.push_str(SPEC_INSTRUCTIONS);
    }
    user.push_str("\n\nUser question: ");
    user.push_str(question.trim());
    user.push('\n');

    ChatPrompt { system, user }
}
