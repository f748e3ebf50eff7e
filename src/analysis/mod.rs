//! Question answering over a loaded dataset.
//!
//! [`DataAnalyzer`] keeps the current dataset and its summary, builds prompts from the summary and
//! sends them to a [`ChatModel`]. Replies in text mode may carry a `chart` or `table` block, which
//! is validated against the dataset and rendered ([`chart`]) or applied ([`table`]). Nothing the
//! model returns is executed.

pub mod analyzer;
pub mod chart;
pub mod prompts;
pub mod provider;
pub mod table;

pub use analyzer::{fenced_block, AnalysisOutput, AnalyzerOptions, DataAnalyzer, DEFAULT_CHART_PATH};
pub use chart::{render_chart, ChartData, ChartKind, ChartSpec};
pub use prompts::{build_prompt, ChatPrompt, OutputFormat, QueryKind, DEFAULT_RESPONSE_LANGUAGE};
pub use provider::{
    ApiSettings, ChatModel, HttpChatModel, LocalSettings, ProviderConfig, DEEPSEEK_API_BASE,
    DEFAULT_OLLAMA_HOST, OPENAI_API_BASE,
};
pub use table::{CompareOp, Condition, TableSpec};
