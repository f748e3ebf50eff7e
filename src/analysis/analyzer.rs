use std::path::PathBuf;

use crate::error::{AnalysisError, AnalysisResult};
use crate::summary::{summarize, DatasetSummary, SummaryOptions};
use crate::types::DataSet;

use super::chart::{render_chart, ChartSpec};
use super::prompts::{build_prompt, OutputFormat, DEFAULT_RESPONSE_LANGUAGE};
use super::provider::ChatModel;
use super::table::TableSpec;

/// Default chart output path, overwritten by every chart.
pub const DEFAULT_CHART_PATH: &str = "temp_figure.png";

/// Result of [`DataAnalyzer::ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    Text(String),
    Markdown(String),
    Json(serde_json::Value),
    /// A derived table from a `table` spec.
    Table(DataSet),
    /// Path of a chart rendered from a `chart` spec.
    Chart(PathBuf),
}

/// Settings of an analyzer session.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    pub format: OutputFormat,
    /// Replaces the format's built-in system prompt.
    pub system_prompt: Option<String>,
    pub language: String,
    pub summary: SummaryOptions,
    pub chart_path: PathBuf,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            system_prompt: None,
            language: DEFAULT_RESPONSE_LANGUAGE.to_string(),
            summary: SummaryOptions::default(),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    dataset: DataSet,
    summary: DatasetSummary,
}

/// Question-answering session over one dataset at a time.
///
/// Loading a dataset replaces the previous dataset and summary together.
#[derive(Debug)]
pub struct DataAnalyzer<M> {
    model: M,
    options: AnalyzerOptions,
    session: Option<Session>,
}

impl<M: ChatModel> DataAnalyzer<M> {
    pub fn new(model: M, options: AnalyzerOptions) -> Self {
        Self {
            model,
            options,
            session: None,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.options.format = format;
    }

    /// Use `prompt` instead of the built-in system prompt; `None` restores the built-in one.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.options.system_prompt = prompt;
    }

    /// Summarize `dataset` and make it the current dataset.
    pub fn load_dataset(&mut self, dataset: DataSet) -> &DatasetSummary {
        let summary = summarize(&dataset, &self.options.summary);
        if summary.shape[0] > self.options.summary.sampling_threshold {
            tracing::info!(
                rows = summary.shape[0],
                "large dataset; the summary includes a random sample"
            );
        }
        let session = self.session.insert(Session { dataset, summary });
        &session.summary
    }

    pub fn dataset(&self) -> Option<&DataSet> {
        self.session.as_ref().map(|s| &s.dataset)
    }

    pub fn summary(&self) -> Option<&DatasetSummary> {
        self.session.as_ref().map(|s| &s.summary)
    }

    /// Ask a question about the current dataset.
    ///
    /// In text mode, a valid `chart` or `table` block in the reply becomes
    /// [`AnalysisOutput::Chart`] or [`AnalysisOutput::Table`]. A block that fails validation does
    /// not fail the call: the reply is returned as text with the reason prepended.
    pub fn ask(&self, question: &str) -> AnalysisResult<AnalysisOutput> {
        let session = self.session.as_ref().ok_or(AnalysisError::NoDataset)?;
        if question.trim().is_empty() {
            return Err(AnalysisError::EmptyQuestion);
        }

        let prompt = build_prompt(
            &session.summary,
            question,
            self.options.format,
            self.options.system_prompt.as_deref(),
            &self.options.language,
        );
        let reply = self.model.complete(&prompt)?;

        Ok(match self.options.format {
            OutputFormat::Markdown => AnalysisOutput::Markdown(reply),
            OutputFormat::Json => match extract_json(&reply) {
                Some(value) => AnalysisOutput::Json(value),
                None => {
                    tracing::warn!("model reply is not valid JSON; returning it as text");
                    AnalysisOutput::Text(reply)
                }
            },
            OutputFormat::Text => self.interpret_text(&session.dataset, reply),
        })
    }

    fn interpret_text(&self, dataset: &DataSet, reply: String) -> AnalysisOutput {
        if let Some(body) = fenced_block(&reply, "chart") {
            let result = ChartSpec::parse(&body).and_then(|spec| {
                let data = spec.validate(dataset)?;
                render_chart(&spec, &data, &self.options.chart_path)
            });
            return match result {
                Ok(()) => AnalysisOutput::Chart(self.options.chart_path.clone()),
                Err(err) => spec_failure(err, reply),
            };
        }
        if let Some(body) = fenced_block(&reply, "table") {
            return match TableSpec::parse(&body).and_then(|spec| spec.apply(dataset)) {
                Ok(table) => AnalysisOutput::Table(table),
                Err(err) => spec_failure(err, reply),
            };
        }
        AnalysisOutput::Text(reply)
    }
}

fn spec_failure(err: AnalysisError, reply: String) -> AnalysisOutput {
    tracing::warn!(error = %err, "could not apply spec from model reply");
    AnalysisOutput::Text(format!("{err}\n\nOriginal reply:\n{reply}"))
}

/// Body of the first fenced block tagged `tag` (the opening fence line starts with ```` ```tag ````).
pub fn fenced_block(reply: &str, tag: &str) -> Option<String> {
    let opener = format!("```{tag}");
    let mut lines = reply.lines();
    lines.by_ref().find(|l| l.trim_start().starts_with(&opener))?;

    let mut body = Vec::new();
    for line in lines {
        if line.trim_start().starts_with("```") {
            return Some(body.join("\n"));
        }
        body.push(line);
    }
    None
}

/// Parse a JSON reply, tolerating a surrounding ```` ```json ```` fence or leading prose.
fn extract_json(reply: &str) -> Option<serde_json::Value> {
    if let Some(body) = fenced_block(reply, "json") {
        if let Ok(value) = serde_json::from_str(&body) {
            return Some(value);
        }
    }
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}
