#![deny(missing_docs)]
//! Report synthesis: brief + ordered findings → one cited markdown
//! document.
//!
//! Worker findings cite their own local source lists; synthesis first
//! renumbers every claim against a session-global source list, then asks
//! the report model for the document in a single call. Citations are
//! post-validated: an out-of-range `[n]` triggers exactly one corrective
//! re-invocation with the mismatch reported; markers that still do not
//! resolve afterwards are stripped so the published report never dangles.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use sonde_model::{CallParams, ChatBackend, ModelAdapter};
use sonde_types::{
    FinalReport, Message, ModelError, ResearchBrief, RunMetadata, Source, TokenUsage,
    WorkerFindings,
};

mod prompt;

/// `[n]` citation markers.
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid regex"));

/// Composes the final report.
pub struct Synthesizer<B: ChatBackend> {
    adapter: Arc<ModelAdapter<B>>,
    response_language: Option<String>,
}

impl<B: ChatBackend> Synthesizer<B> {
    /// Create a synthesizer over the report adapter.
    pub fn new(adapter: Arc<ModelAdapter<B>>) -> Self {
        Self {
            adapter,
            response_language: None,
        }
    }

    /// Ask for the report in this language.
    #[must_use]
    pub fn response_language(mut self, language: Option<String>) -> Self {
        self.response_language = language;
        self
    }

    /// Synthesize the report. Synthesis tokens are added onto
    /// `metadata.usage` so the report accounts for its own cost.
    pub async fn synthesize(
        &self,
        brief: &ResearchBrief,
        findings: &[WorkerFindings],
        mut metadata: RunMetadata,
    ) -> Result<FinalReport, ModelError> {
        let (sources, context) = build_context(brief, findings);
        let system = prompt::synthesis_system(sources.len(), self.response_language.as_deref());
        let mut messages = vec![Message::system(system), Message::user(context)];

        let (mut markdown, usage) = self.generate(&messages).await?;
        metadata.usage.add(usage);

        let bad = invalid_citations(&markdown, sources.len());
        if !bad.is_empty() {
            tracing::debug!(?bad, "report cites unknown sources, re-invoking synthesis");
            messages.push(Message::assistant(markdown.clone()));
            messages.push(Message::user(format!(
                "Your report cites source numbers that do not exist: {bad:?}. Only citations \
                 [1]..[{max}] are valid. Rewrite the report using only the numbered sources \
                 provided.",
                max = sources.len()
            )));
            let (retried, retry_usage) = self.generate(&messages).await?;
            metadata.usage.add(retry_usage);
            markdown = retried;
        }

        let still_bad = invalid_citations(&markdown, sources.len());
        if !still_bad.is_empty() {
            tracing::warn!(?still_bad, "stripping unresolved citations from the report");
            markdown = CITATION
                .replace_all(&markdown, |caps: &regex::Captures<'_>| {
                    let n: usize = caps[1].parse().unwrap_or(0);
                    if n >= 1 && n <= sources.len() {
                        caps[0].to_string()
                    } else {
                        String::new()
                    }
                })
                .into_owned();
        }

        let cited = cited_indices(&markdown);
        let report_sources: Vec<Source> = cited
            .into_iter()
            .filter(|&n| n >= 1 && n <= sources.len())
            .map(|n| sources[n - 1].clone())
            .collect();

        Ok(FinalReport {
            markdown,
            sources: report_sources,
            metadata,
        })
    }

    /// One generation pass: structured when the backend supports it,
    /// free-form otherwise.
    async fn generate(&self, messages: &[Message]) -> Result<(String, TokenUsage), ModelError> {
        if self.adapter.descriptor().native_structured {
            let (document, usage) = self
                .adapter
                .structured::<ReportDocument>(messages, &report_schema(), &CallParams::default())
                .await?;
            Ok((document.markdown, usage))
        } else {
            let completion = self
                .adapter
                .complete(messages, &CallParams::default())
                .await?;
            Ok((completion.text, completion.usage))
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ReportDocument {
    markdown: String,
}

fn report_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "markdown": {
                "type": "string",
                "description": "The complete report as markdown"
            }
        },
        "required": ["markdown"]
    })
}

/// Build the global source list and the synthesis context block.
///
/// Sources are deduplicated by URL across findings in task order; each
/// finding's local `[n]` citations are renumbered to global indices.
fn build_context(brief: &ResearchBrief, findings: &[WorkerFindings]) -> (Vec<Source>, String) {
    let mut sources: Vec<Source> = Vec::new();
    let mut context = brief.render();
    context.push_str("\n\n");

    if findings.is_empty() {
        context.push_str(
            "No research findings were collected. Write the best report you can from the brief \
             alone and say plainly that it is not backed by retrieved sources.\n",
        );
    }

    for finding in findings {
        let mut local_to_global = Vec::with_capacity(finding.sources.len());
        for source in &finding.sources {
            let global = match sources.iter().position(|s| s.url == source.url) {
                Some(position) => position + 1,
                None => {
                    sources.push(source.clone());
                    sources.len()
                }
            };
            local_to_global.push(global);
        }

        let remapped = CITATION.replace_all(&finding.compressed_text, |caps: &regex::Captures<'_>| {
            let local: usize = caps[1].parse().unwrap_or(0);
            match local_to_global.get(local.wrapping_sub(1)) {
                Some(global) => format!("[{global}]"),
                None => caps[0].to_string(),
            }
        });

        context.push_str(&format!(
            "Findings ({id}, {status:?}):\n{remapped}\n",
            id = finding.task_id,
            status = finding.status,
        ));
    }

    context.push_str("\nNumbered sources:\n");
    if sources.is_empty() {
        context.push_str("(none)\n");
    }
    for (index, source) in sources.iter().enumerate() {
        context.push_str(&format!(
            "[{n}] {title} — {url}\n",
            n = index + 1,
            title = source.title,
            url = source.url
        ));
    }

    (sources, context)
}

fn cited_indices(markdown: &str) -> Vec<usize> {
    let mut cited: Vec<usize> = CITATION
        .captures_iter(markdown)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    cited.sort_unstable();
    cited.dedup();
    cited
}

fn invalid_citations(markdown: &str, source_count: usize) -> Vec<usize> {
    cited_indices(markdown)
        .into_iter()
        .filter(|&n| n == 0 || n > source_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonde_types::{TaskId, WorkerStatus};

    fn finding(id: &str, text: &str, sources: Vec<(&str, &str)>) -> WorkerFindings {
        WorkerFindings {
            task_id: TaskId::new(id),
            compressed_text: text.into(),
            raw_notes: Vec::new(),
            sources: sources
                .into_iter()
                .map(|(url, title)| Source {
                    url: url.into(),
                    title: title.into(),
                })
                .collect(),
            status: WorkerStatus::Complete,
            error: None,
            usage: TokenUsage::default(),
        }
    }

    #[test]
    fn context_renumbers_across_findings_and_dedups_urls() {
        let brief = ResearchBrief::from_question("q");
        let findings = vec![
            finding(
                "task-1",
                "- claim a [1]\n- claim b [2]\n",
                vec![("https://a", "A"), ("https://b", "B")],
            ),
            finding(
                "task-2",
                "- claim c [1]\n- claim d [2]\n",
                vec![("https://b", "B"), ("https://c", "C")],
            ),
        ];
        let (sources, context) = build_context(&brief, &findings);
        assert_eq!(sources.len(), 3);
        // task-2's local [1] is https://b, which is global [2].
        assert!(context.contains("- claim c [2]"));
        assert!(context.contains("- claim d [3]"));
        assert!(context.contains("[3] C — https://c"));
    }

    #[test]
    fn empty_findings_produce_brief_only_context() {
        let brief = ResearchBrief::from_question("q");
        let (sources, context) = build_context(&brief, &[]);
        assert!(sources.is_empty());
        assert!(context.contains("No research findings were collected"));
        assert!(context.contains("(none)"));
    }

    #[test]
    fn invalid_citations_are_detected() {
        assert_eq!(
            invalid_citations("ok [1] bad [5] worse [0]", 2),
            vec![0, 5]
        );
        assert!(invalid_citations("ok [1] [2]", 2).is_empty());
    }
}
