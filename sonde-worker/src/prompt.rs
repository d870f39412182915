//! Prompt builders for the worker loop.

use sonde_types::{ResearchBrief, WorkerTask};

pub(crate) fn worker_system(
    brief: &ResearchBrief,
    task: &WorkerTask,
    language: Option<&str>,
) -> String {
    let mut out = format!(
        "You are a focused researcher contributing to a larger investigation.\n\n\
         {brief}\n\n\
         Your assignment: {sub_question}\n\n\
         Work in small steps: use the search tool to gather evidence, use the reflect tool to \
         record what you learned and what is still missing, and stop as soon as you can support \
         an answer with concrete sources. Every factual statement you keep must be traceable to \
         a numbered search result. Do not speculate beyond the evidence.",
        brief = brief.render(),
        sub_question = task.sub_question,
    );
    if let Some(rationale) = &task.rationale {
        out.push_str(&format!("\n\nWhy this matters: {rationale}"));
    }
    if let Some(language) = language {
        out.push_str(&format!("\n\nWrite everything in {language}."));
    }
    out
}

pub(crate) fn compression_system(language: Option<&str>) -> String {
    let mut out = String::from(
        "You compress research notes into findings. Produce a list of factual claims, each \
         citing at least one of the numbered sources by index. Keep only what the evidence \
         supports; merge duplicates; prefer concrete figures, names, and dates.",
    );
    if let Some(language) = language {
        out.push_str(&format!(" Write the claims in {language}."));
    }
    out
}
