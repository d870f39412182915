//! Compression: raw notes + sources → schema-constrained cited claims.

use serde::Deserialize;
use sonde_model::{CallParams, ChatBackend, ModelAdapter};
use sonde_types::{Message, ModelError, Source, TokenUsage, WorkerTask};

use crate::prompt;

#[derive(Debug, Deserialize)]
struct Claim {
    text: String,
    source_indices: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct Compressed {
    claims: Vec<Claim>,
    #[serde(default)]
    #[allow(dead_code)] // schema-required echo; the collected list is canonical
    sources: Vec<Source>,
}

fn compression_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "claims": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"},
                        "source_indices": {
                            "type": "array",
                            "items": {"type": "integer", "minimum": 1},
                            "minItems": 1,
                            "description": "1-based indices into the source list"
                        }
                    },
                    "required": ["text", "source_indices"]
                }
            },
            "sources": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": {"type": "string"},
                        "title": {"type": "string"}
                    },
                    "required": ["url", "title"]
                }
            }
        },
        "required": ["claims", "sources"]
    })
}

/// Compress a worker's notes into cited bullet claims.
///
/// Claims citing only out-of-range indices are dropped, so every surviving
/// bullet references at least one valid source.
pub(crate) async fn compress<B: ChatBackend>(
    adapter: &ModelAdapter<B>,
    task: &WorkerTask,
    notes: &[String],
    sources: &[Source],
    language: Option<&str>,
) -> Result<(String, TokenUsage), ModelError> {
    let mut context = format!("Sub-question: {}\n\nSources:\n", task.sub_question);
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
    context.push_str("\nNotes:\n");
    for note in notes {
        context.push_str(note);
        context.push('\n');
    }

    let messages = [
        Message::system(prompt::compression_system(language)),
        Message::user(context),
    ];
    let (compressed, usage) = adapter
        .structured::<Compressed>(&messages, &compression_schema(), &CallParams::default())
        .await?;

    let mut bullets = String::new();
    for claim in compressed.claims {
        let valid: Vec<usize> = claim
            .source_indices
            .into_iter()
            .filter(|&n| n >= 1 && n <= sources.len())
            .collect();
        if valid.is_empty() {
            tracing::debug!(claim = %claim.text, "dropping claim with no valid source index");
            continue;
        }
        bullets.push_str("- ");
        bullets.push_str(&claim.text);
        for n in valid {
            bullets.push_str(&format!(" [{n}]"));
        }
        bullets.push('\n');
    }

    Ok((bullets, usage))
}
