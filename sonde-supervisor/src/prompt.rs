//! Prompt builders for the supervisor phases.

use sonde_types::{Message, ResearchBrief};

pub(crate) fn clarify_system() -> String {
    "Decide whether the user's research request is specific enough to start working on. Ask for \
     clarification only when the request is genuinely ambiguous about what is being asked — \
     scope, subject, or success criteria — not merely broad."
        .to_string()
}

pub(crate) fn clarify_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "need_clarification": {
                "type": "boolean",
                "description": "Whether a clarifying question must be asked before research"
            },
            "question": {
                "type": "string",
                "description": "The single clarifying question to ask, when needed"
            }
        },
        "required": ["need_clarification"]
    })
}

pub(crate) fn brief_system(language: Option<&str>) -> String {
    let mut out = String::from(
        "Turn the conversation into a research brief: restate the question precisely, list what \
         a complete answer must cover, and capture any hard constraints the user stated. Do not \
         add constraints the user did not give.",
    );
    if let Some(language) = language {
        out.push_str(&format!(" Set the language field to \"{language}\"."));
    }
    out
}

pub(crate) fn supervisor_system(brief: &ResearchBrief, language: Option<&str>) -> String {
    let mut out = format!(
        "You lead a research session and decide what gets investigated.\n\n\
         {brief}\n\n\
         Each turn, reflect on what the findings so far cover, then either delegate new \
         sub-questions with delegate_research — several per turn when independent angles exist, \
         each self-contained since researchers share no context — or call research_complete once \
         the brief's success criteria are met. Delegate narrow questions; avoid re-delegating \
         ground already covered.",
        brief = brief.render(),
    );
    if let Some(language) = language {
        out.push_str(&format!("\n\nWork in {language}."));
    }
    out
}

/// Flatten the user's messages into one prompt block for the clarify and
/// brief phases.
pub(crate) fn render_user_messages(messages: &[Message]) -> String {
    let mut out = String::from("Conversation so far:\n");
    for message in messages {
        out.push_str(&format!("{:?}: {}\n", message.role, message.content));
    }
    out
}
