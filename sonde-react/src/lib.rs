#![deny(missing_docs)]
//! ReAct text protocol — a wire format standing in for native tool calls.
//!
//! Backends that cannot emit structured tool calls are instructed to reply
//! in a fixed `Thought / Action / Action Input` grammar. This crate is the
//! codec for that grammar: [`preamble`] renders the instruction block,
//! [`decode`] parses a model reply into a [`ReactReply`], [`encode`] is its
//! inverse, and [`observation`] formats tool results for the transcript.
//! No I/O happens here; the codec is tested independently of any model.

use sonde_types::{ToolCall, ToolSchema};

/// Marker introducing the reasoning section.
const THOUGHT: &str = "Thought:";
/// Marker introducing the tool name.
const ACTION: &str = "Action:";
/// Marker introducing the JSON argument object.
const ACTION_INPUT: &str = "Action Input:";
/// Marker introducing a final free-text answer.
const FINAL_ANSWER: &str = "Final Answer:";

/// Observation message sent back when a reply did not parse, nudging the
/// model to retry in the required format.
pub const PARSE_NUDGE: &str =
    "your last reply was not parseable; reply again using the required format";

/// A decoded model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactReply {
    /// The model wants a tool invoked.
    Action {
        /// Reasoning preceding the call.
        thought: String,
        /// The decoded call. Its `id` is empty; callers assign one.
        call: ToolCall,
    },
    /// The model is done.
    Final {
        /// Reasoning preceding the answer.
        thought: String,
        /// The free-text answer.
        answer: String,
    },
}

/// Why a reply failed to decode.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// Neither an `Action:` pair nor a `Final Answer:` was found.
    #[error("reply contains neither an Action nor a Final Answer")]
    MissingAction,
    /// `Action:` was present but `Action Input:` was not.
    #[error("Action without Action Input")]
    MissingInput,
    /// No balanced JSON object followed `Action Input:`.
    #[error("Action Input is not a JSON object")]
    MissingObject,
    /// The extracted text was not valid JSON.
    #[error("invalid Action Input JSON: {0}")]
    BadJson(String),
}

/// Render the system-prompt block that teaches the grammar and lists every
/// available tool with its schema.
pub fn preamble(tools: &[ToolSchema]) -> String {
    let mut out = String::from(
        "You can use the following tools. To use one, reply with EXACTLY this structure:\n\
         \n\
         Thought: your one-paragraph reasoning about what to do next\n\
         Action: the tool name\n\
         Action Input: a single-line JSON object matching the tool's parameter schema\n\
         \n\
         When you are done, reply with:\n\
         \n\
         Thought: your reasoning\n\
         Final Answer: your answer\n\
         \n\
         Use one Action per reply and wait for the Observation before the next step.\n\
         \n\
         Available tools:\n",
    );
    for tool in tools {
        out.push_str(&format!(
            "\n- {name}: {desc}\n  Parameters: {schema}\n",
            name = tool.name,
            desc = tool.description,
            schema = tool.parameters,
        ));
    }
    out
}

/// Decode a model reply into a [`ReactReply`].
///
/// A `Final Answer:` is terminal when it appears before the first
/// `Action:` (or there is no `Action:` at all), and otherwise only when
/// no valid `Action:` / `Action Input:` pair parses — so tool arguments
/// that happen to contain the literal marker cannot fake a terminal
/// reply. The JSON after `Action Input:` is extracted greedily through
/// the matching closing brace, so trailing prose does not break parsing.
/// Error messages never echo the raw reply.
pub fn decode(text: &str) -> Result<ReactReply, ParseError> {
    let final_pos = text.find(FINAL_ANSWER);
    let action_pos = text.find(ACTION);

    if let Some(pos) = final_pos {
        if action_pos.is_none_or(|action| pos < action) {
            return Ok(final_reply(text, pos));
        }
    }

    match decode_action(text, action_pos) {
        Ok(reply) => Ok(reply),
        Err(error) => match final_pos {
            // Unparseable Action text followed by a Final Answer is still
            // a terminal reply.
            Some(pos) => Ok(final_reply(text, pos)),
            None => Err(error),
        },
    }
}

fn final_reply(text: &str, pos: usize) -> ReactReply {
    ReactReply::Final {
        thought: extract_thought(&text[..pos]),
        answer: text[pos + FINAL_ANSWER.len()..].trim().to_string(),
    }
}

fn decode_action(text: &str, action_pos: Option<usize>) -> Result<ReactReply, ParseError> {
    let action_pos = action_pos.ok_or(ParseError::MissingAction)?;
    let after_action = &text[action_pos + ACTION.len()..];
    let input_rel = after_action
        .find(ACTION_INPUT)
        .ok_or(ParseError::MissingInput)?;
    let name = after_action[..input_rel]
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if name.is_empty() {
        return Err(ParseError::MissingAction);
    }

    let input_text = &after_action[input_rel + ACTION_INPUT.len()..];
    let json_text = extract_object(input_text).ok_or(ParseError::MissingObject)?;
    let arguments: serde_json::Value =
        serde_json::from_str(json_text).map_err(|e| ParseError::BadJson(e.to_string()))?;
    if !arguments.is_object() {
        return Err(ParseError::MissingObject);
    }

    Ok(ReactReply::Action {
        thought: extract_thought(&text[..action_pos]),
        call: ToolCall {
            id: String::new(),
            name,
            arguments,
        },
    })
}

/// Encode a reply back into grammar text. `decode(encode(r))` preserves the
/// `{name, arguments}` pair for any arguments serializable as single-line
/// JSON.
pub fn encode(reply: &ReactReply) -> String {
    match reply {
        ReactReply::Action { thought, call } => format!(
            "{THOUGHT} {thought}\n{ACTION} {name}\n{ACTION_INPUT} {args}",
            name = call.name,
            args = call.arguments,
        ),
        ReactReply::Final { thought, answer } => {
            format!("{THOUGHT} {thought}\n{FINAL_ANSWER} {answer}")
        }
    }
}

/// Format a tool result payload as an observation line.
pub fn observation(payload: &str) -> String {
    format!("Observation: {payload}")
}

/// The reasoning between `Thought:` and the end of the given slice.
fn extract_thought(head: &str) -> String {
    match head.find(THOUGHT) {
        Some(pos) => head[pos + THOUGHT.len()..].trim().to_string(),
        None => head.trim().to_string(),
    }
}

/// Extract a balanced `{...}` object starting at the first `{`, honoring
/// JSON string literals and escapes.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
