//! Natural language to [`ActionPlan`] through the LLM.

use serde::Deserialize;
use serde_json::{Map, Value};
use toolchat_adapters::conversation::ConversationClient;
use tracing::debug;

use crate::error::PlanError;
use crate::plan::{ActionPlan, ToolKind};

/// Instruction sent as the system prompt of every planning request.
pub const PLANNER_INSTRUCTION: &str = r#"You route user requests to tools. Answer with exactly one JSON object and nothing else:
{"tool": "<name>", "args": {...}}

Supported tools and their args:
- qr_url: {"url": string}
- qr_text: {"text": string}
- qr_wifi: {"ssid": string, "password": string, "auth": "WPA" | "WEP" | "nopass" (optional), "hidden": boolean (optional)}
- qr_vcard: {"name": string, "tel": string, "email": string (optional)}

qr_url and qr_text also accept these optional args:
"error_correction": "L" | "M" | "Q" | "H", "box_size": integer, "border": integer,
"fill_color": string, "back_color": string, "filename": string.
qr_wifi and qr_vcard accept an optional "filename".
- qr_decode: {"image_path": string}
- external_call: {"server": string, "tool": string (optional), "arguments": object (optional)}
- unit_conversion: {"value": number, "unit": "C" | "F"}
- chat: {"prompt": string}

Rules:
- Input that looks like a URL (http://, https://, www.) means qr_url.
- Mentions of wifi, WiFi networks or an SSID mean qr_wifi; use "NOPASS" as the password when none is given.
- Mentions of a contact, business card or vcard mean qr_vcard.
- Requests to turn a text or message into a QR mean qr_text.
- Requests to decode, read or scan a QR image mean qr_decode.
- Requests naming an external or configured server mean external_call.
- Temperatures, Celsius or Fahrenheit mean unit_conversion.
- Anything else is chat, with the user's text as the prompt."#;

#[derive(Debug, Deserialize)]
struct RawPlan {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// Turns free text into a plan, falling back to chat on anything unusable.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanExtractor;

impl PlanExtractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Asks the LLM for a plan for `text`.
    ///
    /// Never fails: an error reply, a reply without a JSON object, or an
    /// unsupported tool all yield `chat` with `text` as the prompt.
    pub async fn extract(&self, client: &mut ConversationClient, text: &str) -> ActionPlan {
        let reply = client.ask_with_system(PLANNER_INSTRUCTION, text).await;
        if reply.is_error() {
            debug!(reply = %reply, "planner request failed; falling back to chat");
            return ActionPlan::chat(text);
        }

        match parse_plan(reply.text(), text) {
            Ok(plan) => {
                debug!(tool = %plan.tool, "plan extracted");
                plan
            }
            Err(err) => {
                debug!(error = %err, category = %err.category(), raw = %reply.text(), "planner reply unusable; falling back to chat");
                ActionPlan::chat(text)
            }
        }
    }
}

/// Parses a planner reply into a plan.
///
/// `original` fills in the prompt of a `chat` plan that carries none.
///
/// # Errors
///
/// Returns [`PlanError`] if the reply has no JSON object, the object is not a
/// plan, or it names an unsupported tool.
pub fn parse_plan(reply: &str, original: &str) -> Result<ActionPlan, PlanError> {
    let span = first_json_object(reply).ok_or(PlanError::NoObject)?;
    let raw: RawPlan = serde_json::from_str(span).map_err(|err| PlanError::Malformed {
        reason: err.to_string(),
    })?;
    let tool = ToolKind::from_wire(&raw.tool).ok_or(PlanError::UnknownTool { tool: raw.tool })?;
    let args = match raw.args {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut plan = ActionPlan::new(tool, args);
    if tool == ToolKind::Chat && !plan.args.get("prompt").is_some_and(Value::is_string) {
        plan.args
            .insert("prompt".into(), Value::String(original.to_owned()));
    }
    Ok(plan)
}

/// Returns the first balanced `{...}` span of `text`.
///
/// Braces inside JSON string literals do not count towards the balance. An
/// opening brace that is never closed is skipped and the search resumes at
/// the next one.
#[must_use]
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        if let Some(len) = balanced_len(&text[start..]) {
            return Some(&text[start..start + len]);
        }
        from = start + 1;
    }
    None
}

/// Byte length of the balanced object `candidate` starts with.
fn balanced_len(candidate: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in candidate.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use toolchat_adapters::testing::ScriptedAdapter;
    use toolchat_adapters::traits::AdapterError;
    use toolchat_audit::AuditLog;

    use super::*;

    #[test]
    fn finds_object_inside_commentary() {
        let reply = "Sure! Here is the plan:\n{\"tool\": \"qr_url\", \"args\": {\"url\": \"https://example.com\"}}\nAnything else?";
        assert_eq!(
            first_json_object(reply),
            Some(r#"{"tool": "qr_url", "args": {"url": "https://example.com"}}"#)
        );
    }

    #[test]
    fn braces_in_strings_do_not_count() {
        let reply = r#"{"tool": "qr_text", "args": {"text": "a } b { \" }"}} trailing }"#;
        assert_eq!(
            first_json_object(reply),
            Some(r#"{"tool": "qr_text", "args": {"text": "a } b { \" }"}}"#)
        );
        assert_eq!(first_json_object("no json {here"), None);
        assert_eq!(first_json_object("}{"), None);
        assert_eq!(first_json_object("nothing"), None);
    }

    #[test]
    fn unclosed_brace_before_the_plan_is_skipped() {
        let reply = r#"Note: { is a brace. {"tool": "qr_url", "args": {"url": "https://example.com"}}"#;
        assert_eq!(
            first_json_object(reply),
            Some(r#"{"tool": "qr_url", "args": {"url": "https://example.com"}}"#)
        );
        let plan = parse_plan(reply, "x").unwrap();
        assert_eq!(plan.tool, ToolKind::QrUrl);
    }

    #[test]
    fn unusable_replies_are_errors() {
        assert_eq!(parse_plan("plain words", "x"), Err(PlanError::NoObject));
        assert!(matches!(
            parse_plan("{not json}", "x"),
            Err(PlanError::Malformed { .. })
        ));
        assert!(matches!(
            parse_plan(r#"{"tool": "send_email", "args": {}}"#, "x"),
            Err(PlanError::UnknownTool { tool }) if tool == "send_email"
        ));
    }

    #[test]
    fn chat_without_prompt_uses_original_text() {
        let plan = parse_plan(r#"{"tool": "chat"}"#, "how are you?").unwrap();
        assert_eq!(plan, ActionPlan::chat("how are you?"));
    }

    #[tokio::test]
    async fn extract_sends_instruction_and_falls_back() {
        let adapter = Arc::new(ScriptedAdapter::new());
        let mut client = ConversationClient::new(adapter.clone(), AuditLog::new());
        adapter.push_text(r#"{"tool": "qr_wifi", "args": {"ssid": "Cafe", "password": "NOPASS"}}"#);
        adapter.push_text("I'd rather just talk.");
        adapter.push(Err(AdapterError::transport("connection refused")));

        let extractor = PlanExtractor::new();
        let wifi = extractor.extract(&mut client, "wifi Cafe, open network").await;
        assert_eq!(wifi.tool, ToolKind::QrWifi);
        assert_eq!(wifi.args["ssid"], "Cafe");

        let chat = extractor.extract(&mut client, "tell me a joke").await;
        assert_eq!(chat, ActionPlan::chat("tell me a joke"));

        let offline = extractor.extract(&mut client, "anything").await;
        assert_eq!(offline, ActionPlan::chat("anything"));

        let requests = adapter.requests();
        assert_eq!(requests[0].system_prompt(), Some(PLANNER_INSTRUCTION));
    }
}
