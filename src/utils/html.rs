// src/utils/html.rs

/// Clean an assistant message body before it is shown to users.
///
/// Only for text that is rendered as HTML. Tool arguments such as question
/// content are plain text (often code) and must not pass through here.
///
/// Whitelist-based: safe formatting tags (like <b>, <p>, <code>) survive, while
/// <script>, <iframe> and event-handler attributes are stripped. Plain text passes
/// through with HTML special characters escaped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
