//! Plain-text rendering of answers, context and ingestion results for stdout.

use docrag_core::types::{Answer, Context};
use docrag_core::Error;

pub fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        return "[No sources]".to_string();
    }
    sources.iter().enumerate().map(|(i, s)| format!("{}. {s}", i + 1)).collect::<Vec<_>>().join("\n")
}

pub fn format_answer(answer: &Answer) -> String {
    format!("{}\n\n=== SOURCES ===\n{}", answer.text, format_sources(&answer.sources))
}

pub fn format_search(context: &Context) -> String {
    let body = if context.is_empty() { "[No matching text found]" } else { context.text.as_str() };
    format!("=== CONTEXT ===\n{body}\n\n=== SOURCES ===\n{}", format_sources(&context.sources))
}

/// `error[Kind]: message`, the form every failure takes on stderr.
pub fn format_error(err: &Error) -> String {
    format!("error[{}]: {err}", err.kind())
}

/// Process exit status for a failure.
pub fn exit_code(err: &Error) -> u8 {
    match err {
        Error::InvalidConfig(_) => 2,
        Error::UnsupportedFormat { .. } | Error::Read { .. } => 4,
        _ => 1,
    }
}
