//! Prompt assembly for the text-generation endpoint.
//!
//! The endpoint takes a single text blob, so transcripts are flattened into
//! `User:` / `Assistant:` turns ending with an open `Assistant:` cue.

use crate::conversation::Message;

const ASSISTANT_PREAMBLE: &str = "You are an AI medical expert whose primary role is to provide \
accurate and concise medical advice. Your main focus should be on addressing health-related \
questions and concerns. You have access to the following events information, but only reference \
it if the user explicitly asks about events. If the user's query is medical in nature, do not \
include details about events.";

const ASSISTANT_INSTRUCTIONS: &str = "Based on the context above, please provide a clear and \
concise response to the following query. If the query explicitly pertains to events, list the \
relevant events along with their dates; otherwise, focus on the medical advice.";

/// Build the chat prompt: preamble, event context, prior turns oldest first, then the new turn.
///
/// History is not truncated.
pub fn chat_prompt(event_context: &str, history: &[Message], user_message: &str) -> String {
    let mut prompt = format!(
        "{ASSISTANT_PREAMBLE}\n\nEvents information (use only if relevant):\n{event_context}\n\n\
         {ASSISTANT_INSTRUCTIONS}\n\n"
    );
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in history {
            prompt.push_str(message.role.label());
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push('\n');
        }
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(user_message);
    prompt.push_str("\nAssistant:");
    prompt
}

/// Build the guessing-game prompt for an assistant "living" in `year`.
pub fn game_prompt(year: i32, question: &str) -> String {
    format!(
        "You are an AI assistant living in the year {year}. This is a guessing game where users \
         must figure out what year you are from based on your knowledge and responses. \
         EXTREMELY IMPORTANT RULES:\n\
         1. NEVER reveal the year you are from - this is the most important rule\n\
         2. NEVER confirm or deny specific years or decades\n\
         3. Only talk about events, culture, and technology that existed in your time\n\
         4. If asked about the year or time period, deflect the question politely\n\
         5. Keep responses focused and concise - maximum two sentences\n\n\
         User: {question}\nAssistant:"
    )
}

/// Keep the first `max` sentences of `text`, split on `.`.
///
/// Empty pieces are dropped and the result always ends with a period.
pub fn first_sentences(text: &str, max: usize) -> String {
    let sentences: Vec<&str> = text
        .trim()
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max)
        .collect();
    format!("{}.", sentences.join(". "))
}

/// Replace literal mentions of the hidden year so a game answer cannot leak it.
pub fn redact_year(answer: &str, year: i32) -> String {
    answer.replace(&year.to_string(), "[redacted]")
}
