// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction appended to every document-analysis prompt.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every item on the document text provided. \
    Do NOT invent defects, costs, or disclosures that the documents do not support. \
    If the documents are silent on something, leave it out.";

/// Cuts `text` to at most `max_chars` characters on a char boundary.
/// Long inspection reports would otherwise blow the model's context window.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_chars("roof leak", 100), "roof leak");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("épée", 2), "ép");
    }
}
