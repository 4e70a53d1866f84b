//! Prompts for the external table-extraction service.
//!
//! Callers can override the default via
//! [`crate::config::ConversionConfig::system_prompt`]. Whatever the service
//! answers is still re-normalised, so the rules below improve the odds of a
//! clean answer but are not relied on.

/// Default system prompt for extracting tables from a PDF or image.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You extract tabular data from documents and return it as CSV in the Brazilian convention.

Follow these rules precisely:

1. Separate columns with a SEMICOLON (;).
2. Use a COMMA (,) as the decimal separator (example: 1234,56). Do not use thousands separators.
3. Write every date as DD/MM/YYYY (example: 26/02/2026).
4. Wrap EVERY value in double quotes (example: "value1";"value2").
5. The first line must be the header row.
6. If the document holds several tables that share the same columns, consolidate them into one.
7. Output ONLY the CSV content: no explanations, no commentary, no code fences."#;

/// User-turn text that names what the attachment is.
pub fn extraction_request(media_type: &str) -> String {
    let subject = if media_type.starts_with("image/") {
        "this image"
    } else {
        "this PDF document"
    };
    format!("Extract every table from {subject} and convert it to CSV following the rules.")
}
