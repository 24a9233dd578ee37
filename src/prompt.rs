const PROMPT_TEMPLATE: &str = r#"Suggest a lowercase filename of up to {max_chars} characters (up to 10 words) for the included image (a
screenshot) that is descriptive and useful for search.

Do not return any explanation, ONLY the suggested filename.

The filename should be lowercase and contain only letters, numbers, and underscores, with no extension. It should follow
the form main-thing_sub-thing_sub-thing etc.

Some good examples of filenames are: "slide_sql_datagrid" OR "screenshot_python_datetime_conversion" OR
"dashboard_sensor_graphs" OR "email_godaddy_domain_offer" OR "tweet_meme_ai_vs_ml"
"#;

const OCR_EXTENSION: &str = "In addition to the image itself, I include at the end of this message any text that appears in the image to help you come up with a good name. Use it as supporting context and keep the name concise.";

/// Compose the instruction sent alongside the image.
///
/// Blank OCR text is treated the same as no OCR at all.
pub fn build_prompt(ocr_text: Option<&str>, max_chars: usize) -> String {
    let base = PROMPT_TEMPLATE.replace("{max_chars}", &max_chars.to_string());

    match ocr_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => format!("{}\n{}\nText from image:\n{}", base, OCR_EXTENSION, text),
        None => base,
    }
}
