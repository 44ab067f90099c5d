//! Supported transcription languages and their display labels.

/// Language codes accepted by the transcription provider, with UI labels.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("es", "Spanish"),
    ("en", "English"),
    ("multi", "Multilingual"),
    ("fr", "French"),
    ("pt", "Portuguese"),
    ("de", "German"),
    ("it", "Italian"),
    ("hi", "Hindi"),
    ("ja", "Japanese"),
    ("ru", "Russian"),
    ("nl", "Dutch"),
];

/// Display label for a language code; unknown codes fall back to the code.
pub fn language_label(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_labels() {
        assert_eq!(language_label("es"), "Spanish");
        assert_eq!(language_label("multi"), "Multilingual");
        assert_eq!(language_label("zz"), "zz");
    }
}
