use ammonia;

/// Clean rich-text HTML coming from the editor using the ammonia library.
///
/// Whitelist-based: formatting tags (<b>, <p>, <code>...) survive, while
/// <script>, <iframe> and event-handler attributes are stripped. Applied to
/// question content and course/chapter/knowledge-point descriptions before
/// they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Same as `clean_html` for optional fields.
pub fn clean_optional(input: Option<String>) -> Option<String> {
    input.map(|s| clean_html(&s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<p>Which is <b>faster</b>?<script>alert(1)</script></p>");
        assert_eq!(cleaned, "<p>Which is <b>faster</b>?</p>");
    }

    #[test]
    fn optional_none_stays_none() {
        assert_eq!(clean_optional(None), None);
    }
}
