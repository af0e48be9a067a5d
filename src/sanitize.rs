/// Strip filesystem-unsafe characters and spaces from a title so it can be
/// used as a directory or file name.
pub fn sanitize_title(title: &str) -> String {
    title.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_forbidden_characters() {
        assert_eq!(sanitize_title(r#"a/b\c:d*e?f"g<h>i|j"#), "abcdefghij");
    }

    #[test]
    fn removes_spaces() {
        assert_eq!(sanitize_title("My Comic Title"), "MyComicTitle");
    }

    #[test]
    fn clean_title_passes_through() {
        assert_eq!(sanitize_title("第01卷"), "第01卷");
    }

    #[test]
    fn idempotent() {
        let once = sanitize_title("a: b / c");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn all_forbidden_yields_empty() {
        assert_eq!(sanitize_title(r#"/\:*?"<>| "#), "");
    }
}
