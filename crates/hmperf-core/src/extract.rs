//! Bracketed-substring extraction over free text.

use log::warn;
use regex::Regex;

/// Every substring strictly between `left` and `right`, matched non-greedily,
/// in order of occurrence.
///
/// Delimiters are literal text, not patterns. Matches do not span lines.
#[must_use]
pub fn between(left: &str, right: &str, text: &str) -> Vec<String> {
    let rule = format!("{}(.*?){}", regex::escape(left), regex::escape(right));
    let re = match Regex::new(&rule) {
        Ok(re) => re,
        Err(e) => {
            warn!("Cannot build extraction rule {rule:?}: {e}");
            return Vec::new();
        }
    };
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_greedy_in_order() {
        let text = "a u0 com.first/.Main b u0 com.second/.Other";
        assert_eq!(between("u0 ", "/", text), ["com.first", "com.second"]);
    }

    #[test]
    fn stops_at_first_right_delimiter() {
        assert_eq!(between("<", ">", "<a>b>"), ["a"]);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(between("u0 ", "/", "mCurrentFocus=null").is_empty());
        assert!(between("u0 ", "/", "").is_empty());
    }

    #[test]
    fn delimiters_are_literal() {
        assert_eq!(between("(", ")", "f(x) g(y)"), ["x", "y"]);
        assert_eq!(between(".*", "$", "a.*b$ c"), ["b"]);
    }

    #[test]
    fn empty_match_between_adjacent_delimiters() {
        assert_eq!(between("[", "]", "[]"), [""]);
    }
}
