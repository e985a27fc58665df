//! `Link` header pagination.

/// Extracts the `page` number of the `rel="next"` target from a `Link`
/// header, e.g.
///
/// ```text
/// <https://api.github.com/repositories/1/releases?per_page=100&page=2>; rel="next",
/// <https://api.github.com/repositories/1/releases?per_page=100&page=5>; rel="last"
/// ```
pub(crate) fn next_page(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|param| param.trim() == r#"rel="next""#) {
            return None;
        }
        let url = target.trim().trim_start_matches('<').trim_end_matches('>');
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("page=")?.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_next_page_among_relations() {
        let link = r#"<https://api.github.com/repositories/1/releases?per_page=100&page=1>; rel="prev", <https://api.github.com/repositories/1/releases?per_page=100&page=3>; rel="next", <https://api.github.com/repositories/1/releases?per_page=100&page=5>; rel="last""#;
        assert_eq!(next_page(link), Some(3));
    }

    #[test]
    fn last_page_has_no_next() {
        let link = r#"<https://api.github.com/repositories/1/releases?per_page=100&page=1>; rel="first", <https://api.github.com/repositories/1/releases?per_page=100&page=4>; rel="prev""#;
        assert_eq!(next_page(link), None);
    }

    #[test]
    fn per_page_is_not_mistaken_for_page() {
        let link = r#"<https://api.github.com/repositories/1/releases?per_page=100>; rel="next""#;
        assert_eq!(next_page(link), None);
    }

    #[test]
    fn empty_header_has_no_next() {
        assert_eq!(next_page(""), None);
    }
}
