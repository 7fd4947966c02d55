/// Slice one page out of an ordered id/item list. Pages are 1-based.
pub fn page_slice<T: Clone>(items: &[T], page: usize, per_page: usize) -> Vec<T> {
    let page = page.max(1);
    items
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect()
}

/// Previous/next page links for the API envelope. `None` when the edge is
/// reached; `total` is the full item count before slicing.
pub fn page_urls(base: &str, page: usize, total: usize, per_page: usize) -> (Option<String>, Option<String>) {
    let page = page.max(1);
    let prev = if page > 1 {
        Some(format!("{}?page={}", base, page - 1))
    } else {
        None
    };
    let next = if page * per_page < total {
        Some(format!("{}?page={}", base, page + 1))
    } else {
        None
    };
    (prev, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_pages_in_order() {
        let items: Vec<usize> = (0..25).collect();
        assert_eq!(page_slice(&items, 1, 10), (0..10).collect::<Vec<_>>());
        assert_eq!(page_slice(&items, 3, 10), (20..25).collect::<Vec<_>>());
        assert!(page_slice(&items, 4, 10).is_empty());
    }

    #[test]
    fn page_zero_behaves_like_page_one() {
        let items: Vec<usize> = (0..5).collect();
        assert_eq!(page_slice(&items, 0, 10), page_slice(&items, 1, 10));
    }

    #[test]
    fn urls_stop_at_the_edges() {
        assert_eq!(page_urls("/api/v1/posts/", 1, 25, 10), (None, Some("/api/v1/posts/?page=2".to_string())));
        assert_eq!(
            page_urls("/api/v1/posts/", 2, 25, 10),
            (Some("/api/v1/posts/?page=1".to_string()), Some("/api/v1/posts/?page=3".to_string()))
        );
        assert_eq!(page_urls("/api/v1/posts/", 3, 25, 10), (Some("/api/v1/posts/?page=2".to_string()), None));
        assert_eq!(page_urls("/api/v1/posts/", 1, 0, 10), (None, None));
    }
}
