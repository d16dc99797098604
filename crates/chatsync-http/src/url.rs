//! URL construction helpers for the chat REST API.
//!
//! Pure functions so every call builds URLs the same way.

use url::Url;

use chatsync_core::domain::ConversationFilters;

/// Append `segments` to the base URL's path.
fn with_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    let base_path = url.path().trim_end_matches('/').to_string();
    let tail: Vec<String> = segments
        .iter()
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();
    url.set_path(&format!("{base_path}/{}", tail.join("/")));
    url
}

/// `GET {base}/messages/{participant}?page=&per_page=`
pub fn build_history_url(base: &Url, participant_id: &str, page: u32, per_page: u32) -> Url {
    let mut url = with_path(base, &["messages", participant_id]);
    url.set_query(Some(&format!("page={}&per_page={}", page.max(1), per_page.clamp(1, 200))));
    url
}

/// `GET {base}/conversations` with optional filters. Empty filters add no
/// query string.
pub fn build_conversations_url(base: &Url, filters: &ConversationFilters) -> Url {
    let mut url = with_path(base, &["conversations"]);

    let mut params = Vec::new();
    if let Some(role) = filters.role {
        params.push(format!("role={}", role.as_str()));
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params.push(format!("search={}", urlencoding::encode(search)));
    }
    if filters.unread_only {
        params.push("unread_only=1".to_string());
    }

    if !params.is_empty() {
        url.set_query(Some(&params.join("&")));
    }
    url
}

/// `POST {base}/messages`
pub fn build_send_url(base: &Url) -> Url {
    with_path(base, &["messages"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::domain::ParticipantRole;

    fn base() -> Url {
        Url::parse("https://market.example.com/api/").unwrap()
    }

    #[test]
    fn test_history_url() {
        let url = build_history_url(&base(), "42", 3, 20);
        assert_eq!(
            url.as_str(),
            "https://market.example.com/api/messages/42?page=3&per_page=20"
        );
    }

    #[test]
    fn test_history_url_encodes_participant() {
        let url = build_history_url(&base(), "a b/c", 0, 500);
        assert!(url.path().ends_with("/messages/a%20b%2Fc"));
        assert_eq!(url.query(), Some("page=1&per_page=200"));
    }

    #[test]
    fn test_conversations_url_without_filters() {
        let url = build_conversations_url(&base(), &ConversationFilters::default());
        assert_eq!(url.as_str(), "https://market.example.com/api/conversations");
    }

    #[test]
    fn test_conversations_url_with_filters() {
        let filters = ConversationFilters {
            role: Some(ParticipantRole::Seller),
            search: Some(" red bike ".into()),
            unread_only: true,
        };
        let url = build_conversations_url(&base(), &filters);
        assert_eq!(url.query(), Some("role=seller&search=red%20bike&unread_only=1"));
    }

    #[test]
    fn test_send_url() {
        let base = Url::parse("http://localhost:8000/api").unwrap();
        assert_eq!(build_send_url(&base).as_str(), "http://localhost:8000/api/messages");
    }
}
