//! Continuation-token paging for `RetrievePropertiesEx`.
//!
//! Strictly sequential: every `ContinueRetrievePropertiesEx` needs the
//! token from the page before it.

use crate::cache::SessionCache;
use crate::envelope;
use crate::error::VsphereResult;
use crate::session::{Session, SoapClient};
use crate::transport::SoapTransport;
use crate::xml::XmlElement;

use log::{debug, warn};

/// Raw pages of one retrieval, in fetch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSet {
    pub pages: Vec<String>,
    /// The page limit stopped the loop while the server still had a token
    pub truncated: bool,
}

/// Continuation token of a page, if the server returned one.
pub fn continuation_token(page: &str) -> VsphereResult<Option<String>> {
    let doc = XmlElement::parse(page)?;
    Ok(doc
        .elements_by_local_name("returnval")
        .into_iter()
        .find_map(|rv| rv.child_text("token")))
}

impl<T: SoapTransport> SoapClient<T> {
    /// Issue `initial` and follow continuation tokens.
    ///
    /// At most `page_limit` pages are fetched (first page included); a
    /// token still pending at that point is dropped with a warning.
    pub async fn fetch_pages(
        &self,
        session: &mut Session,
        cache: &dyn SessionCache,
        initial: &str,
    ) -> VsphereResult<PageSet> {
        let limit = self.config().page_limit.max(1);
        let mut pages = vec![self.call(session, cache, initial).await?];
        let mut truncated = false;

        loop {
            let last = pages.last().map(String::as_str).unwrap_or_default();
            let Some(token) = continuation_token(last)? else {
                break;
            };
            if pages.len() >= limit {
                warn!(
                    "Stopped paging after {} pages with a continuation token still pending; inventory is truncated",
                    pages.len()
                );
                truncated = true;
                break;
            }
            debug!("Fetching page {} (token {token})", pages.len() + 1);
            let page = self
                .call(session, cache, &envelope::continue_retrieve(&token))
                .await?;
            pages.push(page);
        }

        Ok(PageSet { pages, truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::test_support::*;

    #[tokio::test]
    async fn follows_token_until_absent() {
        let t = ScriptedTransport::new(vec![
            ok(retrieve_page(&folder("group-v4", "vm", &[]), Some("abc"))),
            ok(continue_page(&folder("group-v5", "web", &[]), None)),
        ]);
        let client = SoapClient::new(t, config());
        let cache = MemoryCache::new();

        let set = client
            .fetch_pages(&mut Session::new(), &cache, "<initial/>")
            .await
            .unwrap();
        assert_eq!(set.pages.len(), 2);
        assert!(!set.truncated);

        let reqs = client.transport().requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].operation, "ContinueRetrievePropertiesEx");
        assert!(reqs[1].body.contains("<vim25:token>abc</vim25:token>"));
        assert!(set.pages[1].contains("group-v5"));
    }

    #[tokio::test]
    async fn stops_at_page_limit() {
        let mut replies = vec![ok(retrieve_page("", Some("t0")))];
        for i in 1..250 {
            replies.push(ok(continue_page("", Some(&format!("t{i}")))));
        }
        let t = ScriptedTransport::new(replies);
        let client = SoapClient::new(t, config());
        let cache = MemoryCache::new();

        let set = client
            .fetch_pages(&mut Session::new(), &cache, "<initial/>")
            .await
            .unwrap();
        assert_eq!(set.pages.len(), 200);
        assert!(set.truncated);
        assert_eq!(client.transport().count("ContinueRetrievePropertiesEx"), 199);
    }

    #[tokio::test]
    async fn page_limit_is_configurable() {
        let t = ScriptedTransport::new(vec![
            ok(retrieve_page("", Some("a"))),
            ok(continue_page("", Some("b"))),
            ok(continue_page("", Some("c"))),
        ]);
        let mut cfg = config();
        cfg.page_limit = 2;
        let client = SoapClient::new(t, cfg);
        let cache = MemoryCache::new();

        let set = client
            .fetch_pages(&mut Session::new(), &cache, "<initial/>")
            .await
            .unwrap();
        assert_eq!(set.pages.len(), 2);
        assert!(set.truncated);
    }

    #[tokio::test]
    async fn continuation_requests_reauthenticate_individually() {
        let t = ScriptedTransport::new(vec![
            ok(retrieve_page("", Some("abc"))),
            not_authenticated(500),
            login_ok(),
            ok(continue_page("", None)),
        ]);
        let client = SoapClient::new(t, config());
        let cache = MemoryCache::new();

        let set = client
            .fetch_pages(&mut Session::new(), &cache, "<initial/>")
            .await
            .unwrap();
        assert_eq!(set.pages.len(), 2);
        assert_eq!(
            client.transport().operations(),
            vec!["", "ContinueRetrievePropertiesEx", "Login", "ContinueRetrievePropertiesEx"]
        );
    }

    #[test]
    fn token_lookup_ignores_prefixes_and_blank_tokens() {
        let page = envelope(r#"<v:RetrievePropertiesExResponse xmlns:v="urn:vim25"><v:returnval><v:token>xyz</v:token></v:returnval></v:RetrievePropertiesExResponse>"#);
        assert_eq!(continuation_token(&page).unwrap().as_deref(), Some("xyz"));
        assert_eq!(continuation_token(&retrieve_page("", Some("  "))).unwrap(), None);
        assert_eq!(continuation_token(&retrieve_page("", None)).unwrap(), None);
        assert!(continuation_token("<broken").is_err());
    }
}
