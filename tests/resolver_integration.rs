//! Integration tests for the tiered document resolver: page-tier hits,
//! document-tier hits with page indexes, traversal bounds, and graceful
//! exhaustion.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atcsync_core::config::{FetchSettings, ResolverSettings};
use atcsync_core::fetch::{Fetcher, RequestPacer};
use atcsync_core::resolver::{
    DocumentError, DocumentResolver, DocumentTextExtractor, ExtractionSource,
};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Stub document backend: returns the same preset pages for every document.
struct StubDocuments {
    pages: Vec<String>,
}

impl StubDocuments {
    fn with_pages(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| (*p).to_string()).collect(),
        })
    }
}

impl DocumentTextExtractor for StubDocuments {
    fn extract_pages(&self, _bytes: &[u8], _max_pages: usize) -> Result<Vec<String>, DocumentError> {
        Ok(self.pages.clone())
    }
}

fn resolver_for(
    server: &MockServer,
    documents: Arc<dyn DocumentTextExtractor>,
    settings: ResolverSettings,
) -> DocumentResolver {
    let fetch = FetchSettings {
        pacing: Duration::ZERO,
        ..FetchSettings::default()
    };
    let fetcher = Fetcher::new(&fetch, Arc::new(RequestPacer::disabled())).unwrap();
    let templates = vec![format!("{}/record/{{id}}", server.uri())];
    DocumentResolver::new(fetcher, documents, settings, templates)
}

fn test_settings() -> ResolverSettings {
    ResolverSettings {
        max_links_per_page: 4,
        link_cues: vec!["notice".to_string()],
        max_depth: 2,
        min_document_bytes: 16,
        max_document_pages: 0,
    }
}

/// A body that passes the PDF sniff and the minimum-size guard.
fn pdf_bytes() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4 ".to_vec();
    bytes.extend(std::iter::repeat_n(b'x', 64));
    bytes
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

// ---- Fetcher text path ----

#[tokio::test]
async fn test_get_text_decodes_and_normalizes_body() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    // Windows-1252 body with a stray NBSP and ragged spacing.
    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"r\xE9trocession   \xA0 liste".to_vec(), "text/html"),
        )
        .mount(&server)
        .await;

    let fetch = FetchSettings {
        pacing: Duration::ZERO,
        ..FetchSettings::default()
    };
    let fetcher = Fetcher::new(&fetch, Arc::new(RequestPacer::disabled())).unwrap();
    let text = fetcher
        .get_text(&format!("{}/index", server.uri()))
        .await
        .unwrap();
    assert_eq!(text, "rétrocession liste");
}

// ---- Page tier ----

#[tokio::test]
async fn test_code_found_in_page_text() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/record/61266250"))
        .respond_with(html_page(
            "<html><body><p>Antipsychotique, code ATC : N05AH03.</p></body></html>",
        ))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, StubDocuments::with_pages(&[]), test_settings());
    let result = resolver.resolve("61266250", None).await;

    assert_eq!(result.code.as_deref(), Some("N05AH03"));
    assert_eq!(result.level4.as_deref(), Some("N05AH"));
    assert_eq!(result.source, ExtractionSource::Page);
    assert!(result.source_url.unwrap().ends_with("/record/61266250"));
    assert_eq!(result.page_index, None);
}

#[tokio::test]
async fn test_script_text_is_not_searched() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/record/1"))
        .respond_with(html_page(
            "<html><body><script>var x = 'code ATC : N05AH03';</script></body></html>",
        ))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, StubDocuments::with_pages(&[]), test_settings());
    let result = resolver.resolve("1", None).await;
    assert!(!result.found());
}

// ---- Document tier ----

#[tokio::test]
async fn test_code_found_in_linked_document_with_page_index() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/record/1"))
        .respond_with(html_page(
            r#"<html><body><a href="/doc/spec.pdf">Document</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc/spec.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf_bytes(), "application/pdf"))
        .mount(&server)
        .await;

    let documents = StubDocuments::with_pages(&["nothing here", "Statine, code ATC : C10AA07"]);
    let resolver = resolver_for(&server, documents, test_settings());
    let result = resolver.resolve("1", None).await;

    assert_eq!(result.code.as_deref(), Some("C10AA07"));
    assert_eq!(result.source, ExtractionSource::Document);
    assert_eq!(result.page_index, Some(2));
    assert!(result.source_url.unwrap().ends_with("/doc/spec.pdf"));
}

#[tokio::test]
async fn test_undersized_document_is_discarded() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/record/1"))
        .respond_with(html_page(
            r#"<html><body><a href="/doc/tiny.pdf">Document</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    // Below min_document_bytes: treated as an error page, never extracted.
    Mock::given(method("GET"))
        .and(path("/doc/tiny.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    let documents = StubDocuments::with_pages(&["code ATC : C10AA07"]);
    let resolver = resolver_for(&server, documents, test_settings());
    let result = resolver.resolve("1", None).await;
    assert!(!result.found());
}

#[tokio::test]
async fn test_known_link_pointing_at_document_is_tried_first() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/files/direct.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf_bytes(), "application/pdf"))
        .mount(&server)
        .await;

    let documents = StubDocuments::with_pages(&["code ATC : B01AC06"]);
    let resolver = resolver_for(&server, documents, test_settings());
    let known_link = format!("{}/files/direct.pdf", server.uri());
    let result = resolver.resolve("1", Some(&known_link)).await;

    assert_eq!(result.code.as_deref(), Some("B01AC06"));
    assert_eq!(result.source, ExtractionSource::Document);
    assert_eq!(result.page_index, Some(1));
}

// ---- Traversal bounds ----

#[tokio::test]
async fn test_link_cycle_terminates_without_a_code() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    // Two cue-labelled pages linking to each other; no code anywhere.
    Mock::given(method("GET"))
        .and(path("/record/1"))
        .respond_with(html_page(
            r#"<html><body><a href="/a">notice</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(
            r#"<html><body><a href="/b">notice</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(
            r#"<html><body><a href="/a">notice</a><a href="/record/1">notice</a></body></html>"#,
        ))
        .mount(&server)
        .await;

    let resolver = resolver_for(&server, StubDocuments::with_pages(&[]), test_settings());
    let result = resolver.resolve("1", None).await;

    assert!(!result.found());
    assert_eq!(result.source, ExtractionSource::None);
}

#[tokio::test]
async fn test_exhaustion_yields_empty_result_not_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    // No mocks mounted: every candidate 404s.
    let resolver = resolver_for(&server, StubDocuments::with_pages(&[]), test_settings());
    let result = resolver.resolve("99999999", None).await;

    assert!(!result.found());
    assert_eq!(result.source, ExtractionSource::None);
    assert_eq!(result.source_url, None);
}
