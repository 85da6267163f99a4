use async_trait::async_trait;
use mockall::mock;
use regform_core::prelude::*;
use regform_core::ListingError;
use regform_test_utils::{answers, registration_document, registration_schema};
use serde_json::json;

mock! {
    pub Listing {}

    #[async_trait]
    impl FileListing for Listing {
        async fn list_files(&self, container_id: &str) -> Result<Vec<String>, ListingError>;
    }
}

fn with_data_answer() -> Document {
    let mut doc = registration_document();
    doc.unserialize(&answers(json!({"data": ["abc12", "/raw/plots.csv"]})))
        .unwrap();
    doc
}

#[tokio::test]
async fn test_load_files_stores_listing() {
    let mut listing = MockListing::new();
    listing
        .expect_list_files()
        .times(1)
        .returning(|_| Ok(vec!["raw/plots.csv".to_string(), "notes.txt".to_string()]));

    let mut doc = with_data_answer();
    let data = doc.lookup("data").unwrap();
    assert!(doc.files(data).is_none());

    let count = doc.load_files(data, &listing).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(doc.files(data).map(<[String]>::len), Some(2));
}

#[tokio::test]
async fn test_load_files_propagates_provider_error() {
    let mut listing = MockListing::new();
    listing
        .expect_list_files()
        .times(1)
        .returning(|_| Err(ListingError::Failed("timeout".to_string())));

    let mut doc = with_data_answer();
    let data = doc.lookup("data").unwrap();
    let err = doc.load_files(data, &listing).await.unwrap_err();
    assert!(matches!(err, DocumentError::Listing(ListingError::Failed(_))));
    assert!(doc.files(data).is_none());
}

#[tokio::test]
async fn test_load_files_without_container_is_noop() {
    let listing = MockListing::new();
    let mut doc = registration_document();
    let data = doc.lookup("data").unwrap();
    assert_eq!(doc.load_files(data, &listing).await.unwrap(), 0);
}

#[tokio::test]
async fn test_load_files_rejects_non_file_node() {
    let listing = MockListing::new();
    let mut doc = registration_document();
    let title = doc.lookup("title").unwrap();
    assert!(matches!(
        doc.load_files(title, &listing).await,
        Err(DocumentError::NotAnItem { .. })
    ));
}

#[tokio::test]
async fn test_pending_containers_load_once() {
    let mut listing = MockListing::new();
    listing
        .expect_list_files()
        .times(2)
        .returning(|_| Ok(vec!["a.csv".to_string()]));

    let mut doc = Document::builder(registration_schema())
        .containers(["c1", "c2"])
        .build()
        .unwrap();

    assert_eq!(doc.load_pending_files(&listing).await, 2);
    assert_eq!(doc.load_pending_files(&listing).await, 0);
}

#[tokio::test]
async fn test_pending_failures_are_skipped() {
    let listing = StaticListing::new().with_container("c1", ["a.csv"]);
    let mut doc = Document::builder(registration_schema())
        .containers(["c1", "missing"])
        .build()
        .unwrap();
    assert_eq!(doc.load_pending_files(&listing).await, 1);
}

#[test]
fn test_stale_responses_are_dropped() {
    let mut doc = with_data_answer();
    let data = doc.lookup("data").unwrap();

    let stale = doc.refresh_files("abc12");
    let fresh = doc.refresh_files("abc12");
    assert!(!doc.receive_files(&stale, vec!["old.csv".to_string()]));
    assert!(doc.files(data).is_none());

    assert!(doc.receive_files(&fresh, vec!["new.csv".to_string()]));
    assert_eq!(doc.files(data), Some(&["new.csv".to_string()][..]));
}

#[test]
fn test_select_container_requests_listing_once() {
    let mut doc = registration_document();
    let data = doc.lookup("data").unwrap();

    let request = doc.select_container(data, "xyz").unwrap();
    assert!(request.is_some());
    assert_eq!(doc.known_containers().first().map(String::as_str), Some("xyz"));

    doc.set_file(data, "/a.csv").unwrap();
    assert_eq!(doc.serialize_node(data), Some(json!(["xyz", "/a.csv"])));

    // same container: path kept, no second request
    assert!(doc.select_container(data, "xyz").unwrap().is_none());
    assert_eq!(doc.node(data).unwrap().as_file().unwrap().path(), "/a.csv");
}
