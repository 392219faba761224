use std::sync::{Arc, Mutex};

use creative_provisioner_core::batch::{run_batch, BatchError, BatchRecord};
use creative_provisioner_core::contract::{
    Credentials, FolderSet, MockArchiveFetcher, MockCatalogClient,
};
use creative_provisioner_core::provision::{CreativeKind, Outcome, Provisioner};
use serde_json::json;

fn folder(id: &str, name: &str) -> FolderSet {
    FolderSet {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: None,
        default_target_url: None,
        product_category_id: Some(json!(3)),
    }
}

fn record(advertiser_id: Option<&str>, name: &str) -> BatchRecord {
    BatchRecord {
        advertiser_id: advertiser_id.map(str::to_string),
        creative_name: Some(name.to_string()),
        campaign_period: None,
        target_url: Some("https://shop.example".to_string()),
        payload_source: None,
    }
}

/// A catalog whose child list grows with every folder created, so numbering
/// can be observed across sequential records.
fn growing_catalog(created_names: Arc<Mutex<Vec<String>>>) -> MockCatalogClient {
    let mut catalog = MockCatalogClient::new();
    catalog
        .expect_list_folders()
        .returning(|_, _| Ok(vec![folder("parent", "Link TXT")]));
    catalog
        .expect_get_folder()
        .returning(|id, _| Ok(folder(id, "Link TXT")));
    let listed = created_names.clone();
    catalog.expect_list_children().returning(move |_, _, _| {
        Ok(listed
            .lock()
            .unwrap()
            .iter()
            .map(|name| folder("child", name))
            .collect())
    });
    catalog.expect_create_folder().returning(move |new_folder, _| {
        let mut names = created_names.lock().unwrap();
        names.push(new_folder.name);
        Ok(format!("folder-{}", names.len()))
    });
    catalog
        .expect_create_creative()
        .returning(|creative, _| Ok(format!("creative-in-{}", creative.folder_id)));
    catalog
}

#[tokio::test]
async fn batch_runs_sequentially_and_skips_incomplete_records() {
    let created_names = Arc::new(Mutex::new(Vec::new()));
    let provisioner = Provisioner::new(
        growing_catalog(created_names.clone()),
        MockArchiveFetcher::new(),
    );

    let records = vec![
        record(Some("123"), "First"),
        record(None, "Broken"),
        record(Some("123"), "Second"),
    ];
    let report = run_batch(&provisioner, records, CreativeKind::Link, &Credentials::new("k"))
        .await
        .expect("batch should run");

    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert!(report.results[1].message.contains("advertiserId"));
    assert!(report.results[2].success);
    assert_eq!(report.count(Outcome::Success), 2);
    assert_eq!(report.count(Outcome::Failure), 1);

    let names = created_names.lock().unwrap();
    assert_eq!(*names, vec!["1 - First".to_string(), "2 - Second".to_string()]);
}

#[tokio::test]
async fn empty_batch_is_an_error() {
    let provisioner = Provisioner::new(MockCatalogClient::new(), MockArchiveFetcher::new());
    let err = run_batch(
        &provisioner,
        Vec::<BatchRecord>::new(),
        CreativeKind::Link,
        &Credentials::new("k"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BatchError::EmptyInput));
}

#[tokio::test]
async fn report_serialises_as_json_list() {
    let provisioner = Provisioner::new(MockCatalogClient::new(), MockArchiveFetcher::new());
    let report = run_batch(
        &provisioner,
        vec![BatchRecord::default()],
        CreativeKind::Display,
        &Credentials::new("k"),
    )
    .await
    .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["results"][0]["success"], json!(false));
    assert_eq!(value["results"][0]["outcome"], json!("failure"));
    assert!(value["results"][0]["createdCreativeIds"].is_array());
}
