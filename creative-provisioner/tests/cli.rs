use assert_cmd::Command;
use mockito::Matcher;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("creative-provisioner").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("link")
                .and(predicate::str::contains("display"))
                .and(predicate::str::contains("batch"))
                .and(predicate::str::contains("verify-key")),
        );
}

#[test]
fn link_without_api_key_fails_before_any_request() {
    let mut cmd = Command::cargo_bin("creative-provisioner").expect("Binary exists");
    cmd.args([
        "link",
        "--advertiser-id",
        "123",
        "--name",
        "Promo",
        "--target-url",
        "https://shop.example",
    ])
    .env_remove("CREATIVE_API_KEY")
    .env("CREATIVE_API_BASE_URL", "http://127.0.0.1:9")
    .assert()
    .failure()
    .stderr(predicate::str::contains("CREATIVE_API_KEY"));
}

#[test]
fn link_happy_flow_numbers_the_new_folder() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/creatives/creativeset/list")
        .match_query(Matcher::Exact("advertiserId=123".into()))
        .with_status(200)
        .with_body(json!([{"creativeSetId": "parent", "name": "Link TXT"}]).to_string())
        .create();
    server
        .mock("GET", "/creatives/creativeset/single")
        .match_query(Matcher::UrlEncoded("creativeSetId".into(), "parent".into()))
        .with_status(200)
        .with_body(
            json!({
                "creativeSetId": "parent",
                "name": "Link TXT",
                "productCategoryId": 5,
                "defaultTargetURL": "https://shop.example"
            })
            .to_string(),
        )
        .create();
    server
        .mock("GET", "/creatives/creativeset/list")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("advertiserId".into(), "123".into()),
            Matcher::UrlEncoded("creativeSetId".into(), "parent".into()),
        ]))
        .with_status(200)
        .with_body(json!([{"creativeSetId": "c1", "name": "3 - Old"}]).to_string())
        .create();
    let create_folder = server
        .mock("POST", "/creatives/creativeset/create")
        .match_body(Matcher::PartialJson(json!({"name": "4 - Promo", "productCategoryId": 5})))
        .with_status(200)
        .with_body("{}")
        .create();
    let create_link = server
        .mock("POST", "/creatives/creative/link/create")
        .match_body(Matcher::PartialJson(json!({"name": "LinkTXT - 4 - Promo"})))
        .with_status(200)
        .with_body("{}")
        .create();

    let mut cmd = Command::cargo_bin("creative-provisioner").expect("Binary exists");
    cmd.args([
        "link",
        "--advertiser-id",
        "123",
        "--name",
        "Promo",
        "--target-url",
        "https://shop.example/landing",
    ])
    .env("CREATIVE_API_KEY", "test-key")
    .env("CREATIVE_API_BASE_URL", server.url())
    .assert()
    .success()
    .stdout(predicate::str::contains("LinkTXT - 4 - Promo"));

    create_folder.assert();
    create_link.assert();
}

#[test]
fn verify_key_reports_rejection() {
    let mut server = mockito::Server::new();
    server.mock("GET", "/access/user/get").with_status(401).create();

    let mut cmd = Command::cargo_bin("creative-provisioner").expect("Binary exists");
    cmd.arg("verify-key")
        .env("CREATIVE_API_KEY", "wrong")
        .env("CREATIVE_API_BASE_URL", server.url())
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key check failed"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use creative_provisioner::cli::{run, Cli, Commands};

    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        api_key: None,
        command: Commands::VerifyKey,
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
