//! End-to-end tests against a real Docker engine.
//!
//! These build a `FROM scratch` image from a temporary context, so no
//! registry access is needed. Requires a reachable engine (`DOCKER_HOST` or
//! the default socket). Tests are `#[ignore]` and run explicitly.

use dkr_config::GlobalConfig;
use dkr_core::{Command, Console, Dispatcher};
use dkr_provider::{create_provider, ContainerProvider, ListImagesConfig};
use std::collections::HashMap;
use tempfile::TempDir;

const TEST_IMAGE: &str = "dkr-e2e-scratch";

/// Get a provider for testing, or `None` when no engine is reachable
async fn get_test_provider() -> Option<Box<dyn ContainerProvider>> {
    match create_provider(&GlobalConfig::default()).await {
        Ok(provider) => Some(provider),
        Err(e) => {
            eprintln!("Skipping test: engine unavailable: {}", e);
            None
        }
    }
}

async fn dkr(provider: &dyn ContainerProvider, cwd: &std::path::Path, args: &[&str]) -> (i32, String) {
    let command = Command::parse(args.iter().copied()).expect("valid command");
    let dispatcher = Dispatcher::new(provider, &GlobalConfig::default(), cwd.to_path_buf());

    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = {
        let mut console = Console::new(&mut out, &mut err);
        dispatcher
            .dispatch(&command, &mut console)
            .await
            .expect("dispatch succeeds")
    };
    (code, String::from_utf8_lossy(&out).into_owned())
}

#[tokio::test]
#[ignore]
async fn test_build_tag_and_list_scratch_image() {
    let Some(provider) = get_test_provider().await else {
        return;
    };

    let workspace = TempDir::new().expect("temp dir");
    std::fs::write(
        workspace.path().join("Dockerfile"),
        "FROM scratch\nCOPY hello.txt /hello.txt\n",
    )
    .expect("write Dockerfile");
    std::fs::write(workspace.path().join("hello.txt"), "hello\n").expect("write source");
    std::fs::write(workspace.path().join("unused.bin"), vec![0u8; 4096]).expect("write extra");

    let tag = format!("{}:build", TEST_IMAGE);
    let (code, out) = dkr(provider.as_ref(), workspace.path(), &["build", "-t", &tag, "."]).await;
    assert_eq!(code, 0, "build output:\n{}", out);
    assert!(out.contains("COPY hello.txt"), "build output:\n{}", out);

    let (code, _) = dkr(provider.as_ref(), workspace.path(), &["tag", &tag, "tagged"]).await;
    assert_eq!(code, 0);

    let mut filters = HashMap::new();
    filters.insert("reference".to_string(), vec![TEST_IMAGE.to_string()]);
    let images = provider
        .list_images(&ListImagesConfig {
            filters,
            ..Default::default()
        })
        .await
        .expect("list images");
    let tags: Vec<&str> = images
        .iter()
        .flat_map(|i| i.repo_tags.iter().map(String::as_str))
        .collect();
    assert!(tags.contains(&tag.as_str()), "tags: {:?}", tags);
    assert!(tags.contains(&format!("{}:tagged", TEST_IMAGE).as_str()), "tags: {:?}", tags);

    let (code, out) = dkr(provider.as_ref(), workspace.path(), &["images", "-q", TEST_IMAGE]).await;
    assert_eq!(code, 0);
    assert!(out.lines().all(|l| l.len() == 12), "quiet output:\n{}", out);
}

#[tokio::test]
#[ignore]
async fn test_build_failure_exits_1() {
    let Some(provider) = get_test_provider().await else {
        return;
    };

    let workspace = TempDir::new().expect("temp dir");
    std::fs::write(
        workspace.path().join("Dockerfile"),
        "FROM scratch\nCOPY missing.txt /missing.txt\n",
    )
    .expect("write Dockerfile");

    let command = Command::parse(["build", "."]).expect("valid command");
    let dispatcher = Dispatcher::new(
        provider.as_ref(),
        &GlobalConfig::default(),
        workspace.path().to_path_buf(),
    );
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut console = Console::new(&mut out, &mut err);

    // The engine reports the failure either as an error frame or as a failed request
    match dispatcher.dispatch(&command, &mut console).await {
        Ok(code) => assert_eq!(code, 1),
        Err(e) => assert_eq!(e.exit_code(), 1),
    }
}
