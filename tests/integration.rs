use httpmock::MockServer;
use tempfile::TempDir;

use gitdigest::types::IngestOptions;

async fn git_in(dir: &str, args: &[&str]) {
    let output = tokio::process::Command::new("git")
        .args(["-C", dir])
        .args(args)
        .output()
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Mirrors the teacher's `create_test_repo` fixture: a small git repo with a
/// README, a couple of source files, and a binary-ish file for classification
/// tests.
async fn create_test_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let p = dir.path().to_str().unwrap().to_string();

    git_in(&p, &["init", "-b", "main"]).await;
    tokio::join!(
        async {
            git_in(&p, &["config", "user.email", "test@test.com"]).await;
            git_in(&p, &["config", "user.name", "Test"]).await;
        },
        async {
            tokio::try_join!(
                tokio::fs::write(dir.path().join("README.md"), "# toy\n"),
                tokio::fs::write(
                    dir.path().join("main.rs"),
                    "fn main() {\n    println!(\"hi\");\n}\n",
                ),
                tokio::fs::create_dir_all(dir.path().join("src")),
            )
            .unwrap();
            tokio::fs::write(dir.path().join("src/a.py"), "print(1)\n")
                .await
                .unwrap();
            tokio::fs::write(dir.path().join("data.bin"), [0u8, 1, 2, 0, 0, 3])
                .await
                .unwrap();
        },
    );

    git_in(&p, &["add", "."]).await;
    git_in(&p, &["commit", "-m", "initial commit"]).await;

    dir
}

#[tokio::test]
async fn ingests_local_directory_end_to_end() {
    let repo = create_test_repo().await;
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), IngestOptions::default())
        .await
        .unwrap();

    assert!(digest.summary.starts_with("Directory:"));
    assert!(digest.summary.contains("Files analyzed: 4"));
    assert!(digest.summary.contains("Estimated tokens:"));
    assert!(digest.tree.contains("README.md"));
    assert!(digest.tree.contains("src/"));
    assert!(digest.content.contains("FILE: README.md"));
    assert!(digest.content.contains("# toy"));
    assert!(digest.content.contains("[Binary file]"));
}

#[tokio::test]
async fn tree_orders_readme_before_other_files_and_dirs_last() {
    let repo = create_test_repo().await;
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), IngestOptions::default())
        .await
        .unwrap();

    let readme_pos = digest.tree.find("README.md").unwrap();
    let src_pos = digest.tree.find("src/").unwrap();
    assert!(readme_pos < src_pos);
}

#[tokio::test]
async fn include_pattern_restricts_to_matching_files() {
    let repo = create_test_repo().await;
    let options = IngestOptions {
        include_patterns: vec!["*.py".to_string()],
        ..IngestOptions::default()
    };
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), options)
        .await
        .unwrap();

    assert!(digest.content.contains("FILE: src/a.py"));
    assert!(!digest.content.contains("FILE: README.md"));
}

#[tokio::test]
async fn exclude_pattern_removes_matching_files() {
    let repo = create_test_repo().await;
    let options = IngestOptions {
        exclude_patterns: vec!["*.md".to_string()],
        ..IngestOptions::default()
    };
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), options)
        .await
        .unwrap();

    assert!(!digest.content.contains("FILE: README.md"));
    assert!(digest.content.contains("FILE: main.rs"));
}

#[tokio::test]
async fn max_file_size_boundary_excludes_only_oversized_files() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("exact.txt"), "0123456789").await.unwrap(); // 10 bytes
    tokio::fs::write(dir.path().join("over.txt"), "0123456789a").await.unwrap(); // 11 bytes

    let options = IngestOptions {
        max_file_size: Some(10),
        ..IngestOptions::default()
    };
    let digest = gitdigest::ingest_async(dir.path().to_str().unwrap(), options)
        .await
        .unwrap();

    assert!(digest.content.contains("FILE: exact.txt"));
    assert!(!digest.content.contains("FILE: over.txt"));
    assert!(digest.summary.contains("Files analyzed: 1"));
}

#[tokio::test]
async fn empty_directory_yields_zero_files_and_empty_content() {
    let dir = TempDir::new().unwrap();
    let digest = gitdigest::ingest_async(dir.path().to_str().unwrap(), IngestOptions::default())
        .await
        .unwrap();

    assert!(digest.summary.contains("Files analyzed: 0"));
    assert_eq!(digest.content, "");
}

#[tokio::test]
async fn single_file_source_reports_lines_not_files_analyzed() {
    let dir = TempDir::new().unwrap();
    let file_path = dir.path().join("solo.rs");
    tokio::fs::write(&file_path, "fn a() {}\nfn b() {}\nfn c() {}\n")
        .await
        .unwrap();

    let digest = gitdigest::ingest_async(file_path.to_str().unwrap(), IngestOptions::default())
        .await
        .unwrap();

    assert!(digest.summary.contains("File: solo.rs"));
    assert!(digest.summary.contains("Lines: 3"));
    assert!(!digest.summary.contains("Files analyzed"));
}

#[tokio::test]
async fn token_budget_truncates_and_appends_trailer() {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        tokio::fs::write(dir.path().join(name), "word ".repeat(200))
            .await
            .unwrap();
    }

    let options = IngestOptions {
        max_tokens: Some(50),
        ..IngestOptions::default()
    };
    let digest = gitdigest::ingest_async(dir.path().to_str().unwrap(), options)
        .await
        .unwrap();

    assert!(digest.content.contains("[Content truncated to 50 tokens]"));
}

#[tokio::test]
async fn nonexistent_local_source_is_an_error() {
    let result =
        gitdigest::ingest_async("/definitely/does/not/exist/anywhere", IngestOptions::default())
            .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn output_path_writes_summary_tree_and_content() {
    let repo = create_test_repo().await;
    let out_dir = TempDir::new().unwrap();
    let output_path = out_dir.path().join("digest.txt");

    let options = IngestOptions {
        output_path: Some(output_path.clone()),
        ..IngestOptions::default()
    };
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), options)
        .await
        .unwrap();

    let written = tokio::fs::read_to_string(&output_path).await.unwrap();
    assert!(written.starts_with(&digest.summary));
    assert!(written.contains(&digest.tree));
}

#[tokio::test]
async fn disabling_token_counting_falls_back_to_character_heuristic() {
    unsafe {
        std::env::set_var("GIT_INGEST_DISABLE_TOKEN_COUNTING", "true");
    }
    let repo = create_test_repo().await;
    let digest = gitdigest::ingest_async(repo.path().to_str().unwrap(), IngestOptions::default())
        .await
        .unwrap();
    unsafe {
        std::env::remove_var("GIT_INGEST_DISABLE_TOKEN_COUNTING");
    }

    assert!(digest.summary.contains("Estimated tokens:"));
}

#[tokio::test]
async fn blocking_ingest_wrapper_matches_async_entry_point() {
    let repo = create_test_repo().await;
    let path = repo.path().to_str().unwrap().to_string();
    let digest =
        tokio::task::spawn_blocking(move || gitdigest::ingest(&path, IngestOptions::default()))
            .await
            .unwrap()
            .unwrap();

    assert!(digest.summary.contains("Files analyzed: 4"));
}

// ── C3 reachability check against a mock HTTP server ──────────────────────

#[tokio::test]
async fn check_reachable_maps_404_to_not_found() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::HEAD).path("/owner/repo");
        then.status(404);
    });

    let url = format!("{}/owner/repo", server.base_url());
    let result = gitdigest::git::check_reachable(&url, None).await;
    mock.assert();
    assert!(matches!(result, Err(gitdigest::error::Error::NotFound(_))));
}

#[tokio::test]
async fn check_reachable_maps_401_to_unauthorized() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::HEAD).path("/owner/private");
        then.status(401);
    });

    let url = format!("{}/owner/private", server.base_url());
    let result = gitdigest::git::check_reachable(&url, Some("token")).await;
    mock.assert();
    assert!(matches!(result, Err(gitdigest::error::Error::Unauthorized(_))));
}

#[tokio::test]
async fn check_reachable_succeeds_on_2xx() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::HEAD).path("/owner/repo");
        then.status(200);
    });

    let url = format!("{}/owner/repo", server.base_url());
    let result = gitdigest::git::check_reachable(&url, None).await;
    mock.assert();
    assert!(result.is_ok());
}
