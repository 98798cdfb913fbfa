use clap::Parser;

use gitdigest::error::exit_code;
use gitdigest::types::IngestOptions;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("GIT_DIGEST_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = gitdigest::cli::Args::parse();

    let options = IngestOptions {
        max_file_size: args.max_size,
        max_files: None,
        max_total_size: None,
        max_dir_depth: None,
        include_patterns: args.include_pattern,
        exclude_patterns: args.exclude_pattern,
        branch: args.branch,
        tag: args.tag,
        commit: args.commit,
        include_gitignored: args.include_gitignored,
        include_submodules: args.include_submodules,
        token: args.token.or_else(|| std::env::var("GITHUB_TOKEN").ok()),
        max_tokens: args.max_tokens,
        output_path: args.output,
    };

    match gitdigest::ingest_async(&args.source, options).await {
        Ok(digest) => {
            println!("{}", digest.summary);
            println!("{}", digest.tree);
            println!("{}", digest.content);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(exit_code(&e));
        }
    }
}
