//! Fetch command - produce a snapshot of a repository at a commit-ish

use crate::cache::CacheStore;
use crate::cli::args::{FetchArgs, OutputFormat};
use crate::config::Config;
use crate::credentials::{source_from_config, DeployKeyStore};
use crate::error::RepoCacheResult;
use crate::git::Git;
use crate::repository::{commitish_component, RepoKey, Repository};
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::PathBuf;
use std::sync::Arc;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> RepoCacheResult<()> {
    let ctx = UiContext::detect();

    // Reject bad input before any download or directory creation
    let repo = RepoKey::parse(&args.repository)?;
    commitish_component(&args.commitish)?;

    let cache = Arc::new(CacheStore::from_config(&config.cache));
    cache.initialize().await?;

    let key_path = resolve_key(&args, config, &cache).await?;
    let repository = Repository::from_config(&config.cache, cache, Arc::new(Git::new()));

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {} at {}", repo, args.commitish));
    let snapshot = match repository
        .fetch(&key_path, &args.repository, &args.commitish)
        .await
    {
        Ok(path) => {
            spinner.stop(&format!("{} at {} ready", repo, args.commitish));
            path
        }
        Err(e) => {
            spinner.stop_error(&format!("Fetching {} failed", repo));
            return Err(e);
        }
    };

    match args.format {
        OutputFormat::Plain => println!("{}", snapshot.display()),
        OutputFormat::Json => {
            let out = serde_json::json!({
                "repository": repo.to_string(),
                "commitish": args.commitish,
                "path": snapshot,
                "locked": true,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            ui::key_value(&ctx, "repository", &repo.to_string());
            ui::key_value(&ctx, "commitish", &args.commitish);
            ui::key_value(&ctx, "path", &snapshot.display().to_string());
            ui::remark(
                &ctx,
                &format!("Release with: repocache unlock {}", snapshot.display()),
            );
        }
    }

    Ok(())
}

/// Key file given directly, or a key identifier looked up in the key cache
async fn resolve_key(
    args: &FetchArgs,
    config: &Config,
    cache: &Arc<CacheStore>,
) -> RepoCacheResult<PathBuf> {
    if let Some(path) = &args.key_file {
        return Ok(path.clone());
    }

    let key = args.key.as_deref().unwrap_or_default();
    let store = DeployKeyStore::new(
        Arc::clone(cache),
        &config.cache.deploy_keys,
        source_from_config(config)?,
    );
    store.fetch(key).await
}
