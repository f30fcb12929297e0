use std::{future::Future, sync::Arc};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod app;
mod bookmarks;
mod cli;
mod codec;
mod command;
mod config;
mod eid;
mod files;
mod library;
mod lock;
mod metadata;
mod search;
mod selection;
mod session;
mod storage;
mod tagging;
mod tags;
#[cfg(test)]
mod tests;
mod web;

use app::App;
use cli::{Command, TagAction};
use files::{DirDownloader, Downloader, PathPicker, PromptPicker};
use lock::{FileLock, LockGuard};

fn init_logging() {
    let filter = EnvFilter::try_from_env("TAGMARK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    let base_path = App::base_path()?;
    let app = App::open(&base_path)?;

    // the daemon keeps the lock until it exits
    let _lock = match &args.command {
        Command::Daemon { .. } => FileLock::try_acquire(app.dir()).map(LockGuard::Held),
        command => LockGuard::acquire_for(app.dir(), command.mutates()),
    }
    .context("failed to lock the tag store")?;

    match args.command {
        Command::Daemon { listen } => {
            let listen = listen.unwrap_or_else(|| app.config().daemon.listen);
            web::start_daemon(app, listen)
        }

        Command::Query { text } => {
            let session = app.new_session(Some(Arc::new(PromptPicker)));
            let outcome = block_on(session.input(&text.join(" ")))??;
            print_json(&outcome)
        }

        Command::Add { url, title, no_tag } => {
            let title = title.unwrap_or_else(|| url.clone());
            let bookmark = app.add_bookmark(&title, &url)?;

            let tags = if no_tag {
                None
            } else {
                let tagger = app.tagger()?;
                Some(block_on(tagger.tag_page(&bookmark.url, &bookmark.title))??)
            };

            print_json(&json!({ "bookmark": bookmark, "tags": tags }))
        }

        Command::Tag { action } => {
            let session = app.new_session(None);
            let tags = match action {
                TagAction::Show { url } => app.library().tags().get_tags(&url)?,
                TagAction::Add { url, tag } => session.add_tag(&url, &tag)?,
                TagAction::Delete { url, tag } => session.delete_tag(&url, &tag)?,
                TagAction::Rename { url, old, new } => session.rename_tag(&url, &old, &new)?,
            };
            print_json(&tags)
        }

        Command::Retag {} => {
            let tagger = Arc::new(app.tagger()?);
            let bookmarks = app.library().records()?;

            let bar = ProgressBar::new(bookmarks.len() as u64);
            bar.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} {msg}",
            )?);

            let report = block_on(tagging::retag_all(
                tagger,
                bookmarks,
                app.batch_opts(),
                |progress| {
                    bar.set_position(progress.processed() as u64);
                    bar.set_message(format!("{} failed", progress.failure_count));
                },
            ))?;
            bar.finish_and_clear();

            print_json(&report)
        }

        Command::Import { file, content_type } => {
            let picker = PathPicker {
                path: file,
                content_type,
            };
            let session = app.new_session(Some(Arc::new(picker)));
            let outcome = block_on(session.input("@import"))??;
            print_json(&outcome)
        }

        Command::Export { format, out } => {
            let file = app.library().export(format)?;
            let dir = out.unwrap_or_else(|| app.config().export_dir().to_path_buf());
            let saved_to = DirDownloader { dir }.download(&file)?;

            print_json(&json!({ "file": file, "savedTo": saved_to }))
        }
    }
}
