use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use regcomment_client::config::{ClientConfig, SectionArgs};
use regcomment_client::presenter::SAVED_MESSAGE;
use regcomment_client::{
    AttachmentStatus, CommentEvents, CommentModel, CommentPresenter, CommentServices, CommentView,
    LocalFile,
};
use regcomment_core::submission::Submission;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "regcomment", about = "Draft and submit comments on a regulation")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the saved comment for a section
    Show {
        #[command(flatten)]
        section: SectionArgs,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the comment text for a section
    Write {
        #[command(flatten)]
        section: SectionArgs,
        /// Comment text; read from stdin when omitted
        #[arg(long)]
        body: Option<String>,
    },
    /// Upload files and attach them to a section's comment
    Attach {
        #[command(flatten)]
        section: SectionArgs,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove an attachment by key
    Remove {
        #[command(flatten)]
        section: SectionArgs,
        #[arg(long)]
        key: String,
    },
    /// Delete the saved comment for a section
    Clear {
        #[command(flatten)]
        section: SectionArgs,
    },
    /// List every saved comment for the document
    List,
    /// Send every saved comment for the document to the server
    Submit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = regcomment_store::create_store(&cli.config.store_config())?;
    let services = CommentServices::http(&cli.config.server_url, store.clone());
    let doc_id = cli.config.doc_id.as_str();
    let mut events = CommentEvents::new();

    match cli.command {
        Command::Show { section, json } => {
            let presenter =
                CommentPresenter::open(doc_id, &section.target(), services, events.publisher())
                    .await?;
            let view = presenter.view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Command::Write { section, body } => {
            let body = match body {
                Some(body) => body,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let mut presenter =
                CommentPresenter::open(doc_id, &section.target(), services, events.publisher())
                    .await?;
            presenter.set_body(body);
            presenter.save().await?;
            println!("{SAVED_MESSAGE}");
        }
        Command::Attach { section, files } => {
            let mut local = Vec::with_capacity(files.len());
            for path in &files {
                local.push(LocalFile::from_path(path).await?);
            }
            let mut presenter =
                CommentPresenter::open(doc_id, &section.target(), services, events.publisher())
                    .await?;
            let keys = presenter.add_attachments(local).await;
            info!(count = keys.len(), "waiting for uploads");
            presenter.settle().await;
            let added = presenter.rows_for(&keys);
            for row in &added {
                if let AttachmentStatus::Failed { reason } = &row.status {
                    warn!(name = %row.name, "attachment failed: {reason}");
                }
            }
            presenter.save().await?;
            print_view(&presenter.view());
            if !added.iter().any(|row| row.status == AttachmentStatus::Uploaded) {
                bail!("no attachment was uploaded");
            }
        }
        Command::Remove { section, key } => {
            let mut presenter =
                CommentPresenter::open(doc_id, &section.target(), services, events.publisher())
                    .await?;
            if !presenter.remove_attachment(&key) {
                bail!("no attachment with key {key}");
            }
            presenter.dispatch(&mut events).await?;
            presenter.save().await?;
            println!("{SAVED_MESSAGE}");
        }
        Command::Clear { section } => {
            let mut presenter =
                CommentPresenter::open(doc_id, &section.target(), services, events.publisher())
                    .await?;
            presenter.clear().await?;
            println!("Comment cleared.");
        }
        Command::List => {
            let comments = CommentModel::list(&store, doc_id).await?;
            if comments.is_empty() {
                println!("No saved comments for {doc_id}.");
            }
            for comment in comments {
                println!(
                    "{}  {}  ({} files)",
                    comment.section_id,
                    comment.label,
                    comment.attachments.len()
                );
            }
        }
        Command::Submit => {
            let comments = CommentModel::list(&store, doc_id).await?;
            if comments.is_empty() {
                bail!("no saved comments for {doc_id}");
            }
            let mut submission = Submission::from_comments(&comments);
            submission
                .extra
                .insert("doc_number".into(), serde_json::Value::from(doc_id));
            let receipt = regcomment_client::submit::submit(
                &reqwest::Client::new(),
                &cli.config.server_url,
                &submission,
            )
            .await?;
            println!("{}: {}", receipt.status, receipt.metadata_url);
        }
    }

    Ok(())
}

fn print_view(view: &CommentView) {
    println!("{} ({})", view.label, view.section);
    if let Some(context) = &view.context {
        println!("> {context}");
    }
    if view.body.is_empty() {
        println!("(no comment)");
    } else {
        println!("{}", view.body);
    }
    for row in &view.attachments {
        println!(
            "  [{}] {} {} - {}",
            row.key,
            row.name,
            row.size,
            row.status.label()
        );
    }
    if let Some(status) = &view.status {
        println!("{status}");
    }
}
