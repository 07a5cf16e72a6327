//! Command-line consumer of the content service.
//!
//! # Responsibility
//! - Print a digest, tag counts or month archives of the posts file.
//! - Add one post through the service so normalization and id checks apply.
//!
//! # Exit codes
//! - `0` success, `1` storage/logging failure, `2` rejected input.

mod digest;

use clap::{Args, Parser, Subcommand};
use log::info;
use silov0_core::{
    default_log_level, init_logging, tag_counts, ContentConfig, ContentErrorKind, ContentService,
    ContentServiceError, PostFilter, PostStore, RawPost, POSTS_PATH_ENV,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "silov0", version, about = "Manage the silov0 posts file")]
struct Cli {
    /// Posts file to read and write.
    #[arg(long, global = true, env = POSTS_PATH_ENV)]
    posts: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every post, newest first.
    Digest(FilterArgs),
    /// Print tag occurrence counts.
    Tags,
    /// Print post counts per month.
    Archives,
    /// Add one post and persist the collection.
    Add(AddArgs),
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// Only posts carrying this exact tag.
    #[arg(long)]
    tag: Option<String>,
    /// Case-insensitive text over title, summary and tags.
    #[arg(long, short)]
    query: Option<String>,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    title: String,
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,
    /// Explicit id; derived from date + title when omitted.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    summary: Option<String>,
    /// Repeat for several tags.
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl From<AddArgs> for RawPost {
    fn from(args: AddArgs) -> Self {
        let mut raw = RawPost::new()
            .with_title(args.title)
            .with_date(args.date)
            .with_tags(args.tags);
        raw.id = args.id;
        raw.summary = args.summary;
        raw
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    }

    let config = cli
        .posts
        .map(ContentConfig::new)
        .unwrap_or_else(ContentConfig::from_env);
    let service = ContentService::open(&config);

    match run(&service, cli.command) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(err.kind()))
        }
    }
}

fn run<S: PostStore>(
    service: &ContentService<S>,
    command: Command,
) -> Result<String, ContentServiceError> {
    match command {
        Command::Digest(args) => {
            let total = service.all()?.len();
            let filter = PostFilter {
                tag: args.tag,
                query: args.query,
            };
            let posts = service.filter(&filter);
            Ok(digest::render_digest(&posts, total, filter.is_active()))
        }
        Command::Tags => {
            let posts = service.all()?;
            Ok(digest::render_tag_counts(&tag_counts(&posts)))
        }
        Command::Archives => {
            service.all()?;
            Ok(digest::render_archives(&service.archive_buckets()))
        }
        Command::Add(args) => {
            let (id, posts) = service.add_with_id(&RawPost::from(args))?;
            info!("event=cli_add module=cli status=ok id={id}");
            Ok(format!("added {id} ({} posts)\n", posts.len()))
        }
    }
}

fn exit_code(kind: ContentErrorKind) -> u8 {
    match kind {
        ContentErrorKind::Validation | ContentErrorKind::DuplicateId => 2,
        ContentErrorKind::Storage => 1,
    }
}
