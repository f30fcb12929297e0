use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::codec::Format;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start tagmark as a service.
    Daemon {
        /// Address to listen on, overrides daemon.listen
        #[clap(short, long)]
        listen: Option<String>,
    },
    /// Run one query, exactly as typed in the search box
    ///
    /// Plain words are keywords; `@all`, `@latest [N]`, `@export [csv|json|html]`
    /// and `@import` are commands.
    Query {
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Add a bookmark and generate tags for it
    Add {
        /// a url
        #[clap(allow_hyphen_values = true)]
        url: String,

        /// Bookmark title
        #[clap(short, long)]
        title: Option<String>,

        /// Don't generate tags
        #[clap(long, default_value = "false")]
        no_tag: bool,
    },
    /// Inspect or edit the tags of one url
    Tag {
        #[clap(subcommand)]
        action: TagAction,
    },
    /// Generate tags for every bookmark that has none
    Retag {},
    /// Import bookmarks and tags from a csv, json or html file
    Import {
        file: PathBuf,

        /// Overrides the type inferred from the file extension
        #[clap(long)]
        content_type: Option<String>,
    },
    /// Export bookmarks and tags
    Export {
        #[clap(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Output directory, overrides export_dir
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagAction {
    /// Print the tags of a url
    Show { url: String },
    /// Add a tag
    Add { url: String, tag: String },
    /// Delete a tag
    Delete { url: String, tag: String },
    /// Rename a tag
    Rename { url: String, old: String, new: String },
}

impl Command {
    /// Whether the command writes to the tag or bookmark store.
    pub fn mutates(&self) -> bool {
        match self {
            Command::Daemon { .. } => false,
            Command::Query { text } => text
                .first()
                .is_some_and(|word| word.trim().eq_ignore_ascii_case("@import")),
            Command::Tag {
                action: TagAction::Show { .. },
            } => false,
            Command::Export { .. } => false,
            Command::Add { .. }
            | Command::Tag { .. }
            | Command::Retag {}
            | Command::Import { .. } => true,
        }
    }
}
