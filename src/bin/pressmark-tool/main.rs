use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use clap::{arg, Parser, ValueEnum};

use crate::check::check_cmd;
use crate::new_post::new_post_cmd;

mod check;
mod new_post;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Scaffold a new markdown post with a frontmatter block
    NewPost(NewPostArgs),
    /// Validate a directory of markdown files before importing
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct NewPostArgs {
    /// Title of the post
    #[arg(short, long)]
    title: String,

    /// Category name
    #[arg(short, long)]
    category: Option<String>,

    /// Comma-separated list of tags
    #[arg(long)]
    tags: Option<String>,

    /// Post generation options
    #[arg(short, long, default_value_t = PostOutput::Stdout)]
    output: PostOutput,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CheckArgs {
    /// Directory containing the .md files to validate
    #[arg(short, long)]
    dir: PathBuf,
}

#[derive(Clone, Debug, ValueEnum)]
enum PostOutput {
    /// Writes the new post content to the stdout
    Stdout,
    /// Writes the new post content to a file
    File,
}

impl Display for PostOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PostOutput::Stdout => write!(f, "stdout"),
            PostOutput::File => write!(f, "file"),
        }
    }
}

fn main() {
    let args = Args::parse();

    match args {
        Args::NewPost(args) => new_post_cmd(args),
        Args::Check(args) => {
            if let Err(e) = check_cmd(args) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    };
}
