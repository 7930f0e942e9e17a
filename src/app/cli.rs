use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postflow")]
#[command(about = "Post generation workflow with human approval before publishing")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Workflow config file (defaults to ~/.postflow/config.yaml, then the built-in config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a draft and pause for approval
    Generate {
        /// What the post is about (all arguments are joined)
        #[arg(trailing_var_arg = true, required = true)]
        topic: Vec<String>,

        /// One of: ai_news, personal_milestone
        #[arg(short, long, default_value = "ai_news")]
        post_type: String,

        /// Also generate an image for the post
        #[arg(long)]
        image: bool,

        /// Use the multi-agent pipeline
        #[arg(long, conflicts_with = "single_shot")]
        multi_agent: bool,

        /// Use a single generation call
        #[arg(long)]
        single_shot: bool,

        /// Style preference as key=value (repeatable)
        #[arg(long = "pref", value_parser = parse_preference)]
        preferences: Vec<(String, String)>,
    },

    /// Approve the current draft and publish it
    Approve { session: String },

    /// Ask for a revision of the current draft
    Revise {
        session: String,

        /// What to change (all arguments are joined)
        #[arg(trailing_var_arg = true, required = true)]
        feedback: Vec<String>,
    },

    /// Reject the current draft
    Reject { session: String },

    /// Show a stored session
    Show {
        session: String,

        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored sessions, newest first
    Sessions,
}

fn parse_preference(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}
