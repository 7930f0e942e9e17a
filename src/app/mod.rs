pub mod cli;
pub mod util;

use crate::app::cli::{Cli, Command};
use crate::app::util::{render_draft, render_session_row};
use crate::config::WorkflowConfig;
use crate::domain::types::{Preferences, SessionId};
use crate::paths;
use crate::service::{PostService, ResumeOutcome, StartOutcome};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Resolves config: explicit `--config`, then the user file, then the built-in default.
pub fn load_config(explicit: Option<&Path>) -> Result<WorkflowConfig> {
    if let Some(path) = explicit {
        return WorkflowConfig::load(path);
    }
    let user_path = paths::user_config_path()?;
    if user_path.exists() {
        debug!(path = %user_path.display(), "loading user config");
        return WorkflowConfig::load(&user_path);
    }
    Ok(WorkflowConfig::default_config())
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let service = PostService::from_config(&config)?;

    match cli.command {
        Command::Generate {
            topic,
            post_type,
            image,
            multi_agent,
            single_shot,
            preferences,
        } => {
            let use_multi_agent = if multi_agent {
                true
            } else if single_shot {
                false
            } else {
                config.workflow.use_multi_agent
            };
            let mut prefs = Preferences::default();
            for (key, value) in preferences {
                prefs.insert(key, value);
            }
            let outcome = service
                .start(&topic.join(" "), &post_type, prefs, image, use_multi_agent)
                .await?;
            print_start(&outcome);
        }
        Command::Approve { session } => {
            let outcome = service.resume(&parse_session(&session)?, true, None).await?;
            print_resume(&outcome);
        }
        Command::Revise { session, feedback } => {
            let feedback = feedback.join(" ");
            let outcome = service
                .resume(&parse_session(&session)?, false, Some(&feedback))
                .await?;
            print_resume(&outcome);
        }
        Command::Reject { session } => {
            let outcome = service.resume(&parse_session(&session)?, false, None).await?;
            print_resume(&outcome);
        }
        Command::Show { session, json } => {
            let state = service.get(&parse_session(&session)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("session:   {}", state.session_id);
                println!("topic:     {}", state.topic);
                println!("phase:     {}", state.phase);
                println!("revisions: {}/{}", state.revision_count, state.max_revisions);
                if let Some(error) = &state.error {
                    println!("error:     {}", error);
                }
                if let Some(id) = &state.external_id {
                    println!("posted as: {}", id);
                }
                if let Some(draft) = &state.draft {
                    print!("{}", render_draft(draft, state.image_path.as_deref()));
                }
            }
        }
        Command::Sessions => {
            let sessions = service.list()?;
            if sessions.is_empty() {
                println!("No sessions found.");
            }
            for snapshot in &sessions {
                println!("{}", render_session_row(snapshot));
            }
        }
    }
    Ok(())
}

fn parse_session(raw: &str) -> Result<SessionId> {
    SessionId::from_string(raw).with_context(|| format!("Invalid session id: {}", raw))
}

fn print_start(outcome: &StartOutcome) {
    println!("[postflow] session {}", outcome.session_id);
    if let Some(error) = &outcome.error {
        println!("[postflow] failed: {}", error);
        return;
    }
    if let Some(draft) = &outcome.draft {
        print!("{}", render_draft(draft, outcome.image_path.as_deref()));
    }
    println!(
        "[postflow] awaiting approval: `postflow approve {id}`, `postflow revise {id} <feedback>` or `postflow reject {id}`",
        id = outcome.session_id
    );
}

fn print_resume(outcome: &ResumeOutcome) {
    if outcome.posted {
        match &outcome.external_id {
            Some(id) => println!("[postflow] published as {}", id),
            None => println!("[postflow] published"),
        }
    } else if outcome.rejected {
        println!("[postflow] draft rejected, session closed");
    } else if let Some(error) = &outcome.error {
        println!("[postflow] failed: {}", error);
    } else if let Some(draft) = &outcome.draft {
        print!("{}", render_draft(draft, outcome.image_path.as_deref()));
        println!("[postflow] awaiting approval for session {}", outcome.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::POSTFLOW_HOME_ENV;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_load_config_prefers_user_file() {
        let home = tempdir().expect("tempdir");
        std::env::set_var(POSTFLOW_HOME_ENV, home.path());

        let default = load_config(None).expect("default config");
        assert_eq!(
            default.workflow.max_revisions,
            WorkflowConfig::default_config().workflow.max_revisions
        );

        let mut custom = WorkflowConfig::default_config();
        custom.workflow.max_revisions = 5;
        let user_path = paths::user_config_path().expect("user path");
        std::fs::write(&user_path, serde_yaml::to_string(&custom).expect("yaml")).expect("write");

        let loaded = load_config(None).expect("user config");
        assert_eq!(loaded.workflow.max_revisions, 5);

        std::env::remove_var(POSTFLOW_HOME_ENV);
    }

    #[test]
    fn test_parse_session_rejects_garbage() {
        assert!(parse_session("not-a-uuid").is_err());
        let id = SessionId::new();
        assert_eq!(parse_session(&id.to_string()).expect("parse"), id);
    }
}
