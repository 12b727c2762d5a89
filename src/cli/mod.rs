//! Terminal front-end — stdin/stdout REPL driving a `PilotApp`.
//!
//! Replies and panel content go to stdout; the prompt and log output go to
//! stderr.

pub mod command;

pub use command::{Command, CommandParser, HELP};

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::PilotApp;
use crate::chat::TurnOutcome;
use crate::error::Error;
use crate::knowledge::{DocumentUpload, SearchResult, UploadFile, filter_documents};

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

/// Read commands from stdin until EOF or `/quit`.
pub async fn run(app: Arc<PilotApp>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", app.chat().messages().await.first().map_or("", |m| m.content.as_str()));
    println!("[{}]", app.view().await);
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            eprint!("> ");
            continue;
        }
        let reply = execute(&app, CommandParser::parse(&line)).await;
        if !reply.text.is_empty() {
            println!("\n{}\n", reply.text);
        }
        if reply.quit {
            break;
        }
        eprint!("> ");
    }
    Ok(())
}

/// Run one command against the app and render the result.
pub async fn execute(app: &PilotApp, command: Command) -> Reply {
    if matches!(
        command,
        Command::Chat { .. }
            | Command::Status
            | Command::Docs { .. }
            | Command::Upload { .. }
            | Command::View { .. }
    ) {
        sync_onboarding(app).await;
    }

    let result = match command {
        Command::Quit => {
            return Reply {
                text: String::new(),
                quit: true,
            };
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Invalid { message } => Ok(message),
        Command::Chat { content } => chat(app, &content).await,
        Command::Confirm => app
            .chat()
            .confirm_active()
            .await
            .map(|outcome| render_outcome(&outcome)),
        Command::Reset => app
            .chat()
            .reset()
            .await
            .map(|()| "Conversation context was reset.".to_string()),
        Command::Profile { fields } => profile(app, fields).await,
        Command::Save => app.save_profile().await.map(|outcome| {
            let mut text = format!("Profile saved for {}.", outcome.profile.company_name);
            if let Some(advisory) = outcome.advisory {
                text.push_str(&format!("\n{advisory}"));
            }
            text.push_str(&format!("\n[{}]", outcome.stage));
            text
        }),
        Command::Connect => app
            .connect_integration()
            .await
            .map(|stage| format!("Integration confirmed. [{stage}]")),
        Command::Skip => Ok(format!("Integration skipped for now. [{}]", app.skip_integration().await)),
        Command::Status => Ok(status(app).await),
        Command::Refresh => app
            .refresh_onboarding()
            .await
            .map(|view| format!("Onboarding: {}. [{view}]", app.gate().stage())),
        Command::Docs { filter } => Ok(documents(app, filter.as_deref()).await),
        Command::Upload {
            path,
            title,
            category,
        } => upload(app, &path, title, category).await,
        Command::Search { query } => Ok(render_search(&app.search().search(&query).await)),
        Command::View { screen } => Ok(format!("[{}]", app.navigate(screen).await)),
        Command::Health => app.health().await.map(|h| match h.environment {
            Some(env) => format!("Backend {} ({env})", h.status),
            None => format!("Backend {}", h.status),
        }),
    };

    Reply::text(result.unwrap_or_else(|e| e.user_message()))
}

/// Re-check onboarding with the backend until it is complete.
async fn sync_onboarding(app: &PilotApp) {
    if app.gate().stage().is_complete() {
        return;
    }
    if let Err(e) = app.refresh_onboarding().await {
        tracing::warn!(error = %e, "Onboarding refresh failed; keeping current stage");
    }
}

async fn chat(app: &PilotApp, content: &str) -> Result<String, Error> {
    let outcome = app.chat().send(content).await?;
    let mut text = render_outcome(&outcome);
    let hits = app.chat().last_hits().await;
    if !hits.is_empty() {
        text.push_str(&format!("\n({} knowledge hits cited)", hits.len()));
    }
    Ok(text)
}

fn render_outcome(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Replied { reply, plan: None } => reply.content.clone(),
        TurnOutcome::Replied {
            reply,
            plan: Some(plan),
        } => {
            let mut text = reply.content.clone();
            text.push_str(&format!("\n\nPlan {} awaiting confirmation.", plan.plan_id));
            for followup in &plan.followups {
                text.push_str(&format!("\n  - {followup}"));
            }
            text.push_str("\nType /confirm to run it.");
            text
        }
        TurnOutcome::Failed { message } => message.clone(),
        TurnOutcome::Discarded => "(reply discarded: the conversation moved on)".to_string(),
    }
}

async fn profile(app: &PilotApp, fields: Vec<(String, String)>) -> Result<String, Error> {
    let unknown = app
        .gate()
        .edit_draft(|draft| {
            fields
                .into_iter()
                .filter_map(|(key, value)| (!draft.set_field(&key, value)).then_some(key))
                .collect::<Vec<_>>()
        })
        .await;
    let draft = app.gate().draft().await;
    let dirty = draft.is_dirty(app.gate().saved_profile().await.as_ref());

    let mut text = format!(
        "Company: {}\nIndustry: {}\nEmployees: {}\nRevenue: {}\nKey systems: {}\nGoals: {}\nLocale: {}",
        draft.company_name,
        draft.industry,
        draft.employees,
        draft.annual_revenue,
        draft.key_systems,
        draft.goals,
        draft.locale,
    );
    if dirty {
        text.push_str("\n(unsaved changes; /save to keep them)");
    }
    if !unknown.is_empty() {
        text.push_str(&format!("\nUnknown fields ignored: {}", unknown.join(", ")));
    }
    Ok(text)
}

async fn status(app: &PilotApp) -> String {
    let status = app.status().await;
    let mut text = format!(
        "User: {} ({})\nOnboarding: {}\nView: {}\nChat: {}, plan: {}\nDocuments: {}",
        status.user_id,
        status.identity_source,
        status.stage,
        status.view,
        status.chat_phase,
        status.plan_phase,
        status.documents,
    );
    if let Some(advisory) = status.advisory {
        text.push_str(&format!("\n{advisory}"));
    }
    text
}

async fn documents(app: &PilotApp, filter: Option<&str>) -> String {
    let all = match app.documents().refresh().await {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!(error = %e, "Document refresh failed; showing cached list");
            app.documents().list().await
        }
    };
    let shown = filter_documents(&all, filter.unwrap_or(""));
    if shown.is_empty() {
        return "No documents.".to_string();
    }
    shown
        .iter()
        .map(|d| {
            format!(
                "{:<10} {}  [{}]  {}",
                d.status.to_string(),
                d.title,
                d.category,
                d.uploaded_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn upload(
    app: &PilotApp,
    path: &str,
    title: String,
    category: Option<String>,
) -> Result<String, Error> {
    // Refuse before touching the file system.
    app.gate().handle().ensure_complete("document upload")?;

    let file = match UploadFile::from_path(Path::new(path)).await {
        Ok(file) => file,
        Err(e) => return Ok(format!("Cannot read {path}: {e}")),
    };
    let outcome = app
        .documents()
        .upload(DocumentUpload {
            file: Some(file),
            title,
            category: category.unwrap_or_default(),
            ..Default::default()
        })
        .await?;
    Ok(outcome.message)
}

fn render_search(result: &SearchResult) -> String {
    match result {
        SearchResult::Empty => "Search cleared.".to_string(),
        SearchResult::Error { error, .. } => format!("Search failed: {error}"),
        SearchResult::Hits {
            query,
            hits,
            advisory,
        } => {
            let mut lines = Vec::new();
            if let Some(advisory) = advisory {
                lines.push(advisory.clone());
            }
            if hits.is_empty() {
                lines.push(format!("No results for \"{query}\"."));
            }
            for hit in hits {
                lines.push(format!("{:.2}  {}", hit.score, hit.text));
            }
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppDeps;
    use crate::backend::testing::{ScriptedBackend, connected, plan_reply};
    use crate::config::ClientConfig;
    use crate::identity::{MemoryIdentityStore, NoHost};
    use crate::onboarding::OnboardingStage;

    async fn app(backend: &Arc<ScriptedBackend>) -> PilotApp {
        let app = PilotApp::start(
            ClientConfig::default(),
            AppDeps {
                backend: backend.clone(),
                identity_store: Arc::new(MemoryIdentityStore::new()),
                host: Arc::new(NoHost),
            },
        )
        .await;
        app.bootstrap().await.unwrap();
        app
    }

    async fn run_line(app: &PilotApp, line: &str) -> String {
        execute(app, CommandParser::parse(line)).await.text
    }

    #[tokio::test]
    async fn onboarding_through_commands() {
        let backend = ScriptedBackend::new();
        let app = app(&backend).await;

        let text = run_line(&app, "/save").await;
        assert!(text.contains("Company name"), "got {text}");
        assert_eq!(backend.calls("/integration/profile"), 0);

        let text = run_line(&app, r#"/profile name="Acme Ltd" ceo=Bob"#).await;
        assert!(text.contains("Company: Acme Ltd"));
        assert!(text.contains("unsaved changes"));
        assert!(text.contains("Unknown fields ignored: ceo"));

        let text = run_line(&app, "/save").await;
        assert!(text.contains("Profile saved for Acme Ltd."));

        let text = run_line(&app, "hello").await;
        assert!(text.contains("connect Alpha-Business"));

        let text = run_line(&app, "/connect").await;
        assert!(text.contains("complete"));
        assert_eq!(run_line(&app, "hello").await, "ok");
    }

    #[tokio::test]
    async fn plan_then_confirm() {
        let backend = ScriptedBackend::onboarded();
        let app = app(&backend).await;
        backend.push_chat(Ok(plan_reply("p1", &["Which month?"])));

        let text = run_line(&app, "calculate payroll").await;
        assert!(text.contains("Plan p1 awaiting confirmation."));
        assert!(text.contains("  - Which month?"));

        assert_eq!(run_line(&app, "/confirm").await, "Executed p1");
        assert!(run_line(&app, "/confirm").await.contains("No plan"));
    }

    #[tokio::test]
    async fn upload_is_gated_before_reading_the_file() {
        let backend = ScriptedBackend::new();
        let app = app(&backend).await;
        let text = run_line(&app, "/upload /does/not/exist.txt Prices").await;
        assert!(text.contains("company profile"), "got {text}");
        assert_eq!(backend.calls("/knowledge/documents POST"), 0);
    }

    #[tokio::test]
    async fn upload_and_list_documents() {
        let backend = ScriptedBackend::onboarded();
        let app = app(&backend).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.txt");
        tokio::fs::write(&path, "widget 10").await.unwrap();

        let text = run_line(&app, &format!(r#"/upload {} "Price list" sales"#, path.display())).await;
        assert!(text.contains("Uploaded \"Price list\""), "got {text}");

        let text = run_line(&app, "/docs PRICE").await;
        assert!(text.contains("Price list  [sales]"));
        assert_eq!(run_line(&app, "/docs payroll").await, "No documents.");
    }

    #[tokio::test]
    async fn status_picks_up_integration_confirmed_elsewhere() {
        let backend = ScriptedBackend::new();
        backend.snapshot.lock().unwrap().profile = Some(Default::default());
        let app = app(&backend).await;
        assert_eq!(app.gate().stage(), OnboardingStage::IntegrationPending);

        backend.snapshot.lock().unwrap().integration = Some(connected());
        let text = run_line(&app, "/status").await;
        assert!(text.contains("Onboarding: complete"), "got {text}");
        assert_eq!(backend.calls("/integration/status"), 2);

        assert_eq!(run_line(&app, "hello").await, "ok");
        // Complete; no further snapshot fetches.
        run_line(&app, "/view chat").await;
        assert_eq!(backend.calls("/integration/status"), 2);
    }

    #[tokio::test]
    async fn refresh_command_recovers_after_failed_bootstrap() {
        let backend = ScriptedBackend::onboarded();
        *backend.snapshot_failure.lock().unwrap() = Some("gateway timeout".into());
        let app = PilotApp::start(
            ClientConfig::default(),
            AppDeps {
                backend: backend.clone(),
                identity_store: Arc::new(MemoryIdentityStore::new()),
                host: Arc::new(NoHost),
            },
        )
        .await;
        assert!(app.bootstrap().await.is_err());

        let text = run_line(&app, "/refresh").await;
        assert!(text.contains("gateway timeout"), "got {text}");

        *backend.snapshot_failure.lock().unwrap() = None;
        assert_eq!(run_line(&app, "/refresh").await, "Onboarding: complete. [chat]");
    }

    #[tokio::test]
    async fn quit_and_search_clear() {
        let backend = ScriptedBackend::onboarded();
        let app = app(&backend).await;
        assert!(execute(&app, Command::Quit).await.quit);
        assert_eq!(run_line(&app, "/search").await, "Search cleared.");
        assert_eq!(backend.calls("/knowledge/search"), 0);
    }
}
