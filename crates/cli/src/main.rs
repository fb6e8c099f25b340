use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::process::Command;
use tokio::sync::broadcast;

use wrench_core::context::{AgentContext, Constraints, InitialCommandRun};
use wrench_core::orchestrator::{AgentEvent, FinalStatus, Orchestrator};
use wrench_core::session;
use wrench_core::tools;
use wrench_planner::Planner;

/// Runs a shell command, watches it fail, and drives an LLM-backed
/// diagnose-and-fix loop against the project until the error is resolved or
/// the session gives up.
#[derive(Parser)]
#[command(name = "wrench", about = "An agentic debugging assistant for the terminal", version)]
struct Cli {
    /// The command to run and, if it fails, diagnose (e.g. `wrench -- pytest`)
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,

    /// What you're trying to accomplish, beyond "make the command succeed"
    #[arg(long)]
    request: Option<String>,

    /// Override the model the planner requests
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wrench=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    wrench_config::RuntimeConfig::ensure_dirs()?;
    let global_config = wrench_config::RuntimeConfig::load()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = match wrench_config::RuntimeConfig::load_project(&cwd)? {
        Some(project_config) => wrench_config::RuntimeConfig::merge(&global_config, &project_config),
        None => global_config,
    };
    if let Some(model) = &cli.model {
        config.planner.model = model.clone();
    }

    let command_string = cli.command.join(" ");
    tracing::info!(command = %command_string, "running initial command");
    let initial_run = run_initial_command(&command_string, &cwd).await?;

    if initial_run.exit_code == 0 {
        println!("{}", initial_run.stdout);
        if !initial_run.stderr.is_empty() {
            eprintln!("{}", initial_run.stderr);
        }
        println!("`{command_string}` succeeded - nothing to debug.");
        return Ok(());
    }

    println!("`{command_string}` exited with status {}; starting a debugging session...", initial_run.exit_code);

    let registry = tools::default_registry();
    let constraints = Constraints {
        max_session_steps: config.orchestrator.max_session_steps,
        ..Constraints::default()
    };
    let ctx = AgentContext::new(
        cli.request.unwrap_or_else(|| "Diagnose and fix the failure.".to_string()),
        initial_run,
        cwd.to_string_lossy().into_owned(),
        registry.descriptors(),
        constraints,
    );

    let planner: Arc<dyn Planner> = Arc::new(wrench_planner::anthropic::AnthropicPlanner::from_env()?);
    let orchestrator = Orchestrator::new(planner, config, registry);
    let events = orchestrator.subscribe();
    let event_task = tokio::spawn(drive_events(events));

    let (final_ctx, status) = orchestrator.run(ctx).await?;
    drop(orchestrator);
    let _ = event_task.await;

    let session_id = uuid::Uuid::new_v4().to_string();
    let record = session::SessionRecord::new(&final_ctx, status);
    let path = session::save_session(&session_id, &record)?;
    tracing::info!(session_id = %session_id, path = %path.display(), "session saved");

    std::process::exit(match status {
        FinalStatus::Resolved => 0,
        FinalStatus::GuidanceProvided => 0,
        _ => 1,
    });
}

async fn run_initial_command(command: &str, cwd: &std::path::Path) -> Result<InitialCommandRun> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    Ok(InitialCommandRun {
        command_string: command.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Prints streamed session events to the terminal and resolves approval /
/// clarification prompts from stdin. Runs until the orchestrator drops its
/// sender side of the broadcast channel.
async fn drive_events(mut rx: broadcast::Receiver<AgentEvent>) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut stdin = BufReader::new(tokio::io::stdin());

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
        };

        match event {
            AgentEvent::StepStarted { step_no } => {
                println!("\n--- step {step_no} ---");
            }
            AgentEvent::StepCompleted { step_no, tool, status } => {
                println!("[{step_no}] {tool}: {status}");
            }
            AgentEvent::ToolOutputDelta { tool_name, delta } => {
                println!("  {tool_name} | {delta}");
            }
            AgentEvent::ApprovalRequest { tool, summary, respond } => {
                println!("\n{summary}");
                print!("Approve running `{tool}`? [y/N] ");
                use std::io::Write;
                let _ = std::io::stdout().flush();

                let mut line = String::new();
                let _ = stdin.read_line(&mut line).await;
                let approved = matches!(line.trim().to_lowercase().as_str(), "y" | "yes");

                if let Some(sender) = respond.lock().await.take() {
                    let _ = sender.send(approved);
                }
            }
            AgentEvent::Clarification { question, respond } => {
                println!("\n{question}");
                print!("> ");
                use std::io::Write;
                let _ = std::io::stdout().flush();

                let mut line = String::new();
                let _ = stdin.read_line(&mut line).await;

                if let Some(sender) = respond.lock().await.take() {
                    let _ = sender.send(line.trim().to_string());
                }
            }
            AgentEvent::Finished { status, summary } => {
                println!("\n=== {status} ===\n{summary}");
            }
        }
    }
}
