use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use toolgate_core::config::{AuthorizerConfig, AuthorizerHandle};
use toolgate_core::security::add_grants_from_user_message;
use toolgate_traits::{AuthError, Authorizer};

use crate::approval::spawn_terminal_approver;
use crate::cli::{Cli, Commands, RequestArgs, ShellArgs};
use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
struct Classification<'a> {
    argv: &'a [String],
    classification: String,
}

#[derive(Serialize)]
struct Outcome {
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the selected command. Returns false when authorization was refused.
pub async fn run(cli: Cli) -> Result<bool> {
    let path = cli.config.clone().or_else(AuthorizerConfig::default_path);
    let mut config = AuthorizerConfig::load_from_path(path)?;
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }

    match cli.command {
        Commands::Config => {
            if cli.format.is_json() {
                print_json(&config)?;
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(true)
        }
        Commands::Classify { ref argv } => {
            let result = config.shell_commands().check(argv)?;
            if cli.format.is_json() {
                print_json(&Classification {
                    argv,
                    classification: result.to_string(),
                })?;
            } else {
                println!("{result}");
            }
            Ok(true)
        }
        Commands::Read(ref args) => {
            let handle = open(&cli, &config)?;
            let paths = absolute_paths(&args.paths)?;
            let tool = args.tool.as_deref().unwrap_or("read_file");
            authorize(handle, &args.request, cli.format, |auth, req| async move {
                auth.is_authorized_for_read(req.explicit, &req.reason, tool, &paths)
                    .await
            })
            .await
        }
        Commands::Write(ref args) => {
            let handle = open(&cli, &config)?;
            let paths = absolute_paths(&args.paths)?;
            let tool = args.tool.as_deref().unwrap_or("write_file");
            authorize(handle, &args.request, cli.format, |auth, req| async move {
                auth.is_authorized_for_write(req.explicit, &req.reason, tool, &paths)
                    .await
            })
            .await
        }
        Commands::Shell(ShellArgs {
            ref cwd,
            ref request,
            ref argv,
        }) => {
            let handle = open(&cli, &config)?;
            authorize(handle, request, cli.format, |auth, req| async move {
                auth.is_shell_authorized(req.explicit, &req.reason, cwd, argv)
                    .await
            })
            .await
        }
    }
}

fn open(cli: &Cli, config: &AuthorizerConfig) -> Result<AuthorizerHandle> {
    let sandbox = match cli.sandbox.clone().or_else(|| config.sandbox_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve the current directory")?,
    };
    config.build(&sandbox)
}

fn absolute_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|p| {
            std::path::absolute(p).with_context(|| format!("Failed to resolve {}", p.display()))
        })
        .collect()
}

/// Serve the approval queue while `call` runs, then shut the authorizer down.
async fn authorize<'a, F, Fut>(
    handle: AuthorizerHandle,
    request: &'a RequestArgs,
    format: OutputFormat,
    call: F,
) -> Result<bool>
where
    F: FnOnce(Arc<dyn Authorizer>, &'a RequestArgs) -> Fut,
    Fut: Future<Output = toolgate_traits::Result<()>>,
{
    let AuthorizerHandle {
        authorizer,
        requests,
    } = handle;
    let approver = requests.map(spawn_terminal_approver);

    for message in &request.grants {
        add_grants_from_user_message(&authorizer, message)
            .context("Authorizer does not support grants")?;
    }

    let result = call(Arc::clone(&authorizer), request).await;
    authorizer.close();
    if let Some(approver) = approver {
        approver.await.context("Approval task failed")?;
    }

    report(result, format)
}

fn report(result: toolgate_traits::Result<()>, format: OutputFormat) -> Result<bool> {
    let outcome = match result {
        Ok(()) => Outcome {
            allowed: true,
            error: None,
        },
        Err(e) if e.is_denial() || e.is_closed() => Outcome {
            allowed: false,
            error: Some(e.to_string()),
        },
        Err(e) => return Err(input_error(e)),
    };

    if format.is_json() {
        print_json(&outcome)?;
    } else if outcome.allowed {
        println!("{}", "allowed".green().bold());
    } else {
        println!(
            "{} {}",
            "denied:".red().bold(),
            outcome.error.as_deref().unwrap_or_default()
        );
    }
    Ok(outcome.allowed)
}

fn input_error(e: AuthError) -> anyhow::Error {
    anyhow::Error::new(e).context("Invalid authorization request")
}
