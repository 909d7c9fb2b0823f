use anyhow::{bail, Context, Result};
use opsauth::core::config::Config;
use opsauth::core::error::AuthError;
use opsauth::core::startup::Storage;
use opsauth::core::state::AppState;
use opsauth::core::tracing_init::init_tracing;
use opsauth::models::outcome::Outcome;
use opsauth::models::user::ProfileUpdate;
use opsauth::rbac::evaluator;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

const USAGE: &str = "\
usage: opsauth [--config <path>] <command> [args...]

commands:
  register <name> <email> <password> <confirm>
  login <email> <password>
  logout
  whoami
  sessions
  terminate <session-id>
  terminate-others
  passwd <current> <new> <confirm>
  2fa
  profile <json>
  can <permission>
  page <path>
  permissions";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Register {
        name: String,
        email: String,
        password: String,
        confirm: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    WhoAmI,
    Sessions,
    Terminate {
        session_id: String,
    },
    TerminateOthers,
    Passwd {
        current: String,
        new: String,
        confirm: String,
    },
    TwoFactor,
    Profile {
        json: String,
    },
    Can {
        permission: String,
    },
    Page {
        path: String,
    },
    Permissions,
}

fn parse_args(args: &[String]) -> Result<(PathBuf, Command)> {
    let mut config_path = PathBuf::from("config.toml");
    let mut rest = args;

    if rest.first().map(String::as_str) == Some("--config") {
        let Some(path) = rest.get(1) else {
            bail!("--config needs a path\n\n{}", USAGE);
        };
        config_path = PathBuf::from(path);
        rest = &rest[2..];
    }

    let Some((name, params)) = rest.split_first() else {
        bail!("missing command\n\n{}", USAGE);
    };
    let arg = |i: usize| -> Result<String> {
        params
            .get(i)
            .cloned()
            .with_context(|| format!("'{}' is missing an argument\n\n{}", name, USAGE))
    };

    let command = match name.as_str() {
        "register" => Command::Register {
            name: arg(0)?,
            email: arg(1)?,
            password: arg(2)?,
            confirm: arg(3)?,
        },
        "login" => Command::Login {
            email: arg(0)?,
            password: arg(1)?,
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "sessions" => Command::Sessions,
        "terminate" => Command::Terminate { session_id: arg(0)? },
        "terminate-others" => Command::TerminateOthers,
        "passwd" => Command::Passwd {
            current: arg(0)?,
            new: arg(1)?,
            confirm: arg(2)?,
        },
        "2fa" => Command::TwoFactor,
        "profile" => Command::Profile { json: arg(0)? },
        "can" => Command::Can { permission: arg(0)? },
        "page" => Command::Page { path: arg(0)? },
        "permissions" => Command::Permissions,
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    };

    Ok((config_path, command))
}

fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, command) = parse_args(&args)?;

    // Load and validate configuration
    let config = Config::from_file(&config_path)
        .context(format!("Failed to load configuration from '{}'", config_path.display()))?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    // One command per process, no need for worker threads
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path, command))
}

async fn async_main(config: Config, config_path: PathBuf, command: Command) -> Result<ExitCode> {
    info!(
        config_path = %config_path.display(),
        storage = ?config.storage.path,
        log_level = %config.logging.level,
        "opsauth starting"
    );

    let storage = Storage::open(&config.storage)?;
    let compact_after = config.storage.compact_after;
    let state = AppState::new(config, storage)?;

    let restored = state.auth.restore().await?;
    debug!(restored = restored, "Startup restoration finished");

    let (output, success) = run(&state, command).await?;
    println!("{}", output);

    state.storage.maintain(compact_after)?;

    let metrics = state.auth.metrics().snapshot();
    info!(
        logins_succeeded = metrics.logins_succeeded,
        logins_failed = metrics.logins_failed,
        registrations = metrics.registrations,
        logouts = metrics.logouts,
        password_changes = metrics.password_changes,
        "opsauth finished"
    );

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render<T: Serialize>(outcome: Outcome<T>) -> Result<(String, bool)> {
    let success = outcome.success;
    let json = serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?;
    Ok((json, success))
}

/// Role of the signed-in user, for permission queries
fn signed_in_role(state: &AppState) -> Result<String, AuthError> {
    state.auth.current_role().ok_or(AuthError::NotAuthenticated)
}

async fn run(state: &AppState, command: Command) -> Result<(String, bool)> {
    let auth = &state.auth;

    match command {
        Command::Register {
            name,
            email,
            password,
            confirm,
        } => render(auth.register(&name, &email, &password, &confirm).await.into()),
        Command::Login { email, password } => render(auth.login(&email, &password).await.into()),
        Command::Logout => render(auth.logout().await.into()),
        Command::WhoAmI => render(auth.current_user().ok_or(AuthError::NotAuthenticated).into()),
        Command::Sessions => {
            let sessions = if auth.is_authenticated() {
                Ok(auth.current_sessions())
            } else {
                Err(AuthError::NotAuthenticated)
            };
            render(sessions.into())
        }
        Command::Terminate { session_id } => {
            render(auth.terminate_session(&session_id).await.into())
        }
        Command::TerminateOthers => render(auth.terminate_all_other_sessions().await.into()),
        Command::Passwd {
            current,
            new,
            confirm,
        } => render(auth.change_password(&current, &new, &confirm).await.into()),
        Command::TwoFactor => render(auth.toggle_two_factor().await.into()),
        Command::Profile { json } => {
            let update: ProfileUpdate =
                serde_json::from_str(&json).context("Profile update is not valid JSON")?;
            render(auth.update_user(update).await.into())
        }
        Command::Can { permission } => {
            let allowed = signed_in_role(state)
                .map(|role| evaluator::has_permission(&role, &permission));
            render(allowed.into())
        }
        Command::Page { path } => {
            let allowed = signed_in_role(state).map(|role| evaluator::can_access_page(&role, &path));
            render(allowed.into())
        }
        Command::Permissions => {
            let permissions = signed_in_role(state).map(|role| evaluator::role_permissions(&role));
            render(permissions.into())
        }
    }
}
