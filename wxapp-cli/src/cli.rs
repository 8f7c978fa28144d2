use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, Select, Text};
use std::fmt;
use tracing::debug;

use wxapp_core::{
    AuthSummary, Config, Domain, ForecastKind, Frame, LifecycleController, SessionError,
    canonical::{self, NamingScheme},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxapp", version, about = "Weather data source session")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API endpoint, Cognito client and default domain.
    Configure,

    /// Start an interactive session.
    Session {
        /// Domain to log in under; defaults to the configured one.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Show the canonical name of a weather variable and its aliases.
    Canonical {
        /// Variable name in any supported naming scheme, e.g. "t2".
        name: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Session { domain } => {
                let config = Config::load()?;
                let domain = match domain {
                    Some(value) => value.parse::<Domain>()?,
                    None => config.default_domain,
                };
                run_session(&config, domain).await
            }
            Command::Canonical { name } => {
                print_canonical(&name);
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let Some(url) = ask(Text::new("API base URL:").with_default(&config.api_base_url).prompt())?
    else {
        return Ok(());
    };
    let Some(region) =
        ask(Text::new("Cognito region:").with_default(&config.cognito.region).prompt())?
    else {
        return Ok(());
    };
    let Some(client_id) =
        ask(Text::new("Cognito client ID:").with_default(&config.cognito.client_id).prompt())?
    else {
        return Ok(());
    };
    let Some(domain) = ask(pick_domain("Default domain:", config.default_domain))? else {
        return Ok(());
    };

    config.api_base_url = url.trim().to_string();
    config.cognito.region = region.trim().to_string();
    config.cognito.client_id = client_id.trim().to_string();
    config.default_domain = domain;
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Login,
    ChangeDomain,
    Logout,
    SelectProvider,
    ShowVariables,
    InspectModel,
    Quit,
}

impl Action {
    fn available(auth: &AuthSummary) -> Vec<Action> {
        let mut actions = match auth {
            AuthSummary::Authenticated { .. } => {
                vec![Action::ChangeDomain, Action::Logout, Action::Login]
            }
            _ => vec![Action::Login],
        };
        actions.extend([
            Action::SelectProvider,
            Action::ShowVariables,
            Action::InspectModel,
            Action::Quit,
        ]);
        actions
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Login => "Log in",
            Action::ChangeDomain => "Change domain",
            Action::Logout => "Log out",
            Action::SelectProvider => "Select data source",
            Action::ShowVariables => "Show available variables",
            Action::InspectModel => "Inspect one model",
            Action::Quit => "Quit",
        };
        f.write_str(label)
    }
}

async fn run_session(config: &Config, login_domain: Domain) -> Result<()> {
    let mut controller = LifecycleController::from_config(config)?;

    loop {
        let frame = controller.observe();
        render(&frame);

        let Some(action) = ask(Select::new("What next?", Action::available(&frame.auth)).prompt())?
        else {
            break;
        };

        let outcome = match action {
            Action::Login => login(&mut controller, login_domain).await,
            Action::ChangeDomain => change_domain(&mut controller, &frame),
            Action::Logout => {
                controller.logout();
                Ok(())
            }
            Action::SelectProvider => select_provider(&mut controller, &frame),
            Action::ShowVariables => show_variables(&mut controller, &frame).await,
            Action::InspectModel => inspect_model(&mut controller, &frame).await,
            Action::Quit => break,
        };

        // Session errors are reported and the loop keeps going.
        if let Err(err) = outcome {
            match err.downcast_ref::<SessionError>() {
                Some(session_err) => eprintln!("Error: {session_err}"),
                None => return Err(err),
            }
        }
    }

    Ok(())
}

fn render(frame: &Frame) {
    if frame.notification {
        for provider in frame.providers.iter().filter(|p| p.requires_auth) {
            println!("{} data source is now available", provider.name);
        }
    }
    if !frame.rerender {
        return;
    }

    match &frame.auth {
        AuthSummary::Anonymous => println!("Not logged in"),
        AuthSummary::Authenticating => println!("Logging in..."),
        AuthSummary::Authenticated { domain, since } => println!(
            "Logged in, domain {domain} (since {})",
            since.with_timezone(&Local).format("%H:%M:%S")
        ),
        AuthSummary::Failed { reason } => println!("Login failed: {reason}"),
    }

    let names: Vec<&str> = frame.providers.iter().map(|p| p.name.as_str()).collect();
    println!(
        "Data sources: {} (selected: {})",
        names.join(", "),
        frame.selection.as_deref().unwrap_or("none")
    );
}

async fn login(controller: &mut LifecycleController, default: Domain) -> Result<()> {
    let Some(username) = ask(Text::new("Username:").prompt())? else {
        return Ok(());
    };
    let Some(password) = ask(Password::new("Password:").without_confirmation().prompt())? else {
        return Ok(());
    };
    let Some(domain) = ask(pick_domain("Domain:", default))? else {
        return Ok(());
    };

    controller.login_in(username.trim(), &password, domain).await?;
    Ok(())
}

fn change_domain(controller: &mut LifecycleController, frame: &Frame) -> Result<()> {
    let current = match frame.auth {
        AuthSummary::Authenticated { domain, .. } => domain,
        _ => controller.default_domain(),
    };
    let Some(domain) = ask(pick_domain("New domain:", current))? else {
        return Ok(());
    };

    if !controller.change_domain(domain)? {
        println!("Already using domain {domain}");
    }
    Ok(())
}

fn select_provider(controller: &mut LifecycleController, frame: &Frame) -> Result<()> {
    let Some(name) = ask_provider(frame)? else {
        return Ok(());
    };
    controller.set_selection(&name)?;
    Ok(())
}

async fn show_variables(controller: &mut LifecycleController, frame: &Frame) -> Result<()> {
    let Some(provider) = frame.selection.clone() else {
        println!("No data source available");
        return Ok(());
    };

    let union = controller.available_variables(&provider).await?;
    println!("{} variables from {provider}:", union.len());
    for (name, origin) in &union.variables {
        if *name == origin.raw_name {
            println!("  {name}  [{}]", origin.model);
        } else {
            println!("  {name}  ({} in {})", origin.raw_name, origin.model);
        }
    }
    for failure in &union.failures {
        eprintln!("Warning: {failure:#}");
    }
    Ok(())
}

async fn inspect_model(controller: &mut LifecycleController, frame: &Frame) -> Result<()> {
    let Some(provider) = frame.selection.clone() else {
        println!("No data source available");
        return Ok(());
    };
    let Some(instance) = controller.instance(&provider) else {
        return Err(SessionError::UnknownProvider(provider).into());
    };
    let models = instance.available_models(ForecastKind::All);

    let Some(model) = ask(Select::new("Model:", models).prompt())? else {
        return Ok(());
    };
    let domain = instance.metadata_domain(model);
    debug!(provider = %provider, model, domain = %domain, "inspecting model");

    let vars = controller.get_variables(&provider, model, &domain).await?;
    println!("{model} ({domain}): {} variables", vars.len());
    for raw in &vars {
        let canonical = canonical::to_canonical(raw);
        if canonical == *raw {
            println!("  {raw}");
        } else {
            println!("  {raw} -> {canonical}");
        }
    }
    Ok(())
}

fn print_canonical(name: &str) {
    let canonical = canonical::to_canonical(name);
    if !canonical::canonical_names().contains(&canonical.as_str()) {
        println!("{name}: no canonical mapping");
        return;
    }

    println!("canonical: {canonical}");
    println!("aws:       {}", canonical::from_canonical(&canonical, NamingScheme::Aws));
    println!("meteostat: {}", canonical::from_canonical(&canonical, NamingScheme::Meteostat));

    let aliases: Vec<String> = canonical::alternatives(&canonical).into_iter().collect();
    if !aliases.is_empty() {
        println!("aliases:   {}", aliases.join(", "));
    }
}

fn ask_provider(frame: &Frame) -> Result<Option<String>> {
    let names: Vec<String> = frame.providers.iter().map(|p| p.name.clone()).collect();
    let cursor = frame
        .selection
        .as_ref()
        .and_then(|s| names.iter().position(|n| n == s))
        .unwrap_or(0);

    ask(Select::new("Data source:", names).with_starting_cursor(cursor).prompt())
}

fn pick_domain(message: &str, current: Domain) -> Result<Domain, InquireError> {
    let domains = Domain::all().to_vec();
    let cursor = domains.iter().position(|d| *d == current).unwrap_or(0);

    Select::new(message, domains).with_starting_cursor(cursor).prompt()
}

/// Map Esc / Ctrl-C to `None` so callers can back out quietly.
fn ask<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read input"),
    }
}
