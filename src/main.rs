//! menuctl - Inspect navigation menus served by the menu service
//!
//! A command-line shell over the menu client library: fetches the menu tree
//! for a token (falling back to the local tree when the service is down),
//! filters it, and prints trees, breadcrumbs, statistics or validation reports.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menu_client::cli::{render_breadcrumb, render_stats, render_tree, Cli, Command};
use menu_client::data::load_fallback_menus;
use menu_client::service::MenuService;
use menu_client::transform::{
    build_breadcrumb, compute_stats, filter_by_permission, filter_visible, validate,
};

/// Sets up logging to stderr, honoring `RUST_LOG`
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menuctl=info,menu_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let mut service = MenuService::new(cli.service_config())?;
    if let Some(path) = &cli.fallback_file {
        service = service.with_fallback_menus(load_fallback_menus(path)?);
    }
    let token = cli.token.as_deref();

    match &cli.command {
        Command::Tree {
            visible_only,
            permissions,
        } => {
            let mut menus = service.get_user_menus(token).await?;
            if *visible_only {
                menus = filter_visible(&menus);
            }
            if let Some(granted) = permissions {
                menus = filter_by_permission(&menus, granted);
            }
            print!("{}", render_tree(&menus, &cli.locale));
        }
        Command::Check { menu_id } => {
            let allowed = service.check_permission(token, menu_id).await;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Validate => {
            let menus = service.get_user_menus(token).await?;
            let report = validate(&menus);
            for error in &report.errors {
                println!("error: {}", error);
            }
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            println!(
                "{} menus checked, {} errors, {} warnings",
                report.total_nodes,
                report.errors.len(),
                report.warnings.len()
            );
            if !report.is_valid() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Stats => {
            let menus = service.get_user_menus(token).await?;
            print!("{}", render_stats(&compute_stats(&menus)));
        }
        Command::Breadcrumb { path } => {
            let menus = service.get_user_menus(token).await?;
            let trail = build_breadcrumb(&menus, path);
            if trail.is_empty() {
                eprintln!("No menu with path {}", path);
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", render_breadcrumb(&trail, &cli.locale));
        }
    }

    Ok(ExitCode::SUCCESS)
}
