//! Bootstraps the stored session against an HTTP API and prints the result.
//!
//! Run with: AUTHSESSION_API_URL=http://localhost:8080/api cargo run -p bootstrap-cli
//!
//! Pass `login <token>` to store a credential first, or `logout` to clear it.

use std::sync::Arc;

use anyhow::Context;
use authsession_bootstrap::SessionFacade;
use authsession_core::{Credential, PermissionsFetcher};
use authsession_http::{HttpEndpoints, HttpIdentityFetcher, HttpPermissionsFetcher};
use authsession_store::{SessionStore, StoreConfig, backend::FileBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ENV_API_URL: &str = "AUTHSESSION_API_URL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = StoreConfig::from_env();
    let api_url = std::env::var(ENV_API_URL).with_context(|| format!("{ENV_API_URL} is not set"))?;
    let endpoints = HttpEndpoints::from_base(&api_url);

    let store = SessionStore::new(Arc::new(FileBackend::new(config.dir.clone())), config.key.clone());
    tracing::info!(dir = %config.dir.display(), key = %config.key, "Using credential store");

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("login") => {
            let token = args.next().context("usage: bootstrap-cli login <token>")?;
            store.set(&Credential::new(token));
        }
        Some("logout") => {
            store.remove();
            println!("Logged out");
            return Ok(());
        }
        Some(other) => anyhow::bail!("unknown command: {other}"),
        None => {}
    }

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let identity = Arc::new(HttpIdentityFetcher::new(client.clone(), endpoints.identity_url));
    let facade = SessionFacade::with_permissions(
        store,
        identity,
        |session| -> Arc<dyn PermissionsFetcher> {
            Arc::new(HttpPermissionsFetcher::new(client, endpoints.permissions_url, session))
        },
    );

    facade.on_change(|session| {
        tracing::debug!(authenticated = session.is_authenticated(), "Session changed");
    });

    facade.bootstrap()?;
    let phase = facade.wait_until_bootstrapped().await;

    let session = facade.current();
    println!("phase:         {phase:?}");
    match session.credential() {
        Some(_) => println!("authenticated: yes"),
        None => println!("authenticated: no"),
    }
    if let Some(identity) = session.identity() {
        println!(
            "user:          {} ({})",
            identity.id,
            identity.display_name.as_deref().unwrap_or("-")
        );
    }
    if let Some(permissions) = session.permissions() {
        let grants: Vec<&str> = permissions.iter().collect();
        println!("permissions:   {}", grants.join(", "));
    }

    Ok(())
}
