use std::{path::PathBuf, process, sync::Arc};

use pressroom::{
    application::{error::AppError, repos::DocumentStore},
    cache::{CacheConfig, Clock, QuotaLimits, ReadCaches, SystemClock, spawn_revalidation},
    config::{self, StoreBackend},
    infra::{
        error::InfraError,
        http::{self, AdminState, HttpState},
        store::{HttpDocumentStore, MemoryStore},
        telemetry,
    },
};
use reqwest::Url;
use time::OffsetDateTime;
use tokio::{io::AsyncWriteExt, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Report(args) => run_report(args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let source = build_store(&settings.store).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.cache.timezone));
    let cache_config = CacheConfig::from(&settings.cache);
    let caches = Arc::new(ReadCaches::build(
        &cache_config,
        QuotaLimits::from(&settings.quota),
        source,
        clock,
    ));

    info!(
        target = "pressroom::serve",
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        timezone = %settings.cache.timezone,
        "Read caches ready"
    );

    let revalidation_handle = settings
        .revalidation
        .interval
        .map(|every| spawn_revalidation(Arc::clone(&caches), every));

    let result = serve_http(&settings, caches).await;

    if let Some(handle) = revalidation_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn build_store(store: &config::StoreSettings) -> Result<Arc<dyn DocumentStore>, AppError> {
    match store.backend {
        StoreBackend::Memory => {
            let memory = match store.seed_file.as_deref() {
                Some(path) => MemoryStore::from_seed_file(path).await?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(memory))
        }
        StoreBackend::Http => {
            let base_url = store
                .base_url
                .clone()
                .ok_or_else(|| InfraError::configuration("store base url is not configured"))?;
            let client = HttpDocumentStore::new(base_url, store.api_key.clone(), store.timeout)?;
            Ok(Arc::new(client))
        }
    }
}

async fn serve_http(settings: &config::Settings, caches: Arc<ReadCaches>) -> Result<(), AppError> {
    let public_router = http::build_router(HttpState {
        caches: Arc::clone(&caches),
    });
    let admin_router = http::build_admin_router(AdminState { caches });

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let public_server = axum::serve(public_listener, public_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_report(args: config::ReportArgs) -> Result<(), AppError> {
    let base = Url::parse(&args.admin_url)
        .map_err(|err| AppError::validation(format!("invalid admin url: {err}")))?;
    let url = base
        .join("/cache/report")
        .map_err(|err| AppError::validation(format!("invalid admin url: {err}")))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("pressroom/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| InfraError::admin_request(err.to_string()))?;
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| InfraError::admin_request(format!("GET {url}: {err}")))?;
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| InfraError::admin_request(format!("GET {url}: {err}")))?;
    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(InfraError::admin_request(format!("status {status} body {text}")).into());
    }

    match args.output {
        Some(path) if path.as_os_str() == "-" => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&body).await.map_err(InfraError::from)?;
            stdout.flush().await.map_err(InfraError::from)?;
        }
        output => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "pressroom-report-{}.json",
                    OffsetDateTime::now_utc().unix_timestamp()
                ))
            });
            tokio::fs::write(&path, &body)
                .await
                .map_err(InfraError::from)?;
            info!(
                target = "pressroom::report",
                path = %path.display(),
                bytes = body.len(),
                "Cache report written"
            );
        }
    }

    Ok(())
}
