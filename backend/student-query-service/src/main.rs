use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_query_service::config::{Config, DatabaseConfig, FailurePolicy, StorageBackend};
use student_query_service::consumers::{
    DeadLetterPublisher, DeadLetterSink, StudentEventsConsumer,
};
use student_query_service::handlers;
use student_query_service::repository::{
    InMemoryStudentRepository, PostgresStudentRepository, StudentRepository,
};
use student_query_service::services::StudentQueryService;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "student_query_service=info,rdkafka=warn".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect_postgres(database: &DatabaseConfig) -> Result<PostgresStudentRepository> {
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect(&database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("Failed to verify database connection")?;
    info!("✅ Database pool created and verified");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations completed");

    Ok(PostgresStudentRepository::new(pool))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("🔧 Starting student-query-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "✅ Configuration loaded: env={}, http_port={}, storage={:?}, kafka_enabled={}",
        config.app.env, config.app.http_port, config.storage.backend, config.kafka.enabled
    );

    let repository: Arc<dyn StudentRepository> = match config.storage.backend {
        StorageBackend::Postgres => {
            let database = config
                .storage
                .database
                .as_ref()
                .ok_or_else(|| anyhow!("postgres storage selected without database config"))?;
            Arc::new(connect_postgres(database).await?)
        }
        StorageBackend::Memory => {
            warn!("⚠️  Using in-memory student store; projection is rebuilt from the topic on restart");
            Arc::new(InMemoryStudentRepository::new())
        }
    };

    let service = Arc::new(StudentQueryService::new(repository));

    let mut join_set = JoinSet::new();

    // Read API
    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    let http_service = service.clone();
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(http_service.clone()))
            .configure(handlers::configure)
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .run();

    join_set.spawn(async move {
        http_server
            .await
            .map_err(|e| anyhow!("HTTP server error: {}", e))
    });
    info!("✅ HTTP server listening on http://{}", http_addr);

    // Event subscription
    if config.kafka.enabled {
        let dead_letters: Option<Arc<dyn DeadLetterSink>> = match config.kafka.failure_policy {
            FailurePolicy::DeadLetter => {
                let publisher = DeadLetterPublisher::new(
                    &config.kafka.brokers,
                    &config.kafka.dlq_topic,
                    config.kafka.dlq_timeout_ms,
                )
                .context("Failed to create DLQ publisher")?;
                info!("✅ Student events DLQ enabled: topic={}", publisher.topic());
                Some(Arc::new(publisher))
            }
            FailurePolicy::Drop | FailurePolicy::Retry => None,
        };

        let consumer = StudentEventsConsumer::new(&config.kafka, service.clone(), dead_letters)
            .context("Failed to create student events consumer")?;
        join_set.spawn(async move {
            consumer
                .run(shutdown_signal())
                .await
                .map_err(|e| anyhow!("Student events consumer failed: {}", e))
        });
        info!(
            "✅ Student events consumer started (topic: {}, group: {})",
            config.kafka.topic, config.kafka.group_id
        );
    } else {
        info!("Student events consumer disabled (KAFKA_ENABLED=false)");
    }

    info!("🎉 student-query-service is running");

    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => {
                info!("Task completed successfully");
            }
            Ok(Err(e)) => {
                error!("Task failed: {:#}", e);
                return Err(e);
            }
            Err(e) => {
                error!("Task panicked: {:#}", e);
                return Err(anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("🛑 student-query-service shutting down");
    Ok(())
}
