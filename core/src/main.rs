mod cors;

use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::env_config::Config;
use log::info;
use reminder::{
    ReminderScheduler, Runner, SchedulerConfig,
    adapters::{EmailNotificationSender, PgSubscriptionLookup, PgWorkflowStore},
    ports::{Clock, SystemClock, WorkflowStore},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // reminder workflow
    let store: Arc<dyn WorkflowStore> = Arc::new(PgWorkflowStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::new(PgSubscriptionLookup::new(pool.clone())),
        Arc::new(EmailNotificationSender::from_config(&config.mail)),
        SchedulerConfig::from_config(&config.reminder),
    ));
    let runner = Arc::new(Runner::new(
        store.clone(),
        scheduler,
        clock.clone(),
        &config.workflow,
    ));
    actix_web::rt::spawn(runner.run());

    // shared by every worker
    let global_limiter = limiter::global_middleware(&config.rate_limit);
    let ip_limiter = limiter::ip_middleware(&config.rate_limit);

    info!(
        "Listening on {}:{} ({})",
        config.server_host, config.server_port, config.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(clock.clone()))
            .wrap(ip_limiter.clone()) // 5th
            .wrap(logger::middleware(pool.clone(), &config_data)) // 4th
            .wrap(extractor::middleware(config_data.clone())) // 3rd
            .wrap(cors::middleware(&origin)) // 2nd
            .wrap(global_limiter.clone()) // 1st
            .service(
                web::scope("/api/v1")
                    .service(api_auth::mount_auth())
                    .service(reminder::mount_workflows(
                        config_data.workflow_api_keys.clone(),
                    ))
                    .service(
                        api_auth::mount_users().wrap(api_auth::auth_middleware(pool.clone())),
                    )
                    .service(
                        api_subs::mount_subscriptions()
                            .wrap(api_auth::auth_middleware(pool.clone())),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
