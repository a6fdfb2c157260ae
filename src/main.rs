use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use trusty_poll::commands::{self, Command, HELP};
use trusty_poll::config::Config;
use trusty_poll::db::Database;
use trusty_poll::handlers::{describe_update, handle_command};
use trusty_poll::models::seed;
use trusty_poll::session::SessionGuard;
use trusty_poll::store::{PollStore, Subscription};

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    info!("Using storage at {}", config.database_url);

    // Every process pointed at the same database is one tab of the same origin
    let database = Database::connect(&config.database_url).await?;
    let store = PollStore::new(Arc::new(database), config);
    store.bootstrap().await;

    let _subscriptions: Vec<Subscription> = seed::catalogue()
        .iter()
        .map(|poll| {
            store.subscribe(poll.id, |update| {
                info!("{}", describe_update(update));
            })
        })
        .collect();

    let mut guard = SessionGuard::new();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            None => continue,
            Some(Err(e)) => println!("{}", e),
            Some(Ok(Command::Quit)) => break,
            Some(Ok(command)) => println!("{}", handle_command(&store, &mut guard, command).await),
        }
    }

    info!("Tab {} closing", store.tab_id());
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}
