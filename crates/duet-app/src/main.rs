mod cli;
mod events;
mod join;
mod loopback;
mod settings;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Command;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Config is read before logging so its level can apply; errors are
    // reported once the subscriber is up.
    let loaded = duet_config::load_config(args.config.as_deref());
    let log_directive = match (&args.log_level, &loaded) {
        (Some(level), _) => settings::log_directive(level),
        (None, Ok(config)) => config.logging.level.directive().to_string(),
        (None, Err(_)) => "duet=info,duet_call=info".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();

    tracing::info!("Duet v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        duet_config::DuetConfig::default()
    });

    let result = match args.command {
        Command::Loopback {
            duration_secs,
            hangup_after,
            deny_microphone,
        } => {
            let options = loopback::LoopbackOptions {
                duration_secs,
                hangup_after,
                deny_microphone,
            };
            loopback::run(&config, options).await.map(|_| ())
        }
        Command::Join {
            match_id,
            role,
            url,
            hangup_after,
        } => {
            let options = join::JoinOptions {
                match_id,
                role,
                url,
                hangup_after,
            };
            join::run(&config, options).await
        }
        Command::Config => {
            println!("{}", duet_config::config_to_json(&config));
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}
