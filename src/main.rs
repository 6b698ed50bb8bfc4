use clap::Parser;
use daily_pricing::calendar::CalendarRegistry;
use daily_pricing::cli::{print_info, Cli, Commands};
use daily_pricing::config::Config;
use daily_pricing::store::StoreRegistry;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = daily_pricing::telemetry::init_telemetry(&config.telemetry)?;

    if let Commands::Config = cli.command {
        println!("Current configuration:");
        println!("  Store: {}", config.store.path.display());
        println!("  Calendar: {}", config.store.calendar);
        println!("  Cache capacity: {}", config.store.cache_capacity);
        println!(
            "  Logging: {} ({:?})",
            config.telemetry.log_level, config.telemetry.log_format
        );
        match config.telemetry.metrics_port {
            Some(port) => println!("  Metrics: :{}", port),
            None => println!("  Metrics: disabled"),
        }
        return Ok(());
    }

    if let Some(dir) = config.store.path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let registry = StoreRegistry::new(CalendarRegistry::default(), config.store.cache_capacity);
    let store = registry.open(&config.store.path, &config.store.calendar)?;

    match cli.command {
        Commands::Info => print_info(&store)?,
        Commands::Value(args) => args.execute(&store)?,
        Commands::Arrays(args) => args.execute(&store)?,
        Commands::Import(args) => args.execute(&store)?,
        Commands::Export(args) => args.execute(&store)?,
        Commands::Config => {}
    }

    Ok(())
}
