use clap::Parser;
use sumo_agent::adapters::SumoTools;
use sumo_agent::utils::error::{ErrorSeverity, SumoError};
use sumo_agent::utils::logger;
use sumo_agent::{AppConfig, CliConfig, Orchestrator, Repl, Stages, SumoPipeline};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 中的 OPENAI_API_KEY
    let _ = dotenvy::dotenv();

    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting sumo-agent");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    // 載入並驗證配置
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if args.dry_run {
        display_config_summary(&config, &args);
        return Ok(());
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let stages = match Stages::from_config(&config) {
        Ok(stages) => stages,
        Err(e) => exit_with(e),
    };

    // 不經規劃器，直接執行三個階段
    if let Some(place) = &args.place {
        let pipeline = SumoPipeline::new_with_monitoring(stages, args.monitor);
        match pipeline.run(place, config.demand_params()).await {
            Ok(report) => {
                println!("✅ {}", report);
                return Ok(());
            }
            Err(e) => exit_with(e),
        }
    }

    let orchestrator = match Orchestrator::from_config(&config, &stages) {
        Ok(orchestrator) => orchestrator,
        Err(e) => exit_with(e),
    };

    if let Some(instruction) = &args.once {
        match orchestrator.handle(instruction).await {
            Ok(summary) => {
                println!("\n===== RESULT =====\n");
                println!("{}", summary);
                println!("\n==================\n");
                return Ok(());
            }
            Err(e) => exit_with(e),
        }
    }

    let repl = Repl::new(orchestrator, config.repl.clone());
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let stats = repl.run(stdin, &mut stdout).await?;
    tracing::info!(
        "REPL finished: {} instruction(s), {} failed",
        stats.runs,
        stats.failures
    );

    Ok(())
}

fn exit_with(e: SumoError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Medium => 2, // 可重試
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn display_config_summary(config: &AppConfig, args: &CliConfig) {
    let tools = SumoTools::from_config(&config.sumo);

    println!("📋 Configuration Summary:");
    println!("  Output directory: {}", config.workspace.output_dir);
    println!("  Nominatim: {}", config.map.nominatim_endpoint);
    println!("  Overpass: {}", config.map.overpass_endpoint);
    println!("  Python: {}", config.sumo.python);
    for script in [
        sumo_agent::adapters::sumo_tools::OSM_BUILD,
        sumo_agent::adapters::sumo_tools::RANDOM_TRIPS,
    ] {
        let status = if tools.locate(script).is_ok() { "✅" } else { "❌ missing" };
        println!("  {}: {} {}", script, tools.expected_location(script).display(), status);
    }
    println!(
        "  Process timeout: {}s, retries: {}",
        config.process.timeout_seconds, config.process.retry_attempts
    );
    println!(
        "  Demand: duration {}s, period {}s",
        config.demand.duration,
        config.demand_params().period_arg()
    );
    println!("  Planner: {:?} (model {})", config.agent.planner, config.agent.model);
    println!(
        "  API key: {}",
        if config.api_key().is_some() { "set" } else { "not set" }
    );

    if let Some(place) = &args.place {
        println!("  Mode: direct pipeline for '{}'", place);
    } else if let Some(instruction) = &args.once {
        println!("  Mode: single instruction \"{}\"", instruction);
    } else {
        println!("  Mode: interactive REPL");
    }

    println!();
    println!("🔍 Dry run complete. Nothing was downloaded or executed.");
}
