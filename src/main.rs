use clap::Parser;
use screen_script::cli::commands::{RunPaths, cmd_classify, cmd_compile, cmd_run, cmd_skeleton};
use screen_script::cli::config::{Cli, Commands, load_config};
use screen_script::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Run {
            doc,
            script,
            trace,
            report,
            no_dependency,
            driver,
            driver_args,
        } => {
            let paths = RunPaths {
                doc,
                script,
                trace,
                report,
            };
            let completed = cmd_run(
                &paths,
                no_dependency,
                driver.as_deref(),
                &driver_args,
                &config,
                cli.ollama_endpoint.as_deref(),
                cli.ollama_model.as_deref(),
            )?;
            if !completed {
                std::process::exit(1);
            }
        }
        Commands::Compile { script, output } => {
            cmd_compile(&script, output.as_deref())?;
        }
        Commands::Classify { doc, snapshot } => {
            cmd_classify(&doc, &snapshot, &config)?;
        }
        Commands::Skeleton { snapshots } => {
            cmd_skeleton(&snapshots)?;
        }
    }

    Ok(())
}
