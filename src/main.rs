//! CLI driver for the gateway core.
//!
//! Stands in for the out-of-scope web UI: runs an analysis through the
//! full quota → webhook → record pipeline, or just prints the current
//! quota decision.

use clap::{Parser, Subcommand};
use prensa_gateway::config::Config;
use prensa_gateway::core::analysis::AnalysisRequest;
use prensa_gateway::core::orchestrator::{QueryOrchestrator, SubmissionOutcome};
use prensa_gateway::core::policy::QuotaDecision;
use prensa_gateway::utils::logging::init_tracing;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "prensa",
    version,
    about = "¿Funcionó mi nota de prensa? — análisis de cobertura con cuota freemium"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analizar la cobertura de una nota de prensa
    Analizar {
        /// Organización que publicó la nota
        #[arg(long)]
        organizacion: String,
        /// Tema de la nota
        #[arg(long)]
        tema: String,
        /// Fecha de publicación (YYYY-MM-DD)
        #[arg(long)]
        fecha: String,
        /// Imprimir el informe completo en texto plano
        #[arg(long)]
        informe: bool,
    },
    /// Mostrar las consultas restantes del visitante actual
    Cuota,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> prensa_gateway::Result<ExitCode> {
    let config = Config::from_env()?;
    let orchestrator = QueryOrchestrator::from_config(&config)?;

    match cli.command {
        Commands::Cuota => {
            print_decision(&orchestrator.check_quota().await);
        }
        Commands::Analizar {
            organizacion,
            tema,
            fecha,
            informe,
        } => {
            let request = AnalysisRequest {
                organizacion,
                tema,
                fecha,
            };

            match orchestrator.submit(&request).await {
                SubmissionOutcome::Blocked(decision) => {
                    println!("Has alcanzado tu límite de consultas gratuitas.");
                    println!("Regístrate o mejora tu plan para seguir analizando.");
                    print_decision(&decision);
                }
                SubmissionOutcome::Completed { result, decision } => {
                    println!("Resultado global: {}", result.resultado_global);
                    if let Some(resumen) = &result.resumen_ejecutivo {
                        println!("\n{}", resumen);
                    }
                    println!("\nCobertura en medios: {}", result.cobertura_medios);
                    println!("Cobertura en radio:  {}", result.cobertura_radio);
                    println!("Cobertura en TV:     {}", result.cobertura_tv);
                    println!("Emisiones:           {}", result.cobertura_emisiones);
                    println!("Duración:            {} días", result.duracion_dias);
                    println!("Alcance estimado:    {}", result.alcance_display());

                    if informe {
                        println!("\n{}", result.render_report(&request));
                    }
                    println!();
                    print_decision(&decision);
                }
                SubmissionOutcome::Failed(err) => {
                    eprintln!("{}", err.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_decision(decision: &QuotaDecision) {
    if decision.is_unlimited() {
        println!("Consultas restantes: ilimitadas (plan Pro)");
    } else {
        println!(
            "Consultas restantes: {} de {} (usadas: {})",
            decision.remaining_queries,
            decision.limit.unwrap_or(0),
            decision.queries_used
        );
    }
}
