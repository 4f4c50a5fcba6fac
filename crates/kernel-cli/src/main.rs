use std::env;
use std::net::SocketAddr;

use contracts::{ActionPayload, GameConfig, PlayerAction};
use kernel_api::{serve, Collaborators, EngineApi};
use kernel_core::personas::all_personas;
use kernel_core::ProposalPreview;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn print_usage() {
    println!("citypulse <command>");
    println!("commands:");
    println!("  status");
    println!("  preview");
    println!("  personas");
    println!("  demo");
    println!("    plays one scripted turn; uses the text service when CITYPULSE_LLM_API_KEY is set");
    println!("  serve [addr]");
    println!("    default addr: $CITYPULSE_ADDR or {DEFAULT_ADDR}");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value
        .cloned()
        .or_else(|| env::var("CITYPULSE_ADDR").ok())
        .filter(|addr| !addr.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_preview(preview: &ProposalPreview) {
    let diff = &preview.diff;
    println!(
        "phase={} projected_cost={} budget={} budget_after={}",
        preview.phase, diff.projected_cost, preview.budget, preview.budget_after
    );
    println!(
        "delta satisfaction={:+} economy={:+} environment={:+} budget={:+}",
        diff.metric_delta.satisfaction,
        diff.metric_delta.economy,
        diff.metric_delta.environment,
        diff.budget_delta
    );
    for violation in &preview.constraints.violations {
        println!("violation: {violation}");
    }
}

fn play_demo(collaborators: Collaborators) -> Result<(), String> {
    let mut api = EngineApi::with_collaborators(GameConfig::default(), collaborators)
        .map_err(|err| err.message)?;
    let game_id = api.game_id().to_string();

    let script = [
        ActionPayload::Chat {
            persona_id: "aunt_zhang".to_string(),
            text: "What worries the neighbours most about the factory?".to_string(),
        },
        ActionPayload::Advance,
        ActionPayload::SetCellType {
            cell_id: "3-3".to_string(),
            cell_type: "park".to_string(),
        },
        ActionPayload::SetCellType {
            cell_id: "0-2".to_string(),
            cell_type: "residential".to_string(),
        },
        ActionPayload::SubmitProposal {
            strategy_text: "Green infrastructure on the east block and new homes with right to return"
                .to_string(),
        },
        ActionPayload::RequestApproval {
            strategy_text: None,
        },
        ActionPayload::Advance,
    ];

    for (index, payload) in script.into_iter().enumerate() {
        let action = PlayerAction::new(format!("demo-{:03}", index + 1), game_id.clone(), payload);
        let result = api.submit_action(action);
        match &result.error {
            None => println!("{} accepted -> {}", result.action_type, result.phase),
            Some(error) => {
                return Err(format!(
                    "{} rejected: {:?} {}",
                    result.action_type, error.error_code, error.message
                ))
            }
        }
    }

    for message in api.messages() {
        println!("[{}] {}: {}", message.channel_id, message.sender_name, message.content);
    }
    for item in api.news() {
        println!("news ({:?}) {}: {}", item.sentiment, item.title, item.content);
    }
    println!("{}", api.status());
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => match EngineApi::from_config(GameConfig::default()) {
            Ok(api) => println!("{}", api.status()),
            Err(err) => {
                eprintln!("error: {}", err.message);
                std::process::exit(1);
            }
        },
        Some("preview") => {
            let preview = EngineApi::from_config(GameConfig::default())
                .and_then(|api| api.preview());
            match preview {
                Ok(preview) => print_preview(&preview),
                Err(err) => {
                    eprintln!("error: {}", err.message);
                    std::process::exit(1);
                }
            }
        }
        Some("personas") => {
            for persona in all_personas() {
                let chat = if persona.is_chattable() { "" } else { " (not chattable)" };
                println!("{} - {}, {}{}", persona.id, persona.name, persona.role, chat);
            }
        }
        Some("demo") => {
            let outcome =
                tokio::task::spawn_blocking(|| play_demo(Collaborators::from_env())).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    eprintln!("demo failed: {err}");
                    std::process::exit(1);
                }
                Err(err) => {
                    eprintln!("demo task failed: {err}");
                    std::process::exit(1);
                }
            }
        }
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let collaborators = match tokio::task::spawn_blocking(Collaborators::from_env).await
                {
                    Ok(collaborators) => collaborators,
                    Err(err) => {
                        eprintln!("failed to prepare collaborators: {err}");
                        std::process::exit(1);
                    }
                };
                println!("serving api on http://{addr}");
                if let Err(err) = serve(addr, collaborators).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        _ => {
            print_usage();
        }
    }
}
