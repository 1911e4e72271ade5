use async_trait::async_trait;
use clap::{Arg, Command as ClapCommand};
use log::LevelFilter;
use roster_warden::transport::{self, MessageKind, MessageReceived};
use roster_warden::{Config, Engine, JoinEvent, RosterConnector, Transport};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let matches = ClapCommand::new("roster-warden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Membership verification and moderation engine for group-messaging communities")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/roster-warden.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Drive the engine over a scripted in-memory transport and roster")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        let config = Config::default();
        match config.to_file(path) {
            Ok(()) => println!("Default configuration written to {path}"),
            Err(e) => {
                eprintln!("Error writing configuration: {e}");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("demo") {
        run_demo().await;
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        print_config_summary(&config);
        println!("Configuration is valid.");
        return;
    }

    print_config_summary(&config);
    println!();
    println!(
        "This build carries no live chat or spreadsheet connector; embed the \
         engine behind your transport, or run with --demo to see it decide \
         a scripted session."
    );
}

fn print_config_summary(config: &Config) {
    println!("Communities: {}", config.communities.len());
    for community in &config.communities {
        println!(
            "  {} ({}) - {} source(s){}",
            community.name,
            community.id,
            community.sources.len(),
            if community.verification {
                ", verification group"
            } else {
                ""
            }
        );
    }
    println!("Broadcast admins: {}", config.broadcast.admins.len());
    println!(
        "Broadcast budget: {} use(s) per {}s window",
        config.broadcast.max_uses, config.broadcast.window_seconds
    );
}

/// Serves the same sample roster for any sheet id, so the demo works with
/// whatever sources the config declares.
struct DemoRoster;

#[async_trait]
impl RosterConnector for DemoRoster {
    async fn fetch_rows(
        &self,
        _sheet_id: &str,
        _partition: Option<&str>,
    ) -> anyhow::Result<Vec<Vec<String>>> {
        Ok(vec![vec![
            String::new(),
            "Asha Verma".to_string(),
            "asha@example.org".to_string(),
            "919876543210".to_string(),
            "F".to_string(),
            String::new(),
            "North".to_string(),
        ]])
    }
}

/// Prints every command instead of talking to a real chat service.
struct PrintTransport;

#[async_trait]
impl Transport for PrintTransport {
    async fn send_message(
        &self,
        chat: &str,
        text: &str,
        mentions: &[String],
    ) -> anyhow::Result<()> {
        if mentions.is_empty() {
            println!("  -> send to {chat}: {text}");
        } else {
            println!("  -> send to {chat} (mentioning {}): {text}", mentions.join(", "));
        }
        Ok(())
    }

    async fn delete_message(
        &self,
        chat: &str,
        message_id: &str,
        for_everyone: bool,
    ) -> anyhow::Result<()> {
        println!("  -> delete {message_id} in {chat} (for everyone: {for_everyone})");
        Ok(())
    }

    async fn add_participant(&self, chat: &str, participant: &str) -> anyhow::Result<()> {
        println!("  -> add {participant} to {chat}");
        Ok(())
    }

    async fn remove_participant(&self, chat: &str, participant: &str) -> anyhow::Result<()> {
        println!("  -> remove {participant} from {chat}");
        Ok(())
    }

    async fn participants(&self, _chat: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![
            "919876543210@c.us".to_string(),
            "918218049538@c.us".to_string(),
        ])
    }
}

async fn run_demo() {
    let broadcast_group = "demo-broadcast@g.us".to_string();
    let mut config = Config::default();
    config.broadcast.allowed_groups.push(broadcast_group.clone());
    let engine = Engine::new(config, Arc::new(DemoRoster));
    let transport = PrintTransport;
    engine.on_ready("910000000000@c.us");

    let group = engine
        .config()
        .verification_community()
        .map(|c| c.id.clone())
        .expect("default config has a verification community");
    let admin = engine.config().broadcast.admins[0].clone();
    let admin_jid = format!(
        "{}@c.us",
        admin.chars().filter(|c| c.is_ascii_digit()).collect::<String>()
    );

    let script = vec![
        ("member verifies themselves", &group, "verify/919876543210"),
        ("unknown number is checked", &group, "verify/911111111111"),
        ("malformed verify target", &group, "verify/"),
        ("chatter in the verification group", &group, "hello everyone"),
        ("admin broadcast", &broadcast_group, "@all Meeting at 5pm"),
    ];

    for (label, chat, body) in script {
        println!("[{label}] {body}");
        let participants = transport.participants(chat).await.unwrap_or_default();
        let msg = MessageReceived {
            chat: chat.clone(),
            sender: admin_jid.clone(),
            message_id: "demo".to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
        };
        let commands = engine.handle_message(&msg, &participants).await;
        if commands.is_empty() {
            println!("  (no action)");
        }
        transport::dispatch(&transport, &commands).await;
        println!();
    }

    for participant in ["919876543210@c.us", "911111111111@c.us"] {
        println!("[join request] {participant}");
        let decision = engine
            .handle_join(&JoinEvent {
                chat: group.clone(),
                participant: participant.to_string(),
            })
            .await;
        println!("  decision: {:?}", decision.state);
        transport::dispatch(&transport, &decision.commands).await;
        println!();
    }
}
