//! Console dialogue example
//!
//! Logs into an appliance over SSH, launches the configuration console and
//! walks one menu path, then polls until the shell prompt is back.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example console_dialogue -- --host 10.0.0.5 --config run.toml
//! cargo run --example console_dialogue -- --host 10.0.0.5 --user root --password smartvm
//! ```
//!
//! With `--dry-run` the same dialogue is played against a scripted console
//! instead of a real host.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use conscript::{
    Dialogue, DialogueVars, Input, RunConfig, ScriptedTransport, Session, Transport,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(user) = &args.user {
        config.credentials.ssh.username = user.clone();
    }
    if let Some(password) = &args.password {
        config.credentials.ssh.password = Some(password.as_str().into());
        config.credentials.database.password = Some(password.as_str().into());
    }

    let dialogue = Dialogue::builder("console summary")
        .answer("Press any key to continue.", "")
        .within(Duration::from_secs(20))
        .answer("Choose the advanced setting: ", Input::var("choice"))
        .answer(r"Enter the database password: ", Input::var("password"))
        .expect("Press any key to continue.")
        .within(Duration::from_secs(args.timeout))
        .build()?;

    let mut vars = config.credential_vars();
    vars.set("choice", args.choice.clone());

    println!("=== Conscript Console Dialogue Example ===\n");

    if args.dry_run {
        println!("Playing the dialogue against a scripted console...");
        let transport = ScriptedTransport::new()
            .reply_to("ap", "Appliance summary\nPress any key to continue.")
            .output_after(
                Duration::from_millis(100),
                "\nAdvanced Setting\nChoose the advanced setting: ",
            )
            .reply_to(args.choice.as_str(), "Enter the database password: ")
            .reply_to_after(
                "smartvm",
                Duration::from_millis(200),
                "Done.\nPress any key to continue.",
            )
            .output_after(Duration::from_secs(1), "\n[root@appliance ~]# ");
        let vars = vars.with_secret("password", "smartvm");
        drive(Session::start(transport, config.session_config(), "ap")?, &dialogue, &vars, &config)?;
    } else {
        let host = args.host.as_deref().unwrap_or("localhost");
        println!("Connecting to {}...", host);
        let mut session = Session::connect(config.ssh_config(host), config.session_config())?;
        session.send("ap")?;
        drive(session, &dialogue, &vars, &config)?;
    }

    println!("Done!");
    Ok(())
}

fn drive<T: Transport>(
    mut session: Session<T>,
    dialogue: &Dialogue,
    vars: &DialogueVars,
    config: &RunConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let transcript = session.run(dialogue, vars)?;

    println!("Result:");
    for step in &transcript.steps {
        println!(
            "  Step {}: {} -> {:?}",
            step.index + 1,
            step.description,
            step.elapsed
        );
        if let Some(input) = &step.input {
            println!("    Typed: {}", input);
        }
    }
    println!("  Total time: {:?}", transcript.elapsed);

    // The console drops back to the shell on its own
    let outcome = config
        .poller()
        .delay(Duration::from_millis(250))
        .timeout(Duration::from_secs(30))
        .message("shell prompt")
        .handle_errors(true)
        .wait_for(|| {
            session
                .expect(r"[$#]\s*$", Duration::from_millis(500))
                .map(|found| found.matched)
        })?;
    println!("Shell prompt {:?} after {} checks", outcome.value, outcome.attempts);

    println!("Closing session...");
    session.close()?;
    Ok(())
}

/// Simple argument parser
struct Args {
    host: Option<String>,
    user: Option<String>,
    password: Option<String>,
    config: Option<PathBuf>,
    choice: String,
    timeout: u64,
    dry_run: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Args {
            host: None,
            user: None,
            password: None,
            config: None,
            choice: "1".to_string(),
            timeout: 300,
            dry_run: false,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => {
                    parsed.host = value;
                    i += 1;
                }
                "--user" | "-u" => {
                    parsed.user = value;
                    i += 1;
                }
                "--password" | "-P" => {
                    parsed.password = value;
                    i += 1;
                }
                "--config" | "-c" => {
                    parsed.config = value.map(PathBuf::from);
                    i += 1;
                }
                "--choice" => {
                    if let Some(choice) = value {
                        parsed.choice = choice;
                    }
                    i += 1;
                }
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(300);
                    i += 1;
                }
                "--dry-run" => parsed.dry_run = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        parsed
    }

    fn print_help() {
        println!("Usage: console_dialogue [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --host <HOST>          Appliance to connect to [default: localhost]");
        println!("  -u, --user <USER>          SSH username (overrides the config file)");
        println!("  -P, --password <PASSWORD>  SSH and database password");
        println!("  -c, --config <FILE>        Run configuration (TOML)");
        println!("      --choice <N>           Advanced setting to choose [default: 1]");
        println!("  -t, --timeout <SECS>       Timeout for the final step [default: 300]");
        println!("      --dry-run              Use a scripted console instead of SSH");
        println!("      --help                 Print help");
    }
}
