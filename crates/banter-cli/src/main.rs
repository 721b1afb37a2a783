use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use banter_client::{controller_config, HttpTransport};
use banter_config::{Config, ConfigManager};
use banter_core::{
    ControllerError, Credentials, Outcome, Role, SendOutcome, SessionController,
    ValidationError,
};
use banter_observability::{create_session_span, LogManager, LoggingConfig};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, Instrument};

mod printer;
mod repl;

use printer::{format_message, print_history, print_sessions, print_suggestions, Printer};
use repl::{ReplInput, HELP};

type Controller = SessionController<Printer>;

#[derive(Parser)]
#[command(name = "banter")]
#[command(about = "Command line client for the Banter chat server")]
#[command(version)]
struct Cli {
    /// Override server.base_url from the config file
    #[arg(long, env = "BANTER_SERVER_URL")]
    server_url: Option<String>,

    #[arg(short, long, env = "BANTER_USERNAME", global = true)]
    username: Option<String>,

    #[arg(short, long, env = "BANTER_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Enable debug mode
    #[arg(long, short, default_value = "false", global = true)]
    debug: bool,

    /// Config file path
    #[arg(long, env = "BANTER_CONFIG", default_value = "~/.banter/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 校验用户名和密码
    Login,
    /// 列出会话
    Sessions,
    /// 创建新会话
    New {
        /// 会话标题，默认取 client.new_chat_title
        #[arg(long)]
        title: Option<String>,
    },
    /// 查看会话历史
    History {
        session_id: String,
    },
    /// 发送单条消息
    Send {
        /// 消息内容
        message: String,
        /// 发送到已有会话；不指定时创建新会话
        #[arg(short, long)]
        session: Option<String>,
    },
    /// 删除会话
    Delete {
        session_id: String,
        /// 跳过确认
        #[arg(short, long)]
        yes: bool,
    },
    /// 启动交互式聊天
    Chat,
    /// 配置管理
    Config(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: server.base_url)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化配置文件
    Init {
        /// 强制覆盖已存在的配置
        #[arg(long, short)]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path =
        banter_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    let credentials = cli.credentials();
    match cli.command {
        Commands::Config(args) => handle_config(args, &config_path).await,
        command => {
            let manager = ConfigManager::load(&config_path)
                .await
                .with_context(|| format!("failed to load {:?}", config_path))?;
            let mut config = manager.snapshot().await;
            if let Some(url) = &cli.server_url {
                config.set_value("server.base_url", url)?;
                ConfigManager::validate(&config)?;
            }
            let _log_manager = init_logging(&config, cli.debug)?;
            run_command(command, &config, credentials).await
        }
    }
}

fn init_logging(config: &Config, debug: bool) -> anyhow::Result<LogManager> {
    let logging = if debug {
        LoggingConfig::default().with_log_level("debug")
    } else {
        let logging = LoggingConfig::from_app_config(&config.logging);
        match logging.file_path {
            Some(_) => logging,
            // stderr is shared with command output
            None => logging.with_log_level("warn"),
        }
    };
    Ok(LogManager::new(&logging)?)
}

async fn run_command(
    command: Commands,
    config: &Config,
    credentials: Option<Credentials>,
) -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::from_config(config)?);
    let mut settings = controller_config(config);
    if let Commands::New { title: Some(title) } = &command {
        settings = settings.with_new_chat_title(title.clone());
    }
    let interactive = matches!(command, Commands::Chat);
    let mut controller = SessionController::new(transport, Printer::new(interactive), settings);

    if interactive {
        return run_interactive_chat(&mut controller, credentials).await;
    }

    authenticate(&mut controller, credentials).await?;

    match command {
        Commands::Login => {
            if let Some(user) = controller.user() {
                println!("{}", format!("✅ Logged in as {}", user.username).green());
            }
        }
        Commands::Sessions => {
            print_sessions(controller.sessions(), None);
        }
        Commands::New { .. } => {
            let session_id = controller.start_new_chat().await?;
            println!("{}", session_id);
        }
        Commands::History { session_id } => {
            controller
                .switch_session(&session_id)
                .instrument(create_session_span(&session_id))
                .await?;
            print_history(controller.history());
        }
        Commands::Send { message, session } => {
            if let Some(session_id) = &session {
                controller.switch_session(session_id).await?;
            }
            let result = controller.send_message(&message).await;
            print_last_reply(&controller);
            result?;
            if let Some(session_id) = controller.current_session_id() {
                println!("{}", format!("Session: {}", session_id).dimmed());
            }
        }
        Commands::Delete { session_id, yes } => {
            let result = if yes {
                controller.delete_session(&session_id, &mut true).await
            } else {
                let mut gate = confirm_on_stdin;
                controller.delete_session(&session_id, &mut gate).await
            };
            match result {
                Err(ControllerError::Validation(ValidationError::NotConfirmed)) => {
                    println!("{}", "Cancelled".dimmed());
                }
                other => other?,
            }
        }
        Commands::Chat | Commands::Config(_) => unreachable!("handled before login"),
    }

    Ok(())
}

/// 用已有的登录状态，或者用给定的凭据登录
async fn authenticate(
    controller: &mut Controller,
    credentials: Option<Credentials>,
) -> anyhow::Result<()> {
    match credentials {
        Some(credentials) => controller.login(credentials).await.context("login failed")?,
        None => {
            if !controller.check_auth().await? {
                bail!(
                    "Not logged in. Pass --username and --password, \
                     or set BANTER_USERNAME and BANTER_PASSWORD"
                );
            }
        }
    }
    Ok(())
}

async fn run_interactive_chat(
    controller: &mut Controller,
    credentials: Option<Credentials>,
) -> anyhow::Result<()> {
    println!("{}", "💬 Banter Interactive Chat".cyan().bold());

    match credentials {
        Some(credentials) => controller.login(credentials).await.context("login failed")?,
        None => {
            if !controller.check_auth().await.unwrap_or(false) {
                let credentials = prompt_credentials()?;
                controller.login(credentials).await.context("login failed")?;
            }
        }
    }

    if let Some(user) = controller.user() {
        println!("{}", format!("Logged in as {}", user.username).dimmed());
    }
    println!("{}", "Type /help for commands, /quit to leave".dimmed());
    println!();
    print_sessions(controller.sessions(), None);

    loop {
        if controller.is_auth_expiring() {
            controller.settle().await;
            break;
        }

        let Some(line) = read_line(&format!("{} ", "You:".cyan().bold()))? else {
            break;
        };

        let input = ReplInput::parse(&line);
        let command = match &input {
            ReplInput::Empty => continue,
            ReplInput::Quit => break,
            ReplInput::Help => {
                println!("{}", HELP.dimmed());
                continue;
            }
            ReplInput::Invalid(text) => {
                println!("{}", format!("Unknown command: {} (try /help)", text).yellow());
                continue;
            }
            _ => match input.command() {
                Some(command) => command,
                None => continue,
            },
        };

        let name = command.name();
        let mut gate = confirm_on_stdin;
        match controller.dispatch(command, &mut gate).await {
            Ok(outcome) => show_outcome(controller, &input, outcome),
            Err(ControllerError::Validation(ValidationError::NotConfirmed)) => {
                println!("{}", "Cancelled".dimmed());
            }
            Err(e) => {
                debug!("{} failed: {}", name, e);
                if matches!(input, ReplInput::Message(_)) {
                    print_last_reply(controller);
                } else if !matches!(e, ControllerError::Transport(_)) {
                    // transport failures were already shown as a notification
                    println!("{}", format!("❌ {}", e).red());
                }
            }
        }

        if input == ReplInput::Logout {
            break;
        }
        println!();
    }

    println!("{}", "👋 Goodbye!".cyan());
    Ok(())
}

fn show_outcome(controller: &Controller, input: &ReplInput, outcome: Outcome) {
    match (input, outcome) {
        (ReplInput::Message(_), Outcome::Send(SendOutcome::Replied)) => {
            print_last_reply(controller);
        }
        (ReplInput::Message(_), Outcome::Send(_)) => {
            println!("{}", "A message is already being sent".yellow());
        }
        (_, Outcome::SessionCreated(session_id)) => {
            println!("{}", format!("Session: {}", session_id).dimmed());
        }
        (ReplInput::Sessions, _) => {
            print_sessions(controller.sessions(), controller.current_session_id());
        }
        (ReplInput::Switch(_), _) => {
            print_history(controller.history());
        }
        _ => {}
    }
}

fn print_last_reply(controller: &Controller) {
    if let Some(reply) = controller
        .history()
        .last()
        .filter(|m| m.role == Role::Assistant)
    {
        println!("{}", format_message(reply));
        if !reply.is_error {
            print_suggestions(controller.presenter().suggestions());
        }
    }
}

/// 读取一行输入，EOF 时返回 `None`
fn read_line(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn prompt_credentials() -> anyhow::Result<Credentials> {
    let username = read_line("Username: ")?.unwrap_or_default();
    let password = read_line("Password: ")?.unwrap_or_default();
    Ok(Credentials::new(username, password))
}

fn confirm_on_stdin(prompt: &str) -> bool {
    match read_line(&format!("{} [y/N] ", prompt.yellow())) {
        Ok(Some(answer)) => is_yes(&answer),
        _ => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn handle_config(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None if Config::keys().contains(&key.as_str()) => {
                    println!("{}", format!("{} is not set", key).dimmed());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    println!("{}", format!("Known keys: {}", Config::keys().join(", ")).dimmed());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(config_path).await?;

            manager
                .update(|config| config.set_value(&key, &value))
                .await
                .with_context(|| format!("failed to set {}", key))?;

            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("⚠️  Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            // 初始化目录
            banter_config::init_banter_dirs().await?;

            // 创建默认配置
            let manager = ConfigManager::new(Config::default(), config_path.to_path_buf());
            manager.save().await?;

            println!("{}", format!("✅ Config initialized at {:?}", config_path).green());
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!("{}", format!("{:?}", manager.path()).dimmed());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
