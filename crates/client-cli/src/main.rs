use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use shared::{RequestDecision, ResourceShape, Role, VmAction};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod client;
mod commands;
mod config;

use client::ApiClient;

#[derive(Parser)]
#[command(name = "vmg")]
#[command(about = "VM Guardian client - request, approve and monitor lab virtual machines")]
#[command(version = env!("VMG_VERSION"))]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Auth token (overrides config)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Sign in to the VM Guardian server
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account (pending until an administrator activates it)
    Register {
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = RegisterRole::Student)]
        role: RegisterRole,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show current login status
    Whoami,
    /// Show where the dashboard sends you for a path
    Open {
        /// Dashboard path, e.g. /admin/users
        path: String,
    },
    /// Virtual machines
    Vms {
        #[command(subcommand)]
        action: VmCommand,
    },
    /// VM requests
    Requests {
        #[command(subcommand)]
        action: RequestCommand,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RegisterRole {
    Student,
    Instructor,
}

impl From<RegisterRole> for Role {
    fn from(role: RegisterRole) -> Self {
        match role {
            RegisterRole::Student => Role::Student,
            RegisterRole::Instructor => Role::Instructor,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Start,
    Stop,
    Suspend,
    Connect,
    Delete,
}

impl From<ActionArg> for VmAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Start => VmAction::Start,
            ActionArg::Stop => VmAction::Stop,
            ActionArg::Suspend => VmAction::Suspend,
            ActionArg::Connect => VmAction::Connect,
            ActionArg::Delete => VmAction::Delete,
        }
    }
}

#[derive(Subcommand)]
enum VmCommand {
    /// List your VMs (all VMs for administrators)
    List,
    /// Show one VM
    Show { id: String },
    /// Start, stop, suspend, connect to or delete a VM
    Action {
        id: String,
        #[arg(value_enum)]
        action: ActionArg,
    },
}

#[derive(Subcommand)]
enum RequestCommand {
    /// List your requests (all requests for administrators)
    List,
    /// Request a new VM
    Create {
        /// What the VM is for
        #[arg(long)]
        purpose: String,
        #[arg(long, default_value_t = 2)]
        vcpus: u32,
        #[arg(long, default_value_t = 2048)]
        memory_mb: u32,
        #[arg(long, default_value_t = 20)]
        storage_gb: u32,
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long)]
        course: Option<String>,
    },
    /// Approve a pending request (admin)
    Approve {
        id: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Reject a pending request (admin)
    Reject {
        id: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Change the response message of a request (admin)
    Respond { id: String, message: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load().unwrap_or_default();
    let server = config.server_url(cli.server);
    let token = cli.token.or_else(|| config.remote.token.clone());
    let client = ApiClient::new(server.clone(), token);
    tracing::debug!("Using server {}", server);

    match cli.command {
        Commands::Config { action } => handle_config_command(action)?,
        Commands::Login { email, password } => {
            let password = auth::read_password(password)?;
            auth::login(&client, &mut config, &email, &password).await?;
        }
        Commands::Register {
            email,
            name,
            role,
            password,
        } => {
            let password = auth::read_password(password)?;
            auth::register(&client, &mut config, &email, &password, &name, Some(role.into())).await?;
        }
        Commands::Logout => auth::logout(&client, &mut config).await?,
        Commands::Whoami => auth::whoami(&client, &server).await?,
        Commands::Open { path } => commands::open(&client, &path).await?,
        Commands::Vms { action } => match action {
            VmCommand::List => commands::list_vms(&client).await?,
            VmCommand::Show { id } => commands::show_vm(&client, &id).await?,
            VmCommand::Action { id, action } => {
                commands::vm_action(&client, &id, action.into()).await?
            }
        },
        Commands::Requests { action } => match action {
            RequestCommand::List => commands::list_requests(&client).await?,
            RequestCommand::Create {
                purpose,
                vcpus,
                memory_mb,
                storage_gb,
                days,
                course,
            } => {
                let shape = ResourceShape {
                    vcpus,
                    memory_mb,
                    storage_gb,
                    duration_days: days,
                };
                commands::create_request(&client, purpose, shape, course).await?
            }
            RequestCommand::Approve { id, message } => {
                commands::decide_request(&client, &id, RequestDecision::Approve, message).await?
            }
            RequestCommand::Reject { id, message } => {
                commands::decide_request(&client, &id, RequestDecision::Reject, message).await?
            }
            RequestCommand::Respond { id, message } => {
                commands::respond_to_request(&client, &id, message).await?
            }
        },
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            match key.as_str() {
                "server" => config.remote.server = Some(value),
                "token" => config.remote.token = Some(value),
                _ => anyhow::bail!("Unknown config key: {}. Valid keys: server, token", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            let value = match key.as_str() {
                "server" => config.remote.server.unwrap_or_default(),
                "token" => config.remote.token.map(|_| "****").unwrap_or_default().to_string(),
                _ => anyhow::bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("server: {}", config.remote.server.unwrap_or_default());
            println!("token: {}", config.remote.token.map(|_| "****").unwrap_or_default());
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
