use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;

use return_desk::{
    auth::{Role, UserSummary},
    config::{self, AppConfig},
    db::{self, DbPool},
    errors::ServiceError,
    repositories::{UserDirectory, UserRepository},
    services::users::{CreateUserRequest, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::CreateUser(args) => create_user(&context, args, cli.json).await?,
        Commands::CreateAdmin(args) => create_admin(&context, args, cli.json).await?,
        Commands::SetActive(args) => set_active(&context, args, cli.json).await?,
        Commands::ListUsers => list_users(&context, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "return-desk-cli",
    about = "Operator commands for the return desk database",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create an active account
    CreateUser(CreateUserArgs),
    /// Create an admin account unless the username already exists
    CreateAdmin(CreateAdminArgs),
    /// Activate or deactivate an account
    SetActive(SetActiveArgs),
    /// List every account, newest first
    ListUsers,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(help = "Username; doubles as the notification address")]
    email: String,
    #[arg(help = "Initial password (at least 8 characters)")]
    password: String,
    #[arg(default_value = "sales", value_parser = parse_role, help = "sales, warehouse, manager or admin")]
    role: Role,
    #[arg(long, help = "Display name; defaults to the part of the email before '@'")]
    name: Option<String>,
    #[arg(long, action = ArgAction::SetTrue, help = "Create the account deactivated")]
    inactive: bool,
}

#[derive(Args)]
struct CreateAdminArgs {
    email: String,
    password: String,
}

#[derive(Args)]
struct SetActiveArgs {
    email: String,
    #[arg(value_parser = clap::value_parser!(bool), help = "true to activate, false to deactivate")]
    active: bool,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_str(raw.trim()).map_err(|_| format!("unknown role {raw:?}"))
}

struct CliContext {
    db: Arc<DbPool>,
    users: Arc<UserRepository>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);
        let users = Arc::new(UserRepository::new(db.clone()));

        Ok(Self { db, users })
    }

    fn user_service(&self) -> UserService {
        UserService::new(self.users.clone())
    }

    async fn find(&self, email: &str) -> Result<Option<UserSummary>> {
        Ok(self
            .users
            .find_by_username(&email.trim().to_lowercase())
            .await?
            .map(UserSummary::from))
    }
}

fn default_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or(email)
        .to_string()
}

async fn create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let name = args.name.unwrap_or_else(|| default_name(&args.email));
    let created = context
        .user_service()
        .create(CreateUserRequest {
            username: args.email.clone(),
            name,
            role: args.role,
            password: args.password,
            is_active: !args.inactive,
        })
        .await;

    match created {
        Ok(user) => {
            if json {
                print_json(&user)?;
            } else {
                println!("Created {} user {}", user.role, user.username);
            }
            Ok(())
        }
        Err(ServiceError::Conflict(_)) => {
            println!("User {:?} already exists", args.email);
            Ok(())
        }
        Err(e) => Err(anyhow!(e)).context("failed to create user"),
    }
}

async fn create_admin(context: &CliContext, args: CreateAdminArgs, json: bool) -> Result<()> {
    if let Some(existing) = context.find(&args.email).await? {
        if json {
            print_json(&existing)?;
        } else {
            println!("Admin user {:?} already exists", existing.username);
        }
        return Ok(());
    }

    let user = context
        .user_service()
        .create(CreateUserRequest {
            username: args.email,
            name: "Administrator".to_string(),
            role: Role::Admin,
            password: args.password,
            is_active: true,
        })
        .await
        .context("failed to create admin")?;

    if json {
        print_json(&user)?;
    } else {
        println!("Created admin user {}", user.username);
    }
    Ok(())
}

async fn set_active(context: &CliContext, args: SetActiveArgs, json: bool) -> Result<()> {
    let user = context
        .find(&args.email)
        .await?
        .ok_or_else(|| anyhow!("no user named {:?}", args.email))?;
    let updated: UserSummary = context
        .users
        .set_active(user.id, args.active)
        .await
        .context("failed to update user")?
        .into();

    if json {
        print_json(&updated)?;
    } else {
        println!(
            "{} is now {}",
            updated.username,
            if updated.is_active { "active" } else { "inactive" }
        );
    }
    Ok(())
}

async fn list_users(context: &CliContext, json: bool) -> Result<()> {
    let users: Vec<UserSummary> = context
        .users
        .list_users()
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    if json {
        return print_json(&users);
    }
    if users.is_empty() {
        println!("No users");
    }
    for user in &users {
        println!(
            "- #{} {} • {} • {} • {}",
            user.id,
            user.username,
            user.name,
            user.role,
            if user.is_active { "active" } else { "pending" }
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
