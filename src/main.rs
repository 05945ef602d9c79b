use std::error::Error;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, ContentArrangement, Table};
use terminal_size::{terminal_size, Width};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use scorebox::auth::{self, AuthSettings, StoredToken};
use scorebox::config;
use scorebox::context::{build_http_client, build_store_from_env};
use scorebox::models::{CurrentUser, MusicRecord};
use scorebox::services::integrity_service::IntegrityReport;
use scorebox::services::library_service::RecordChange;
use scorebox::services::user_service::NewUser;
use scorebox::services::vault_service::{NewVaultEntry, VaultPatch};
use scorebox::services::{
    association_service, integrity_service, library_service, now_iso8601, role_service,
    user_service, vault_service,
};
use scorebox::storage::{self, BlobStore};
use scorebox::AppState;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(
    name = "scorebox",
    author,
    version,
    about = "Manage associations and their music libraries stored in a cloud folder",
    long_about = r#"scorebox keeps users, associations, role definitions, a credential vault and
music databases as JSON files inside one folder of a cloud storage account.

Every command loads the affected file, changes it and writes it back whole.

Examples:
  1) Authorise once:
      scorebox auth url
      scorebox auth login --code <CODE>
  2) List what a user can see:
      scorebox --as anna --password secret libraries list
  3) Import records exported from a spreadsheet as JSON:
      scorebox libraries import 3f2a9c0d11e4b7a8 records.json
"#,
    after_help = "Use `scorebox <subcommand> --help` to get subcommand specific options and usage examples."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to .env file
    #[arg(long, global = true)]
    env_file: Option<String>,
    /// Act as this user (permissions and visibility follow their role)
    #[arg(long = "as", global = true)]
    as_user: Option<String>,
    /// Password for --as (falls back to SCOREBOX_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Disable request/response logging
    #[arg(long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and storage connectivity
    #[command(about = "Validate configuration and storage connectivity.", long_about = "Resolve an access token (or the local directory) and list the storage root to confirm the configuration works.")]
    CheckConfig,
    /// Obtain storage credentials
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
    /// Manage users (users.json)
    Users {
        #[command(subcommand)]
        sub: UserCommands,
    },
    /// Manage associations (associations.json)
    Associations {
        #[command(subcommand)]
        sub: AssociationCommands,
    },
    /// Show or reset role definitions (roles.json)
    Roles {
        #[command(subcommand)]
        sub: RoleCommands,
    },
    /// Manage the credential vault (vault.json)
    Vault {
        #[command(subcommand)]
        sub: VaultCommands,
    },
    /// Manage music databases and their records
    Libraries {
        #[command(subcommand)]
        sub: LibraryCommands,
    },
    /// Check consistency across registry files
    #[command(about = "Check consistency across registry files", long_about = "Compare cached record counts with content files, find missing and orphaned content files, dangling association memberships and duplicate record numbers. Use --repair to fix stale counts.")]
    Doctor {
        /// Rewrite stale record counts
        #[arg(long, default_value_t = false)]
        repair: bool,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    #[command(about = "Print the authorisation URL", long_about = "Print the URL to open in a browser to grant access. Pass --verifier to attach a PKCE challenge; use the same value with `auth login`.")]
    Url {
        #[arg(long)]
        verifier: Option<String>,
    },
    #[command(about = "Exchange an authorisation code", long_about = "Exchange the code shown after granting access for a refresh token and store it in TOKEN_FILE.")]
    Login {
        #[arg(long)]
        code: String,
        #[arg(long)]
        verifier: Option<String>,
    },
    #[command(about = "Show which token source is in use")]
    Token,
}

#[derive(Subcommand)]
enum UserCommands {
    #[command(about = "List users visible to the caller")]
    List,
    #[command(about = "Show one user")]
    Show { username: String },
    #[command(about = "Add a new user", long_about = "Add a user with a role (admin|manager|member). The password is hashed before it is stored.")]
    Add {
        username: String,
        password: String,
        role: String,
        /// Association id (repeatable)
        #[arg(long = "association")]
        associations: Vec<String>,
    },
    #[command(about = "Change a user's role")]
    SetRole { username: String, role: String },
    #[command(about = "Replace a user's association memberships")]
    SetAssociations {
        username: String,
        /// Association ids; none clears the memberships you control
        association_ids: Vec<String>,
    },
    #[command(about = "Reset a user's password")]
    ResetPassword { username: String, password: String },
    #[command(about = "Delete a user")]
    Delete { username: String },
}

#[derive(Subcommand)]
enum AssociationCommands {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum RoleCommands {
    List,
    /// Rewrite roles.json to the built-in definitions
    Sync,
}

#[derive(Subcommand)]
enum VaultCommands {
    List,
    Add {
        account: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    Update {
        id: String,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete { id: String },
}

#[derive(clap::Args)]
struct RecordArgs {
    #[arg(long, default_value = "")]
    nr: String,
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    composer: String,
    #[arg(long, default_value = "")]
    arranger: String,
}

impl RecordArgs {
    fn into_record(self) -> MusicRecord {
        MusicRecord {
            number: self.nr,
            title: self.title,
            composer: self.composer,
            arranger: self.arranger,
        }
    }
}

#[derive(Subcommand)]
enum LibraryCommands {
    List,
    Create { name: String, association_id: String },
    Rename { id: String, name: String },
    Delete { id: String },
    #[command(about = "Print a library's records")]
    Records { id: String },
    AddRecord {
        id: String,
        #[command(flatten)]
        record: RecordArgs,
    },
    UpdateRecord {
        id: String,
        index: usize,
        #[command(flatten)]
        record: RecordArgs,
    },
    DeleteRecord { id: String, index: usize },
    #[command(about = "Replace all records from a JSON array file", long_about = "Replace every record of a library with the contents of a JSON array file (objects with Nr/Titel/Komponist/Arrangeur or number/title/composer/arranger).")]
    Import { id: String, file: String },
    #[command(about = "Write a library's records to a JSON file")]
    Export { id: String, file: String },
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w.saturating_sub(4));
    }
    table
}

fn print_rows(header: Vec<&str>, rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("(empty list)");
        return;
    }
    let mut table = new_table();
    table.set_header(header);
    for r in rows {
        table.add_row(r);
    }
    println!("\n{table}\n");
}

fn print_change(change: &RecordChange) {
    println!("{} {}", yansi::Paint::new("Records:").green(), change.record_count);
    if !change.duplicate_numbers.is_empty() {
        println!(
            "{} {}",
            yansi::Paint::new("Warning: duplicate Nr values:").yellow(),
            change.duplicate_numbers.join(", ")
        );
    }
}

fn print_report(report: &IntegrityReport) {
    for m in &report.count_mismatches {
        println!(
            "{} {} ({}): cached {} but file has {}",
            yansi::Paint::new("count mismatch").red(),
            m.name,
            m.library_id,
            m.cached,
            m.actual
        );
    }
    for id in &report.missing_content {
        println!("{} for music database {}", yansi::Paint::new("missing content file").red(), id);
    }
    for f in &report.orphan_files {
        println!("{} {}", yansi::Paint::new("orphan content file").yellow(), f);
    }
    for (user, assoc) in &report.dangling_memberships {
        println!("{} {} -> {}", yansi::Paint::new("unknown association").yellow(), user, assoc);
    }
    for (id, numbers) in &report.duplicate_numbers {
        println!("{} in {}: {}", yansi::Paint::new("duplicate Nr").yellow(), id, numbers.join(", "));
    }
    for (id, e) in &report.unreadable {
        println!("{} {}: {}", yansi::Paint::new("unreadable").red(), id, e);
    }
    if report.is_clean() {
        println!("{}", yansi::Paint::new("All registry files are consistent").green());
    }
}

async fn resolve_caller(
    state: &AppState,
    as_user: Option<String>,
    password: Option<String>,
) -> Result<CurrentUser, Box<dyn Error>> {
    let creds = match as_user {
        Some(u) => Some((
            u,
            password
                .or_else(|| std::env::var("SCOREBOX_PASSWORD").ok())
                .unwrap_or_default(),
        )),
        None => config::get_cli_credentials(),
    };
    match creds {
        Some((user, password)) => Ok(user_service::authenticate(state, &user, &password).await?),
        None => Ok(CurrentUser::operator()),
    }
}

async fn run_auth(sub: AuthCommands) -> CliResult {
    let settings = AuthSettings::from_env();
    let client = build_http_client();
    match sub {
        AuthCommands::Url { verifier } => {
            println!("{}", auth::authorization_url(&settings, verifier.as_deref())?);
        }
        AuthCommands::Login { code, verifier } => {
            let resp = auth::exchange_code(&client, &settings, &code, verifier.as_deref()).await?;
            if resp.refresh_token.is_none() {
                println!(
                    "{}",
                    yansi::Paint::new("No refresh token returned; request offline access in the authorisation URL").yellow()
                );
            }
            auth::save_stored_token(
                &settings.token_file,
                &StoredToken {
                    refresh_token: resp.refresh_token,
                    access_token: Some(resp.access_token),
                    obtained_at: now_iso8601(),
                },
            )?;
            println!(
                "{} {}",
                yansi::Paint::new("Token stored in").green(),
                settings.token_file.display()
            );
        }
        AuthCommands::Token => {
            let token = auth::resolve_access_token(&client, &settings).await?;
            println!("{} {:?}", yansi::Paint::new("Access token source:").green(), token.source);
        }
    }
    Ok(())
}

async fn run(command: Commands, as_user: Option<String>, password: Option<String>) -> CliResult {
    let client = build_http_client();
    let store: Arc<dyn BlobStore> = build_store_from_env(&client).await?;
    let state = AppState::new(store);

    if matches!(command, Commands::CheckConfig) {
        let files = state.store.list().await?;
        println!(
            "{} {} ({} files)",
            yansi::Paint::new("Storage reachable:").green(),
            state.store.describe(),
            files.len()
        );
        return Ok(());
    }

    if let Some(admin) = user_service::ensure_bootstrap_admin(&state).await? {
        println!(
            "{} '{}' (change its password with `users reset-password`)",
            yansi::Paint::new("No administrator found; created").yellow(),
            admin.username
        );
    }
    let caller = resolve_caller(&state, as_user, password).await?;
    tracing::debug!(user = %caller.username, role = %caller.role, "caller resolved");

    match command {
        Commands::CheckConfig | Commands::Auth { .. } => {}
        Commands::Users { sub } => match sub {
            UserCommands::List => {
                let users = user_service::list_users(&state, &caller).await?;
                print_rows(
                    vec!["Username", "Role", "Associations", "Created"],
                    users
                        .into_iter()
                        .map(|u| vec![u.username, u.role, u.association_ids.join(", "), u.created_at])
                        .collect(),
                );
            }
            UserCommands::Show { username } => {
                let u = user_service::get_user(&state, &caller, &username).await?;
                print_rows(
                    vec!["Field", "Value"],
                    vec![
                        vec!["username".into(), u.username],
                        vec!["role".into(), u.role],
                        vec!["associations".into(), u.association_ids.join(", ")],
                        vec!["created_at".into(), u.created_at],
                    ],
                );
            }
            UserCommands::Add { username, password, role, associations } => {
                let u = user_service::create_user(
                    &state,
                    &caller,
                    NewUser { username, password, role, association_ids: associations },
                )
                .await?;
                println!("{} '{}' {}", yansi::Paint::new("User").green(), u.username, yansi::Paint::new("added").green());
            }
            UserCommands::SetRole { username, role } => {
                let u = user_service::update_role(&state, &caller, &username, &role).await?;
                println!("{} '{}' -> {}", yansi::Paint::new("Role of").green(), u.username, u.role);
            }
            UserCommands::SetAssociations { username, association_ids } => {
                let u = user_service::set_associations(&state, &caller, &username, association_ids).await?;
                println!("{} '{}': {}", yansi::Paint::new("Associations of").green(), u.username, u.association_ids.join(", "));
            }
            UserCommands::ResetPassword { username, password } => {
                user_service::reset_password(&state, &caller, &username, &password).await?;
                println!("{} '{}' {}", yansi::Paint::new("Password for").green(), username.trim().to_lowercase(), yansi::Paint::new("updated").green());
            }
            UserCommands::Delete { username } => {
                user_service::delete_user(&state, &caller, &username).await?;
                println!("{} '{}' {}", yansi::Paint::new("User").green(), username.trim().to_lowercase(), yansi::Paint::new("deleted").green());
            }
        },
        Commands::Associations { sub } => match sub {
            AssociationCommands::List => {
                let rows = association_service::list_associations(&state, &caller).await?;
                print_rows(
                    vec!["ID", "Name", "Description", "Created"],
                    rows.into_iter()
                        .map(|a| vec![a.id, a.name, a.description, a.created_at])
                        .collect(),
                );
            }
            AssociationCommands::Add { name, description } => {
                let a = association_service::create_association(&state, &caller, &name, &description).await?;
                println!("{} '{}' ({})", yansi::Paint::new("Association created:").green(), a.name, a.id);
            }
            AssociationCommands::Update { id, name, description } => {
                let a = association_service::update_association(&state, &caller, &id, name, description).await?;
                println!("{} '{}'", yansi::Paint::new("Association updated:").green(), a.name);
            }
            AssociationCommands::Delete { id } => {
                association_service::delete_association(&state, &caller, &id).await?;
                println!("{} {}", yansi::Paint::new("Association deleted:").green(), id);
            }
        },
        Commands::Roles { sub } => {
            let roles = match sub {
                RoleCommands::List => role_service::list_roles(&state).await?,
                RoleCommands::Sync => role_service::sync_roles(&state, &caller).await?,
            };
            print_rows(
                vec!["ID", "Name", "Description"],
                roles.into_iter().map(|r| vec![r.id, r.name, r.description]).collect(),
            );
        }
        Commands::Vault { sub } => match sub {
            VaultCommands::List => {
                let rows = vault_service::list_entries(&state, &caller).await?;
                print_rows(
                    vec!["ID", "Account", "Email", "Password", "Note"],
                    rows.into_iter()
                        .map(|e| vec![e.id, e.account, e.email, e.password, e.note])
                        .collect(),
                );
            }
            VaultCommands::Add { account, email, password, note } => {
                let e = vault_service::add_entry(&state, &caller, NewVaultEntry { account, email, password, note }).await?;
                println!("{} {} ({})", yansi::Paint::new("Vault entry added:").green(), e.account, e.id);
            }
            VaultCommands::Update { id, account, email, password, note } => {
                let e = vault_service::update_entry(&state, &caller, &id, VaultPatch { account, email, password, note }).await?;
                println!("{} {}", yansi::Paint::new("Vault entry updated:").green(), e.account);
            }
            VaultCommands::Delete { id } => {
                vault_service::delete_entry(&state, &caller, &id).await?;
                println!("{} {}", yansi::Paint::new("Vault entry deleted:").green(), id);
            }
        },
        Commands::Libraries { sub } => match sub {
            LibraryCommands::List => {
                let rows = library_service::list_libraries(&state, &caller).await?;
                print_rows(
                    vec!["ID", "Name", "Association", "Records", "File", "Created"],
                    rows.into_iter()
                        .map(|d| {
                            vec![d.id, d.name, d.association_id, d.record_count.to_string(), d.file_name, d.created_at]
                        })
                        .collect(),
                );
            }
            LibraryCommands::Create { name, association_id } => {
                let d = library_service::create_library(&state, &caller, &name, &association_id).await?;
                println!("{} '{}' ({})", yansi::Paint::new("Music database created:").green(), d.name, d.id);
            }
            LibraryCommands::Rename { id, name } => {
                let d = library_service::rename_library(&state, &caller, &id, &name).await?;
                println!("{} '{}'", yansi::Paint::new("Music database renamed:").green(), d.name);
            }
            LibraryCommands::Delete { id } => {
                let d = library_service::delete_library(&state, &caller, &id).await?;
                println!("{} '{}'", yansi::Paint::new("Music database deleted:").green(), d.name);
            }
            LibraryCommands::Records { id } => {
                let records = library_service::library_records(&state, &caller, &id).await?;
                print_rows(
                    vec!["#", "Nr", "Titel", "Komponist", "Arrangeur"],
                    records
                        .into_iter()
                        .enumerate()
                        .map(|(i, r)| vec![i.to_string(), r.number, r.title, r.composer, r.arranger])
                        .collect(),
                );
            }
            LibraryCommands::AddRecord { id, record } => {
                let change = library_service::add_record(&state, &caller, &id, record.into_record()).await?;
                print_change(&change);
            }
            LibraryCommands::UpdateRecord { id, index, record } => {
                let change = library_service::update_record(&state, &caller, &id, index, record.into_record()).await?;
                print_change(&change);
            }
            LibraryCommands::DeleteRecord { id, index } => {
                let change = library_service::delete_record(&state, &caller, &id, index).await?;
                print_change(&change);
            }
            LibraryCommands::Import { id, file } => {
                let text = tokio::fs::read_to_string(&file).await?;
                let records: Vec<MusicRecord> = serde_json::from_str(&text)?;
                let change = library_service::replace_records(&state, &caller, &id, records).await?;
                print_change(&change);
            }
            LibraryCommands::Export { id, file } => {
                let records = library_service::library_records(&state, &caller, &id).await?;
                tokio::fs::write(&file, serde_json::to_string_pretty(&records)?).await?;
                println!("{} {} records to {}", yansi::Paint::new("Exported").green(), records.len(), file);
            }
        },
        Commands::Doctor { repair } => {
            if repair {
                let fixed = integrity_service::repair_counts(&state, &caller).await?;
                println!("{} {}", yansi::Paint::new("Record counts repaired:").green(), fixed.len());
            }
            let report = integrity_service::check_integrity(&state, &caller).await?;
            print_report(&report);
            if !report.is_clean() {
                process::exit(2);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }
    if cli.silent {
        storage::set_silent(true);
    }
    config::load_env_file(cli.env_file.as_deref());

    let Cli { command, as_user, password, .. } = cli;
    let result = match command {
        Commands::Auth { sub } => run_auth(sub).await,
        command => run(command, as_user, password).await,
    };
    if let Err(e) = result {
        tracing::error!(%e, "command failed");
        eprintln!("{}: {}", yansi::Paint::new("Error").red(), e);
        process::exit(1);
    }
}
