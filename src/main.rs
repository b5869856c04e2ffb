//! Drowsiness dashboard CLI

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::signal;
use tracing::{info, warn};

use drowsiness_dashboard::{
    api::ApiClient,
    config::AppConfig,
    dashboard::{self, FleetDashboard, FleetQuery},
    errors::DashboardError,
    forms::{LoginForm, PasswordRecovery, RecoveryStep, SignupForm},
    mock::MockFleet,
    navigation::{Navigator, Page},
    output::OutputFormat,
    polling::PollingService,
    render,
    session::{FileTokenStore, Session},
};

#[derive(Parser)]
#[command(name = "drowsy")]
#[command(about = "Driver drowsiness dashboards on the command line")]
#[command(version)]
struct Cli {
    /// API base URL, overrides the configured target
    #[arg(long, env = "DROWSY_API_URL")]
    api_url: Option<String>,

    /// Configuration file used instead of config/default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the token
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "DROWSY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        device_id: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },

    /// Forget the stored token
    Logout,

    /// Show the signed-in user
    #[command(alias = "profile")]
    Me,

    /// Reset a forgotten password
    Recover,

    /// Driver dashboard for one device
    Driver {
        /// Defaults to the signed-in user's device, then `api.default_device_id`
        #[arg(long)]
        device_id: Option<String>,
        /// Print the first snapshot and exit
        #[arg(long)]
        once: bool,
    },

    /// Latest reading of one device
    Latest {
        #[arg(long)]
        device_id: Option<String>,
    },

    /// Fleet dashboard (admin only)
    Fleet {
        /// Filter drivers by name or device id
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 5)]
        page_size: usize,
        #[arg(long)]
        once: bool,
    },

    /// Safety scores over demo trip data
    Score {
        /// Fleet JSON file; the built-in demo fleet when omitted
        #[arg(long)]
        trips: Option<PathBuf>,
        /// Evaluation time (RFC 3339); defaults to the data's reference time
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(url) = cli.api_url {
        config.api.base_url = Some(url);
    }
    config.validate()?;

    let client = ApiClient::from_config(&config.api)?;
    let store = FileTokenStore::new(&config.session.token_path);
    let mut session = Session::new(client, Box::new(store));
    let app = App {
        config,
        format: cli.output,
    };

    tokio::select! {
        result = app.run(cli.command, &mut session) => result,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    }
}

struct App {
    config: AppConfig,
    format: OutputFormat,
}

impl App {
    async fn run(&self, command: Commands, session: &mut Session) -> Result<(), DashboardError> {
        let mut navigator = Navigator::new();

        match command {
            Commands::Login { email, password } => {
                let password = match password {
                    Some(p) => p,
                    None => prompt(&mut stdin_lines(), "Password: ").await?,
                };
                navigator.go_login();
                match LoginForm::new(&email, &password)
                    .submit(session, &mut navigator)
                    .await
                {
                    Ok(page) => self.report_signed_in(session, page),
                    Err(e) => {
                        eprintln!("{}", e.inline_message());
                        Ok(())
                    }
                }
            }
            Commands::Register {
                email,
                first_name,
                last_name,
                phone,
                device_id,
                password,
                confirm_password,
            } => {
                let form = SignupForm {
                    first_name,
                    last_name,
                    email,
                    phone,
                    device_id,
                    password,
                    confirm_password,
                };
                navigator.go_signup();
                match form.submit(session, &mut navigator).await {
                    Ok(page) => self.report_signed_in(session, page),
                    Err(e) => {
                        eprintln!("{}", e.inline_message());
                        Ok(())
                    }
                }
            }
            Commands::Logout => {
                session.logout()?;
                navigator.after_logout();
                println!("Signed out");
                Ok(())
            }
            Commands::Me => {
                session.restore().await?;
                navigator.go_profile();
                let user = session.user().ok_or(DashboardError::NotAuthenticated)?;
                if self.format.is_text() {
                    print!("{}", render::profile(user));
                }
                self.format.print_value(user)
            }
            Commands::Recover => recover(session.client()).await,
            Commands::Driver { device_id, once } => {
                self.driver(session, &mut navigator, device_id, once).await
            }
            Commands::Latest { device_id } => {
                session.restore().await?;
                let device_id =
                    session.device_id(device_id.as_deref(), &self.config.api.default_device_id);
                let reading = session.client().device_latest(&device_id).await?;
                if self.format.is_text() {
                    print!("{}", render::latest_reading(&reading));
                }
                self.format.print_value(&reading)
            }
            Commands::Fleet {
                search,
                page,
                page_size,
                once,
            } => {
                let query = FleetQuery {
                    search,
                    driver_page: page,
                    driver_page_size: page_size,
                    ..FleetQuery::default()
                };
                self.fleet(session, &mut navigator, query, once).await
            }
            Commands::Score { trips, at } => {
                let fleet = match trips {
                    Some(path) => MockFleet::from_path(&path)?,
                    None => MockFleet::builtin()?,
                };
                let now = at.or(fleet.reference_time).unwrap_or_else(Utc::now);
                let report = fleet.report(now);
                if self.format.is_text() {
                    print!("{}", render::score_report(&report));
                }
                self.format.print_value(&report)
            }
        }
    }

    fn report_signed_in(&self, session: &Session, page: Page) -> Result<(), DashboardError> {
        if let Some(user) = session.user() {
            println!("Signed in as {} ({})", user.email, user.role);
        }
        let command = match page {
            Page::MasterDashboard => "drowsy fleet",
            _ => "drowsy driver",
        };
        println!("Open your dashboard with `{}`", command);
        Ok(())
    }

    async fn driver(
        &self,
        session: &mut Session,
        navigator: &mut Navigator,
        device_id: Option<String>,
        once: bool,
    ) -> Result<(), DashboardError> {
        session.restore().await?;
        navigator.go_driver_dashboard(session.is_authenticated());
        if navigator.resolve(session.user()) != Page::DriverDashboard {
            return Err(DashboardError::NotAuthenticated);
        }
        if navigator.demo_mode() {
            info!("Not signed in, showing the driver dashboard in demo mode");
        }
        let device_id =
            session.device_id(device_id.as_deref(), &self.config.api.default_device_id);

        let service = PollingService::new();
        let mut subscription = dashboard::watch_driver(
            &service,
            session.client(),
            &device_id,
            &self.config.api,
            &self.config.polling,
        )?;

        while let Some(snapshot) = subscription.next().await {
            if self.format.is_text() {
                print!(
                    "{}",
                    render::driver_panel(&snapshot, self.config.polling.event_display_limit)
                );
                println!();
            }
            self.format.print_value(&snapshot)?;
            if once {
                break;
            }
        }
        Ok(())
    }

    async fn fleet(
        &self,
        session: &mut Session,
        navigator: &mut Navigator,
        query: FleetQuery,
        once: bool,
    ) -> Result<(), DashboardError> {
        session.restore().await?;
        navigator.go_master_dashboard(session.is_authenticated());
        if navigator.resolve(session.user()) != Page::MasterDashboard {
            return Err(DashboardError::NotAuthenticated);
        }

        let service = PollingService::new();
        let mut fleet = FleetDashboard::watch(
            &service,
            session.client(),
            &self.config.api,
            &self.config.polling,
        )?;
        if !fleet.ready().await {
            warn!("Fleet pollers stopped before the first update");
            return Ok(());
        }

        loop {
            let view = fleet.view(&query);
            if self.format.is_text() {
                print!("{}", render::fleet_panel(&view));
                println!();
            }
            self.format.print_value(&view)?;
            if once || !fleet.changed().await {
                break;
            }
        }
        Ok(())
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String, DashboardError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| DashboardError::Validation("Input closed".to_string()))?;
    Ok(line.trim().to_string())
}

/// Interactive forgot-password wizard
async fn recover(client: &ApiClient) -> Result<(), DashboardError> {
    let mut lines = stdin_lines();
    let mut recovery = PasswordRecovery::new();
    recovery.begin()?;

    loop {
        match recovery.step() {
            RecoveryStep::Request => {
                let email = prompt(&mut lines, "Email: ").await?;
                if let Err(e) = recovery.request_code(client, &email).await {
                    eprintln!("{}", e.inline_message());
                }
            }
            RecoveryStep::Verify => {
                if let Some(code) = recovery.issued_code() {
                    println!("Verification code for {}: {}", recovery.email(), code);
                }
                let code = prompt(&mut lines, "Code (empty to change email): ").await?;
                if code.is_empty() {
                    recovery.back()?;
                    continue;
                }
                let password = prompt(&mut lines, "New password: ").await?;
                let confirmation = prompt(&mut lines, "Confirm password: ").await?;
                if let Err(e) = recovery
                    .verify(client, &code, &password, &confirmation)
                    .await
                {
                    eprintln!("{}", e.inline_message());
                }
            }
            RecoveryStep::Success => {
                println!("Password updated, sign in with `drowsy login`");
                recovery.finish()?;
                return Ok(());
            }
            RecoveryStep::Login => return Ok(()),
        }
    }
}
