use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use evalboard::error::ApiError;
use evalboard::screens::auth::AuthViewModel;
use evalboard::screens::challenges::{ChallengeDetailViewModel, ChallengeListViewModel, ChallengeTab};
use evalboard::screens::host::{WorkerAction, WorkerLogsScreen, manage_worker};
use evalboard::screens::leaderboard::{LeaderboardScreen, LeaderboardViewModel};
use evalboard::screens::submissions::{SubmissionsScreen, SubmissionsViewModel};
use evalboard::screens::teams::{HostTeamsViewModel, ParticipantTeamsViewModel, TeamKind};
use evalboard::screens::{Route, ScreenAction, ScreenContext, ToastLevel};
use evalboard::services::config_loader::{EvalboardConfig, load_evalboard_config, resolve_config_path};
use evalboard::services::dialogs::{ModalDecision, ModalResult};
use evalboard::services::gateway::{Gateway, ReqwestTransport};
use evalboard::services::projection::{ChallengeCard, TimeSpan};
use evalboard::services::session::{FileStore, Session};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_unwrap::ResultExt;

const ENV_PASSWORD: &str = "EVALBOARD_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login { username: String },
    Logout,
    Challenges { tab: ChallengeTab },
    Challenge { challenge_id: u64 },
    Teams,
    HostTeams,
    Submissions { challenge_id: u64, phase_id: u64 },
    HostSubmissions { challenge_id: u64, phase_id: u64 },
    Leaderboard { phase_split_id: u64, watch: bool },
    WorkerLogs { challenge_id: u64 },
    Worker { challenge_id: u64, action: WorkerAction },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    config: Option<String>,
    command: Command,
}

fn parse_cli_args<I>(args: I) -> Result<CliArgs, ApiError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut positional = Vec::new();
    let mut watch = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(args.next().ok_or_else(|| {
                    ApiError::Configuration(
                        "Missing value after --config. Use --config <path>.".to_owned(),
                    )
                })?);
            }
            "--watch" => watch = true,
            "--help" | "-h" => {
                print_cli_help();
                std::process::exit(0);
            }
            value if value.starts_with("--") => {
                return Err(ApiError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or_else(|| {
        ApiError::Configuration("Missing command. Run with --help for valid commands.".to_owned())
    })?;
    let mut operand = |label: &str| {
        positional.next().ok_or_else(|| {
            ApiError::Configuration(format!("'{name}' needs a <{label}> argument."))
        })
    };

    let command = match name.as_str() {
        "login" => Command::Login {
            username: operand("username")?,
        },
        "logout" => Command::Logout,
        "challenges" => {
            let tab = match operand("tab").ok() {
                Some(raw) => ChallengeTab::parse(&raw).ok_or_else(|| {
                    ApiError::Configuration(format!(
                        "Unknown tab '{raw}'. Use present, upcoming or past."
                    ))
                })?,
                None => ChallengeTab::default(),
            };
            Command::Challenges { tab }
        }
        "challenge" => Command::Challenge {
            challenge_id: parse_id("challenge", &operand("challenge")?)?,
        },
        "teams" => Command::Teams,
        "host-teams" => Command::HostTeams,
        "submissions" => Command::Submissions {
            challenge_id: parse_id("challenge", &operand("challenge")?)?,
            phase_id: parse_id("phase", &operand("phase")?)?,
        },
        "host-submissions" => Command::HostSubmissions {
            challenge_id: parse_id("challenge", &operand("challenge")?)?,
            phase_id: parse_id("phase", &operand("phase")?)?,
        },
        "leaderboard" => Command::Leaderboard {
            phase_split_id: parse_id("split", &operand("split")?)?,
            watch,
        },
        "worker-logs" => Command::WorkerLogs {
            challenge_id: parse_id("challenge", &operand("challenge")?)?,
        },
        "worker" => {
            let challenge_id = parse_id("challenge", &operand("challenge")?)?;
            let raw = operand("start|stop|restart")?;
            let action = WorkerAction::parse(&raw).ok_or_else(|| {
                ApiError::Configuration(format!(
                    "Unknown worker action '{raw}'. Use start, stop or restart."
                ))
            })?;
            Command::Worker {
                challenge_id,
                action,
            }
        }
        unknown => {
            return Err(ApiError::Configuration(format!(
                "Unknown command '{unknown}'. Run with --help for valid commands."
            )));
        }
    };

    Ok(CliArgs { config, command })
}

fn parse_id(label: &str, raw: &str) -> Result<u64, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::Configuration(format!("<{label}> must be a numeric id, got '{raw}'."))
    })
}

fn print_cli_help() {
    println!(
        "evalboard [--config PATH] <command>\n\n\
         Commands:\n  \
         login <username>              log in (password from {ENV_PASSWORD})\n  \
         logout                        end the session\n  \
         challenges [present|upcoming|past]\n  \
         challenge <id>                show one challenge and its phases\n  \
         teams                         list your participant teams\n  \
         host-teams                    list your host teams\n  \
         submissions <challenge> <phase>\n  \
         host-submissions <challenge> <phase>\n  \
         leaderboard <split> [--watch] refresh until Ctrl-C with --watch\n  \
         worker-logs <challenge>       tail worker logs until Ctrl-C\n  \
         worker <challenge> <start|stop|restart>"
    );
}

fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let _ = fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "evalboard.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(err) = init_result {
        eprintln!("tracing init failed: {err}");
        return None;
    }

    Some(file_guard)
}

fn build_context(config: EvalboardConfig) -> Result<ScreenContext> {
    let transport = ReqwestTransport::new(config.api_base_url.clone())
        .context("failed to build HTTP transport")?;
    let store = FileStore::open(&config.storage.session_file).with_context(|| {
        format!(
            "failed to open session file '{}'",
            config.storage.session_file.display()
        )
    })?;
    let session = Session::new(Box::new(store)).shared();
    ScreenContext::new(config, Gateway::new(Arc::new(transport)), session)
        .context("invalid display settings")
}

/// Prints the user-visible side of an action. Returns `false` when it reports a failure.
fn report(action: &ScreenAction) -> bool {
    match action {
        ScreenAction::Stay => true,
        ScreenAction::Toast(toast) => match toast.level {
            ToastLevel::Error => {
                eprintln!("error: {}", toast.message);
                false
            }
            ToastLevel::Success | ToastLevel::Info => {
                println!("{}", toast.message);
                true
            }
        },
        ScreenAction::InlineError(message) => {
            eprintln!("error: {message}");
            false
        }
        ScreenAction::FormError { field, message } => {
            eprintln!("error: {field}: {message}");
            false
        }
        ScreenAction::Navigate(Route::Login) => {
            eprintln!("Not logged in. Run `evalboard login <username>` first.");
            false
        }
        ScreenAction::Navigate(Route::PermissionDenied) => {
            eprintln!("Permission denied.");
            false
        }
        ScreenAction::Navigate(route) => {
            info!(?route, "navigate");
            true
        }
    }
}

fn describe_span(span: &TimeSpan) -> String {
    match span {
        TimeSpan::Upcoming(countdown) => format!("starts in {}", countdown.label()),
        TimeSpan::Ongoing(countdown) => format!("ends in {}", countdown.label()),
        TimeSpan::Open => "open".to_string(),
        TimeSpan::Ended => "ended".to_string(),
    }
}

fn print_card(card: &ChallengeCard) {
    println!(
        "{:>6}  {:<40}  {:<20}  {}",
        card.id,
        card.title,
        card.host,
        describe_span(&card.time_span)
    );
}

fn print_pages(current_page: u64, is_prev: bool, is_next: bool) {
    println!(
        "page {current_page}{}{}",
        if is_prev { "  [prev]" } else { "" },
        if is_next { "  [next]" } else { "" }
    );
}

fn print_submissions(vm: &SubmissionsViewModel) {
    for row in &vm.rows {
        println!(
            "{:>6}  #{:<4}  {:<10}  {:<8}  {:<20}  {}",
            row.id,
            row.number.unwrap_or_default(),
            row.status_label,
            if row.show_private { "private" } else { "public" },
            row.team.as_deref().unwrap_or("-"),
            row.submitted.as_deref().unwrap_or("-")
        );
    }
    let page = &vm.submissions.state;
    print_pages(page.current_page, page.is_prev, page.is_next);
}

fn print_leaderboard(vm: &LeaderboardViewModel) {
    if let Some(error) = &vm.error {
        eprintln!("refresh failed: {error}");
    }
    println!("{:>4}  {:<32}  {}", "rank", "team", vm.labels.join("  "));
    for row in &vm.rows {
        let scores: Vec<String> = row
            .scores
            .iter()
            .map(|(_, score)| format!("{score:.4}"))
            .collect();
        println!(
            "{:>4}  {:<32}  {}{}",
            row.rank,
            row.team_name,
            scores.join("  "),
            if row.is_baseline { "  (baseline)" } else { "" }
        );
    }
}

async fn run(command: Command, ctx: ScreenContext) -> Result<bool> {
    match command {
        Command::Login { username } => {
            let password = std::env::var(ENV_PASSWORD)
                .with_context(|| format!("{ENV_PASSWORD} must hold the password"))?;
            let mut vm = AuthViewModel::default();
            let action = vm.login(&ctx, &username, &password).await;
            if let ScreenAction::Navigate(route) = &action
                && *route != Route::Login
            {
                println!("Logged in as {username}.");
                return Ok(true);
            }
            Ok(report(&action))
        }
        Command::Logout => {
            let mut vm = AuthViewModel::default();
            vm.logout(&ctx).await;
            println!("Logged out.");
            Ok(true)
        }
        Command::Challenges { tab } => {
            let mut vm = ChallengeListViewModel::default();
            let action = vm.load(&ctx, tab).await;
            if !report(&action) {
                return Ok(false);
            }
            if vm.no_challenges {
                println!("No challenges.");
            }
            vm.cards.iter().for_each(print_card);
            let state = &vm.challenges.state;
            print_pages(state.current_page, state.is_prev, state.is_next);
            Ok(true)
        }
        Command::Challenge { challenge_id } => {
            let mut vm = ChallengeDetailViewModel::default();
            let action = vm.load(&ctx, challenge_id).await;
            if !report(&action) {
                return Ok(false);
            }
            if let Some(card) = &vm.card {
                print_card(card);
                if let Some(starts) = &card.starts {
                    println!("  starts  {starts}");
                }
                if let Some(ends) = &card.ends {
                    println!("  ends    {ends}");
                }
            }
            for phase in &vm.phases {
                println!("  phase {:>5}  {}", phase.id, phase.name);
            }
            Ok(true)
        }
        Command::Teams => {
            let mut vm = ParticipantTeamsViewModel::new(TeamKind::Participant);
            let action = vm.load(&ctx).await;
            if !report(&action) {
                return Ok(false);
            }
            for team in &vm.teams.items {
                println!("{:>6}  {:<32}  {} member(s)", team.id, team.team_name, team.members.len());
            }
            Ok(true)
        }
        Command::HostTeams => {
            let mut vm = HostTeamsViewModel::new(TeamKind::Host);
            let action = vm.load_with_selection(&ctx).await;
            if !report(&action) {
                return Ok(false);
            }
            for team in &vm.teams.items {
                let marker = if vm.selected_host_team == Some(team.id) { "*" } else { " " };
                println!("{marker}{:>6}  {}", team.id, team.team_name);
            }
            Ok(true)
        }
        Command::Submissions {
            challenge_id,
            phase_id,
        } => {
            let screen = SubmissionsScreen::new(ctx, challenge_id, phase_id);
            let action = screen.open().await;
            screen.close().await;
            if !report(&action) {
                return Ok(false);
            }
            let state = screen.state();
            let vm = state.lock().await;
            print_submissions(&vm);
            Ok(true)
        }
        Command::HostSubmissions {
            challenge_id,
            phase_id,
        } => {
            let mut vm = SubmissionsViewModel::all_for_host(&ctx, challenge_id, phase_id);
            let action = vm.load(&ctx).await;
            if !report(&action) {
                return Ok(false);
            }
            print_submissions(&vm);
            Ok(true)
        }
        Command::Leaderboard {
            phase_split_id,
            watch,
        } => {
            let screen = LeaderboardScreen::new(ctx.clone(), phase_split_id);
            let action = screen.fetch().await;
            if !report(&action) {
                return Ok(false);
            }
            print_leaderboard(&screen.snapshot().await);
            if !watch {
                return Ok(true);
            }

            screen.start_refresh();
            let mut last_shown = screen.snapshot().await.refreshed_at;
            let mut ticker = tokio::time::interval(ctx.config.polling.leaderboard_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let vm = screen.snapshot().await;
                        if vm.refreshed_at != last_shown || vm.error.is_some() {
                            last_shown = vm.refreshed_at;
                            print_leaderboard(&vm);
                        }
                    }
                }
            }
            screen.stop_refresh().await;
            Ok(true)
        }
        Command::WorkerLogs { challenge_id } => {
            let screen = WorkerLogsScreen::new(ctx.clone(), challenge_id);
            let action = screen.open().await;
            if !report(&action) {
                return Ok(false);
            }
            let mut printed = 0;
            let mut ticker = tokio::time::interval(ctx.config.polling.worker_logs_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let vm = screen.snapshot().await;
                        if let Some(error) = &vm.error {
                            warn!(challenge_id, error = %error, "worker log refresh failed");
                        }
                        if vm.logs.len() < printed {
                            printed = 0;
                        }
                        for line in &vm.logs[printed..] {
                            println!("{line}");
                        }
                        printed = vm.logs.len();
                    }
                }
            }
            screen.close().await;
            Ok(true)
        }
        Command::Worker {
            challenge_id,
            action,
        } => {
            let result = manage_worker(
                &ctx,
                challenge_id,
                action,
                ModalDecision::ready(ModalResult::Confirmed),
            )
            .await;
            Ok(report(&result))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli_args(std::env::args().skip(1))?;
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_evalboard_config(&config_path)
        .with_context(|| format!("failed to load config '{}'", config_path.display()))?;
    let _log_guard = init_tracing(&config.logging.log_dir);
    info!(config = %config_path.display(), api = %config.api_base_url, "starting evalboard");

    let ctx = build_context(config).expect_or_log("failed to initialise evalboard");
    if !run(cli.command, ctx).await? {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_parse_leaderboard_watch() {
        let cli = parse_cli_args(args(&["--config", "x.toml", "leaderboard", "7", "--watch"])).unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        assert_eq!(
            cli.command,
            Command::Leaderboard {
                phase_split_id: 7,
                watch: true
            }
        );
    }

    #[test]
    fn test_parse_challenges_tab() {
        let cli = parse_cli_args(args(&["challenges"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Challenges {
                tab: ChallengeTab::Present
            }
        );
        let cli = parse_cli_args(args(&["challenges", "past"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Challenges {
                tab: ChallengeTab::Past
            }
        );
        assert!(parse_cli_args(args(&["challenges", "later"])).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_cli_args(args(&[])).is_err());
        assert!(parse_cli_args(args(&["submissions", "1"])).is_err());
        assert!(parse_cli_args(args(&["submissions", "one", "2"])).is_err());
        assert!(parse_cli_args(args(&["--verbose", "teams"])).is_err());
        assert!(parse_cli_args(args(&["worker", "3", "pause"])).is_err());
    }

    #[test]
    fn test_parse_host_submissions() {
        let cli = parse_cli_args(args(&["host-submissions", "4", "9"])).unwrap();
        assert_eq!(
            cli.command,
            Command::HostSubmissions {
                challenge_id: 4,
                phase_id: 9
            }
        );
    }

    #[test]
    fn test_parse_worker() {
        let cli = parse_cli_args(args(&["worker", "3", "restart"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Worker {
                challenge_id: 3,
                action: WorkerAction::Restart
            }
        );
    }
}
