use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::binder::{BindOptions, ToggleMode};
use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::fetcher::{HttpTransport, ResultFetcher, DEFAULT_ENDPOINT};
use crate::navigation::{self, RollQuery};
use crate::notify::ToastQueue;
use crate::print::{FilePrintSink, PrintOutcome};
use crate::render::scripts::CollectingScriptHost;
use crate::sanitize::ScriptPolicy;
use crate::session::{ApplyOutcome, LookupSession, SessionOptions};
use crate::token::{
    JwtTokenProvider, StaticToken, TokenProvider, DEFAULT_SECRET_ENV, DEFAULT_TOKEN_TTL_SECS,
};

const DEFAULT_TIMEOUT_SECS: u64 = 15;

fn print_banner() {
    const BANNER: &str = r#"
                          ____      _
   ________  _______  __/ / /__  _(_)__ _      __
  / ___/ _ \/ ___/ / / / / __/ | / / / _ \ | /| / /
 / /  /  __(__  ) /_/ / / /_ | |/ / /  __/ |/ |/ /
/_/   \___/____/\__,_/_/\__/ |___/_/\___/|__/|__/
       roll-number result lookup
    "#;
    print!("{}", BANNER);
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `-r, --roll, --roll-number <ROLL>` style flag column for one argument.
fn help_flags(arg: &clap::Arg) -> String {
    let mut flags: Vec<String> = arg.get_short().map(|c| format!("-{c}")).into_iter().collect();
    flags.extend(arg.get_long().map(|l| format!("--{l}")));
    flags.extend(
        arg.get_visible_aliases()
            .unwrap_or_default()
            .into_iter()
            .map(|a| format!("--{a}")),
    );
    let mut out = flags.join(", ");
    if arg.get_action().takes_values() {
        let name = arg
            .get_value_names()
            .and_then(|names| names.first())
            .map(|name| name.to_string())
            .unwrap_or_else(|| arg.get_id().as_str().to_uppercase());
        out.push_str(&format!(" <{name}>"));
    }
    out
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = format!(
        "{} {}\n{}\n\nUsage: {} [OPTIONS] (--roll <ROLL> | --url <URL>)\n",
        cmd.get_name(),
        cmd.get_version().unwrap_or_default(),
        cmd.get_about().map(|a| a.to_string()).unwrap_or_default(),
        cmd.get_name(),
    );

    let args: Vec<&clap::Arg> = cmd.get_arguments().filter(|a| !a.is_hide_set()).collect();
    let mut headings: Vec<&str> = Vec::new();
    for arg in &args {
        let heading = arg.get_help_heading().unwrap_or("Options");
        if !headings.contains(&heading) {
            headings.push(heading);
        }
    }

    for heading in headings {
        out.push_str(&format!("\n{heading}:\n"));
        for arg in args
            .iter()
            .filter(|a| a.get_help_heading().unwrap_or("Options") == heading)
        {
            let help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
            out.push_str(&format!("  {:<42} {}\n", help_flags(arg), help.trim()));
        }
    }
    out
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("resultview={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Clone, Debug, PartialEq)]
enum TokenSource {
    Static(String),
    Signed { secret_env: String, ttl_secs: u64 },
}

#[derive(Clone, Debug, PartialEq)]
struct RunConfig {
    roll: RollQuery,
    endpoint: String,
    timeout: u64,
    proxy: Option<String>,
    token: TokenSource,
    bind: BindOptions,
    script_policy: ScriptPolicy,
    trusted_scripts: bool,
    expand: Vec<String>,
    output: Option<String>,
    print: Option<String>,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let roll = match (args.roll.as_deref(), args.url.as_deref()) {
        (Some(roll), _) => RollQuery::from_value(Some(roll)),
        (None, Some(url)) => navigation::parse_roll_query(url)?,
        (None, None) => RollQuery::Missing,
    };

    let endpoint = args
        .endpoint
        .or(cfg.endpoint)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    reqwest::Url::parse(&endpoint).map_err(|e| format!("invalid endpoint '{endpoint}': {e}"))?;

    let timeout = args.timeout.or(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());

    let token = match args.token {
        Some(token) => TokenSource::Static(token.trim().to_string()),
        None => TokenSource::Signed {
            secret_env: args
                .secret_env
                .or(cfg.secret_env)
                .unwrap_or_else(|| DEFAULT_SECRET_ENV.to_string()),
            ttl_secs: args
                .token_ttl
                .or(cfg.token_ttl)
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
        },
    };

    let toggle_mode = match args.toggle_mode.as_deref() {
        Some(raw) => ToggleMode::parse(raw)
            .ok_or_else(|| format!("invalid --toggle-mode '{raw}'"))?,
        None => cfg.toggle_mode.unwrap_or_default(),
    };
    let auto_height = args.auto_height.or(cfg.auto_height).unwrap_or(false);

    let script_policy = match args.script_policy.as_deref() {
        Some(raw) => ScriptPolicy::parse(raw)
            .ok_or_else(|| format!("invalid --script-policy '{raw}'"))?,
        None => cfg.script_policy.unwrap_or_default(),
    };
    let trusted_scripts = args.trusted_scripts || cfg.trusted_scripts.unwrap_or(false);

    let expand = args
        .expand
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let print = args
        .print
        .or(cfg.print)
        .map(|p| config::expand_tilde_string(&p));

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    Ok(RunConfig {
        roll,
        endpoint,
        timeout,
        proxy,
        token,
        bind: BindOptions {
            toggle_mode,
            auto_height,
        },
        script_policy,
        trusted_scripts,
        expand,
        output,
        print,
        no_color,
    })
}

fn issue_token(source: &TokenSource) -> Result<String, String> {
    let provider: Box<dyn TokenProvider> = match source {
        TokenSource::Static(token) => Box::new(StaticToken(token.clone())),
        TokenSource::Signed {
            secret_env,
            ttl_secs,
        } => Box::new(
            JwtTokenProvider::from_env(secret_env, *ttl_secs)
                .map_err(|e| format!("failed to set up token signing: {e}"))?,
        ),
    };
    provider
        .token()
        .map_err(|e| format!("failed to issue token: {e}"))
}

fn flush_toasts(toasts: &ToastQueue) {
    for toast in toasts.drain() {
        eprintln!("{}", toast.render());
    }
}

async fn write_output(path: &str, contents: &str) -> Result<(), String> {
    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| format!("failed to open output file: {e}"))?;
    outfile
        .write_all(contents.as_bytes())
        .await
        .map_err(|e| format!("failed to write output file: {e}"))
}

/// Appends replayed scripts to the exported document so a browser opening the
/// file runs them in their original order.
fn export_document(html: &str, scripts: &[String]) -> String {
    if scripts.is_empty() {
        return html.to_string();
    }
    let mut tail = String::new();
    for script in scripts {
        tail.push_str("<script>");
        tail.push_str(script);
        tail.push_str("</script>\n");
    }
    match html.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tail, &html[idx..]),
        None => format!("{html}{tail}"),
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let toasts = ToastQueue::new();
    let roll = match &run.roll {
        RollQuery::Present(roll) => roll.clone(),
        RollQuery::Missing => {
            toasts.error(crate::fetcher::MISSING_ROLL_NUMBER);
            flush_toasts(&toasts);
            return Err("no roll number supplied".to_string());
        }
    };

    let token = issue_token(&run.token)?;
    let transport = HttpTransport::new(run.timeout, run.proxy.as_deref())
        .map_err(|e| e.to_string())?;
    let fetcher = ResultFetcher::new(transport, run.endpoint.clone());

    let options = SessionOptions {
        bind: run.bind,
        script_policy: run.script_policy,
        trusted_scripts: run.trusted_scripts,
    };
    let host = CollectingScriptHost::default();
    let mut session = LookupSession::new(fetcher, token, toasts.clone(), options)
        .with_script_host(Box::new(host.clone()));

    format_kv_line("Roll", &roll);
    format_kv_line(
        "Provider",
        &format!(
            "{} timeout={}s proxy={}",
            run.endpoint,
            run.timeout,
            if run.proxy.is_some() { "on" } else { "off" }
        ),
    );
    format_kv_line(
        "Render",
        &format!(
            "toggle={} auto-height={} scripts={}",
            run.bind.toggle_mode.label(),
            format_bool(run.bind.auto_height),
            options.effective_policy().label()
        ),
    );
    println!();

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} [{elapsed_precise}]")
            .map_err(|e| format!("failed to build spinner style: {e}"))?,
    );
    pb.set_message("Fetching Your Result...");

    let now = Instant::now();
    let outcome = session.lookup(&roll).await.map_err(|e| e.to_string());
    pb.finish_and_clear();
    let outcome = outcome?;

    match &outcome {
        ApplyOutcome::Rendered { bind, scripts, .. } => {
            format_kv_line("Result", &"rendered".green().to_string());
            if let Some(report) = bind {
                format_kv_line(
                    "Binding",
                    &format!(
                        "sections={} links-disabled={} issues={}",
                        report.sections_bound,
                        report.anchors_disabled,
                        report.issues.len()
                    ),
                );
            }
            if let Some(replay) = scripts {
                format_kv_line(
                    "Scripts",
                    &format!("executed={} failed={}", replay.executed, replay.failed.len()),
                );
            }
        }
        ApplyOutcome::Failed(failure) => {
            format_kv_line("Result", &failure.kind.label().red().to_string());
            flush_toasts(&toasts);
            return Err(failure.to_string());
        }
        ApplyOutcome::Stale { .. } => {
            flush_toasts(&toasts);
            return Err("result superseded by a newer lookup".to_string());
        }
    }

    for key in run.expand.iter() {
        if !session.click_section(key) {
            toasts.warn(format!("no section '{key}' to expand"));
        }
    }

    if let Some(doc) = session.surface().document() {
        for (key, state) in doc.sections() {
            let label = if state.expanded {
                "expanded".green()
            } else {
                "collapsed".dimmed()
            };
            format_kv_line("Section", &format!("{key} {label}"));
        }
    }
    if let Some(height) = session.surface().display_height() {
        format_kv_line("Height", &format!("{height}px"));
    }

    if let Some(path) = run.output.as_ref() {
        let html = session
            .surface()
            .document()
            .map(|doc| doc.to_html())
            .unwrap_or_default();
        write_output(path, &export_document(&html, &host.scripts())).await?;
        format_kv_line("Output", path);
    }

    if let Some(path) = run.print.as_ref() {
        let mut sink = FilePrintSink::new(path);
        match session.print(&mut sink).map_err(|e| e.to_string())? {
            PrintOutcome::Printed { bytes } => {
                format_kv_line("Print", &format!("{path} ({bytes} bytes)"))
            }
            PrintOutcome::NotReady => format_kv_line("Print", "skipped"),
        }
    }

    flush_toasts(&toasts);

    println!();
    println!(
        ":: Completed :: lookup took {}ms ::",
        now.elapsed().as_millis()
    );
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_logging(args.verbose);

    if args.init_config {
        let path = match args.config.as_deref() {
            Some(p) => config::expand_tilde(p),
            None => config::default_config_path()
                .ok_or_else(|| "could not determine home directory".to_string())?,
        };
        config::ensure_default_config_file(&path)?;
        format_kv_line("Config", &path.display().to_string());
        return Ok(());
    }

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
