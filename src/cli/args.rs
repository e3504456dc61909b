use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "resultview",
    version,
    about = "roll-number result lookup and sandboxed renderer",
    long_about = "resultview fetches a pre-rendered result document for a roll number, strips its scripts, renders it into an isolated document with collapsible sections and disabled links, and can export or print the result.\n\nExamples:\n  resultview -r 2300541539001\n  resultview -U 'https://site.example/result?rollNo=2300541539001' -o result.html\n  resultview -r 2300541539001 --toggle-mode accordion -e sem1 --print print.html\n\nTip: Use --init-config to write a commented default config to ~/.resultview/config.yml."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'r',
        long = "rn",
        visible_alias = "roll",
        value_name = "ROLL",
        help_heading = "Input",
        help = "Roll number to look up."
    )]
    pub roll: Option<String>,

    #[arg(
        short = 'U',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Result page URL or path carrying the roll number (e.g. /result?rollNo=123)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.resultview/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a default config file (if missing) and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'E',
        long = "ep",
        visible_alias = "endpoint",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Result provider endpoint."
    )]
    pub endpoint: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "se",
        visible_alias = "secret-env",
        value_name = "VAR",
        help_heading = "Token",
        help = "Environment variable holding the token signing secret (default SECRET_KEY)."
    )]
    pub secret_env: Option<String>,

    #[arg(
        long = "ttl",
        visible_alias = "token-ttl",
        value_name = "SECONDS",
        help_heading = "Token",
        help = "Lifetime of the signed token in seconds."
    )]
    pub token_ttl: Option<u64>,

    #[arg(
        short = 'k',
        long = "tk",
        visible_alias = "token",
        value_name = "TOKEN",
        help_heading = "Token",
        help = "Send a pre-issued token instead of signing one."
    )]
    pub token: Option<String>,

    #[arg(
        short = 'm',
        long = "tm",
        visible_alias = "toggle-mode",
        value_name = "MODE",
        help_heading = "Render",
        help = "Section toggle policy (independent or accordion)."
    )]
    pub toggle_mode: Option<String>,

    #[arg(
        short = 'H',
        long = "ah",
        visible_alias = "auto-height",
        num_args = 0..=1,
        default_missing_value = "true",
        help_heading = "Render",
        help = "Recompute the surface height after render and every toggle."
    )]
    pub auto_height: Option<bool>,

    #[arg(
        short = 'S',
        long = "sp",
        visible_alias = "script-policy",
        value_name = "POLICY",
        help_heading = "Render",
        help = "Inline script policy (strip or replay)."
    )]
    pub script_policy: Option<String>,

    #[arg(
        long = "ts",
        visible_alias = "trusted-scripts",
        help_heading = "Render",
        help = "Allow the replay policy to run provider scripts with host privileges."
    )]
    pub trusted_scripts: bool,

    #[arg(
        short = 'e',
        long = "ex",
        visible_alias = "expand",
        value_name = "SECTION",
        action = ArgAction::Append,
        help_heading = "Render",
        help = "Expand a section by id after binding (repeatable)."
    )]
    pub expand: Vec<String>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the rendered document to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'P',
        long = "pr",
        visible_alias = "print",
        value_name = "FILE",
        help_heading = "Output",
        help = "Print the surface content to a file."
    )]
    pub print: Option<String>,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,
}
