use crate::binder::ToggleMode;
use crate::cli::args::CliArgs;
use crate::sanitize::ScriptPolicy;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if args.init_config {
        return Ok(());
    }
    if args.roll.is_some() && args.url.is_some() {
        return Err("use either --roll or --url, not both".to_string());
    }
    if args.roll.is_none() && args.url.is_none() {
        return Err("a roll number is required (--roll or --url)".to_string());
    }
    if let Some(raw) = args.toggle_mode.as_deref() {
        ToggleMode::parse(raw).ok_or_else(|| {
            format!("invalid --toggle-mode '{raw}', expected independent or accordion")
        })?;
    }
    if let Some(raw) = args.script_policy.as_deref() {
        ScriptPolicy::parse(raw)
            .ok_or_else(|| format!("invalid --script-policy '{raw}', expected strip or replay"))?;
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(ttl) = args.token_ttl {
        if ttl == 0 {
            return Err("invalid token-ttl, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.endpoint.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --endpoint '{raw}': {e}"))?;
    }
    if let Some(token) = args.token.as_deref() {
        if token.trim().is_empty() {
            return Err("--token must not be empty".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["resultview"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn requires_exactly_one_roll_source() {
        assert!(validate(&parse(&[])).is_err());
        assert!(validate(&parse(&["-r", "1", "--url", "/result?rollNo=1"])).is_err());
        assert!(validate(&parse(&["-r", "1"])).is_ok());
        assert!(validate(&parse(&["--init-config"])).is_ok());
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!(validate(&parse(&["-r", "1", "--toggle-mode", "tabs"])).is_err());
        assert!(validate(&parse(&["-r", "1", "--script-policy", "eval"])).is_err());
        assert!(validate(&parse(&["-r", "1", "-m", "accordion", "-S", "replay"])).is_ok());
    }

    #[test]
    fn rejects_zero_timeout_and_bad_endpoint() {
        assert!(validate(&parse(&["-r", "1", "--timeout", "0"])).is_err());
        assert!(validate(&parse(&["-r", "1", "--endpoint", "not a url"])).is_err());
    }
}
