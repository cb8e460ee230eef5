use std::env;

pub const DEFAULT_STEPS: &str = "A2,C,history:A";
pub const DEFAULT_LOG: &str = "info";

pub struct Config {
    /// Raw step list, comma separated (see `script::Step::parse`).
    pub steps: String,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// Do not print the active path after each step.
    pub quiet: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_args_iter(env::args())
    }

    pub fn from_args_iter<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut steps = env::var("STATETREE_STEPS").unwrap_or_else(|_| DEFAULT_STEPS.to_string());
        let mut log_filter =
            env::var("STATETREE_LOG").unwrap_or_else(|_| DEFAULT_LOG.to_string());
        let mut quiet = env::var("STATETREE_QUIET")
            .ok()
            .and_then(parse_bool)
            .unwrap_or(false);

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "--steps" => match args.next() {
                    Some(value) => steps = value.as_ref().to_string(),
                    None => missing_value(arg),
                },
                "--log" => match args.next() {
                    Some(value) => log_filter = value.as_ref().to_string(),
                    None => missing_value(arg),
                },
                "--quiet" => {
                    quiet = true;
                }
                _ if arg.starts_with("--steps=") => {
                    steps = arg["--steps=".len()..].to_string();
                }
                _ if arg.starts_with("--log=") => {
                    log_filter = arg["--log=".len()..].to_string();
                }
                _ => {}
            }
        }

        Self {
            steps,
            log_filter,
            quiet,
        }
    }
}

/// A trailing flag without its value keeps the current setting.
fn missing_value(flag: &str) {
    eprintln!("{flag} expects a value; keeping the current setting");
    eprintln!("{USAGE}");
}

fn print_usage() {
    println!("{USAGE}");
}

const USAGE: &str = "statetree_walk [--steps A2,C,history:A,...] [--log <filter>] [--quiet]\n\
         steps: <state> | point:<state>:<id> | history:<state> | deep:<state> | event:<next|back|home> | start | stop | reset";

fn parse_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
