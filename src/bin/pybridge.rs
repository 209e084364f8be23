use std::path::PathBuf;

use pybridge::logging::{self, LogConfig};
use pybridge::{BridgeConfig, Object, Value};

#[derive(Debug, Clone, Default)]
struct CliConfig {
    module: String,
    /// Dotted attribute path below the module, e.g. `path.join`
    callable: Option<String>,
    args: Vec<Value>,
    json: bool,
    verbose: bool,
    config_file: Option<PathBuf>,
    python_path: Vec<String>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [OPTIONS] <module> [<callable> [args...]]\n\n\
         Arguments are parsed as JSON, falling back to plain strings.\n\n\
         Options:\n  \
         --json          Print the decoded result as JSON\n  \
         --config FILE   Load bridge settings from a TOML file\n  \
         --path DIR      Prepend DIR to sys.path (repeatable)\n  \
         --verbose       Debug logging to stderr",
        program
    )
}

fn parse_args() -> Result<CliConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pybridge");

    let mut config = CliConfig::default();
    let mut positional = Vec::new();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--json" => config.json = true,
            "--verbose" => config.verbose = true,
            "--help" | "-h" => return Err(usage(program)),
            "--config" => {
                i += 1;
                let file = args.get(i).ok_or("--config requires an argument")?;
                config.config_file = Some(PathBuf::from(file));
            }
            "--path" => {
                i += 1;
                let dir = args.get(i).ok_or("--path requires an argument")?;
                config.python_path.push(dir.clone());
            }
            // Everything after the callable belongs to the call.
            arg if arg.starts_with("--") && positional.len() < 2 => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    config.module = positional.next().ok_or_else(|| usage(program))?;
    config.callable = positional.next();
    config.args = positional.map(|arg| parse_value(&arg)).collect();

    Ok(config)
}

fn parse_value(arg: &str) -> Value {
    serde_json::from_str(arg)
        .map(Value::from_json)
        .unwrap_or_else(|_| Value::from(arg))
}

fn bridge_config(cli: &CliConfig) -> Result<BridgeConfig, String> {
    let mut config = match &cli.config_file {
        Some(path) => BridgeConfig::from_file(path).map_err(|e| e.to_string())?,
        None => BridgeConfig::from_env(),
    };
    let mut python_path = cli.python_path.clone();
    python_path.append(&mut config.python_path);
    config.python_path = python_path;
    Ok(config)
}

fn resolve(module: &Object, path: &str) -> pybridge::Result<Object> {
    path.split('.')
        .try_fold(module.clone(), |target, name| target.attr(name))
}

fn run(cli: &CliConfig) -> Result<String, String> {
    pybridge::configure(bridge_config(cli)?).map_err(|e| e.to_string())?;

    let module = pybridge::import(&cli.module).map_err(|e| e.to_string())?;
    let result = match &cli.callable {
        Some(path) => resolve(&module, path)
            .and_then(|callable| callable.invoke(&cli.args))
            .map_err(|e| e.to_string())?,
        None => module,
    };

    if cli.json {
        let json = result
            .value()
            .and_then(|value| value.to_json())
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&json).map_err(|e| e.to_string())
    } else {
        Ok(result.string())
    }
}

fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::from_env()
    };
    logging::init_with_config(log_config);

    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
