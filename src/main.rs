use clap::Parser as ClapParser;
use shsyntax::{parse, parse_str, ParseError, ParseOptions, ScriptNode};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "shsyntax")]
#[command(about = "Parse POSIX and Bash shell scripts and report syntax errors")]
#[command(version)]
struct Cli {
    /// Parse the script given on the command line
    #[arg(short = 'c')]
    script: Option<String>,

    /// Parse as POSIX shell, rejecting Bash extensions
    #[arg(long = "posix")]
    posix: bool,

    /// Keep comments in the syntax tree
    #[arg(long = "comments")]
    comments: bool,

    /// TOML file with parser options; flags override it
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Print the syntax tree as JSON
    #[arg(long = "json", conflicts_with = "yaml")]
    json: bool,

    /// Print the syntax tree as YAML
    #[arg(long = "yaml")]
    yaml: bool,

    /// Script files to parse; stdin when none are given
    #[arg()]
    files: Vec<PathBuf>,
}

fn load_options(cli: &Cli) -> Result<ParseOptions, String> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            toml::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => ParseOptions::default(),
    };
    if cli.posix {
        options.posix = true;
    }
    if cli.comments {
        options.keep_comments = true;
    }
    Ok(options)
}

fn emit(cli: &Cli, script: &ScriptNode) -> Result<(), String> {
    if cli.json {
        let out = serde_json::to_string_pretty(script).map_err(|e| e.to_string())?;
        println!("{}", out);
    } else if cli.yaml {
        let out = serde_yaml::to_string(script).map_err(|e| e.to_string())?;
        print!("{}", out);
    }
    Ok(())
}

/// Print the tree or the diagnostic; false on failure.
fn report(cli: &Cli, result: Result<ScriptNode, ParseError>) -> bool {
    match result {
        Ok(script) => match emit(cli, &script) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Error: {}", e);
                false
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            false
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let options = match load_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut ok = true;
    if let Some(src) = &cli.script {
        ok = report(&cli, parse_str(src, options));
    } else if cli.files.is_empty() {
        ok = report(&cli, parse(io::stdin().lock(), "", options));
    } else {
        for path in &cli.files {
            let name = path.display().to_string();
            let file = match File::open(path) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!("{}: {}", name, e);
                    ok = false;
                    continue;
                }
            };
            ok &= report(&cli, parse(BufReader::new(file), &name, options));
        }
    }

    if !ok {
        std::process::exit(1);
    }
}
