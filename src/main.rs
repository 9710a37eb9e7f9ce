use anyhow::Context;
use cfn_tools::directive::{EvalEnv, GitVersion};
use cfn_tools::openapi::{self, Format, OutputFormat};
use cfn_tools::tree::References;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "cfn-tools")]
#[command(about = "Process CloudFormation templates and OpenAPI specifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commands for CloudFormation templates.
    Template {
        #[command(subcommand)]
        cmd: TemplateCommands,
    },
    /// Commands for OpenAPI specifications.
    Openapi {
        #[command(subcommand)]
        cmd: OpenapiCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Resolve every CFNTools tag in a template.
    Process {
        #[arg(short = 't', long, default_value = "template.yaml")]
        template: PathBuf,

        /// Output file, `-` for stdout.
        #[arg(short = 'o', long, default_value = "-")]
        output: String,

        /// Write `!Ref X` as `Ref: X`, `!GetAtt A.B` as `Fn::GetAtt: [A, B]`, ...
        #[arg(long)]
        replace_tags: bool,
    },
}

#[derive(Subcommand)]
enum OpenapiCommands {
    /// Delete paths or operations matching rules.
    Process {
        /// Input file, `-` for stdin.
        #[arg(short = 'i', long, default_value = "-")]
        input: String,

        /// Output file, `-` for stdout.
        #[arg(short = 'o', long, default_value = "-")]
        output: String,

        /// `selector : action : predicate`, applied in order.
        #[arg(short = 'r', long = "rule")]
        rules: Vec<String>,

        /// json, yaml, or default (same as the input).
        #[arg(short = 'f', long, default_value = "default")]
        format: OutputFormat,
    },
}

fn main() -> ExitCode {
    cfn_tools::logging::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.cmd {
        Commands::Template {
            cmd:
                TemplateCommands::Process {
                    template,
                    output,
                    replace_tags,
                },
        } => {
            if !template.exists() {
                anyhow::bail!("template file not found: {}", template.display());
            }

            // `!CFNToolsVersion` describes the repository the template lives in.
            let repo_dir = match template.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let env = EvalEnv::default().with_versions(GitVersion::new(repo_dir));

            let text = cfn_tools::process_template(
                &template,
                &env,
                References::from_expand_flag(replace_tags),
            )
            .with_context(|| format!("process template {}", template.display()))?;

            write_output(&output, &text)?;
            if output != "-" {
                eprintln!("Processed template written to: {}", output);
            }
        }
        Commands::Openapi {
            cmd:
                OpenapiCommands::Process {
                    input,
                    output,
                    rules,
                    format,
                },
        } => {
            let content = read_input(&input)?;
            let hint = if input == "-" {
                None
            } else {
                Format::from_path(Path::new(&input))
            };

            let text = openapi::process_openapi(&content, &rules, hint, format)
                .with_context(|| format!("process specification {}", display_name(&input)))?;

            info!(rules = rules.len(), %format, "openapi processed");
            write_output(&output, &text)?;
        }
    }

    Ok(())
}

fn display_name(path: &str) -> &str {
    if path == "-" { "<stdin>" } else { path }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("read input file {}", input))
    }
}

/// Writes `text` to a file or stdout, ending it with exactly one newline.
fn write_output(output: &str, text: &str) -> Result<()> {
    let mut text = text.trim_end_matches('\n').to_string();
    text.push('\n');

    if output == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes()).context("write stdout")?;
        stdout.flush().context("flush stdout")?;
    } else {
        std::fs::write(output, text).with_context(|| format!("write output file {}", output))?;
    }
    Ok(())
}
