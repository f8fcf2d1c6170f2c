use anyhow::{Context, Result, bail};
use cipherlab::tutor::Tutor;
use cipherlab::{
    Action, CipherLab, Config, Credential, GeminiTutor, Mode, NarrationStep, OutputFile, Request,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

mod auth;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Shared passphrase (PBKDF2-SHA256 + AES-256-GCM)
    Password,
    /// Recipient's RSA public key wraps a one-time AES-256-GCM key
    Hybrid,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Password => Mode::Password,
            ModeArg::Hybrid => Mode::Hybrid,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cipherlab")]
#[command(
    version,
    about = "Encrypt text locally with a passphrase or a recipient's RSA public key."
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH", env = "CIPHERLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Print every protocol step to stderr
    #[arg(long, global = true)]
    explain: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generates a 2048-bit RSA key pair for hybrid mode
    Keygen {
        /// Write the public key here instead of stdout
        #[arg(long, value_name = "PATH")]
        public_out: Option<PathBuf>,

        /// Write the private key here instead of stdout
        #[arg(long, value_name = "PATH")]
        private_out: Option<PathBuf>,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Encrypts text into a base64 envelope
    Encrypt {
        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Recipient's public key (hybrid mode)
        #[arg(long, value_name = "PATH")]
        public_key: Option<PathBuf>,

        /// Write the envelope here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Plaintext; read from stdin when omitted
        text: Option<String>,
    },

    /// Decrypts an envelope back into text
    Decrypt {
        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Your private key (hybrid mode)
        #[arg(long, value_name = "PATH")]
        private_key: Option<PathBuf>,

        /// Write the plaintext here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Envelope; read from stdin when omitted
        envelope: Option<String>,
    },

    /// Asks the AI tutor a question about cryptography
    #[command(arg_required_else_help = true)]
    Ask {
        question: String,

        /// Summary of what you just did, passed to the tutor
        #[arg(long)]
        context: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_key_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))
}

/// Input text from the argument, else all of stdin minus the final newline.
fn read_input(arg: Option<String>, stdin_taken: bool) -> Result<String> {
    if let Some(text) = arg {
        return Ok(text);
    }
    if stdin_taken {
        bail!("input text must be passed as an argument when the passphrase is piped on stdin");
    }

    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read input from stdin")?;
    let len = buf.trim_end_matches(['\n', '\r']).len();
    buf.truncate(len);
    Ok(buf)
}

fn print_steps(steps: &[NarrationStep]) {
    for step in steps {
        eprintln!("> {}", step.title());
        eprintln!("  {}", step.description());
    }
}

fn ensure_writable(paths: &[&Option<PathBuf>], force: bool) -> Result<()> {
    for path in paths.iter().copied().flatten() {
        if path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }
    }
    Ok(())
}

fn write_key(file: OutputFile, pem: &str) -> Result<()> {
    file.save(pem.as_bytes())?;
    eprintln!("wrote {}", file.path().display());
    Ok(())
}

async fn run_request(
    lab: &mut CipherLab,
    request: Request,
    output: Option<PathBuf>,
) -> Result<()> {
    let action = request.action;
    let outcome = lab.process(request).await;
    print_steps(outcome.steps());

    let text = outcome.into_result()?;
    match output {
        Some(path) => {
            // plaintext gets the same owner-only mode as private keys
            let file = match action {
                Action::Encrypt => OutputFile::new(path),
                Action::Decrypt => OutputFile::owner_only(path),
            };
            file.save(text.as_bytes())?;
            eprintln!("wrote {}", file.path().display());
        }
        None => println!("{}", text.as_str()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = Config::load(args.config.as_deref())?;
    let mut lab = CipherLab::with_explain(args.explain || config.general.explain);

    match args.command {
        Commands::Keygen {
            public_out,
            private_out,
            force,
        } => {
            ensure_writable(&[&public_out, &private_out], force)?;
            let pair = lab.generate_keys().await?;

            match public_out {
                Some(path) => write_key(OutputFile::new(path), &pair.public_key)?,
                None => println!("{}", pair.public_key),
            }
            match private_out {
                Some(path) => write_key(OutputFile::owner_only(path), &pair.private_key)?,
                None => println!("{}", pair.private_key.as_str()),
            }
        }
        Commands::Encrypt {
            mode,
            public_key,
            output,
            text,
        } => {
            let mode = Mode::from(mode);
            let (credential, stdin_taken) = match mode {
                Mode::Password => passphrase_credential(auth::read_new_passphrase()?),
                Mode::Hybrid => match public_key {
                    Some(path) => (Some(Credential::PublicKey(read_key_file(&path)?)), false),
                    None => (None, false),
                },
            };
            let mut request = Request::new(mode, Action::Encrypt, read_input(text, stdin_taken)?);
            request.credential = credential;

            run_request(&mut lab, request, output).await?;
        }
        Commands::Decrypt {
            mode,
            private_key,
            output,
            envelope,
        } => {
            let mode = Mode::from(mode);
            let (credential, stdin_taken) = match mode {
                Mode::Password => passphrase_credential(auth::read_passphrase()?),
                Mode::Hybrid => match private_key {
                    Some(path) => (
                        Some(Credential::PrivateKey(Zeroizing::new(read_key_file(&path)?))),
                        false,
                    ),
                    None => (None, false),
                },
            };
            let mut request =
                Request::new(mode, Action::Decrypt, read_input(envelope, stdin_taken)?);
            request.credential = credential;

            run_request(&mut lab, request, output).await?;
        }
        Commands::Ask { question, context } => {
            let tutor = GeminiTutor::from_env(config.tutor);
            let answer = tutor.ask(&question, context.as_deref().unwrap_or("")).await;
            println!("{answer}");
        }
    }

    Ok(())
}

fn passphrase_credential(
    read: Option<(Zeroizing<String>, auth::Source)>,
) -> (Option<Credential>, bool) {
    match read {
        Some((pw, source)) => (
            Some(Credential::Passphrase(pw)),
            source == auth::Source::Stdin,
        ),
        None => (None, false),
    }
}
