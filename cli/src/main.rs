mod convert;
mod options;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dgv_core::HardwareProfile;
use log::error;

use convert::{batch, dai_to_wav, wav_to_dai, wav_to_wav, CliError, FileKind, Result};
use options::ProfileOptions;

#[derive(Parser)]
#[command(name = "dgv")]
#[command(about = "Convert DAI cassette programs between .dai files and WAV recordings")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input file; .dai is encoded to WAV, .wav is decoded to .dai
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file (default: derived from the input name)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    profile: ProfileArgs,
}

#[derive(Args, Clone, Default)]
struct ProfileArgs {
    /// Profile options string, e.g. --V7MBNF96000
    #[arg(short = 'o', long = "options", value_name = "OPTIONS", allow_hyphen_values = true)]
    options: Option<String>,

    /// Soften the first sample of every level change
    #[arg(long)]
    smooth: bool,
}

impl ProfileArgs {
    fn parsed(&self) -> Result<ProfileOptions> {
        Ok(match &self.options {
            Some(text) => ProfileOptions::parse(text)?,
            None => ProfileOptions::default(),
        })
    }

    fn profile(&self) -> Result<HardwareProfile> {
        Ok(self.parsed()?.apply()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a .dai program to a WAV recording
    Encode {
        #[arg(value_name = "INPUT.DAI")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT.WAV")]
        output: Option<PathBuf>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Decode a WAV recording to a .dai program
    Decode {
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT.DAI")]
        output: Option<PathBuf>,
    },

    /// Decode a WAV recording and encode it again with another profile
    Reshape {
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT.WAV")]
        output: Option<PathBuf>,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Convert every .wav and .dai file in a directory
    Batch {
        /// Directory to convert (default: current directory)
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        #[command(flatten)]
        profile: ProfileArgs,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Encode { input, output, profile }) => {
            dai_to_wav(&input, output.as_deref(), &profile.profile()?, profile.smooth)?;
        }
        Some(Commands::Decode { input, output }) => {
            wav_to_dai(&input, output.as_deref())?;
        }
        Some(Commands::Reshape { input, output, profile }) => {
            wav_to_wav(&input, output.as_deref(), &profile.profile()?, profile.smooth)?;
        }
        Some(Commands::Batch { dir, profile }) => {
            batch(&dir, &profile.parsed()?, profile.smooth)?;
        }
        None => {
            let input = cli
                .input
                .ok_or_else(|| CliError::Usage("no input file given (see --help)".to_string()))?;
            convert_by_extension(&input, cli.output.as_deref(), &cli.profile)?;
        }
    }
    Ok(())
}

fn convert_by_extension(input: &Path, output: Option<&Path>, args: &ProfileArgs) -> Result<()> {
    match FileKind::of(input) {
        Some(FileKind::Dai) => {
            dai_to_wav(input, output, &args.profile()?, args.smooth)?;
        }
        Some(FileKind::Wav) => match output.and_then(FileKind::of) {
            Some(FileKind::Wav) => {
                wav_to_wav(input, output, &args.profile()?, args.smooth)?;
            }
            _ => {
                wav_to_dai(input, output)?;
            }
        },
        None => {
            return Err(CliError::Usage(format!(
                "{}: expected a .dai or .wav file",
                input.display()
            )))
        }
    }
    Ok(())
}
