use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flakegate::{GeneratorConfig, derive_machine_id};

/// Command-line arguments for the `flakegate` binary.
///
/// Every option can also be supplied through the environment variable named
/// in its help text, or through a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flakegate",
    version,
    about = "Mint Snowflake-style IDs and dry-run rate limit rules"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Mint one or more IDs.
    Generate(GenerateArgs),
    /// Print the machine ID derived from this host.
    MachineId(MachineIdArgs),
    /// Replay requests against a rule file and print each decision.
    Check(CheckArgs),
}

/// Bit layout presets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 32/5/15 bits, 1s ticks: IDs fit in 52 bits.
    Small,
    /// 33/14/16 bits, 1s ticks.
    Standard,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Bit layout to mint with.
    ///
    /// Environment variable: `FLAKEGATE_PRESET`
    #[arg(long, env = "FLAKEGATE_PRESET", value_enum, default_value_t = Preset::Standard)]
    pub preset: Preset,

    /// Explicit machine ID. Derived from the host name when omitted.
    ///
    /// Environment variable: `FLAKEGATE_MACHINE_ID`
    #[arg(long, env = "FLAKEGATE_MACHINE_ID", allow_negative_numbers = true)]
    pub machine_id: Option<i64>,

    /// Number of IDs to mint.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Print the decoded fields next to each ID.
    #[arg(long, default_value_t = false)]
    pub explain: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MachineIdArgs {
    /// Width of the machine field.
    ///
    /// Environment variable: `FLAKEGATE_MACHINE_BITS`
    #[arg(long, env = "FLAKEGATE_MACHINE_BITS", default_value_t = 14)]
    pub bits: u32,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// JSON rule file (`{"Rules": [...]}`).
    ///
    /// Environment variable: `FLAKEGATE_RULES`
    #[arg(long, env = "FLAKEGATE_RULES")]
    pub rules: PathBuf,

    /// Request path to evaluate.
    #[arg(long)]
    pub path: String,

    /// User ID of the simulated caller.
    #[arg(long, default_value_t = String::new())]
    pub user: String,

    /// Client IP of the simulated caller.
    #[arg(long, default_value_t = String::new())]
    pub ip: String,

    /// How many back-to-back requests to replay.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
}

/// Validated settings for `generate`.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub generator: GeneratorConfig,
    pub count: usize,
    pub explain: bool,
}

impl TryFrom<GenerateArgs> for GenerateConfig {
    type Error = anyhow::Error;

    fn try_from(args: GenerateArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("--count must be greater than 0");
        }

        let machine_bits = match args.preset {
            Preset::Small => GeneratorConfig::small(0).machine_bits,
            Preset::Standard => GeneratorConfig::standard(0).machine_bits,
        };
        let machine_id = args
            .machine_id
            .unwrap_or_else(|| derive_machine_id(machine_bits));
        let generator = match args.preset {
            Preset::Small => GeneratorConfig::small(machine_id),
            Preset::Standard => GeneratorConfig::standard(machine_id),
        };
        generator
            .validate()
            .with_context(|| format!("preset {:?} rejects machine id {machine_id}", args.preset))?;

        Ok(Self {
            generator,
            count: args.count,
            explain: args.explain,
        })
    }
}

/// Validated settings for `check`.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub rules: PathBuf,
    pub path: String,
    pub user: String,
    pub ip: String,
    pub repeat: usize,
}

impl TryFrom<CheckArgs> for CheckConfig {
    type Error = anyhow::Error;

    fn try_from(args: CheckArgs) -> Result<Self, Self::Error> {
        if args.repeat == 0 {
            bail!("--repeat must be greater than 0");
        }
        if !args.path.starts_with('/') {
            bail!("--path must be absolute, got {:?}", args.path);
        }
        Ok(Self {
            rules: args.rules,
            path: args.path,
            user: args.user,
            ip: args.ip,
            repeat: args.repeat,
        })
    }
}

pub fn validate_machine_bits(bits: u32) -> anyhow::Result<u32> {
    if !(1..=63).contains(&bits) {
        bail!("--bits must be between 1 and 63, got {bits}");
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(machine_id: Option<i64>, count: usize) -> GenerateArgs {
        GenerateArgs {
            preset: Preset::Small,
            machine_id,
            count,
            explain: false,
        }
    }

    #[test]
    fn parses_generate_subcommand() {
        let args = CliArgs::try_parse_from([
            "flakegate",
            "generate",
            "--preset",
            "small",
            "--machine-id",
            "3",
            "-n",
            "5",
        ])
        .unwrap();
        let Command::Generate(args) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(args.preset, Preset::Small);
        assert_eq!(args.machine_id, Some(3));
        assert_eq!(args.count, 5);
    }

    #[test]
    fn generate_config_uses_preset_layout() {
        let config = GenerateConfig::try_from(generate_args(Some(31), 2)).unwrap();
        assert_eq!(config.generator, GeneratorConfig::small(31));
    }

    #[test]
    fn generate_config_rejects_out_of_range_machine_id() {
        assert!(GenerateConfig::try_from(generate_args(Some(32), 1)).is_err());
        assert!(GenerateConfig::try_from(generate_args(Some(-1), 1)).is_err());
    }

    #[test]
    fn generate_config_rejects_zero_count() {
        assert!(GenerateConfig::try_from(generate_args(Some(1), 0)).is_err());
    }

    #[test]
    fn generate_config_derives_machine_id_when_missing() {
        let config = GenerateConfig::try_from(generate_args(None, 1)).unwrap();
        assert!((0..32).contains(&config.generator.machine_id));
    }

    #[test]
    fn check_config_requires_absolute_path() {
        let args = CheckArgs {
            rules: PathBuf::from("rules.json"),
            path: "api/x".into(),
            user: String::new(),
            ip: String::new(),
            repeat: 1,
        };
        assert!(CheckConfig::try_from(args).is_err());
    }

    #[test]
    fn machine_bits_bounds() {
        assert!(validate_machine_bits(0).is_err());
        assert!(validate_machine_bits(14).is_ok());
        assert!(validate_machine_bits(64).is_err());
    }
}
