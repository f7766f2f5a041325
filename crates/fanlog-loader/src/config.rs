use crate::store::Mode;
use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

/// Command line options for the `fanlog-loader` binary.
///
/// Every option can also be set through the environment (or a `.env` file in
/// the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fanlog-loader",
    version,
    about = "Ingest or query simulated payment records across parallel workers"
)]
pub struct CliArgs {
    /// Directory holding the payment record store.
    ///
    /// Each worker owns one `payments-<worker>.jsonl` file in it. Query runs
    /// read back whatever a previous insert run left behind.
    ///
    /// Environment variable: `DATA_DIR`
    #[arg(short, long, env = "DATA_DIR", default_value = "payments-data")]
    pub data_dir: PathBuf,

    /// Number of worker threads to run.
    ///
    /// Environment variable: `PROCS`
    #[arg(short, long, env = "PROCS", default_value_t = 2)]
    pub procs: usize,

    /// File that receives the progress samples of every worker.
    ///
    /// Truncated at the start of each run.
    ///
    /// Environment variable: `LOGFILE`
    #[arg(short, long, env = "LOGFILE", default_value = "processing-output.log")]
    pub logfile: PathBuf,

    /// Durability mode for record writes.
    ///
    /// `local` buffers writes, `majority` flushes every record and
    /// `linearizable` also syncs every record to disk.
    ///
    /// Environment variable: `MODE`
    #[arg(short, long, env = "MODE", value_enum, default_value_t = Mode::Local)]
    pub mode: Mode,

    /// Number of records to insert or query in total.
    ///
    /// Records that do not divide evenly across the workers are skipped.
    ///
    /// Environment variable: `TOTALREC`
    #[arg(short, long, env = "TOTALREC", default_value_t = 1_000_000)]
    pub totalrec: u64,

    /// Query the existing record set instead of inserting a new one.
    ///
    /// Environment variable: `DOQUERIES`
    #[arg(short = 'q', long, env = "DOQUERIES", default_value_t = false)]
    pub doqueries: bool,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub data_dir: PathBuf,
    pub procs: usize,
    pub logfile: PathBuf,
    pub mode: Mode,
    pub totalrec: u64,
    pub doqueries: bool,
}

impl TryFrom<CliArgs> for LoaderConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.procs == 0 {
            bail!("PROCS must be greater than 0");
        }

        if args.data_dir.as_os_str().is_empty() {
            bail!("DATA_DIR must not be empty");
        }

        if args.logfile.as_os_str().is_empty() {
            bail!("LOGFILE must not be empty");
        }

        Ok(Self {
            data_dir: args.data_dir,
            procs: args.procs,
            logfile: args.logfile,
            mode: args.mode,
            totalrec: args.totalrec,
            doqueries: args.doqueries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<LoaderConfig> {
        let argv = std::iter::once("fanlog-loader").chain(args.iter().copied());
        let cli = CliArgs::try_parse_from(argv)?;
        LoaderConfig::try_from(cli)
    }

    #[test]
    fn short_flags() {
        let config = parse(&[
            "-d", "data", "-p", "8", "-l", "out.log", "-m", "linearizable", "-t", "500", "-q",
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.procs, 8);
        assert_eq!(config.logfile, PathBuf::from("out.log"));
        assert_eq!(config.mode, Mode::Linearizable);
        assert_eq!(config.totalrec, 500);
        assert!(config.doqueries);
    }

    #[test]
    fn long_flags() {
        let config = parse(&["--procs", "3", "--mode", "majority", "--totalrec", "10"]).unwrap();
        assert_eq!(config.procs, 3);
        assert_eq!(config.mode, Mode::Majority);
        assert_eq!(config.totalrec, 10);
    }

    #[test]
    fn rejects_zero_procs() {
        assert!(parse(&["-p", "0"]).is_err());
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(parse(&["-m", "eventual"]).is_err());
    }
}
