use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "embedvec")]
#[command(about = "Embed texts, store them in a vector index, and query it", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the literary demo: embed three texts, upsert two, query with the third")]
    Run {
        #[arg(long, help = "Embedding model (overrides EMBEDVEC_MODEL)")]
        model: Option<String>,

        #[arg(long, help = "Index name (overrides EMBEDVEC_INDEX_NAME)")]
        index: Option<String>,

        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..), help = "Number of matches to return")]
        top_k: Option<usize>,

        #[arg(long, help = "Return raw vectors with each match")]
        include_values: Option<bool>,

        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..), help = "Concurrent embedding requests")]
        concurrency: Option<usize>,

        #[arg(long, value_parser = clap::value_parser!(u64).range(1..), help = "Per-stage timeout in seconds")]
        timeout_secs: Option<u64>,

        #[arg(long, help = "Continue with the inputs that embedded when some fail")]
        proceed_on_partial: bool,

        #[arg(long, help = "Query with the fixed 8-value probe vector instead of the third text")]
        probe: bool,

        #[arg(long, help = "Use the deterministic embedder and an in-memory store")]
        offline: bool,
    },

    #[command(about = "List indexes in the vector store")]
    Indexes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_counts_rejected_at_parse() {
        for flag in ["--top-k", "--concurrency", "--timeout-secs"] {
            let parsed = Cli::try_parse_from(["embedvec", "run", flag, "0"]);
            assert!(parsed.is_err(), "{flag} 0 should not parse");
        }
    }

    #[test]
    fn test_positive_overrides_parse() {
        let cli = Cli::try_parse_from(["embedvec", "run", "--top-k", "3", "--timeout-secs", "5"]).unwrap();
        match cli.command {
            Commands::Run { top_k, timeout_secs, .. } => {
                assert_eq!(top_k, Some(3));
                assert_eq!(timeout_secs, Some(5));
            }
            Commands::Indexes => panic!("expected run"),
        }
    }
}
