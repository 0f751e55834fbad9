use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cinebully::app::start_node;
use cinebully::client::ClusterClient;
use cinebully::config::ClusterConfig;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Cinema seat booking on a Bully-elected cluster", long_about = None)]
pub struct Opt {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Run one cluster member
    Node {
        #[clap(long, env = "CINEBULLY_CONFIG", default_value = "cluster.toml")]
        config: PathBuf,

        #[clap(long, env = "CINEBULLY_NODE_ID")]
        id: u64,
    },
    /// List the nodes known to a member
    Nodes {
        #[clap(long, default_value = "127.0.0.1:8081")]
        addr: String,
    },
    /// Show the seat map
    Seats {
        #[clap(long, default_value = "127.0.0.1:8081")]
        addr: String,
    },
    /// Show the transaction log
    Transactions {
        #[clap(long, default_value = "127.0.0.1:8081")]
        addr: String,
    },
    /// Show the election history
    Elections {
        #[clap(long, default_value = "127.0.0.1:8081")]
        addr: String,
    },
    /// Book a seat, e.g. `book --seat A2 --customer "Jane Doe"`
    Book {
        #[clap(long, default_value = "127.0.0.1:8081")]
        addr: String,

        #[clap(long)]
        seat: String,

        #[clap(long)]
        customer: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Setup the logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = Opt::parse();

    match options.command {
        Command::Node { config, id } => {
            let cluster = ClusterConfig::load(&config)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("loading {}", config.display()))?;
            let node = cluster.for_node(id).map_err(anyhow::Error::msg)?;

            tracing::info!("Starting node {} ({} members)", id, node.cluster.nodes.len());
            start_node(node).await?;
        }
        Command::Nodes { addr } => print_json(&ClusterClient::new(addr)?.nodes().await?)?,
        Command::Seats { addr } => print_json(&ClusterClient::new(addr)?.seats().await?)?,
        Command::Transactions { addr } => {
            print_json(&ClusterClient::new(addr)?.transactions().await?)?
        }
        Command::Elections { addr } => {
            print_json(&ClusterClient::new(addr)?.election_events().await?)?
        }
        Command::Book {
            addr,
            seat,
            customer,
        } => print_json(&ClusterClient::new(addr)?.book(&seat, &customer).await?)?,
    }

    Ok(())
}
