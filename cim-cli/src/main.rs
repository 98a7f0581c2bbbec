use std::{collections::HashMap, error::Error, path::PathBuf, str::FromStr};

use anyhow::Context;
use cim_connector::prelude::*;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Read and query CIM RDF/XML files with SQL
#[derive(Debug, Parser)]
#[command(name = "cim", version, about, long_about = None)]
struct Args {
    /// Connection configuration file (json, yaml or toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// k=v list of parameters substituted into the configuration file
    /// e.g. cim query -c conn.yml -p bucket=grid file.rdf "select ..."
    #[arg(short, long, global = true, value_parser = parse_key_val::<String, String>)]
    params: Option<Vec<(String, String)>>,

    /// Logging level (info, debug, trace)
    #[arg(long, global = true, env = "CIM_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a file and print its element counts
    Read {
        /// Path or URL of the RDF/XML file
        file: String,
    },

    /// Run a SQL query against the class tables of a file
    Query {
        /// Path or URL of the RDF/XML file
        file: String,

        /// Query to run, e.g. "select sup.sup.sup.sup.name from EnergyConsumer"
        sql: String,

        /// Print the query plans instead of the rows
        #[arg(long)]
        explain: bool,
    },
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

fn load_spec(
    config: Option<PathBuf>,
    params: HashMap<String, String>,
) -> anyhow::Result<ConnectionSpec> {
    match config {
        Some(path) => {
            debug!("Loading connection configuration from {}", path.display());
            ConnectionSpec::from_file(&path, params)
                .with_context(|| format!("failed to load configuration '{}'", path.display()))
        }
        None => Ok(ConnectionSpec::default()),
    }
}

async fn read(
    interaction: &mut Interaction,
    factory: &ConnectionFactory,
    file: String,
) -> anyhow::Result<()> {
    let input = factory.record_factory().create_input().with("filename", file);
    let mut output = factory.record_factory().create_output();

    interaction
        .execute_into(&InteractionSpec::read(), &input, &mut output)
        .await
        .context("failed to read file")?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn explain(
    interaction: &mut Interaction,
    factory: &ConnectionFactory,
    file: String,
    sql: String,
) -> anyhow::Result<()> {
    let input = factory
        .record_factory()
        .create_input()
        .with("filename", file)
        .with("query", sql);
    let mut output = factory.record_factory().create_output();

    interaction
        .execute_into(&InteractionSpec::explain(), &input, &mut output)
        .await
        .context("failed to explain query")?;

    if let Some(plans) = output.get("plan").and_then(Value::as_map) {
        for (plan_type, plan) in plans {
            println!("{plan_type}:\n{}\n", plan.as_str().unwrap_or_default());
        }
    }

    Ok(())
}

async fn query(
    interaction: &mut Interaction,
    factory: &ConnectionFactory,
    file: String,
    sql: String,
) -> anyhow::Result<()> {
    let input = factory
        .record_factory()
        .create_input()
        .with("filename", file)
        .with("query", sql);

    let mut rows = interaction
        .execute(&InteractionSpec::get_data_frame(), &input)
        .await
        .and_then(Record::into_result_set)
        .context("failed to run query")?;

    let columns = rows.column_count();
    let header = (1..=columns)
        .map(|i| rows.column_name(i).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", header.join("\t"));

    let mut count = 0;
    while rows.next().await? {
        let row = (1..=columns)
            .map(|i| rows.get_string(i).map(Option::unwrap_or_default))
            .collect::<Result<Vec<_>, _>>()?;
        println!("{}", row.join("\t"));
        count += 1;
    }
    rows.close();

    debug!(rows = count, "Query finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(args.log_level.to_lowercase().as_str()).unwrap_or(Level::WARN);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    let params = HashMap::from_iter(args.params.unwrap_or_default());
    let spec = load_spec(args.config, params)?;

    let factory = ConnectionFactory::new(ContextPolicy::Shared);
    let mut connection = factory
        .create_connection(&spec)
        .await
        .context("failed to create connection")?;
    let mut interaction = connection.create_interaction()?;

    let result = match args.command {
        Commands::Read { file } => read(&mut interaction, &factory, file).await,
        Commands::Query { file, sql, explain: true } => {
            explain(&mut interaction, &factory, file, sql).await
        }
        Commands::Query { file, sql, .. } => query(&mut interaction, &factory, file, sql).await,
    };

    interaction.close();
    connection.close();

    result
}
