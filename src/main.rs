use std::convert::TryFrom;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{debug, error};
use serde_json::{json, Value as Json};

use odoo_xmlrpc::{Config, Domain, Odoo, Result, SearchOptions, Value};

#[derive(Parser)]
#[command(name = "odoo", version, about = "Query and update an Odoo database over XML-RPC")]
struct Cli {
    /// Base URL of the Odoo server, e.g. "https://odoo.example.com"
    #[arg(short = 'u', long, env = "ODOO_URL")]
    url: String,

    /// Database to connect to
    #[arg(short = 'd', long = "db", env = "ODOO_DB")]
    database: String,

    #[arg(short = 'l', long, env = "ODOO_USERNAME")]
    username: String,

    #[arg(short = 'p', long, env = "ODOO_PASSWORD", hide_env_values = true)]
    password: String,

    /// Seconds to wait for each call
    #[arg(long, env = "ODOO_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Paging {
    #[arg(long)]
    offset: Option<u32>,

    #[arg(long)]
    limit: Option<u32>,

    /// Sort specification, e.g. "name desc"
    #[arg(long)]
    order: Option<String>,
}

impl Paging {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            offset: self.offset,
            limit: self.limit,
            order: self.order.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the server version
    Version,
    /// Print the ids of the records matching a domain
    Search {
        model: String,
        /// Domain as JSON, e.g. '[["is_company", "=", true]]'
        #[arg(long, default_value = "[]")]
        domain: String,
        #[command(flatten)]
        paging: Paging,
    },
    /// Count the records matching a domain
    Count {
        model: String,
        #[arg(long, default_value = "[]")]
        domain: String,
    },
    /// Read records by id
    Read {
        model: String,
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Comma-separated field names, all fields when omitted
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Search and read in one call
    SearchRead {
        model: String,
        #[arg(long, default_value = "[]")]
        domain: String,
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        #[command(flatten)]
        paging: Paging,
    },
    /// Describe the fields of a model
    Fields {
        model: String,
        /// Comma-separated attributes to return, e.g. "string,type"
        #[arg(long, value_delimiter = ',')]
        attributes: Vec<String>,
    },
    /// Create a record from a JSON object of field values
    Create { model: String, values: String },
    /// Update records with a JSON object of field values
    Write {
        model: String,
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        values: String,
    },
    /// Print the display names of records
    NameGet {
        model: String,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Delete records
    Unlink {
        model: String,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

fn parse_domain(domain: &str) -> Result<Domain> {
    let json: Json = serde_json::from_str(domain)?;
    Domain::try_from(Value::from_json(json))
}

fn parse_values(values: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(values)?;
    Ok(Value::from_json(json))
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

async fn run(cli: Cli) -> Result<Json> {
    let config = Config::new(&cli.url, &cli.database, &cli.username, &cli.password)
        .with_timeout(Duration::from_secs(cli.timeout));
    debug!("Using config: {:?}", config);

    let odoo = Odoo::connect(config).await?;

    let output = match cli.command {
        Command::Version => json!({
            "server_version": odoo.server_version().server_version,
            "server_version_info": odoo.server_version().server_version_info,
            "server_serie": odoo.server_version().server_serie,
            "protocol_version": odoo.server_version().protocol_version,
            "uid": odoo.uid(),
        }),
        Command::Search {
            model,
            domain,
            paging,
        } => serde_json::to_value(
            odoo.search(&model, &parse_domain(&domain)?, &paging.options())
                .await?,
        )?,
        Command::Count { model, domain } => {
            serde_json::to_value(odoo.search_count(&model, &parse_domain(&domain)?).await?)?
        }
        Command::Read { model, ids, fields } => {
            serde_json::to_value(odoo.read(&model, &ids, &as_strs(&fields)).await?)?
        }
        Command::SearchRead {
            model,
            domain,
            fields,
            paging,
        } => serde_json::to_value(
            odoo.search_read(&model, &parse_domain(&domain)?, &as_strs(&fields), &paging.options())
                .await?,
        )?,
        Command::Fields { model, attributes } => {
            Json::Object(odoo.fields_get(&model, &[], &as_strs(&attributes)).await?)
        }
        Command::Create { model, values } => {
            serde_json::to_value(odoo.create(&model, &parse_values(&values)?).await?)?
        }
        Command::Write { model, ids, values } => {
            serde_json::to_value(odoo.write(&model, &ids, &parse_values(&values)?).await?)?
        }
        Command::NameGet { model, ids } => serde_json::to_value(odoo.name_get(&model, &ids).await?)?,
        Command::Unlink { model, ids } => serde_json::to_value(odoo.unlink(&model, &ids).await?)?,
    };
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Init logging to DEBUG only if user required it
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "odoo",
            "--url",
            "http://localhost:8069",
            "--db",
            "odoo14",
            "--username",
            "admin",
            "--password",
            "admin",
            "search",
            "res.partner",
            "--domain",
            r#"[["is_company", "=", true]]"#,
            "--limit",
            "5",
        ])
        .unwrap();

        match cli.command {
            Command::Search { model, domain, paging } => {
                assert_eq!("res.partner", model);
                assert_eq!(1, parse_domain(&domain).unwrap().len());
                assert_eq!(Some(5), paging.options().limit);
                assert_eq!(None, paging.options().offset);
            }
            _ => panic!("expected the search command"),
        }
    }

    #[test]
    fn test_parse_read_fields() {
        let cli = Cli::try_parse_from([
            "odoo", "-u", "http://localhost:8069", "-d", "db", "-l", "admin", "-p", "admin",
            "read", "res.partner", "7", "9", "--fields", "name,email",
        ])
        .unwrap();

        match cli.command {
            Command::Read { ids, fields, .. } => {
                assert_eq!(vec![7, 9], ids);
                assert_eq!(vec!["name", "email"], as_strs(&fields));
            }
            _ => panic!("expected the read command"),
        }
    }

    #[test]
    fn test_bad_domain_is_an_error() {
        assert!(parse_domain("not json").is_err());
        assert!(parse_domain(r#"{"name": "x"}"#).is_err());
        assert!(parse_domain("[]").unwrap().is_empty());
    }
}
