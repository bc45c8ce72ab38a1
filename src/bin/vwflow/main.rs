use futures::prelude::*;
use vwflow::{config, Config, HmacUpload, ItemsQuery, NewItem, VWflow, Workflow, WorkflowStatus};

const CONFIG_LOCATION: &str = "vwflow.toml";
const CONFIG_ENV: &str = "VWFLOW_CONFIG";
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3);

const USAGE: &str = r##"
usage:
    vwflow list [key=value ..]       -- get the first page of an items query
                                        e.g. vwflow list type=video search=bunny
    vwflow list-all [key=value ..]   -- get every page of an items query
    vwflow get ID                    -- get an item
    vwflow create PATH [name] [description] [tag,tag,..]
                                     -- create an item by uploading a file
    vwflow update ID field=value ..  -- change name, description or tags (comma separated)
    vwflow snapshot ID SNAPSHOT_ID   -- select another snapshot for an item
    vwflow delete ID                 -- delete an item
    vwflow wait ID                   -- poll an item until its workflow is done
    vwflow hmac-upload PATH [client_data]
                                     -- upload a file with the [hmac] settings
    vwflow hmac-form [redirect]      -- print the fields for a browser upload form

    vwflow default-config            -- prints out the default configuration
                                        you can redirect this to a file with:
                                        vwflow default-config > vwflow.toml
    vwflow help                      -- show this help message

the configuration is read from ./vwflow.toml, or the file named by VWFLOW_CONFIG
"##;

enum Command {
    List { query: ItemsQuery, all: bool },
    Get(String),
    Create(NewItem),
    Update { id: String, fields: Vec<(String, String)> },
    Snapshot { id: String, snapshot_id: i64 },
    Delete(String),
    Wait(String),
    HmacUpload { path: String, client_data: String },
    HmacForm { redirect: Option<String> },
    DefaultConfig,
    Help,
}

impl Command {
    fn parse() -> Command {
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        Self::parse_args(&args).unwrap_or(Command::Help)
    }

    fn parse_args(args: &[String]) -> Option<Command> {
        let (head, tail) = args.split_first()?;
        let arg = |n: usize| tail.get(n).cloned();

        let cmd = match head.as_str() {
            "list" | "list-all" => Command::List {
                query: pairs(tail)?.into_iter().collect(),
                all: head == "list-all",
            },
            "get" => Command::Get(arg(0)?),
            "create" => {
                let mut item = NewItem::new(arg(0)?);
                if let Some(name) = arg(1) {
                    item = item.name(name);
                }
                if let Some(description) = arg(2) {
                    item = item.description(description);
                }
                if let Some(tags) = arg(3) {
                    item = item.tags(split_tags(&tags));
                }
                Command::Create(item)
            }
            "update" => Command::Update {
                id: arg(0)?,
                fields: pairs(tail.get(1..)?).filter(|f| !f.is_empty())?,
            },
            "snapshot" => Command::Snapshot {
                id: arg(0)?,
                snapshot_id: arg(1)?.parse().ok()?,
            },
            "delete" => Command::Delete(arg(0)?),
            "wait" => Command::Wait(arg(0)?),
            "hmac-upload" => Command::HmacUpload {
                path: arg(0)?,
                client_data: arg(1).unwrap_or_default(),
            },
            "hmac-form" => Command::HmacForm { redirect: arg(0) },
            "default-config" => Command::DefaultConfig,
            _ => Command::Help,
        };
        Some(cmd)
    }
}

fn pairs(args: &[String]) -> Option<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            let mut iter = arg.splitn(2, '=');
            Some((iter.next()?.to_string(), iter.next()?.to_string()))
        })
        .collect()
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn init_logger(level: config::LogLevel) -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        let level: log::LevelFilter = level.into();
        std::env::set_var("RUST_LOG", format!("vwflow={}", level.to_string().to_lowercase()));
    }

    let opts = alto_logger::Options::default()
        .with_time(alto_logger::options::TimeConfig::date_time_format("%c"));
    let logger = alto_logger::TermLogger::new(opts)?;
    alto_logger::init(logger).map_err(|err| anyhow::anyhow!("cannot init logger: {:?}", err))
}

async fn load_config() -> anyhow::Result<Config> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_LOCATION.to_string());
    if tokio::fs::metadata(&path).await.is_err() {
        tokio::fs::write(&path, config::DEFAULT_CONFIG).await?;
        anyhow::bail!("{} wasn't found. created a new one. edit it and re-run", path);
    }
    Config::load(&path).await
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = match Command::parse() {
        Command::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        Command::DefaultConfig => {
            Config::print_default();
            return Ok(());
        }
        cmd => cmd,
    };

    let config = load_config().await?;
    init_logger(config.log_level)?;

    let client = VWflow::with_config(config.client_config());
    log::debug!("using {}", client.base_url());

    match cmd {
        Command::List { query, all: false } => print_json(&client.list_items(&query).await?)?,

        Command::List { query, all: true } => {
            let mut pages = Box::pin(client.pages(&query));
            let mut total = 0;
            while let Some(page) = pages.next().await {
                let page = page?;
                log::info!("got a page of {} items", page.count);
                for item in &page.results {
                    let status = item
                        .workflow()
                        .and_then(Workflow::status)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    println!(
                        "{}\t{}\t{}",
                        item.id,
                        status,
                        item.name().unwrap_or_default()
                    );
                }
                total += page.results.len();
            }
            log::info!("{} items in total", total);
        }

        Command::Get(id) => print_json(&client.get_item(&id).await?)?,

        Command::Create(item) => {
            log::info!("uploading {}", item.path().display());
            print_json(&client.create_item(&item).await?)?
        }

        Command::Update { id, fields } => {
            let mut item = client.get_item(&id).await?;
            for (key, value) in fields {
                match key.as_str() {
                    "name" => item.set_name(value),
                    "description" => item.set_description(value),
                    "tags" => item.set_tags(split_tags(&value)),
                    key => anyhow::bail!("'{}' can't be updated from here", key),
                }
            }
            print_json(&client.update_item(&item).await?)?
        }

        Command::Snapshot { id, snapshot_id } => {
            print_json(&client.set_item_snapshot(&id, snapshot_id).await?)?
        }

        Command::Delete(id) => {
            client.delete_item(&id).await?;
            log::info!("deleted {}", id);
        }

        Command::Wait(id) => loop {
            let item = client.get_item(&id).await?;
            match item.workflow() {
                Some(workflow) if workflow.is_finished() => {
                    log::info!(
                        "workflow is {} (last action: {})",
                        workflow.status().map(WorkflowStatus::as_str).unwrap_or_default(),
                        workflow.curr_action().unwrap_or("unknown")
                    );
                    print_json(&item)?;
                    break;
                }
                Some(workflow) => match workflow.status() {
                    Some(status) => log::info!("workflow is {}", status),
                    None => log::info!("workflow has no status yet"),
                },
                None => log::info!("no workflow yet"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        },

        Command::HmacUpload { path, client_data } => {
            let config::Hmac {
                account_id,
                wprofile_id,
                secret,
                valid_for,
            } = &config.hmac;

            let mut upload = HmacUpload::new(path, account_id, wprofile_id, secret)
                .client_data(client_data);
            if let Some(valid_for) = valid_for {
                upload = upload.valid_for(std::time::Duration::from_secs(*valid_for));
            }
            print_json(&client.create_item_with_hmac(&upload).await?)?
        }

        Command::HmacForm { redirect } => {
            let config::Hmac {
                account_id,
                wprofile_id,
                secret,
                valid_for,
            } = &config.hmac;

            let valid_for = valid_for
                .map(std::time::Duration::from_secs)
                .unwrap_or(vwflow::hmac::DEFAULT_VALID_FOR);

            let mut token =
                vwflow::HmacToken::generate(secret, valid_for, time::OffsetDateTime::now_utc());
            if let Some(redirect) = redirect {
                token = token.redirect(redirect);
            }

            let mut fields = serde_json::Map::new();
            fields.insert(
                "action".into(),
                client.hmac_redirect_url(account_id, wprofile_id).into(),
            );
            for (key, value) in token.form_fields().iter() {
                fields.insert(key.to_string(), value.clone().into());
            }
            print_json(&fields)?
        }

        Command::Help | Command::DefaultConfig => unreachable!("handled before loading the config"),
    }

    Ok(())
}
