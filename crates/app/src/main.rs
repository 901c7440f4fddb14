mod config;

use services::api::ApiResponse;
use services::question_bank::{DEFAULT_OPTIONS_PER_QUESTION, DEFAULT_QUESTION_COUNT};
use services::{AppServices, AssessmentApi, Clock};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{
    Args, ENV_ANSWER_POLICY, ENV_DB_URL, ENV_ORDERING, ENV_RANDOM_DRAW, prepare_sqlite_file,
};

const DEFAULT_LOG_FILTER: &str = "services=info,app=info";

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [global flags] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  seed [--count <n>] [--options <k>]     populate the question bank");
    eprintln!("  user create");
    eprintln!("  user get <user_id>");
    eprintln!("  assessment create <user_id>");
    eprintln!("  assessment get <assessment_id>");
    eprintln!("  start <assessment_id> [--end-existing]");
    eprintln!("  healthz --referer <page_url>");
    eprintln!("  question <assessment_id> <index>");
    eprintln!("  answer <assessment_id> <index> --option <option_id>");
    eprintln!("  end <assessment_id>");
    eprintln!();
    eprintln!("Global flags:");
    eprintln!("  --db <sqlite_url>                    default sqlite://assessments.sqlite3");
    eprintln!("  --answer-policy trusted|strict       default trusted");
    eprintln!("  --ordering sequential|random         default random");
    eprintln!("  --random-draw with-replacement|without-replacement");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {ENV_DB_URL}, {ENV_ANSWER_POLICY}, {ENV_ORDERING}, {ENV_RANDOM_DRAW}, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Seed,
    CreateUser,
    GetUser(String),
    CreateAssessment(String),
    GetAssessment(String),
    Start(String),
    Healthcheck,
    Question(String, String),
    Answer(String, String),
    End(String),
}

impl Command {
    fn from_positionals(positionals: &[String]) -> Option<Self> {
        let words: Vec<&str> = positionals.iter().map(String::as_str).collect();
        let command = match words.as_slice() {
            ["seed"] => Self::Seed,
            ["user", "create"] => Self::CreateUser,
            ["user", "get", id] => Self::GetUser((*id).to_owned()),
            ["assessment", "create", user_id] => Self::CreateAssessment((*user_id).to_owned()),
            ["assessment", "get", id] => Self::GetAssessment((*id).to_owned()),
            ["start", id] => Self::Start((*id).to_owned()),
            ["healthz"] => Self::Healthcheck,
            ["question", id, index] => Self::Question((*id).to_owned(), (*index).to_owned()),
            ["answer", id, index] => Self::Answer((*id).to_owned(), (*index).to_owned()),
            ["end", id] => Self::End((*id).to_owned()),
            _ => return None,
        };
        Some(command)
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_response(response: &ApiResponse) -> Result<bool, serde_json::Error> {
    println!("{}", response.http_status);
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(response.is_success())
}

async fn dispatch(api: &AssessmentApi, command: Command, args: &Args) -> ApiResponse {
    match command {
        Command::Seed => {
            let count = args.count.unwrap_or(DEFAULT_QUESTION_COUNT);
            let options = args
                .options_per_question
                .unwrap_or(DEFAULT_OPTIONS_PER_QUESTION);
            match api.services().question_bank().prepopulate(count, options).await {
                Ok(created) => {
                    info!(created, "seed finished");
                    ApiResponse::created(created)
                }
                Err(err) => ApiResponse::error(500, err.to_string()),
            }
        }
        Command::CreateUser => api.create_user().await,
        Command::GetUser(id) => api.get_user(&id).await,
        Command::CreateAssessment(user_id) => api.create_assessment(&user_id).await,
        Command::GetAssessment(id) => api.get_assessment(&id).await,
        Command::Start(id) => {
            let body = serde_json::json!({ "end_existing_attempt": args.end_existing });
            api.start(&id, Some(&body.to_string())).await
        }
        Command::Healthcheck => api.healthcheck(args.referer.as_deref()).await,
        Command::Question(id, index) => api.get_question(&id, &index).await,
        Command::Answer(id, index) => {
            let body = args.option_id.as_deref().map(|option| {
                serde_json::json!({ "OptionId": option.trim().parse::<u64>().ok() }).to_string()
            });
            api.submit_answer(&id, &index, body.as_deref()).await
        }
        Command::End(id) => api.end(&id).await,
    }
}

async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args = Args::from_env(std::env::args().skip(1)).inspect_err(|e| {
        eprintln!("{e}");
        print_usage();
    })?;
    if args.help || args.positionals.is_empty() {
        print_usage();
        return Ok(args.help);
    }

    let Some(command) = Command::from_positionals(&args.positionals) else {
        eprintln!("unknown command: {}", args.positionals.join(" "));
        print_usage();
        return Ok(false);
    };

    // The database file is created here; services only see a URL.
    prepare_sqlite_file(&args.db_url)?;
    let services =
        AppServices::new_sqlite(&args.db_url, Clock::default_clock(), args.options).await?;
    debug!(db_url = %args.db_url, options = ?args.options, "services ready");

    let api = AssessmentApi::new(services);
    let response = dispatch(&api, command, &args).await;
    Ok(print_response(&response)?)
}

#[tokio::main]
async fn main() {
    init_tracing();
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}
