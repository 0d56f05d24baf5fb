use anyhow::Context;
use clap::Parser;
use shadow_forwarder::kafka::KafkaProducer;
use shadow_forwarder::{Config, Forwarder, InvocationContext, InvocationEvent, InvocationResponse};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "shadow-forwarder")]
#[command(about = "Forwards device shadow updates to Kafka", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Invocation events, one JSON per line (default: stdin)"
    )]
    input: Option<PathBuf>,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting shadow-forwarder");
    info!("Loading configuration from {:?}", args.config);

    let config = Config::from_file(&args.config).context("failed to load configuration")?;

    info!(
        kafka_brokers = ?config.kafka.brokers,
        kafka_client_id = %config.kafka.client_id,
        topic = %config.forwarder.topic_name,
        send_timeout_ms = config.forwarder.send_timeout_ms,
        "Configuration summary"
    );

    let forwarder = Forwarder::from_config(&config);
    forwarder.warm_up().await;

    let failed = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {:?}", path))?;
            run(&forwarder, BufReader::new(file)).await?
        }
        None => run(&forwarder, BufReader::new(tokio::io::stdin())).await?,
    };

    forwarder.shutdown().await?;
    info!(failed, "Input exhausted, forwarder stopped");

    if failed > 0 {
        anyhow::bail!("{} invocation(s) failed", failed);
    }
    Ok(())
}

/// Treats each input line as one invocation against the same warm forwarder.
/// Returns the number of failed invocations.
async fn run<R>(forwarder: &Forwarder<KafkaProducer>, input: R) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut stdout = tokio::io::stdout();
    let mut failed = 0;
    let mut sequence = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        sequence += 1;

        let context = InvocationContext {
            request_id: format!("local-{}", sequence),
            function_name: "shadow-forwarder".to_string(),
        };

        let response = match serde_json::from_str::<InvocationEvent>(&line) {
            Ok(event) => InvocationResponse::from(&forwarder.handle(&event, &context).await),
            Err(e) => InvocationResponse::Error {
                error: format!("invalid invocation event: {}", e),
                retryable: false,
            },
        };

        if let InvocationResponse::Error { error, .. } = &response {
            error!(request_id = %context.request_id, "Invocation failed: {}", error);
            failed += 1;
        }

        let mut rendered = serde_json::to_vec(&response)?;
        rendered.push(b'\n');
        stdout.write_all(&rendered).await?;
        stdout.flush().await?;
    }

    Ok(failed)
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("shadow_forwarder=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("shadow_forwarder=info,warn"))
    };

    // stdout carries invocation responses, so logs go to stderr.
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
