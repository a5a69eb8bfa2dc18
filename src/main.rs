use std::env;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use content_audit::domain::document::Document;
use content_audit::engine::{self, Engine};
use content_audit::models::config::EngineConfig;

/// One document per stdin line, as produced by the scraping collaborator.
#[derive(Deserialize, Debug)]
struct DocumentLine {
    url: String,
    #[serde(default)]
    title: String,
    text: String,
}

/// Output line for an input that produced no analysis.
#[derive(Serialize, Debug, PartialEq)]
struct FailureLine {
    url: Option<String>,
    /// 1-based stdin line, set when the line itself could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    error: String,
}

/// Parse one stdin line, naming the url when the JSON is readable enough.
fn parse_line(raw: &str, line_no: usize) -> Result<Document, FailureLine> {
    serde_json::from_str::<DocumentLine>(raw)
        .map(|doc| Document::new(doc.url, doc.title, &doc.text))
        .map_err(|e| FailureLine {
            url: serde_json::from_str::<serde_json::Value>(raw)
                .ok()
                .and_then(|value| value.get("url")?.as_str().map(str::to_string)),
            line: Some(line_no),
            error: format!("invalid input line: {e}"),
        })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("CONTENT_AUDIT_CONFIG").ok());
    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let batch_size = config.batch_size;

    let engine = match tokio::task::spawn_blocking(move || engine::initialize(&config)).await {
        Ok(Ok(engine)) => engine,
        Ok(Err(e)) => {
            log::error!("Failed to initialize engine: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("Engine initialization aborted: {e}");
            std::process::exit(1);
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut batch = Vec::with_capacity(batch_size);
    let mut line_no = 0;

    loop {
        let (line, read_failed) = match lines.next_line().await {
            Ok(line) => (line, false),
            Err(e) => {
                log::error!("Failed to read stdin: {e}");
                (None, true)
            }
        };
        let finished = line.is_none();

        let mut failure = None;
        if let Some(raw) = line.as_deref() {
            line_no += 1;
            if !raw.trim().is_empty() {
                match parse_line(raw, line_no) {
                    Ok(document) => batch.push(document),
                    Err(rejected) => {
                        log::error!("Failed to parse line {line_no}: {}", rejected.error);
                        failure = Some(rejected);
                    }
                }
            }
        }

        // Pending documents are written before a failure line to keep input order.
        if !batch.is_empty() && (batch.len() >= batch_size || finished || failure.is_some()) {
            let documents = std::mem::take(&mut batch);
            if let Err(e) = process_batch(engine, documents, &mut stdout).await {
                log::error!("Failed to write results: {e}");
                std::process::exit(1);
            }
        }
        if let Some(failure) = failure
            && let Err(e) = write_line(&mut stdout, &failure).await
        {
            log::error!("Failed to write results: {e}");
            std::process::exit(1);
        }

        if read_failed {
            std::process::exit(1);
        }
        if finished {
            break;
        }
    }
}

async fn write_line<T: Serialize>(out: &mut Stdout, value: &T) -> std::io::Result<()> {
    let line = serde_json::to_string(value).map_err(std::io::Error::other)?;
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

async fn process_batch(
    engine: &'static Engine,
    documents: Vec<Document>,
    out: &mut Stdout,
) -> std::io::Result<()> {
    log::info!("Analyzing batch of {} documents", documents.len());

    let (documents, results) = tokio::task::spawn_blocking(move || {
        let results = engine.analyze_batch(&documents);
        (documents, results)
    })
    .await
    .map_err(std::io::Error::other)?;

    for (doc, result) in documents.iter().zip(results) {
        match result {
            Ok(analysis) => write_line(out, &analysis).await?,
            Err(err) => {
                log::warn!("Analysis failed for {}: {err}", doc.url);
                let failure = FailureLine {
                    url: Some(doc.url.clone()),
                    line: None,
                    error: err.to_string(),
                };
                write_line(out, &failure).await?;
            }
        }
    }
    Ok(())
}
